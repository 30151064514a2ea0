//! Query specification builder.
//!
//! A [`QuerySpec`] accumulates everything one query sends: table and alias,
//! projection, filter text with named parameters, joins, ordering and
//! paging. It is consumed by [`QuerySpec::into_request`] when the query runs.
//!
//! # Example
//!
//! ```rust
//! use serde::Serialize;
//! use sqldata_query::query::QuerySpec;
//!
//! #[derive(Serialize)]
//! struct Params<'a> {
//!     country: &'a str,
//! }
//!
//! let spec = QuerySpec::new()
//!     .table("dbo.Orders o")
//!     .inner_join("dbo.Products p", "p.ProductId = o.ProductId")
//!     .filter_with("o.Country = @country", &Params { country: "UK" })
//!     .order_by("o.OrderDate desc")
//!     .top(10);
//!
//! assert_eq!(spec.table_name(), "dbo.Orders");
//! assert_eq!(spec.alias(), Some("o"));
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{QueryError, QueryResult};

/// Kind of a table join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinKind {
    /// `INNER JOIN`
    #[serde(rename = "InnerJoin")]
    Inner,
    /// `LEFT JOIN`
    #[serde(rename = "LeftJoin")]
    Left,
    /// `RIGHT JOIN`
    #[serde(rename = "RightJoin")]
    Right,
    /// `FULL JOIN`
    #[serde(rename = "FullJoin")]
    Full,
}

/// One joined table with its mandatory alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableJoin {
    /// Joined table name.
    pub table_name: String,
    /// Alias used by the join condition.
    pub table_alias: String,
    /// Join kind.
    pub join_type: JoinKind,
    /// Join condition, passed through verbatim.
    pub join_condition: String,
}

impl TableJoin {
    /// Parse `"name alias"` into a join. Fails if there is no alias.
    pub fn parse(
        kind: JoinKind,
        table_with_alias: &str,
        condition: impl Into<String>,
    ) -> QueryResult<Self> {
        let (table, alias) = split_alias(table_with_alias)
            .ok_or_else(|| QueryError::invalid_join(table_with_alias))?;

        Ok(Self {
            table_name: table.to_string(),
            table_alias: alias.to_string(),
            join_type: kind,
            join_condition: condition.into(),
        })
    }
}

/// Split `"name alias"` on the first space.
fn split_alias(text: &str) -> Option<(&str, &str)> {
    let (name, alias) = text.trim().split_once(' ')?;
    let alias = alias.trim();
    (!name.is_empty() && !alias.is_empty()).then_some((name, alias))
}

/// Query request body sent to the query endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// Select clause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    /// Filter text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_string: Option<String>,
    /// Named filter parameters, in declaration order. Always sent, even when empty.
    pub filter_parameters: IndexMap<String, Value>,
    /// Rows to skip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    /// Maximum rows to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<u32>,
    /// Order-by clause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    /// Alias of the main table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_table_alias: Option<String>,
    /// Joined tables.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tables_join: Vec<TableJoin>,
}

/// Fluent accumulator for one query.
///
/// Mutators never fail. A bad join or bad filter parameters are remembered
/// and reported when the spec is turned into a request.
#[derive(Debug, Default)]
pub struct QuerySpec {
    table: String,
    alias: Option<String>,
    select: Option<String>,
    filter_string: Option<String>,
    filter_parameters: IndexMap<String, Value>,
    order_by: Option<String>,
    skip: Option<u32>,
    top: Option<u32>,
    joins: Vec<TableJoin>,
    error: Option<QueryError>,
}

impl QuerySpec {
    /// Create an empty spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table or view. `"name alias"` also sets the alias.
    pub fn table(mut self, table: impl AsRef<str>) -> Self {
        let table = table.as_ref().trim();
        match split_alias(table) {
            Some((name, alias)) => {
                self.table = name.to_string();
                self.alias = Some(alias.to_string());
            }
            None => {
                self.table = table.to_string();
                self.alias = None;
            }
        }
        self
    }

    /// Set the select clause explicitly.
    pub fn select(mut self, fields: impl Into<String>) -> Self {
        self.select = Some(fields.into());
        self
    }

    /// Set the filter text and clear any parameters.
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_string = Some(filter.into());
        self.filter_parameters.clear();
        self
    }

    /// Set the filter text with named parameters.
    ///
    /// `params` must serialize to an object; its fields become the
    /// parameters in declaration order. List values are sent as they are.
    pub fn filter_with<P: Serialize + ?Sized>(
        mut self,
        filter: impl Into<String>,
        params: &P,
    ) -> Self {
        self.filter_string = Some(filter.into());
        self.filter_parameters.clear();

        match serde_json::to_value(params) {
            Ok(Value::Object(map)) => self.filter_parameters.extend(map),
            Ok(Value::Null) => {}
            Ok(other) => {
                self.record_error(QueryError::invalid_filter_parameters(format!(
                    "expected an object with named fields, got {}",
                    other
                )));
            }
            Err(e) => {
                self.record_error(
                    QueryError::invalid_filter_parameters(e.to_string()).with_source(e),
                );
            }
        }
        self
    }

    /// Set the order-by clause.
    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// Skip `n` rows.
    pub fn skip(mut self, n: u32) -> Self {
        self.skip = Some(n);
        self
    }

    /// Return at most `n` rows.
    pub fn top(mut self, n: u32) -> Self {
        self.top = Some(n);
        self
    }

    /// Add a join. `table_with_alias` must be `"name alias"`.
    pub fn join(
        mut self,
        kind: JoinKind,
        table_with_alias: &str,
        condition: impl Into<String>,
    ) -> Self {
        match TableJoin::parse(kind, table_with_alias, condition) {
            Ok(join) => self.joins.push(join),
            Err(e) => self.record_error(e),
        }
        self
    }

    /// Add an inner join.
    pub fn inner_join(self, table_with_alias: &str, condition: impl Into<String>) -> Self {
        self.join(JoinKind::Inner, table_with_alias, condition)
    }

    /// Add a left join.
    pub fn left_join(self, table_with_alias: &str, condition: impl Into<String>) -> Self {
        self.join(JoinKind::Left, table_with_alias, condition)
    }

    /// Add a right join.
    pub fn right_join(self, table_with_alias: &str, condition: impl Into<String>) -> Self {
        self.join(JoinKind::Right, table_with_alias, condition)
    }

    /// Add a full join.
    pub fn full_join(self, table_with_alias: &str, condition: impl Into<String>) -> Self {
        self.join(JoinKind::Full, table_with_alias, condition)
    }

    fn record_error(&mut self, error: QueryError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Table or view name (without alias).
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Main table alias.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Explicit select clause, if set.
    pub fn selection(&self) -> Option<&str> {
        self.select.as_deref()
    }

    /// Filter parameters in declaration order.
    pub fn filter_parameters(&self) -> &IndexMap<String, Value> {
        &self.filter_parameters
    }

    /// Joins in the order they were added.
    pub fn joins(&self) -> &[TableJoin] {
        &self.joins
    }

    /// Check whether a table has been set.
    pub fn has_table(&self) -> bool {
        !self.table.is_empty()
    }

    /// First error recorded by a mutator, if any.
    pub fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    /// Consume the spec into the table name and request body.
    ///
    /// `projection` is used when no select clause was set explicitly.
    pub fn into_request(self, projection: Option<String>) -> QueryResult<(String, QueryRequest)> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.table.is_empty() {
            return Err(QueryError::missing_table());
        }

        let select = self
            .select
            .filter(|s| !s.trim().is_empty())
            .or(projection.filter(|s| !s.is_empty()));

        let request = QueryRequest {
            select,
            filter_string: self.filter_string,
            filter_parameters: self.filter_parameters,
            skip: self.skip,
            top: self.top,
            order_by: self.order_by,
            main_table_alias: self.alias,
            tables_join: self.joins,
        };

        Ok((self.table, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Serialize)]
    struct Params {
        country: String,
        ids: Vec<i32>,
        since: &'static str,
    }

    #[test]
    fn test_table_with_alias() {
        let spec = QuerySpec::new().table("dbo.Orders o");
        assert_eq!(spec.table_name(), "dbo.Orders");
        assert_eq!(spec.alias(), Some("o"));

        let spec = QuerySpec::new().table("dbo.Orders");
        assert_eq!(spec.alias(), None);
    }

    #[test]
    fn test_join_requires_alias() {
        let err = TableJoin::parse(JoinKind::Inner, "dbo.table", "1 = 1").unwrap_err();
        assert!(err.is_configuration_error());

        let join = TableJoin::parse(JoinKind::Left, "dbo.table t", "t.Id = o.Id").unwrap();
        assert_eq!(join.table_name, "dbo.table");
        assert_eq!(join.table_alias, "t");
        assert_eq!(join.join_type, JoinKind::Left);
    }

    #[test]
    fn test_bad_join_surfaces_on_request() {
        let spec = QuerySpec::new().table("Orders").right_join("Products", "1 = 1");
        assert!(spec.error().is_some());
        let err = spec.into_request(None).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_filter_params_keep_declaration_order() {
        let spec = QuerySpec::new().table("Orders").filter_with(
            "Country = @country and Id in @ids",
            &Params {
                country: "UK".into(),
                ids: vec![1, 2, 3],
                since: "2020-01-01",
            },
        );

        let keys: Vec<_> = spec.filter_parameters().keys().cloned().collect();
        assert_eq!(keys, vec!["country", "ids", "since"]);
        assert_eq!(spec.filter_parameters()["ids"], json!([1, 2, 3]));
    }

    #[test]
    fn test_filter_without_params_clears_map() {
        let spec = QuerySpec::new()
            .filter_with("a = @a", &json!({ "a": 1 }))
            .filter("b = 2");
        assert!(spec.filter_parameters().is_empty());
    }

    #[test]
    fn test_non_object_params_rejected() {
        let err = QuerySpec::new()
            .table("Orders")
            .filter_with("a = @a", &42)
            .into_request(None)
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidFilterParameters);
    }

    #[test]
    fn test_missing_table() {
        let err = QuerySpec::new().into_request(None).unwrap_err();
        assert!(err.is_configuration_error());
        assert_eq!(err.message, "Table or View Name must be specified.");
    }

    #[test]
    fn test_projection_used_only_without_select() {
        let (_, request) = QuerySpec::new()
            .table("Orders")
            .into_request(Some("A, B".into()))
            .unwrap();
        assert_eq!(request.select.as_deref(), Some("A, B"));

        let (_, request) = QuerySpec::new()
            .table("Orders")
            .select("C")
            .into_request(Some("A, B".into()))
            .unwrap();
        assert_eq!(request.select.as_deref(), Some("C"));
    }

    #[test]
    fn test_request_wire_shape() {
        let (table, request) = QuerySpec::new()
            .table("dbo.Orders o")
            .select("o.Id")
            .filter_with("o.Country = @country", &json!({ "country": "UK" }))
            .inner_join("dbo.Products p", "p.Id = o.ProductId")
            .order_by("o.Id")
            .skip(5)
            .top(10)
            .into_request(None)
            .unwrap();

        assert_eq!(table, "dbo.Orders");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "select": "o.Id",
                "filterString": "o.Country = @country",
                "filterParameters": { "country": "UK" },
                "skip": 5,
                "top": 10,
                "orderBy": "o.Id",
                "mainTableAlias": "o",
                "tablesJoin": [{
                    "tableName": "dbo.Products",
                    "tableAlias": "p",
                    "joinType": "InnerJoin",
                    "joinCondition": "p.Id = o.ProductId"
                }]
            })
        );
    }

    #[test]
    fn test_empty_params_are_still_sent() {
        let (_, request) = QuerySpec::new()
            .table("Orders")
            .filter("a = 1")
            .into_request(None)
            .unwrap();

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "filterString": "a = 1", "filterParameters": {} })
        );
    }
}
