//! Wire data transfer objects.
//!
//! The data service exchanges tabular data as a [`RowTable`]: parallel
//! `fieldNames` / `fieldDataTypes` arrays plus fixed-arity rows.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::value::Record;

/// Coarse column data type declared by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// Short string.
    String,
    /// Long string.
    LargeString,
    /// 32-bit integer.
    WholeNumber,
    /// 64-bit integer (kept as text by the dynamic decoder).
    BigIntNumber,
    /// Floating point or decimal.
    FloatNumber,
    /// Date and time.
    DateTime,
    /// Boolean.
    Boolean,
    /// Unbounded text.
    Text,
    /// Binary data.
    Binary,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Flat row table exchanged with the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowTable {
    /// Column names, unique ignoring case.
    #[serde(default)]
    pub field_names: Vec<String>,
    /// Column types, parallel to `field_names`; absent on write payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_data_types: Option<Vec<ColumnType>>,
    /// Rows; each has exactly `field_names.len()` values.
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl RowTable {
    /// Create an empty table with the given columns.
    pub fn with_columns(field_names: Vec<String>) -> Self {
        Self {
            field_names,
            field_data_types: None,
            rows: Vec::new(),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Declared type of column `index`, if types were sent.
    pub fn column_type(&self, index: usize) -> Option<ColumnType> {
        self.field_data_types
            .as_ref()
            .and_then(|types| types.get(index).copied())
    }

    /// Build the case-insensitive name → index lookup.
    pub fn column_map(&self) -> ColumnMap {
        ColumnMap::new(&self.field_names)
    }
}

/// Case-insensitive column name → index lookup, built once per table.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    index: HashMap<String, usize>,
}

impl ColumnMap {
    /// Index the given column names. Later duplicates do not replace earlier ones.
    pub fn new(field_names: &[String]) -> Self {
        let mut index = HashMap::with_capacity(field_names.len());
        for (i, name) in field_names.iter().enumerate() {
            index.entry(name.to_lowercase()).or_insert(i);
        }
        Self { index }
    }

    /// Find a column ignoring case.
    pub fn get(&self, name: &str) -> Option<usize> {
        self.index.get(&name.to_lowercase()).copied()
    }

    /// Number of indexed columns.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if no columns are indexed.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Insert/update/delete counters reported by a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveInfo {
    /// Rows inserted.
    pub inserted: u64,
    /// Rows updated.
    pub updated: u64,
    /// Rows deleted.
    pub deleted: u64,
}

impl SaveInfo {
    /// Counters with only `inserted` set.
    pub fn inserted(inserted: u64) -> Self {
        Self {
            inserted,
            ..Self::default()
        }
    }

    /// Total rows touched.
    pub fn total(&self) -> u64 {
        self.inserted + self.updated + self.deleted
    }
}

/// Body of a save or append request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    /// Rows to insert or update.
    pub table_data: RowTable,
    /// Key records of rows to delete.
    pub items_to_delete: Vec<Record>,
}

/// Shape of a query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultType {
    /// Result carried as a list of key/value objects.
    Items,
    /// Result carried as a [`RowTable`].
    Table,
}

/// Column description accompanying an `Items` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultFieldInfo {
    /// Column name.
    pub field_name: String,
    /// Column type.
    pub data_type: ColumnType,
}

/// Envelope returned by the query endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryResponse {
    /// Which of `table` / `items` carries the data.
    pub result_type: Option<ResultType>,
    /// Table-shaped result.
    pub table: Option<RowTable>,
    /// Item-shaped result.
    pub items: Option<Vec<IndexMap<String, Value>>>,
    /// Column descriptions for item-shaped results.
    pub fields: Option<Vec<ResultFieldInfo>>,
}

impl QueryResponse {
    /// Normalize either envelope form into a [`RowTable`].
    ///
    /// Item-shaped results take their columns from `fields` when present,
    /// otherwise from the keys of the first item. Keys missing on an item
    /// become null.
    pub fn into_table(self) -> RowTable {
        let prefer_items = self.result_type == Some(ResultType::Items) || self.table.is_none();
        if !prefer_items {
            return self.table.unwrap_or_default();
        }

        let Some(items) = self.items else {
            return self.table.unwrap_or_default();
        };

        let (field_names, field_data_types) = match self.fields {
            Some(fields) => {
                let names: Vec<String> = fields.iter().map(|f| f.field_name.clone()).collect();
                let types = fields.iter().map(|f| f.data_type).collect();
                (names, Some(types))
            }
            None => (
                items
                    .first()
                    .map(|item| item.keys().cloned().collect())
                    .unwrap_or_default(),
                None,
            ),
        };

        let rows = items
            .into_iter()
            .map(|mut item| {
                field_names
                    .iter()
                    .map(|name: &String| item.swap_remove(name).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        RowTable {
            field_names,
            field_data_types,
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_row_table_wire_names() {
        let table: RowTable = serde_json::from_value(json!({
            "fieldNames": ["OrderId", "Country"],
            "fieldDataTypes": ["WholeNumber", "String"],
            "rows": [[1, "UK"]]
        }))
        .unwrap();

        assert_eq!(table.field_names, vec!["OrderId", "Country"]);
        assert_eq!(table.column_type(0), Some(ColumnType::WholeNumber));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_write_payload_omits_types() {
        let table = RowTable::with_columns(vec!["A".into()]);
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json, json!({ "fieldNames": ["A"], "rows": [] }));
    }

    #[test]
    fn test_column_map_ignores_case() {
        let map = ColumnMap::new(&["OrderId".to_string(), "CITY".to_string()]);
        assert_eq!(map.get("orderid"), Some(0));
        assert_eq!(map.get("ORDERID"), Some(0));
        assert_eq!(map.get("City"), Some(1));
        assert_eq!(map.get("Country"), None);
    }

    #[test]
    fn test_save_info_defaults_missing_counters() {
        let info: SaveInfo = serde_json::from_value(json!({ "inserted": 3 })).unwrap();
        assert_eq!(info, SaveInfo::inserted(3));
        assert_eq!(info.total(), 3);
    }

    #[test]
    fn test_table_response_passthrough() {
        let response: QueryResponse = serde_json::from_value(json!({
            "resultType": "Table",
            "table": { "fieldNames": ["A"], "rows": [[1], [2]] }
        }))
        .unwrap();
        let table = response.into_table();
        assert_eq!(table.rows, vec![vec![json!(1)], vec![json!(2)]]);
    }

    #[test]
    fn test_items_response_becomes_table() {
        let response: QueryResponse = serde_json::from_value(json!({
            "resultType": "Items",
            "items": [
                { "Country": "UK", "Sales": 2.5 },
                { "Sales": 4 }
            ],
            "fields": [
                { "fieldName": "Country", "dataType": "String" },
                { "fieldName": "Sales", "dataType": "FloatNumber" }
            ]
        }))
        .unwrap();

        let table = response.into_table();
        assert_eq!(table.field_names, vec!["Country", "Sales"]);
        assert_eq!(
            table.field_data_types,
            Some(vec![ColumnType::String, ColumnType::FloatNumber])
        );
        assert_eq!(table.rows[0], vec![json!("UK"), json!(2.5)]);
        assert_eq!(table.rows[1], vec![Value::Null, json!(4)]);
    }
}
