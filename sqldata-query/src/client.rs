//! Client and per-connection query handle.
//!
//! A [`SqlDataClient`] owns one [`ClientConfig`] and one [`Transport`]. It
//! hands out [`SqlDataApi`] handles bound to a named server connection; each
//! handle accumulates a query through fluent calls and consumes it when an
//! execute method runs, so the same handle can be reused for the next query.
//!
//! ```rust,ignore
//! let client = sqldata_http::connect(ClientConfig::from_env()?)?;
//!
//! let orders: Vec<Order> = client
//!     .connection("SQL-Shared")
//!     .table("test1.Orders o")
//!     .inner_join("test1.Products p", "p.ProductId = o.ProductId")
//!     .filter_with("o.Country = @country", &json!({ "country": "UK" }))
//!     .top(100)
//!     .run_query()
//!     .await?;
//! ```
//!
//! Authentication is resolved once per client: when a username and password
//! are configured, the first request logs in and the bearer token is reused
//! for every later request. A configured access token is appended to every
//! URL as `$accessToken`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::mem;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, trace};

use crate::batch::{BatchWriter, WriteMode, WriteOptions, WriteSink};
use crate::codec::{Encodable, decode_rows, encode_object};
use crate::config::ClientConfig;
use crate::dynamic::decode_dynamic;
use crate::error::{QueryError, QueryResult};
use crate::projection::projection;
use crate::query::{JoinKind, QuerySpec};
use crate::shape::{Shape, descriptor_of};
use crate::table::{QueryResponse, SaveInfo, SaveRequest};
use crate::traits::{BoxFuture, PostRequest, Transport};
use crate::value::Record;

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(alias = "Token")]
    token: Option<String>,
}

struct ClientInner<T> {
    config: ClientConfig,
    transport: T,
    token: OnceCell<String>,
}

/// Client for one data service.
///
/// Cloning is cheap; clones share the transport and the cached token.
pub struct SqlDataClient<T: Transport> {
    inner: Arc<ClientInner<T>>,
}

impl<T: Transport> Clone for SqlDataClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> std::fmt::Debug for SqlDataClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlDataClient")
            .field("config", &self.inner.config)
            .field("authenticated", &self.inner.token.initialized())
            .finish()
    }
}

impl<T: Transport> SqlDataClient<T> {
    /// Create a client over `transport`.
    pub fn new(config: ClientConfig, transport: T) -> Self {
        info!(
            base_url = %config.base(),
            has_credentials = config.has_credentials(),
            has_access_token = config.access_token().is_some(),
            "SqlDataClient created"
        );
        Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                token: OnceCell::new(),
            }),
        }
    }

    /// The client's configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Start a query handle for a named server connection.
    pub fn connection(&self, name: impl Into<String>) -> SqlDataApi<T> {
        SqlDataApi {
            client: self.clone(),
            connection: name.into(),
            spec: QuerySpec::new(),
        }
    }

    /// URL of a data endpoint.
    pub fn endpoint_url(&self, connection: &str, action: &str, table: &str) -> String {
        format!(
            "{}/sql-data-api/{}/{}/{}",
            self.inner.config.base(),
            connection,
            action,
            table
        )
    }

    /// Append the access token, if one is configured.
    pub fn with_access_token(&self, mut url: String) -> String {
        if let Some(token) = self.inner.config.access_token() {
            let separator = if url.contains('?') { '&' } else { '?' };
            let encoded: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
            url.push(separator);
            url.push_str("$accessToken=");
            url.push_str(&encoded);
        }
        url
    }

    /// Bearer token, logging in on first use.
    async fn bearer_token(&self) -> QueryResult<Option<String>> {
        if !self.inner.config.has_credentials() {
            return Ok(None);
        }
        let token = self.inner.token.get_or_try_init(|| self.authenticate()).await?;
        Ok(Some(token.clone()))
    }

    async fn authenticate(&self) -> QueryResult<String> {
        let config = &self.inner.config;
        if config.base().is_empty() {
            return Err(QueryError::missing_base_url());
        }

        let url = format!("{}/api/security/authenticate", config.base());
        debug!(url = %url, "Authenticating");

        let body = json!({
            "username": config.username.as_deref().unwrap_or_default(),
            "password": config.password.as_deref().unwrap_or_default(),
        });

        let response = self
            .inner
            .transport
            .post(PostRequest::new(url, body))
            .await
            .map_err(|e| {
                let body = e.context.response_body.clone();
                let err = QueryError::authentication_failed(e.message.clone());
                match body {
                    Some(body) => err.with_response_body(body).with_source(e),
                    None => err.with_source(e),
                }
            })?;

        let login: LoginResponse = serde_json::from_value(response)
            .map_err(|e| QueryError::authentication_failed(e.to_string()).with_source(e))?;

        match login.token.filter(|t| !t.trim().is_empty()) {
            Some(token) => {
                info!("Authenticated with the data service");
                Ok(token)
            }
            None => Err(QueryError::authentication_failed("the server returned no token")),
        }
    }

    /// POST a JSON body to a data endpoint, attaching both auth mechanisms.
    async fn post<B: Serialize + ?Sized>(&self, url: String, body: &B) -> QueryResult<Value> {
        let body = serde_json::to_value(body)
            .map_err(|e| QueryError::serialization(e.to_string()).with_source(e))?;
        let token = self.bearer_token().await?;

        debug!(url = %url, "POST");
        crate::sqldata_debug!(body = %body, "Request body");

        let request = PostRequest::new(self.with_access_token(url), body).bearer(token);
        self.inner.transport.post(request).await
    }
}

/// Fluent query and write handle bound to one server connection.
///
/// Builder calls record state; `run_*`, `save*` and `append*` consume it.
/// State is reset even when the execute call fails.
pub struct SqlDataApi<T: Transport> {
    client: SqlDataClient<T>,
    connection: String,
    spec: QuerySpec,
}

impl<T: Transport> SqlDataApi<T> {
    fn update(&mut self, f: impl FnOnce(QuerySpec) -> QuerySpec) -> &mut Self {
        self.spec = f(mem::take(&mut self.spec));
        self
    }

    /// Server connection name.
    pub fn connection_name(&self) -> &str {
        &self.connection
    }

    /// The query accumulated so far.
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// Set the table, optionally with an alias (`"dbo.Orders o"`).
    pub fn table(&mut self, table: impl AsRef<str>) -> &mut Self {
        self.update(|spec| spec.table(table))
    }

    /// Same as [`table`](Self::table).
    pub fn table_or_view(&mut self, name: impl AsRef<str>) -> &mut Self {
        self.table(name)
    }

    /// Same as [`table`](Self::table).
    pub fn view(&mut self, view: impl AsRef<str>) -> &mut Self {
        self.table(view)
    }

    /// Set the select clause, overriding the generated projection.
    pub fn select(&mut self, fields: impl Into<String>) -> &mut Self {
        self.update(|spec| spec.select(fields))
    }

    /// Set the filter text without parameters.
    pub fn filter(&mut self, filter: impl Into<String>) -> &mut Self {
        self.update(|spec| spec.filter(filter))
    }

    /// Set the filter text with named parameters taken from `params`' fields.
    pub fn filter_with<P: Serialize + ?Sized>(
        &mut self,
        filter: impl Into<String>,
        params: &P,
    ) -> &mut Self {
        self.update(|spec| spec.filter_with(filter, params))
    }

    /// Set the order-by clause.
    pub fn order_by(&mut self, order_by: impl Into<String>) -> &mut Self {
        self.update(|spec| spec.order_by(order_by))
    }

    /// Skip `n` rows.
    pub fn skip(&mut self, n: u32) -> &mut Self {
        self.update(|spec| spec.skip(n))
    }

    /// Return at most `n` rows.
    pub fn top(&mut self, n: u32) -> &mut Self {
        self.update(|spec| spec.top(n))
    }

    /// Same as [`top`](Self::top).
    pub fn limit(&mut self, n: u32) -> &mut Self {
        self.top(n)
    }

    /// Add an inner join on `"table alias"`.
    pub fn inner_join(
        &mut self,
        table_with_alias: &str,
        condition: impl Into<String>,
    ) -> &mut Self {
        self.update(|spec| spec.join(JoinKind::Inner, table_with_alias, condition))
    }

    /// Add a left join on `"table alias"`.
    pub fn left_join(&mut self, table_with_alias: &str, condition: impl Into<String>) -> &mut Self {
        self.update(|spec| spec.join(JoinKind::Left, table_with_alias, condition))
    }

    /// Add a right join on `"table alias"`.
    pub fn right_join(
        &mut self,
        table_with_alias: &str,
        condition: impl Into<String>,
    ) -> &mut Self {
        self.update(|spec| spec.join(JoinKind::Right, table_with_alias, condition))
    }

    /// Add a full join on `"table alias"`.
    pub fn full_join(&mut self, table_with_alias: &str, condition: impl Into<String>) -> &mut Self {
        self.update(|spec| spec.join(JoinKind::Full, table_with_alias, condition))
    }

    fn take_spec(&mut self, table_hint: Option<String>) -> QuerySpec {
        let spec = mem::take(&mut self.spec);
        match table_hint {
            Some(table) if !spec.has_table() => spec.table(table),
            _ => spec,
        }
    }

    fn check_target(&self) -> QueryResult<()> {
        if self.connection.trim().is_empty() {
            return Err(QueryError::missing_connection());
        }
        if self.client.config().base().is_empty() {
            return Err(QueryError::missing_base_url());
        }
        Ok(())
    }

    async fn query(
        &mut self,
        spec: QuerySpec,
        projection: Option<String>,
    ) -> QueryResult<QueryResponse> {
        let (table, request) = spec.into_request(projection)?;
        self.check_target()?;

        let url = self.client.endpoint_url(&self.connection, "query", &table);
        debug!(connection = %self.connection, table = %table, "Running query");

        let response = self.client.post(url, &request).await?;
        serde_json::from_value(response).map_err(|e| {
            QueryError::deserialization(e.to_string())
                .with_table(&table)
                .with_source(e)
        })
    }

    /// Run the query and decode rows into `S`.
    ///
    /// Without an explicit select clause, the projection is generated from
    /// `S`'s descriptor. Without a table, `S`'s declared table is used.
    pub async fn run_query<S: Shape>(&mut self) -> QueryResult<Vec<S>> {
        let shape = descriptor_of::<S>();
        let spec = self.take_spec(shape.table_name().map(str::to_string));

        let select = projection(&shape);
        trace!(shape = %shape.name(), select = %select, "Generated projection");

        let response = self.query(spec, Some(select)).await?;
        let table = response.into_table();
        debug!(rows = table.len(), "Query returned");
        decode_rows(&table)
    }

    /// Run the query and decode rows into [`Record`]s by column type.
    pub async fn run_dynamic_query(&mut self) -> QueryResult<Vec<Record>> {
        let spec = self.take_spec(None);
        let response = self.query(spec, None).await?;
        let table = response.into_table();
        debug!(rows = table.len(), "Query returned");
        decode_dynamic(&table)
    }

    fn write_table<I: Encodable>(&mut self) -> QueryResult<String> {
        let spec = self.take_spec(I::table_hint());
        let (table, _) = spec.into_request(None)?;
        self.check_target()?;
        Ok(table)
    }

    /// Save `items` in batches of the default size, then delete `items_to_delete`.
    pub async fn save<I, It>(
        &mut self,
        items: It,
        items_to_delete: Vec<Record>,
    ) -> QueryResult<SaveInfo>
    where
        I: Encodable,
        It: IntoIterator<Item = I>,
    {
        self.save_with(items, items_to_delete, WriteOptions::default()).await
    }

    /// Save with an explicit batch size and progress callback.
    pub async fn save_with<I, It>(
        &mut self,
        items: It,
        items_to_delete: Vec<Record>,
        options: WriteOptions<'_>,
    ) -> QueryResult<SaveInfo>
    where
        I: Encodable,
        It: IntoIterator<Item = I>,
    {
        let table = self.write_table::<I>()?;
        let target = WriteTarget {
            client: &self.client,
            connection: &self.connection,
            table: &table,
        };
        BatchWriter::new(&target).save(items, items_to_delete, options).await
    }

    /// Append `items` in batches of the default size.
    pub async fn append<I, It>(&mut self, items: It) -> QueryResult<SaveInfo>
    where
        I: Encodable,
        It: IntoIterator<Item = I>,
    {
        self.append_with(items, WriteOptions::default()).await
    }

    /// Append with an explicit batch size and progress callback.
    pub async fn append_with<I, It>(
        &mut self,
        items: It,
        options: WriteOptions<'_>,
    ) -> QueryResult<SaveInfo>
    where
        I: Encodable,
        It: IntoIterator<Item = I>,
    {
        let table = self.write_table::<I>()?;
        let target = WriteTarget {
            client: &self.client,
            connection: &self.connection,
            table: &table,
        };
        BatchWriter::new(&target).append(items, options).await
    }

    /// Insert one item and return the identifier the server generated.
    pub async fn save_with_auto_id<I: Encodable>(&mut self, item: &I) -> QueryResult<i64> {
        let table = self.write_table::<I>()?;
        let body = encode_object(item)?;

        let url = self.client.endpoint_url(&self.connection, "save-with-autoid", &table);
        debug!(connection = %self.connection, table = %table, "Saving with auto id");

        let response = self.client.post(url, &body).await?;
        let id = match &response {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        id.ok_or_else(|| {
            QueryError::deserialization(format!("expected an integer id, got {}", response))
                .with_table(&table)
        })
    }
}

struct WriteTarget<'a, T: Transport> {
    client: &'a SqlDataClient<T>,
    connection: &'a str,
    table: &'a str,
}

impl<T: Transport> WriteSink for WriteTarget<'_, T> {
    fn write(&self, mode: WriteMode, request: SaveRequest) -> BoxFuture<'_, QueryResult<SaveInfo>> {
        Box::pin(async move {
            let url = self.client.endpoint_url(self.connection, mode.endpoint(), self.table);
            let response = self.client.post(url, &request).await?;
            serde_json::from_value(response).map_err(|e| {
                QueryError::deserialization(e.to_string())
                    .with_table(self.table)
                    .with_source(e)
            })
        })
    }
}
