//! Shared fixtures for integration tests.

#![allow(dead_code)]

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqldata::query::{BoxFuture, PostRequest, QueryResult, Transport};
use sqldata::{ClientConfig, FieldDescriptor, ScalarType, Shape, ShapeDescriptor, SqlDataClient};
use std::sync::Arc;

pub const BASE_URL: &str = "http://data.local";
pub const AUTH_SUFFIX: &str = "/api/security/authenticate";

type Responder = Box<dyn Fn(&PostRequest) -> QueryResult<Value> + Send + Sync>;

/// In-memory transport that records every request.
pub struct MockTransport {
    requests: Mutex<Vec<PostRequest>>,
    responder: Responder,
}

impl MockTransport {
    /// Answer every request with `f`.
    pub fn new(f: impl Fn(&PostRequest) -> QueryResult<Value> + Send + Sync + 'static) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(f),
        }
    }

    /// Login returns `token`; writes report one insert per row; queries return `table`.
    pub fn service(table: Value) -> Self {
        Self::new(move |request| {
            if request.url.ends_with(AUTH_SUFFIX) {
                return Ok(json!({ "token": "tok-1" }));
            }
            if request.url.contains("/query/") {
                return Ok(table.clone());
            }
            if request.url.contains("/save-with-autoid/") {
                return Ok(json!(101));
            }
            let rows = request.body["tableData"]["rows"]
                .as_array()
                .map(|rows| rows.len())
                .unwrap_or(0);
            Ok(json!({ "inserted": rows, "updated": 0, "deleted": 0 }))
        })
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<PostRequest> {
        self.requests.lock().clone()
    }

    /// Requests other than logins.
    pub fn data_requests(&self) -> Vec<PostRequest> {
        self.requests()
            .into_iter()
            .filter(|r| !r.url.ends_with(AUTH_SUFFIX))
            .collect()
    }
}

impl Transport for MockTransport {
    fn post(&self, request: PostRequest) -> BoxFuture<'_, QueryResult<Value>> {
        let response = (self.responder)(&request);
        self.requests.lock().push(request);
        Box::pin(async move { response })
    }
}

/// Client over a shared mock, plus the mock itself for inspection.
pub fn client_with(
    config: ClientConfig,
    transport: MockTransport,
) -> (SqlDataClient<Arc<MockTransport>>, Arc<MockTransport>) {
    let transport = Arc::new(transport);
    (SqlDataClient::new(config, Arc::clone(&transport)), transport)
}

/// Client with only a base URL.
pub fn client(transport: MockTransport) -> (SqlDataClient<Arc<MockTransport>>, Arc<MockTransport>) {
    client_with(ClientConfig::new(BASE_URL), transport)
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub container: Option<String>,
}

impl Shape for Product {
    fn describe() -> ShapeDescriptor {
        ShapeDescriptor::new::<Self>("Product")
            .field(FieldDescriptor::scalar("name", ScalarType::String).source("ProductName"))
            .field(
                FieldDescriptor::scalar("container", ScalarType::String)
                    .source("ProductContainer")
                    .nullable(),
            )
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: i64,
    pub order_date: Option<NaiveDateTime>,
    pub country: String,
    pub product: Product,
    pub sales: Decimal,
    pub quantity: i32,
    pub note: String,
}

impl Shape for Order {
    fn describe() -> ShapeDescriptor {
        ShapeDescriptor::new::<Self>("Order")
            .table("test1.Orders")
            .field(FieldDescriptor::scalar("order_id", ScalarType::Int).source("OrderId"))
            .field(
                FieldDescriptor::scalar("order_date", ScalarType::DateTime)
                    .source("OrderDate")
                    .nullable(),
            )
            .field(FieldDescriptor::scalar("country", ScalarType::String).source("Country"))
            .field(FieldDescriptor::nested::<Product>("product").prefix("p"))
            .field(FieldDescriptor::scalar("sales", ScalarType::Decimal).source("Sales"))
            .field(FieldDescriptor::scalar("quantity", ScalarType::Int).source("OrderQuantity"))
            .field(FieldDescriptor::scalar("note", ScalarType::String).ignored())
    }
}
