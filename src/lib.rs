//! # sqldata
//!
//! Typed query and batched write client for the sql-data-api service.
//!
//! sqldata provides:
//! - A fluent query builder with joins, named filter parameters and paging
//! - Shape descriptors that generate projections and map flat rows onto nested types
//! - Dynamic decoding into ordered records when no shape is known
//! - Batched saves and appends with aggregated counters and progress callbacks
//! - An HTTP transport built on reqwest (feature `http`, on by default)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sqldata::prelude::*;
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct Order {
//!     order_id: i64,
//!     country: String,
//! }
//!
//! impl Shape for Order {
//!     fn describe() -> ShapeDescriptor {
//!         ShapeDescriptor::new::<Self>("Order")
//!             .table("test1.Orders")
//!             .field(FieldDescriptor::scalar("order_id", ScalarType::Int).source("OrderId"))
//!             .field(FieldDescriptor::scalar("country", ScalarType::String).source("Country"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), QueryError> {
//!     let client = sqldata::connect(ClientConfig::from_env()?)?;
//!     let mut api = client.connection("SQL-Shared");
//!
//!     let orders: Vec<Order> = api.filter("Country = 'UK'").top(10).run_query().await?;
//!     let info = api.save(orders, Vec::new()).await?;
//!     println!("inserted {}, updated {}", info.inserted, info.updated);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Core query, codec and write types.
pub mod query {
    pub use sqldata_query::*;
}

/// HTTP transport.
#[cfg(feature = "http")]
pub mod http {
    pub use sqldata_http::*;
}

#[cfg(feature = "http")]
pub use sqldata_http::{HttpTransport, connect};

pub use sqldata_query::{record, sqldata_debug};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use serde::{Deserialize, Serialize};
    pub use sqldata_query::prelude::*;
}

// Re-export key types at the crate root
pub use sqldata_query::{
    ClientConfig, FieldDescriptor, FieldValue, QueryError, QueryResult, Record, SaveInfo,
    ScalarType, Shape, ShapeDescriptor, SqlDataApi, SqlDataClient, Transport, WriteOptions,
};
