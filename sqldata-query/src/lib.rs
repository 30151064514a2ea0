//! # sqldata-query
//!
//! Client-side query and write layer for the sql-data-api service.
//!
//! This crate provides:
//! - Shape descriptors and the projection generator
//! - The row table codec (typed shapes and records to and from row tables)
//! - The dynamic row decoder
//! - A fluent query specification builder
//! - A batched write orchestrator
//! - The client, its configuration and the transport seam
//!
//! ## Shapes and Projections
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use sqldata_query::{
//!     FieldDescriptor, ScalarType, Shape, ShapeDescriptor, descriptor_of, projection,
//! };
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Product {
//!     name: String,
//! }
//!
//! impl Shape for Product {
//!     fn describe() -> ShapeDescriptor {
//!         ShapeDescriptor::new::<Self>("Product")
//!             .field(FieldDescriptor::scalar("name", ScalarType::String).source("ProductName"))
//!     }
//! }
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Order {
//!     id: i64,
//!     product: Product,
//! }
//!
//! impl Shape for Order {
//!     fn describe() -> ShapeDescriptor {
//!         ShapeDescriptor::new::<Self>("Order")
//!             .field(FieldDescriptor::scalar("id", ScalarType::Int).source("OrderId"))
//!             .field(FieldDescriptor::nested::<Product>("product").prefix("p"))
//!     }
//! }
//!
//! assert_eq!(projection(&descriptor_of::<Order>()), "OrderId, p.ProductName");
//! ```
//!
//! ## Dynamic Records
//!
//! ```rust
//! use serde_json::json;
//! use sqldata_query::{ColumnType, FieldValue, RowTable, decode_dynamic};
//!
//! let table = RowTable {
//!     field_names: vec!["Qty".into()],
//!     field_data_types: Some(vec![ColumnType::WholeNumber]),
//!     rows: vec![vec![json!("3")]],
//! };
//!
//! let records = decode_dynamic(&table).unwrap();
//! assert_eq!(records[0].get("Qty"), Some(&FieldValue::Int(3)));
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use sqldata_query::{ErrorCode, QueryError};
//!
//! let err = QueryError::invalid_batch_size(0);
//! assert_eq!(err.code, ErrorCode::InvalidBatchSize);
//! assert!(err.is_configuration_error());
//! ```

pub mod batch;
pub mod client;
pub mod codec;
pub mod config;
pub mod dynamic;
pub mod env;
pub mod error;
pub mod logging;
pub mod projection;
pub mod query;
pub mod shape;
pub mod table;
pub mod traits;
pub mod value;

pub use batch::{BatchWriter, DEFAULT_BATCH_SIZE, ProgressFn, WriteMode, WriteOptions, WriteSink};
pub use client::{SqlDataApi, SqlDataClient};
pub use codec::{Encodable, decode_rows, encode_object, encode_rows, encode_rows_with};
pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_TIMEOUT};
pub use dynamic::decode_dynamic;
pub use env::{EnvSource, MapEnvSource, StdEnvSource};
pub use error::{ErrorCode, ErrorContext, ErrorKind, QueryError, QueryResult, Suggestion};
pub use projection::{projection, projection_list};
pub use query::{JoinKind, QueryRequest, QuerySpec, TableJoin};
pub use shape::{FieldDescriptor, FieldType, ScalarType, Shape, ShapeDescriptor, descriptor_of};
pub use table::{
    ColumnMap, ColumnType, QueryResponse, ResultFieldInfo, ResultType, RowTable, SaveInfo,
    SaveRequest,
};
pub use traits::{BoxFuture, PostRequest, Transport};
pub use value::{FieldValue, Record, SENTINEL_YEAR, WIRE_DATETIME_FORMAT};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::client::{SqlDataApi, SqlDataClient};
    pub use crate::codec::Encodable;
    pub use crate::config::ClientConfig;
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::shape::{FieldDescriptor, ScalarType, Shape, ShapeDescriptor};
    pub use crate::table::SaveInfo;
    pub use crate::traits::Transport;
    pub use crate::value::{FieldValue, Record};
    pub use crate::batch::WriteOptions;
    pub use crate::record;
}
