//! # sqldata-http
//!
//! HTTP transport for the sqldata client, built on reqwest with rustls.
//!
//! This crate provides:
//! - [`HttpTransport`], a JSON-over-HTTP [`Transport`](sqldata_query::Transport)
//! - [`connect`], which builds a ready [`SqlDataClient`] from a configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqldata_query::{ClientConfig, Record};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = sqldata_http::connect(ClientConfig::from_env()?)?;
//!
//!     let rows: Vec<Record> = client
//!         .connection("SQL-Shared")
//!         .table("test1.Orders")
//!         .filter("Country = 'UK'")
//!         .top(10)
//!         .run_dynamic_query()
//!         .await?;
//!
//!     println!("{} rows", rows.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod transport;

pub use error::{HttpError, HttpResult};
pub use transport::HttpTransport;

use sqldata_query::{ClientConfig, QueryResult, SqlDataClient};

/// Build a client that talks HTTP using `config`.
pub fn connect(config: ClientConfig) -> QueryResult<SqlDataClient<HttpTransport>> {
    let transport = HttpTransport::new(&config)?;
    Ok(SqlDataClient::new(config, transport))
}
