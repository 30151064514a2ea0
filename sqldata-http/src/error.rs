//! Error types for HTTP transport operations.

use sqldata_query::QueryError;
use thiserror::Error;

/// Result type for HTTP transport operations.
pub type HttpResult<T> = Result<T, HttpError>;

/// Errors that can occur while talking to the data service over HTTP.
#[derive(Error, Debug)]
pub enum HttpError {
    /// reqwest error not covered by a more specific variant.
    #[error("http error: {0}")]
    Request(#[from] reqwest::Error),

    /// The server could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The request did not complete in time.
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Status code.
        status: u16,
        /// Response body text, empty when unreadable.
        body: String,
    },

    /// The response body is not valid JSON.
    #[error("invalid JSON response: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The transport could not be built.
    #[error("configuration error: {0}")]
    Config(String),
}

impl HttpError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Status code of a non-success response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<HttpError> for QueryError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Request(e) => {
                let message = e.to_string();
                QueryError::connection(message).with_source(e)
            }
            HttpError::Connection(msg) => QueryError::connection(msg),
            HttpError::Timeout(ms) => QueryError::timeout(ms),
            HttpError::Status { status, body } => QueryError::request_failed(status, body),
            HttpError::InvalidJson(e) => QueryError::deserialization(e.to_string()).with_source(e),
            HttpError::Config(msg) => QueryError::invalid_configuration(msg),
        }
    }
}
