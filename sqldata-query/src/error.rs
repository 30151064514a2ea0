//! Error types for query, write and marshalling operations.
//!
//! Every failure surfaces as a [`QueryError`] carrying an [`ErrorCode`]. Codes
//! are grouped into the three families callers usually branch on:
//!
//! - 3xxx: Transport errors (connection, timeout, authentication, non-success status)
//! - 6xxx: Marshalling errors (value coercion, serialization, missing fields)
//! - 7xxx: Configuration errors (missing table/connection/base URL, bad joins, batch size)
//! - 9xxx: Internal errors
//!
//! ```rust
//! use sqldata_query::{ErrorCode, ErrorKind, QueryError};
//!
//! let err = QueryError::missing_table();
//! assert_eq!(err.code, ErrorCode::MissingConfiguration);
//! assert_eq!(err.code.kind(), ErrorKind::Configuration);
//! assert!(err.is_configuration_error());
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Transport errors (3xxx)
    /// The server could not be reached (E3001).
    ConnectionFailed = 3001,
    /// The request did not complete within the configured timeout (E3002).
    ConnectionTimeout = 3002,
    /// The login exchange failed or returned no token (E3003).
    AuthenticationFailed = 3003,
    /// The server answered with a non-success status (E3004).
    RequestFailed = 3004,

    // Marshalling errors (6xxx)
    /// A wire value cannot be coerced into the declared type (E6001).
    InvalidDataType = 6001,
    /// A value could not be serialized for the wire (E6002).
    SerializationError = 6002,
    /// A response or row could not be deserialized (E6003).
    DeserializationError = 6003,
    /// An item lacks a field every other item carries (E6004).
    MissingField = 6004,

    // Configuration errors (7xxx)
    /// A required setting is absent (E7001).
    MissingConfiguration = 7001,
    /// A setting is present but unusable (E7002).
    InvalidConfiguration = 7002,
    /// A join target has no alias (E7003).
    InvalidJoin = 7003,
    /// Batch size is zero (E7004).
    InvalidBatchSize = 7004,
    /// Filter parameters are not a key/value structure (E7005).
    InvalidFilterParameters = 7005,

    // Internal errors (9xxx)
    /// Internal error (E9001).
    Internal = 9001,
}

/// Coarse error family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Raised before any network attempt; never retried.
    Configuration,
    /// Network failure or non-success response.
    Transport,
    /// A value could not be converted between the wire and a target type.
    Marshalling,
    /// A bug in this crate.
    Internal,
}

impl ErrorCode {
    /// Get the error code string (e.g., "E7001").
    pub fn code(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the family this code belongs to.
    pub fn kind(&self) -> ErrorKind {
        match *self as u16 {
            3000..=3999 => ErrorKind::Transport,
            6000..=6999 => ErrorKind::Marshalling,
            7000..=7999 => ErrorKind::Configuration,
            _ => ErrorKind::Internal,
        }
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::ConnectionFailed => "Connection failed",
            Self::ConnectionTimeout => "Request timed out",
            Self::AuthenticationFailed => "Authentication failed",
            Self::RequestFailed => "Request failed",
            Self::InvalidDataType => "Invalid data type",
            Self::SerializationError => "Serialization error",
            Self::DeserializationError => "Deserialization error",
            Self::MissingField => "Missing field",
            Self::MissingConfiguration => "Missing configuration",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::InvalidJoin => "Invalid join",
            Self::InvalidBatchSize => "Invalid batch size",
            Self::InvalidFilterParameters => "Invalid filter parameters",
            Self::Internal => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Suggestion for fixing an error.
#[derive(Debug, Clone)]
pub struct Suggestion {
    /// The suggestion text.
    pub text: String,
    /// Optional code example.
    pub code: Option<String>,
}

impl Suggestion {
    /// Create a new suggestion.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: None,
        }
    }

    /// Add a code example.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The table or view involved.
    pub table: Option<String>,
    /// The field or column involved.
    pub field: Option<String>,
    /// The offending raw value, rendered as text.
    pub value: Option<String>,
    /// The server's response body, when one was retrievable.
    pub response_body: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<Suggestion>,
    /// Help text.
    pub help: Option<String>,
}

/// Errors that can occur during query, write and marshalling operations.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(Suggestion::new(suggestion));
        self
    }

    /// Add a code suggestion.
    pub fn with_code_suggestion(
        mut self,
        text: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        self.context
            .suggestions
            .push(Suggestion::new(text).with_code(code));
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the table.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.context.table = Some(table.into());
        self
    }

    /// Set the field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Set the offending value.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.context.value = Some(value.into());
        self
    }

    /// Set the server response body.
    pub fn with_response_body(mut self, body: impl Into<String>) -> Self {
        self.context.response_body = Some(body.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Configuration ==============

    /// No table or view name was given.
    pub fn missing_table() -> Self {
        Self::new(
            ErrorCode::MissingConfiguration,
            "Table or View Name must be specified.",
        )
        .with_code_suggestion("Name the table before executing", "api.table(\"dbo.Orders\")")
    }

    /// No connection name was given.
    pub fn missing_connection() -> Self {
        Self::new(
            ErrorCode::MissingConfiguration,
            "Connection Name must be specified.",
        )
        .with_code_suggestion("Pass a connection name", "client.connection(\"SQL-Shared\")")
    }

    /// The client has no base URL.
    pub fn missing_base_url() -> Self {
        Self::new(ErrorCode::MissingConfiguration, "BaseUrl must be specified.")
            .with_suggestion("Set base_url on ClientConfig or SQLDATA_BASE_URL in the environment")
    }

    /// A configuration value is present but unusable.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message)
    }

    /// A join target was given without an alias.
    pub fn invalid_join(table_with_alias: impl Into<String>) -> Self {
        let table = table_with_alias.into();
        Self::new(
            ErrorCode::InvalidJoin,
            format!("Join table '{}' must be followed by an alias", table),
        )
        .with_table(&table)
        .with_code_suggestion(
            "Separate the alias with a space",
            "api.inner_join(\"dbo.Products p\", \"p.Id = o.ProductId\")",
        )
    }

    /// Batch size must be positive.
    pub fn invalid_batch_size(batch_size: usize) -> Self {
        Self::new(
            ErrorCode::InvalidBatchSize,
            format!("Batch size must be greater than zero, got {}", batch_size),
        )
    }

    /// Filter parameters did not serialize into a key/value structure.
    pub fn invalid_filter_parameters(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidFilterParameters, message).with_help(
            "Filter parameters must be a struct or map whose fields name the @parameters",
        )
    }

    // ============== Transport ==============

    /// The server could not be reached.
    pub fn connection(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::ConnectionFailed, format!("Connection error: {}", message))
            .with_suggestion("Check that the base URL points at a running data service")
    }

    /// The request timed out.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::new(
            ErrorCode::ConnectionTimeout,
            format!("Request timed out after {}ms", duration_ms),
        )
        .with_suggestion("Increase the client timeout or reduce the batch size")
    }

    /// The login exchange failed.
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            ErrorCode::AuthenticationFailed,
            format!("Authentication failed: {}", message),
        )
        .with_suggestion("Check the configured username and password")
    }

    /// The server answered with a non-success status.
    pub fn request_failed(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(ErrorCode::RequestFailed, format!("HTTP {}: {}", status, body))
            .with_response_body(body)
    }

    // ============== Marshalling ==============

    /// A wire value could not be coerced into the declared type of a field.
    pub fn conversion(
        field: impl Into<String>,
        raw: impl fmt::Display,
        target: impl fmt::Display,
    ) -> Self {
        let field = field.into();
        let raw = raw.to_string();
        Self::new(
            ErrorCode::InvalidDataType,
            format!("Cannot convert value {} of '{}' to {}", raw, field, target),
        )
        .with_field(&field)
        .with_value(raw)
    }

    /// An item did not carry a field present in the column list.
    pub fn missing_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(
            ErrorCode::MissingField,
            format!("Item has no value for field '{}'", field),
        )
        .with_field(&field)
        .with_help("Every item in a write must have the same fields as the first item")
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializationError, message.into())
    }

    /// Create a deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            ErrorCode::DeserializationError,
            format!("Failed to deserialize result: {}", message),
        )
        .with_suggestion("Check that the shape matches the columns the server returns")
    }

    // ============== Error Checks ==============

    /// Check if this is a configuration error.
    pub fn is_configuration_error(&self) -> bool {
        self.code.kind() == ErrorKind::Configuration
    }

    /// Check if this is a transport error.
    pub fn is_transport_error(&self) -> bool {
        self.code.kind() == ErrorKind::Transport
    }

    /// Check if this is a marshalling error.
    pub fn is_marshalling_error(&self) -> bool {
        self.code.kind() == ErrorKind::Marshalling
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::ConnectionTimeout
    }

    /// Display the full error with all context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error [{}]: {}\n", self.code.code(), self.message));

        if let Some(ref op) = self.context.operation {
            output.push_str(&format!("  → While: {}\n", op));
        }
        if let Some(ref table) = self.context.table {
            output.push_str(&format!("  → Table: {}\n", table));
        }
        if let Some(ref field) = self.context.field {
            output.push_str(&format!("  → Field: {}\n", field));
        }
        if let Some(ref value) = self.context.value {
            output.push_str(&format!("  → Value: {}\n", value));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion.text));
                if let Some(ref code) = suggestion.code {
                    output.push_str(&format!(
                        "     ```\n     {}\n     ```\n",
                        code.replace('\n', "\n     ")
                    ));
                }
            }
        }

        if let Some(ref help) = self.context.help {
            output.push_str(&format!("\nHelp: {}\n", help));
        }

        output
    }
}

/// Helper for creating errors with context.
#[macro_export]
macro_rules! query_error {
    ($code:expr, $msg:expr) => {
        $crate::error::QueryError::new($code, $msg)
    };
    ($code:expr, $msg:expr, $($key:ident = $value:expr),+ $(,)?) => {{
        let mut err = $crate::error::QueryError::new($code, $msg);
        $(
            err = err.$key($value);
        )+
        err
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConnectionFailed.code(), "E3001");
        assert_eq!(ErrorCode::InvalidDataType.code(), "E6001");
        assert_eq!(ErrorCode::MissingConfiguration.code(), "E7001");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ErrorCode::RequestFailed.kind(), ErrorKind::Transport);
        assert_eq!(ErrorCode::MissingField.kind(), ErrorKind::Marshalling);
        assert_eq!(ErrorCode::InvalidJoin.kind(), ErrorKind::Configuration);
        assert_eq!(ErrorCode::Internal.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_configuration_errors() {
        assert!(QueryError::missing_table().is_configuration_error());
        assert!(QueryError::missing_connection().is_configuration_error());
        assert!(QueryError::missing_base_url().is_configuration_error());
        assert!(QueryError::invalid_batch_size(0).is_configuration_error());
        assert!(QueryError::invalid_join("dbo.table").is_configuration_error());
    }

    #[test]
    fn test_request_failed_keeps_body() {
        let err = QueryError::request_failed(500, "Invalid column name 'Foo'");
        assert!(err.is_transport_error());
        assert!(err.message.contains("Invalid column name"));
        assert_eq!(
            err.context.response_body.as_deref(),
            Some("Invalid column name 'Foo'")
        );
    }

    #[test]
    fn test_conversion_error_names_field_and_value() {
        let err = QueryError::conversion("OrderId", "\"abc\"", "Int");
        assert!(err.is_marshalling_error());
        assert_eq!(err.context.field.as_deref(), Some("OrderId"));
        assert_eq!(err.context.value.as_deref(), Some("\"abc\""));
        assert!(err.to_string().contains("OrderId"));
    }

    #[test]
    fn test_timeout_error() {
        let err = QueryError::timeout(10_000);
        assert!(err.is_timeout());
        assert!(err.is_transport_error());
        assert!(err.message.contains("10000"));
    }

    #[test]
    fn test_display_full() {
        let err = QueryError::invalid_join("dbo.Products").with_context("Building query");

        let output = err.display_full();
        assert!(output.contains("E7003"));
        assert!(output.contains("dbo.Products"));
        assert!(output.contains("Building query"));
        assert!(output.contains("Suggestions"));
    }

    #[test]
    fn test_error_macro() {
        let err = query_error!(
            ErrorCode::InvalidDataType,
            "bad value",
            with_field = "Sales",
            with_value = "\"n/a\""
        );

        assert_eq!(err.code, ErrorCode::InvalidDataType);
        assert_eq!(err.context.field, Some("Sales".to_string()));
    }
}
