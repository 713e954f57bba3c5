//! Error types for the DB CRUD Server.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Every variant maps to a stable machine-readable kind and an HTTP status so that
//! callers of the generated REST surface can react without parsing messages.

use crate::models::ValidationError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Connection pool '{connection_id}' exhausted after waiting {waited_ms}ms")]
    PoolExhausted {
        connection_id: String,
        waited_ms: u64,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Cancelled: {operation}")]
    Cancelled { operation: String },

    #[error("Connection not found: {connection_id}")]
    ConnectionNotFound { connection_id: String },

    #[error("Table '{table}' not found")]
    TableNotFound { table: String },

    #[error("No route for '{path}'")]
    RouteNotFound { path: String },

    #[error("Schema introspection is not supported for {backend}")]
    IntrospectionUnsupported { backend: String },

    #[error("Schema error: {message} (object: {object})")]
    Schema { message: String, object: String },

    #[error("Validation failed with {} error(s)", errors.len())]
    Validation { errors: Vec<ValidationError> },

    #[error("Invalid filter: {message}")]
    InvalidFilter { message: String },

    #[error("Invalid sort: {message}")]
    InvalidSort { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Query failed: {message}")]
    Query {
        message: String,
        /// e.g., "23505" for unique violation
        sql_state: Option<String>,
        /// Unique or foreign-key violation (HTTP 409)
        conflict: bool,
    },

    #[error("Record '{id}' not found in table '{table}'")]
    NotFound { table: String, id: String },

    #[error("Permission denied: {operation} - {reason}")]
    Permission { operation: String, reason: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn pool_exhausted(connection_id: impl Into<String>, waited_ms: u64) -> Self {
        Self::PoolExhausted {
            connection_id: connection_id.into(),
            waited_ms,
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a connection not found error.
    pub fn connection_not_found(connection_id: impl Into<String>) -> Self {
        Self::ConnectionNotFound {
            connection_id: connection_id.into(),
        }
    }

    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
        }
    }

    pub fn route_not_found(path: impl Into<String>) -> Self {
        Self::RouteNotFound { path: path.into() }
    }

    pub fn introspection_unsupported(backend: impl Into<String>) -> Self {
        Self::IntrospectionUnsupported {
            backend: backend.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>, object: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            object: object.into(),
        }
    }

    pub fn validation(errors: Vec<ValidationError>) -> Self {
        Self::Validation { errors }
    }

    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            message: message.into(),
        }
    }

    pub fn invalid_sort(message: impl Into<String>) -> Self {
        Self::InvalidSort {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a query error with optional SQL state.
    pub fn query(message: impl Into<String>, sql_state: Option<String>, conflict: bool) -> Self {
        Self::Query {
            message: message.into(),
            sql_state,
            conflict,
        }
    }

    pub fn not_found(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.into(),
            id: id.into(),
        }
    }

    /// Create a permission error.
    pub fn permission(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Permission {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Machine-readable error kind used in API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection_failed",
            Self::PoolExhausted { .. } => "pool_exhausted",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled { .. } => "cancelled",
            Self::ConnectionNotFound { .. } => "connection_not_found",
            Self::TableNotFound { .. } => "table_not_found",
            Self::RouteNotFound { .. } => "route_not_found",
            Self::IntrospectionUnsupported { .. } => "introspection_unsupported",
            Self::Schema { .. } => "schema_error",
            Self::Validation { .. } => "validation_failed",
            Self::InvalidFilter { .. } => "invalid_filter",
            Self::InvalidSort { .. } => "invalid_sort",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Query { conflict: true, .. } => "conflict",
            Self::Query { .. } => "query_failed",
            Self::NotFound { .. } => "not_found",
            Self::Permission { .. } => "permission_denied",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. }
            | Self::InvalidFilter { .. }
            | Self::InvalidSort { .. }
            | Self::InvalidInput { .. }
            | Self::Schema { .. } => StatusCode::BAD_REQUEST,
            Self::Query { conflict: true, .. } => StatusCode::CONFLICT,
            Self::Query { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } | Self::TableNotFound { .. } | Self::RouteNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            Self::Permission { .. } => StatusCode::FORBIDDEN,
            Self::Connection { .. } | Self::PoolExhausted { .. } | Self::Cancelled { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::ConnectionNotFound { .. }
            | Self::IntrospectionUnsupported { .. }
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::PoolExhausted { .. } => {
                Some("Retry later or raise max_connections / acquire_timeout")
            }
            Self::InvalidFilter { .. } => Some(
                "Use [{\"column\": ..., \"operator\": \"eq|ne|gt|gte|lt|lte|like|in\", \"value\": ...}]",
            ),
            Self::InvalidSort { .. } => {
                Some("Use [{\"column\": ..., \"direction\": \"asc|desc\"}]")
            }
            _ => None,
        }
    }

    /// Check if this error is retryable at the transport layer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Errors after which the connection that produced them must not be reused.
    pub fn is_poisoning(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Caller-side problems that are not server faults.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Convert sqlx errors to DbError.
///
/// Database errors reaching this conversion have not been classified by a
/// connector; `StatementExecutor` classifies them first whenever it can.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::query(db_err.message(), code, false)
            }
            sqlx::Error::RowNotFound => DbError::internal("No rows returned"),
            sqlx::Error::PoolTimedOut => DbError::pool_exhausted("unknown", 0),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::TypeNotFound { type_name } => DbError::schema(
                format!("Type not found: {}", type_name),
                type_name.to_string(),
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::schema(format!("Column not found: {}", col), col.to_string())
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::connection(
                "Database worker crashed",
                "The connection was discarded; retry the request",
            ),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a [ValidationError]>,
}

impl IntoResponse for DbError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "Request failed");
        }
        let errors = match &self {
            DbError::Validation { errors } => Some(errors.as_slice()),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind(),
                message: self.to_string(),
                suggestion: self.suggestion(),
                errors,
            },
        };
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_retryable() {
        assert!(DbError::connection("err", "sugg").is_retryable());
        assert!(!DbError::pool_exhausted("db", 30_000).is_retryable());
        assert!(!DbError::table_not_found("users").is_retryable());
        assert!(!DbError::permission("write", "read-only").is_retryable());
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = DbError::validation(vec![ValidationError::new("name", "is required")]);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), "validation_failed");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_filter_and_sort_map_to_bad_request() {
        assert_eq!(
            DbError::invalid_filter("unknown column").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DbError::invalid_sort("bad direction").status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_query_conflict_maps_to_409() {
        let err = DbError::query("duplicate key", Some("23505".to_string()), true);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.kind(), "conflict");

        let err = DbError::query("not null violation", Some("23502".to_string()), false);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), "query_failed");
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err = DbError::not_found("users", "1");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_pool_exhausted_maps_to_503() {
        let err = DbError::pool_exhausted("main", 1500);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.suggestion().is_some());
        assert!(!err.is_poisoning());
    }

    #[test]
    fn test_io_error_is_poisoning() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: DbError = sqlx::Error::Io(io).into();
        assert!(err.is_poisoning());
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_validation_response_lists_all_errors() {
        let err = DbError::validation(vec![
            ValidationError::new("name", "is required"),
            ValidationError::new("age", "must be a whole number"),
        ]);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["kind"], "validation_failed");
        assert_eq!(body["error"]["errors"].as_array().unwrap().len(), 2);
        assert_eq!(body["error"]["errors"][0]["field"], "name");
    }
}
