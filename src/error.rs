//! Error types for db-console.
//!
//! Defines the crate-wide error enum plus explicit per-operation error types,
//! so every caller-facing failure path is an exhaustively-handled variant.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for db-console operations.
#[derive(Error, Debug)]
pub enum ConsoleError {
    /// Database connection errors (host unreachable, auth failed, pool exhausted, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution errors (syntax errors, statement timeout, etc.)
    #[error("Query error: {0}")]
    Query(QueryError),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors while writing export artifacts.
    #[error("Export error: {0}")]
    Export(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConsoleError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message and no source position.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(QueryError::new(msg))
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an export error with the given message.
    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Config(_) => "Configuration Error",
            Self::Export(_) => "Export Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// A query execution failure as reported by the database, with the
/// source position when the server exposes one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct QueryError {
    /// The database error message (including DETAIL/HINT lines when present).
    pub message: String,
    /// 1-based line of the error within the submitted statement.
    pub line: Option<u32>,
    /// 1-based column of the error within that line.
    pub position: Option<u32>,
}

impl QueryError {
    /// Creates a query error with no source position.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            position: None,
        }
    }

    /// Creates a query error carrying a source position.
    pub fn with_position(message: impl Into<String>, line: u32, position: u32) -> Self {
        Self {
            message: message.into(),
            line: Some(line),
            position: Some(position),
        }
    }
}

/// Request-validation failures surfaced by `QueryService::submit`.
///
/// None of these create an execution: the request is rejected before any
/// registry entry exists.
#[derive(Error, Debug)]
pub enum SubmitError {
    /// The submitted SQL was empty or whitespace-only.
    #[error("SQL query cannot be empty")]
    EmptyStatement,

    /// The submitted SQL was classified as mutating by the safety filter.
    #[error("Only read-only queries are allowed")]
    MutatingStatement,

    /// A dedicated connection could not be acquired for the execution.
    #[error(transparent)]
    Connection(ConsoleError),
}

impl From<SubmitError> for ConsoleError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Connection(inner) => inner,
            other => ConsoleError::query(other.to_string()),
        }
    }
}

/// Lookup failures shared by status, results-page, and CSV-export requests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrieveError {
    /// No execution with this identifier exists (never created, or reaped).
    #[error("Query with ID '{0}' not found")]
    NotFound(Uuid),

    /// The execution has not reached a terminal state yet.
    #[error("Query '{0}' is still running")]
    StillRunning(Uuid),

    /// The execution terminated with an error; there are no results to read.
    #[error("Query '{0}' failed with an error")]
    Failed(Uuid),

    /// Completed but without attached results (defensive case).
    #[error("No results available for query '{0}'")]
    NoResults(Uuid),
}

/// Failures surfaced by `QueryService::export_csv`.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Retrieve(#[from] RetrieveError),

    /// Writing the CSV artifact failed.
    #[error("Failed to write CSV export: {0}")]
    Io(String),
}

/// Result type alias using ConsoleError.
pub type Result<T> = std::result::Result<T, ConsoleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_connection() {
        let err = ConsoleError::connection("Cannot connect to localhost:5432");
        assert_eq!(
            err.to_string(),
            "Connection error: Cannot connect to localhost:5432"
        );
        assert_eq!(err.category(), "Connection Error");
    }

    #[test]
    fn test_error_display_query() {
        let err = ConsoleError::query("column \"emal\" does not exist");
        assert_eq!(
            err.to_string(),
            "Query error: column \"emal\" does not exist"
        );
        assert_eq!(err.category(), "Query Error");
    }

    #[test]
    fn test_error_display_config() {
        let err = ConsoleError::config("missing field 'database'");
        assert_eq!(
            err.to_string(),
            "Configuration error: missing field 'database'"
        );
        assert_eq!(err.category(), "Configuration Error");
    }

    #[test]
    fn test_query_error_position() {
        let err = QueryError::with_position("syntax error at or near \"FORM\"", 2, 10);
        assert_eq!(err.line, Some(2));
        assert_eq!(err.position, Some(10));
        assert_eq!(err.to_string(), "syntax error at or near \"FORM\"");
    }

    #[test]
    fn test_retrieve_error_variants_are_distinct() {
        let id = Uuid::new_v4();
        assert_ne!(RetrieveError::NotFound(id), RetrieveError::StillRunning(id));
        assert_ne!(RetrieveError::Failed(id), RetrieveError::NoResults(id));
    }

    #[test]
    fn test_submit_error_display() {
        assert_eq!(
            SubmitError::EmptyStatement.to_string(),
            "SQL query cannot be empty"
        );
        assert_eq!(
            SubmitError::MutatingStatement.to_string(),
            "Only read-only queries are allowed"
        );
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConsoleError>();
        assert_send_sync::<SubmitError>();
        assert_send_sync::<RetrieveError>();
    }
}
