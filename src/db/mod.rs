//! Database abstraction layer for db-console.
//!
//! Provides the connection-provider seam the query service runs against:
//! a provider hands out one dedicated connection per execution, and the
//! connection is consumed on release so it can never be released twice.

mod mock;
mod postgres;
mod types;

pub use mock::{mock_record, MockConnection, MockOutcome, MockProvider};
pub use postgres::PostgresProvider;
pub use types::{ColumnInfo, Record, Row, Value};

use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Postgres,
    // Future: MySQL, SQLite, etc.
}

impl DatabaseBackend {
    /// Returns the backend as a string for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// Returns the default port for this backend.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Postgres => 5432,
        }
    }
}

/// Creates a connection provider for the given configuration.
///
/// This is the central factory function for database access.
pub async fn connect(config: &ConnectionConfig) -> Result<std::sync::Arc<dyn ConnectionProvider>> {
    let provider = PostgresProvider::connect(config).await?;
    Ok(std::sync::Arc::new(provider))
}

/// Supplies a dedicated database session per execution.
///
/// The provider owns pooling and low-level transport; callers only see
/// exclusively-owned connections.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Acquires a connection dedicated to one execution.
    async fn acquire(&self) -> Result<Box<dyn DbConnection>>;
}

/// One execution's exclusively-owned database session.
///
/// `execute` serves both session statements (`SET ...`) and the user query.
/// `release` consumes the connection, returning it to the provider; ownership
/// makes a double release unrepresentable.
#[async_trait]
pub trait DbConnection: Send {
    /// Runs a statement on this session and returns its rows as keyed records.
    async fn execute(&mut self, sql: &str) -> Result<Vec<Record>>;

    /// Returns the session to the provider.
    async fn release(self: Box<Self>) -> Result<()>;
}
