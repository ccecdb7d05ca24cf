//! Execution registry: the process-scoped store of submitted queries.
//!
//! One `Execution` record tracks a submitted statement from submission to its
//! terminal state. The registry is the single source of truth for status,
//! timing, results, and failure, keyed by execution id. Entries are created
//! on submission and removed by the retention reaper.

use crate::db::{ColumnInfo, Row};
use crate::error::{ConsoleError, QueryError, RetrieveError};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::{debug, warn};
use uuid::Uuid;

/// Lifecycle state of one execution.
///
/// `Running` is the initial state; `Completed` and `Error` are terminal.
/// There is no cancellation or retry path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Error,
}

impl ExecutionStatus {
    /// Returns the status as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Returns true for `Completed` and `Error`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The captured failure of an errored execution.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExecutionFailure {
    /// The database error message.
    pub message: String,
    /// 1-based source line, when the database reported a position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 1-based source column, when the database reported a position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

impl From<QueryError> for ExecutionFailure {
    fn from(err: QueryError) -> Self {
        Self {
            message: err.message,
            line: err.line,
            position: err.position,
        }
    }
}

impl From<ConsoleError> for ExecutionFailure {
    fn from(err: ConsoleError) -> Self {
        match err {
            ConsoleError::Query(query_err) => query_err.into(),
            other => Self {
                message: other.to_string(),
                line: None,
                position: None,
            },
        }
    }
}

/// The materialized, possibly-truncated output of one execution.
///
/// Immutable once attached; pagination and export only compute views over it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QueryResults {
    /// Column names with their inferred display types, derived from the
    /// first returned row; empty when the query returned zero rows.
    pub columns: Vec<ColumnInfo>,
    /// Retained rows, positional, aligned to `columns`.
    pub rows: Vec<Row>,
    /// Total rows returned by the database before truncation.
    pub row_count: usize,
    /// True iff the raw row count exceeded the display cap.
    pub truncated: bool,
}

/// One submitted query's lifecycle record.
#[derive(Debug)]
pub struct Execution {
    pub id: Uuid,
    /// The submitted SQL, immutable.
    pub sql: String,
    pub started_at: SystemTime,
    pub status: ExecutionStatus,
    /// Present iff status is `Completed`.
    pub results: Option<Arc<QueryResults>>,
    /// Present iff status is `Error`.
    pub failure: Option<ExecutionFailure>,
}

/// A point-in-time copy of an execution's status fields.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub status: ExecutionStatus,
    pub started_at: SystemTime,
    pub failure: Option<ExecutionFailure>,
}

/// Process-wide mapping from execution id to execution record.
///
/// Mutations are point operations under a mutex; the lock is never held
/// across an await. Each record's terminal transition happens exactly once,
/// from its own continuation task.
#[derive(Debug, Default)]
pub struct ExecutionRegistry {
    entries: Mutex<HashMap<Uuid, Execution>>,
}

impl ExecutionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked executions.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Returns true if no executions are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the id is currently tracked.
    pub fn contains(&self, id: &Uuid) -> bool {
        self.entries.lock().unwrap().contains_key(id)
    }

    /// Inserts a new execution in the `Running` state.
    pub fn insert_running(&self, id: Uuid, sql: impl Into<String>, started_at: SystemTime) {
        let execution = Execution {
            id,
            sql: sql.into(),
            started_at,
            status: ExecutionStatus::Running,
            results: None,
            failure: None,
        };
        self.entries.lock().unwrap().insert(id, execution);
    }

    /// Transitions a running execution to `Completed` with its results.
    ///
    /// A transition from a terminal state is ignored with a warning; the
    /// state machine allows exactly one way out of `Running`.
    pub fn complete(&self, id: &Uuid, results: QueryResults) {
        let mut entries = self.entries.lock().unwrap();
        let Some(execution) = entries.get_mut(id) else {
            warn!("Query {id} not found in registry on completion");
            return;
        };
        if execution.status != ExecutionStatus::Running {
            warn!(
                "Ignoring completion for query {id} already in state {}",
                execution.status
            );
            return;
        }
        execution.status = ExecutionStatus::Completed;
        execution.results = Some(Arc::new(results));
    }

    /// Transitions a running execution to `Error` with its failure.
    pub fn fail(&self, id: &Uuid, failure: ExecutionFailure) {
        let mut entries = self.entries.lock().unwrap();
        let Some(execution) = entries.get_mut(id) else {
            warn!("Query {id} not found in registry on failure");
            return;
        };
        if execution.status != ExecutionStatus::Running {
            warn!(
                "Ignoring failure for query {id} already in state {}",
                execution.status
            );
            return;
        }
        execution.status = ExecutionStatus::Error;
        execution.failure = Some(failure);
    }

    /// Removes an execution; returns false if it was already gone.
    pub fn remove(&self, id: &Uuid) -> bool {
        match self.entries.lock().unwrap().remove(id) {
            Some(execution) => {
                debug!("Evicting query {}: {}", execution.id, execution.sql);
                true
            }
            None => false,
        }
    }

    /// Copies out the status fields of an execution.
    pub fn status_snapshot(&self, id: &Uuid) -> Option<StatusSnapshot> {
        let entries = self.entries.lock().unwrap();
        entries.get(id).map(|execution| StatusSnapshot {
            status: execution.status,
            started_at: execution.started_at,
            failure: execution.failure.clone(),
        })
    }

    /// Returns the stored results of a completed execution, or the
    /// appropriate retrieval failure.
    pub fn results(&self, id: &Uuid) -> Result<Arc<QueryResults>, RetrieveError> {
        let entries = self.entries.lock().unwrap();
        let Some(execution) = entries.get(id) else {
            return Err(RetrieveError::NotFound(*id));
        };
        match execution.status {
            ExecutionStatus::Running => Err(RetrieveError::StillRunning(*id)),
            ExecutionStatus::Error => Err(RetrieveError::Failed(*id)),
            ExecutionStatus::Completed => execution
                .results
                .clone()
                .ok_or(RetrieveError::NoResults(*id)),
        }
    }
}
