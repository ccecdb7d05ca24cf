//! Query service: orchestrates one query's life.
//!
//! The synchronous half of a submission validates the SQL, acquires a
//! dedicated connection, registers the execution, and returns immediately.
//! The asynchronous continuation applies session settings, runs the
//! statement, commits the outcome into the registry, and schedules the
//! retention reap.

use crate::config::QueryConfig;
use crate::db::{ColumnInfo, ConnectionProvider, DbConnection, Record, Row, Value};
use crate::error::{ConsoleError, ExportError, RetrieveError, SubmitError};
use crate::query::export::{self, CsvExport};
use crate::query::pagination::{self, ResultsPage};
use crate::query::reaper::{schedule_reap, ReapScheduler, TokioReapScheduler};
use crate::query::registry::{
    ExecutionFailure, ExecutionRegistry, ExecutionStatus, QueryResults,
};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{error, info};
use uuid::Uuid;

/// Default page number for results requests.
const DEFAULT_PAGE: usize = 1;

/// Default page size for results requests.
const DEFAULT_PAGE_SIZE: usize = 100;

/// The immediate response to an accepted submission.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionView {
    pub query_id: Uuid,
    pub status: ExecutionStatus,
    pub start_time: SystemTime,
}

/// The polled status of an execution.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub query_id: Uuid,
    pub status: ExecutionStatus,
    pub start_time: SystemTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionFailure>,
}

/// Accepts read-only SQL, runs it out-of-band, and serves status, pages,
/// and CSV exports keyed by execution id.
#[derive(Clone)]
pub struct QueryService {
    registry: Arc<ExecutionRegistry>,
    provider: Arc<dyn ConnectionProvider>,
    scheduler: Arc<dyn ReapScheduler>,
    config: QueryConfig,
}

impl QueryService {
    /// Creates a service with the production tokio reap scheduler.
    pub fn new(provider: Arc<dyn ConnectionProvider>, config: QueryConfig) -> Self {
        Self::with_scheduler(provider, config, Arc::new(TokioReapScheduler))
    }

    /// Creates a service with an injected reap scheduler.
    pub fn with_scheduler(
        provider: Arc<dyn ConnectionProvider>,
        config: QueryConfig,
        scheduler: Arc<dyn ReapScheduler>,
    ) -> Self {
        Self {
            registry: Arc::new(ExecutionRegistry::new()),
            provider,
            scheduler,
            config,
        }
    }

    /// Number of executions currently tracked (running or retained).
    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    /// Submits a statement for asynchronous execution.
    ///
    /// Rejects empty and mutating SQL before any execution exists. On
    /// acceptance, returns the execution id with `running` status without
    /// waiting for the query to finish.
    pub async fn submit(
        &self,
        sql: &str,
        timeout_ms: Option<u64>,
    ) -> Result<ExecutionView, SubmitError> {
        if sql.trim().is_empty() {
            return Err(SubmitError::EmptyStatement);
        }
        if crate::safety::is_mutating(sql) {
            return Err(SubmitError::MutatingStatement);
        }

        let connection = self
            .provider
            .acquire()
            .await
            .map_err(SubmitError::Connection)?;

        let id = Uuid::new_v4();
        let started_at = SystemTime::now();
        self.registry.insert_running(id, sql, started_at);

        let timeout_ms = timeout_ms.unwrap_or(self.config.default_timeout_ms);
        let registry = Arc::clone(&self.registry);
        let scheduler = Arc::clone(&self.scheduler);
        let config = self.config.clone();
        let statement = sql.to_string();

        tokio::spawn(async move {
            run_execution(registry, scheduler, config, id, statement, timeout_ms, connection).await;
        });

        Ok(ExecutionView {
            query_id: id,
            status: ExecutionStatus::Running,
            start_time: started_at,
        })
    }

    /// Returns the status of an execution.
    pub fn status(&self, id: &Uuid) -> Result<StatusView, RetrieveError> {
        let snapshot = self
            .registry
            .status_snapshot(id)
            .ok_or(RetrieveError::NotFound(*id))?;

        Ok(StatusView {
            query_id: *id,
            status: snapshot.status,
            start_time: snapshot.started_at,
            error: snapshot.failure,
        })
    }

    /// Returns one page of a completed execution's results.
    pub fn results_page(
        &self,
        id: &Uuid,
        page: Option<usize>,
        page_size: Option<usize>,
    ) -> Result<ResultsPage, RetrieveError> {
        let results = self.registry.results(id)?;
        Ok(pagination::page_of(
            &results,
            page.unwrap_or(DEFAULT_PAGE),
            page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            self.config.max_page_size,
        ))
    }

    /// Writes a completed execution's retained rows to a CSV file and
    /// returns its location.
    pub fn export_csv(&self, id: &Uuid) -> Result<CsvExport, ExportError> {
        let results = self.registry.results(id)?;
        export::write_csv(
            &self.config.export_dir,
            *id,
            &results,
            self.config.max_csv_rows,
        )
    }
}

/// The asynchronous continuation: session settings, statement, outcome,
/// reap scheduling. Owns the execution's connection throughout.
async fn run_execution(
    registry: Arc<ExecutionRegistry>,
    scheduler: Arc<dyn ReapScheduler>,
    config: QueryConfig,
    id: Uuid,
    sql: String,
    timeout_ms: u64,
    mut connection: Box<dyn DbConnection>,
) {
    match run_statement(connection.as_mut(), &config, &sql, timeout_ms).await {
        Ok((results, elapsed_ms)) => {
            info!(
                "Query {id} completed in {elapsed_ms}ms with {} rows",
                results.rows.len()
            );
            registry.complete(&id, results);
        }
        Err(e) => {
            error!("Query {id} failed: {e}");
            registry.fail(&id, ExecutionFailure::from(e));
        }
    }

    // The only path that frees the connection and the registry entry.
    schedule_reap(
        scheduler.as_ref(),
        registry,
        id,
        connection,
        config.retention(),
    );
}

/// Applies session settings and runs the statement, returning materialized
/// results and the elapsed execution time in milliseconds.
async fn run_statement(
    connection: &mut dyn DbConnection,
    config: &QueryConfig,
    sql: &str,
    timeout_ms: u64,
) -> Result<(QueryResults, u128), ConsoleError> {
    // Statement-level timeout, enforced by the database session itself.
    connection
        .execute(&format!("SET statement_timeout = {timeout_ms}"))
        .await?;

    if config.schema != "public" {
        connection
            .execute(&format!("SET search_path TO {}, public", config.schema))
            .await?;
    }

    let start = Instant::now();
    let records = connection.execute(sql).await?;
    let elapsed_ms = start.elapsed().as_millis();

    Ok((materialize(records, config.max_rows), elapsed_ms))
}

/// Turns raw keyed records into stored results: columns and display types
/// from the first row, rows converted to positional form, capped at
/// `max_rows` with truncation bookkeeping.
fn materialize(records: Vec<Record>, max_rows: usize) -> QueryResults {
    let row_count = records.len();
    let truncated = row_count > max_rows;

    let columns: Vec<ColumnInfo> = match records.first() {
        Some(first) => first
            .iter()
            .map(|(name, value)| ColumnInfo::new(name, value.display_type()))
            .collect(),
        None => Vec::new(),
    };

    let rows: Vec<Row> = records
        .into_iter()
        .take(max_rows)
        .map(|record| positional_row(record, &columns))
        .collect();

    QueryResults {
        columns,
        rows,
        row_count,
        truncated,
    }
}

/// Reorders a keyed record into a positional row aligned to `columns`.
/// Missing keys become NULL.
fn positional_row(record: Record, columns: &[ColumnInfo]) -> Row {
    columns
        .iter()
        .map(|col| {
            record
                .iter()
                .find(|(name, _)| name == &col.name)
                .map(|(_, value)| value.clone())
                .unwrap_or(Value::Null)
        })
        .collect()
}
