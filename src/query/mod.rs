//! Query execution and session lifecycle management.
//!
//! The core of db-console: accepts a read-only SQL statement, runs it
//! out-of-band on a dedicated connection, tracks per-execution state in the
//! registry, serves paged results and CSV exports, and reclaims resources
//! after the retention delay.

mod export;
mod pagination;
mod reaper;
mod registry;
mod service;

pub use export::CsvExport;
pub use pagination::ResultsPage;
pub use reaper::{ManualReapScheduler, ReapScheduler, TokioReapScheduler};
pub use registry::{
    ExecutionFailure, ExecutionRegistry, ExecutionStatus, QueryResults, StatusSnapshot,
};
pub use service::{ExecutionView, QueryService, StatusView};
