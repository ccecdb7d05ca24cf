//! db-console - asynchronous SQL execution and session lifecycle management.
//!
//! Submits read-only statements for out-of-band execution on dedicated
//! connections, tracks each execution in an in-memory registry, and serves
//! paged results and CSV exports until the retention window expires.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod query;
pub mod safety;
