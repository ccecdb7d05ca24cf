//! Mock connection provider for testing.
//!
//! Provides scriptable in-memory sessions so the query service can be tested
//! without a database: each acquired connection pops the next scripted
//! outcome, records every statement it is asked to run, and counts releases.

use super::{ConnectionProvider, DbConnection, Record, Value};
use crate::error::{ConsoleError, QueryError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// What a mock session should do when the user statement runs.
#[derive(Clone)]
pub enum MockOutcome {
    /// Return these keyed records.
    Rows(Vec<Record>),
    /// Fail with this query error.
    Fail(QueryError),
    /// Stay running until the notify handle is triggered, then return rows.
    BlockUntil(Arc<Notify>, Vec<Record>),
}

/// A mock connection provider with scripted outcomes.
///
/// `SET ...` statements succeed with no rows and are only recorded; any other
/// statement consumes the next scripted outcome. With an empty script, a
/// single default row is returned.
pub struct MockProvider {
    script: Mutex<VecDeque<MockOutcome>>,
    statements: Arc<Mutex<Vec<String>>>,
    released: Arc<AtomicUsize>,
}

impl MockProvider {
    /// Creates a provider with no scripted outcomes (default row per query).
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            statements: Arc::new(Mutex::new(Vec::new())),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a provider whose next query returns the given records.
    pub fn returning_rows(rows: Vec<Record>) -> Self {
        let provider = Self::new();
        provider.push_outcome(MockOutcome::Rows(rows));
        provider
    }

    /// Creates a provider whose next query fails with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        let provider = Self::new();
        provider.push_outcome(MockOutcome::Fail(QueryError::new(message)));
        provider
    }

    /// Appends an outcome to the script.
    pub fn push_outcome(&self, outcome: MockOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// All statements executed across sessions, in order.
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    /// How many sessions have been released so far.
    pub fn release_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionProvider for MockProvider {
    async fn acquire(&self) -> Result<Box<dyn DbConnection>> {
        let outcome = self.script.lock().unwrap().pop_front();
        Ok(Box::new(MockConnection {
            outcome,
            statements: Arc::clone(&self.statements),
            released: Arc::clone(&self.released),
        }))
    }
}

/// One scripted mock session.
pub struct MockConnection {
    outcome: Option<MockOutcome>,
    statements: Arc<Mutex<Vec<String>>>,
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl DbConnection for MockConnection {
    async fn execute(&mut self, sql: &str) -> Result<Vec<Record>> {
        self.statements.lock().unwrap().push(sql.to_string());

        // Session statements succeed silently, like a real session.
        if sql.trim().to_lowercase().starts_with("set ") {
            return Ok(Vec::new());
        }

        match self.outcome.take() {
            Some(MockOutcome::Rows(rows)) => Ok(rows),
            Some(MockOutcome::Fail(err)) => Err(ConsoleError::Query(err)),
            Some(MockOutcome::BlockUntil(notify, rows)) => {
                notify.notified().await;
                Ok(rows)
            }
            None => Ok(vec![vec![(
                "result".to_string(),
                Value::Text(format!("Mock result for: {sql}")),
            )]]),
        }
    }

    async fn release(self: Box<Self>) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Builds a keyed record from name/value pairs; test convenience.
pub fn mock_record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}
