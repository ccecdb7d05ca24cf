//! Results pagination.
//!
//! Computes a page view over a stored result set. Purely a read: rows are
//! never mutated, and out-of-range pages yield an empty slice rather than
//! an error.

use crate::db::{ColumnInfo, Row};
use crate::query::registry::QueryResults;

/// One page of a stored result set.
///
/// `row_count`, `truncated`, and `columns` always reflect the full stored
/// results, not the page.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsPage {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub truncated: bool,
    pub page_count: usize,
    pub current_page: usize,
}

/// Slices `results` into the requested page.
///
/// `page_size` is clamped to `max_page_size`; `page` is 1-based and clamped
/// to at least 1. `page_count` covers the retained row set, so concatenating
/// pages `1..=page_count` reproduces the stored rows exactly.
pub fn page_of(
    results: &QueryResults,
    page: usize,
    page_size: usize,
    max_page_size: usize,
) -> ResultsPage {
    let effective_size = page_size.clamp(1, max_page_size);
    let page = page.max(1);

    let start = (page - 1).saturating_mul(effective_size);
    let end = start.saturating_add(effective_size).min(results.rows.len());

    let rows = if start >= results.rows.len() {
        Vec::new()
    } else {
        results.rows[start..end].to_vec()
    };

    ResultsPage {
        columns: results.columns.clone(),
        rows,
        row_count: results.row_count,
        truncated: results.truncated,
        page_count: results.rows.len().div_ceil(effective_size),
        current_page: page,
    }
}
