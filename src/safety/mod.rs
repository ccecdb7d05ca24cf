//! Read-only safety filter.
//!
//! Classifies a raw SQL string as mutating or read-only before submission.
//! This is a keyword heuristic, not a parser: it flags statements that begin
//! with a mutating keyword, or contain one immediately after a statement
//! separator (`;`). Keywords hidden inside comments, string literals, or
//! otherwise obfuscated statements are not caught; the database user's
//! privileges remain the real enforcement boundary.

/// Keywords whose presence at a statement start marks the SQL as mutating.
const MUTATING_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "create", "alter", "truncate", "rename", "grant",
    "revoke", "commit", "rollback", "begin", "start",
];

/// Returns true if the SQL should be rejected as mutating.
///
/// The input is trimmed and lowercased before matching.
pub fn is_mutating(sql: &str) -> bool {
    let normalized = sql.trim().to_lowercase();

    MUTATING_KEYWORDS.iter().any(|keyword| {
        normalized.starts_with(keyword) || normalized.contains(&format!(";{keyword}"))
    })
}
