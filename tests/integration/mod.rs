//! Integration tests for db-console.

pub mod lifecycle_test;
pub mod postgres_test;
