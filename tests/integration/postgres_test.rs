//! Query lifecycle tests against a real PostgreSQL database.
//!
//! Set DATABASE_URL to run these; they skip silently otherwise.

use db_console::config::{ConnectionConfig, QueryConfig};
use db_console::db::{ConnectionProvider, PostgresProvider, Value};
use db_console::error::SubmitError;
use db_console::query::{ExecutionStatus, QueryService};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Helper to get the test database URL from the environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Helper to create a service backed by a real connection pool.
async fn get_test_service(config: QueryConfig) -> Option<QueryService> {
    let url = get_test_database_url()?;
    let conn = ConnectionConfig::from_connection_string(&url).ok()?;
    let provider = PostgresProvider::connect(&conn).await.ok()?;
    Some(QueryService::new(
        Arc::new(provider) as Arc<dyn ConnectionProvider>,
        config,
    ))
}

async fn wait_terminal(service: &QueryService, id: &Uuid) -> ExecutionStatus {
    for _ in 0..1000 {
        let view = service.status(id).expect("execution should exist");
        if view.status.is_terminal() {
            return view.status;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("execution {id} never reached a terminal state");
}

#[tokio::test]
async fn test_simple_select_completes() {
    let Some(service) = get_test_service(QueryConfig::default()).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let view = service
        .submit("SELECT 1 as num, 'hello' as greeting", None)
        .await
        .unwrap();

    let status = wait_terminal(&service, &view.query_id).await;
    assert_eq!(status, ExecutionStatus::Completed);

    let page = service.results_page(&view.query_id, None, None).unwrap();
    assert_eq!(page.columns.len(), 2);
    assert_eq!(page.columns[0].name, "num");
    assert_eq!(page.columns[0].data_type, "INTEGER");
    assert_eq!(page.columns[1].name, "greeting");
    assert_eq!(page.columns[1].data_type, "VARCHAR");
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0][0], Value::Int(1));
    assert_eq!(page.row_count, 1);
}

#[tokio::test]
async fn test_mutating_statement_is_rejected() {
    let Some(service) = get_test_service(QueryConfig::default()).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = service
        .submit("DROP TABLE IF EXISTS should_never_exist", None)
        .await;
    assert!(matches!(result, Err(SubmitError::MutatingStatement)));
    assert_eq!(service.active_count(), 0);
}

#[tokio::test]
async fn test_syntax_error_reports_position() {
    let Some(service) = get_test_service(QueryConfig::default()).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let view = service.submit("SELEC 1", None).await.unwrap();
    let status = wait_terminal(&service, &view.query_id).await;
    assert_eq!(status, ExecutionStatus::Error);

    let failure = service.status(&view.query_id).unwrap().error.unwrap();
    let message = failure.message.to_lowercase();
    assert!(
        message.contains("syntax"),
        "Expected syntax error, got: {message}"
    );
    assert_eq!(failure.line, Some(1));
    assert_eq!(failure.position, Some(1));
}

#[tokio::test]
async fn test_statement_timeout_is_enforced() {
    let Some(service) = get_test_service(QueryConfig::default()).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let view = service
        .submit("SELECT pg_sleep(5)", Some(100))
        .await
        .unwrap();
    let status = wait_terminal(&service, &view.query_id).await;
    assert_eq!(status, ExecutionStatus::Error);

    let failure = service.status(&view.query_id).unwrap().error.unwrap();
    let message = failure.message.to_lowercase();
    assert!(
        message.contains("timeout") || message.contains("canceling"),
        "Expected timeout error, got: {message}"
    );
}

#[tokio::test]
async fn test_export_csv_from_live_results() {
    let dir = tempfile::tempdir().unwrap();
    let config = QueryConfig {
        export_dir: dir.path().to_path_buf(),
        ..QueryConfig::default()
    };
    let Some(service) = get_test_service(config).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let view = service
        .submit(
            "SELECT n as id, 'name-' || n as name FROM generate_series(1, 3) n",
            None,
        )
        .await
        .unwrap();
    wait_terminal(&service, &view.query_id).await;

    let export = service.export_csv(&view.query_id).unwrap();
    let content = std::fs::read_to_string(&export.file_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "id,name");
    assert_eq!(lines.len(), 4);
}

#[tokio::test]
async fn test_null_values_survive_the_pipeline() {
    let Some(service) = get_test_service(QueryConfig::default()).await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let view = service
        .submit("SELECT NULL as a, 42 as b", None)
        .await
        .unwrap();
    wait_terminal(&service, &view.query_id).await;

    let page = service.results_page(&view.query_id, None, None).unwrap();
    assert_eq!(page.columns[0].data_type, "NULL");
    assert_eq!(page.rows[0][0], Value::Null);
    assert_eq!(page.rows[0][1], Value::Int(42));
}
