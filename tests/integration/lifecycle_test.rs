//! Full execution lifecycle tests against the mock provider.
//!
//! Exercises the public API the way an embedding application would:
//! submit, poll, page, export, and observe reclamation. No database needed.

use db_console::config::QueryConfig;
use db_console::db::{mock_record, ConnectionProvider, MockProvider, Value};
use db_console::error::RetrieveError;
use db_console::query::{
    ExecutionStatus, ManualReapScheduler, QueryService, ReapScheduler,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

async fn wait_terminal(service: &QueryService, id: &Uuid) -> ExecutionStatus {
    for _ in 0..500 {
        let view = service.status(id).expect("execution should exist");
        if view.status.is_terminal() {
            return view.status;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("execution {id} never reached a terminal state");
}

#[tokio::test]
async fn test_full_lifecycle_submit_poll_page_export_reap() {
    let export_dir = tempfile::tempdir().unwrap();
    let rows: Vec<_> = (0..5)
        .map(|i| {
            mock_record(&[
                ("id", Value::Int(i)),
                ("label", Value::Text(format!("row-{i}"))),
            ])
        })
        .collect();

    let provider = Arc::new(MockProvider::returning_rows(rows));
    let scheduler = Arc::new(ManualReapScheduler::new());
    let config = QueryConfig {
        export_dir: export_dir.path().to_path_buf(),
        ..QueryConfig::default()
    };
    let service = QueryService::with_scheduler(
        Arc::clone(&provider) as Arc<dyn ConnectionProvider>,
        config,
        Arc::clone(&scheduler) as Arc<dyn ReapScheduler>,
    );

    // Submit returns immediately with a running execution.
    let view = service
        .submit("SELECT id, label FROM items", None)
        .await
        .unwrap();
    assert_eq!(view.status, ExecutionStatus::Running);
    assert_eq!(service.active_count(), 1);

    // Poll to completion, then page through the results.
    let status = wait_terminal(&service, &view.query_id).await;
    assert_eq!(status, ExecutionStatus::Completed);

    let page = service
        .results_page(&view.query_id, Some(1), Some(2))
        .unwrap();
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.row_count, 5);
    assert_eq!(page.page_count, 3);
    assert_eq!(page.current_page, 1);

    let last = service
        .results_page(&view.query_id, Some(3), Some(2))
        .unwrap();
    assert_eq!(last.rows, vec![vec![
        Value::Int(4),
        Value::Text("row-4".to_string()),
    ]]);

    // Export the retained rows to CSV.
    let export = service.export_csv(&view.query_id).unwrap();
    let content = std::fs::read_to_string(&export.file_path).unwrap();
    assert_eq!(content.lines().count(), 6);
    assert_eq!(content.lines().next().unwrap(), "id,label");

    // After the retention reap, the execution is gone and the session freed.
    assert_eq!(provider.release_count(), 0);
    scheduler.run_pending().await;
    assert_eq!(provider.release_count(), 1);
    assert_eq!(
        service.status(&view.query_id),
        Err(RetrieveError::NotFound(view.query_id))
    );
    assert_eq!(service.active_count(), 0);
}

#[tokio::test]
async fn test_failure_lifecycle_retains_error_until_reap() {
    let provider = Arc::new(MockProvider::failing("division by zero"));
    let scheduler = Arc::new(ManualReapScheduler::new());
    let service = QueryService::with_scheduler(
        Arc::clone(&provider) as Arc<dyn ConnectionProvider>,
        QueryConfig::default(),
        Arc::clone(&scheduler) as Arc<dyn ReapScheduler>,
    );

    let view = service.submit("SELECT 1 / 0", None).await.unwrap();
    assert_eq!(
        wait_terminal(&service, &view.query_id).await,
        ExecutionStatus::Error
    );

    // The failure stays pollable until the entry is reaped.
    let status = service.status(&view.query_id).unwrap();
    assert_eq!(status.error.unwrap().message, "division by zero");

    scheduler.run_pending().await;
    assert_eq!(provider.release_count(), 1);
    assert_eq!(
        service.status(&view.query_id),
        Err(RetrieveError::NotFound(view.query_id))
    );
}

#[tokio::test]
async fn test_views_serialize_with_camel_case_keys() {
    let provider = Arc::new(MockProvider::returning_rows(vec![mock_record(&[(
        "n",
        Value::Int(1),
    )])]));
    let service = QueryService::new(
        Arc::clone(&provider) as Arc<dyn ConnectionProvider>,
        QueryConfig::default(),
    );

    let view = service.submit("SELECT 1 AS n", None).await.unwrap();
    let json = serde_json::to_value(&view).unwrap();
    assert!(json.get("queryId").is_some());
    assert!(json.get("startTime").is_some());
    assert_eq!(json["status"], "running");

    wait_terminal(&service, &view.query_id).await;

    let page = service.results_page(&view.query_id, None, None).unwrap();
    let json = serde_json::to_value(&page).unwrap();
    assert!(json.get("rowCount").is_some());
    assert!(json.get("pageCount").is_some());
    assert!(json.get("currentPage").is_some());
    assert_eq!(json["columns"][0]["type"], "INTEGER");
}
