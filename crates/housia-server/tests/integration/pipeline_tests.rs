use std::sync::Arc;

use axum::http::StatusCode;
use tokio_util::sync::CancellationToken;

use housia_core::config::WorkerConfig;
use housia_core::job::JobStatus;
use housia_core::testutil::{MockDelegate, MockPromptSource, MockReporter, wait_for};
use housia_core::worker::WorkerService;

use crate::integration::common::{get, json_body, setup_test_app, submit};

const URL: &str = "https://example.com/house/1";

/// Submit over HTTP, let a worker process the job, then poll its status.
#[tokio::test]
async fn submitted_job_is_processed_and_duplicate_is_refused() {
    let app = setup_test_app();
    let worker = WorkerService::new(
        app.broker.clone(),
        MockDelegate::succeeding(),
        MockPromptSource::new("extract the listing"),
        app.listings.clone(),
        app.status.clone(),
        WorkerConfig::default().with_concurrency(2),
    );
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let handle =
        tokio::spawn(async move { worker.run(token, Arc::new(MockReporter::new())).await });

    let response = submit(&app.router, serde_json::json!({ "url": URL })).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let job_id = json_body(response).await["jobId"]
        .as_str()
        .unwrap()
        .to_string();

    let status = app.status.clone();
    let id = job_id.clone();
    wait_for(move || status.status_of(&id) == Some(JobStatus::Success)).await;

    let polled = json_body(get(&app.router, &format!("/v1/scrape/jobs/{job_id}")).await).await;
    assert_eq!(polled["status"], "success");
    assert_eq!(app.listings.count_for(URL), 1);

    let again = submit(&app.router, serde_json::json!({ "url": URL })).await;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    cancel.cancel();
    handle.await.unwrap().unwrap();
    assert_eq!(app.broker.published_jobs("scraping_queue").len(), 1);
}
