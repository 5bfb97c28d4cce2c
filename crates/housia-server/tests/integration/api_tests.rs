use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use housia_core::AppError;
use housia_core::job::JobStatus;
use housia_core::testutil::{MemoryBroker, MockListingStore, make_test_listing};

use crate::integration::common::{
    QUEUE, get, json_body, setup_test_app, setup_test_app_with, submit,
};

const URL: &str = "https://example.com/house/1";

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app();

    let response = get(&app.router, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn submit_new_url_returns_202() {
    let app = setup_test_app();

    let response = submit(&app.router, serde_json::json!({ "url": URL })).await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = json_body(response).await;
    assert_eq!(json["status"], "queued");
    assert_eq!(json["message"], "Job queued successfully");
    let job_id = json["jobId"].as_str().unwrap();
    assert!(job_id.starts_with("scrape-"));

    let published = app.broker.published_jobs(QUEUE);
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].id, job_id);
    assert_eq!(app.status.status_of(job_id), Some(JobStatus::Queued));
}

#[tokio::test]
async fn submit_stored_url_returns_409() {
    let app = setup_test_app_with(
        MemoryBroker::new(),
        MockListingStore::with_listing(make_test_listing(URL)),
    );

    let response = submit(&app.router, serde_json::json!({ "url": URL })).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["error"], "duplicate");
    assert!(app.broker.published_jobs(QUEUE).is_empty());
}

#[tokio::test]
async fn submit_invalid_url_returns_400() {
    let app = setup_test_app();

    let response = submit(&app.router, serde_json::json!({ "url": "ftp://example.com/x" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "validation_error");
}

#[tokio::test]
async fn submit_without_url_returns_400() {
    let app = setup_test_app();

    let response = submit(&app.router, serde_json::json!({ "link": URL })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submit_non_json_body_returns_400() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/v1/scrape")
                .header("content-type", "text/plain")
                .body(Body::from(URL))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn broker_down_returns_503() {
    let broker = MemoryBroker::new();
    broker.fail_next_publish(AppError::ConnectionError("broker down".into()));
    let app = setup_test_app_with(broker, MockListingStore::empty());

    let response = submit(&app.router, serde_json::json!({ "url": URL })).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(app.status.is_empty());
}

#[tokio::test]
async fn status_of_submitted_job() {
    let app = setup_test_app();
    let job_id = json_body(submit(&app.router, serde_json::json!({ "url": URL })).await).await
        ["jobId"]
        .as_str()
        .unwrap()
        .to_string();

    let response = get(&app.router, &format!("/v1/scrape/jobs/{job_id}")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["id"], job_id.as_str());
    assert_eq!(json["status"], "queued");
    assert!(json["updatedAt"].is_string());
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn status_of_unknown_job_returns_404() {
    let app = setup_test_app();

    let response = get(&app.router, "/v1/scrape/jobs/scrape-unknown").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "not_found");
}
