use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use tower::ServiceExt;

use housia_core::testutil::{MemoryBroker, MockListingStore, MockStatusStore};
use housia_core::{SubmissionConfig, SubmissionGateway};
use housia_server::routes;
use housia_server::state::AppState;

pub const QUEUE: &str = "scraping_queue";

/// Router wired to in-memory collaborators, plus handles for assertions.
pub struct TestApp {
    pub router: Router,
    pub broker: MemoryBroker,
    pub listings: MockListingStore,
    pub status: MockStatusStore,
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with(MemoryBroker::new(), MockListingStore::empty())
}

pub fn setup_test_app_with(broker: MemoryBroker, listings: MockListingStore) -> TestApp {
    let status = MockStatusStore::empty();
    let gateway = SubmissionGateway::new(
        broker.clone(),
        listings.clone(),
        status.clone(),
        SubmissionConfig::default(),
    );
    let router = routes::router(Arc::new(AppState { gateway }));

    TestApp {
        router,
        broker,
        listings,
        status,
    }
}

pub async fn submit(router: &Router, body: serde_json::Value) -> Response<Body> {
    router
        .clone()
        .oneshot(
            Request::post("/v1/scrape")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn get(router: &Router, uri: &str) -> Response<Body> {
    router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}
