use housia_core::job::{JobStatus, JobStatusRecord};
use housia_core::status::StatusRecorder;
use housia_core::traits::StatusStore;

use crate::integration::common::setup_status_store;

#[tokio::test]
async fn unknown_job_is_not_found() {
    let (store, _container) = setup_status_store().await;

    assert!(store.get("scrape-unknown").await.unwrap().is_none());
}

#[tokio::test]
async fn set_if_absent_then_get_returns_the_record() {
    let (store, _container) = setup_status_store().await;

    let record = JobStatusRecord::error("scrape-1", "Scrape error: timeout");
    assert!(store.set_if_absent(&record).await.unwrap());

    let stored = store.get("scrape-1").await.unwrap().unwrap();
    assert_eq!(stored, record);
}

#[tokio::test]
async fn set_if_absent_leaves_existing_record() {
    let (store, _container) = setup_status_store().await;

    store.advance(&JobStatusRecord::success("scrape-1")).await.unwrap();
    assert!(!store.set_if_absent(&JobStatusRecord::queued("scrape-1")).await.unwrap());

    let stored = store.get("scrape-1").await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Success);
}

#[tokio::test]
async fn advance_moves_forward_only() {
    let (store, _container) = setup_status_store().await;

    assert!(store.advance(&JobStatusRecord::queued("scrape-1")).await.unwrap());
    assert!(store.advance(&JobStatusRecord::processing("scrape-1")).await.unwrap());
    assert!(store.advance(&JobStatusRecord::processing("scrape-1")).await.unwrap());
    assert!(!store.advance(&JobStatusRecord::queued("scrape-1")).await.unwrap());

    let stored = store.get("scrape-1").await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Processing);
    assert!(stored.error.is_none());

    assert!(store.advance(&JobStatusRecord::error("scrape-1", "boom")).await.unwrap());
    assert!(!store.advance(&JobStatusRecord::success("scrape-1")).await.unwrap());
    assert_eq!(
        store.get("scrape-1").await.unwrap().unwrap().status,
        JobStatus::Error
    );
}

#[tokio::test]
async fn concurrent_writers_never_leave_terminal_status() {
    let (store, _container) = setup_status_store().await;

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                let record = match i % 4 {
                    0 => JobStatusRecord::success("scrape-1"),
                    1 => JobStatusRecord::error("scrape-1", "duplicate"),
                    2 => JobStatusRecord::processing("scrape-1"),
                    _ => JobStatusRecord::queued("scrape-1"),
                };
                store.advance(&record).await.unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    // Whichever terminal write landed first is final.
    assert!(store.get("scrape-1").await.unwrap().unwrap().status.is_terminal());
    let late = store.advance(&JobStatusRecord::processing("scrape-1")).await.unwrap();
    assert!(!late);
}

#[tokio::test]
async fn recorder_keeps_terminal_status() {
    let (store, _container) = setup_status_store().await;
    let recorder = StatusRecorder::new(store.clone());

    recorder.seed(JobStatusRecord::queued("scrape-1")).await;
    recorder.record(JobStatusRecord::success("scrape-1")).await;
    recorder.record(JobStatusRecord::processing("scrape-1")).await;

    let stored = store.get("scrape-1").await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Success);
}
