use housia_core::AppError;
use housia_core::models::{NewListing, ScrapedListing};
use housia_core::traits::ListingStore;
use housia_db::{Database, ListingRepository};

use crate::integration::common::setup_test_db;

fn new_listing(url: &str) -> NewListing {
    ScrapedListing {
        name: "Appartement T2".to_string(),
        description: None,
        price: 189_000.0,
        size: 41.5,
        city: "Rennes".to_string(),
        post_code: "35000".to_string(),
        rooms: 2,
        dpe: Some("d".to_string()),
    }
    .into_new_listing(url)
}

#[tokio::test]
async fn create_then_find_by_url() {
    let (pool, _container) = setup_test_db().await;
    let repo = ListingRepository::new(pool);

    let stored = repo
        .create(&new_listing("https://example.com/house/1"))
        .await
        .unwrap();

    assert_eq!(stored.city, "Rennes");
    assert_eq!(stored.dpe.as_deref(), Some("D"));
    assert!(!stored.is_favorite);
    assert!(!stored.is_housia_picked);

    let found = repo
        .find_by_url("https://example.com/house/1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, stored.id);
}

#[tokio::test]
async fn unknown_url_is_none() {
    let (pool, _container) = setup_test_db().await;
    let repo = ListingRepository::new(pool);

    assert!(
        repo.find_by_url("https://example.com/nowhere")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn second_create_for_same_url_is_a_duplicate() {
    let (pool, _container) = setup_test_db().await;
    let repo = ListingRepository::new(pool.clone());
    let listing = new_listing("https://example.com/house/2");

    repo.create(&listing).await.unwrap();
    let err = repo.create(&listing).await.unwrap_err();

    assert!(matches!(err, AppError::DuplicateError(ref url) if url == "https://example.com/house/2"));
    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM houses")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn racing_creates_store_one_listing() {
    let (pool, _container) = setup_test_db().await;
    let repo = Database::from_pool(pool).listing_repo();

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.create(&new_listing("https://example.com/house/3")).await })
        })
        .collect();

    let mut created = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(AppError::DuplicateError(_)) => duplicates += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(duplicates, 4);
}

#[tokio::test]
async fn invalid_row_is_a_persistence_error() {
    let (pool, _container) = setup_test_db().await;
    let repo = ListingRepository::new(pool);
    let mut listing = new_listing("https://example.com/house/4");
    listing.post_code = "123456789012345".to_string();

    let err = repo.create(&listing).await.unwrap_err();

    assert!(matches!(err, AppError::PersistenceError(_)));
}
