use housia_core::AppError;
use housia_core::traits::PromptSource;
use housia_db::{Database, PromptRepository};

use crate::integration::common::setup_test_db;

#[tokio::test]
async fn active_prompt_is_returned() {
    let (pool, _container) = setup_test_db().await;
    sqlx::query("INSERT INTO prompts (name, prompt, active) VALUES ($1, $2, $3), ($4, $5, $6)")
        .bind("old")
        .bind("previous prompt")
        .bind(false)
        .bind("current")
        .bind("extract name, price and city")
        .bind(true)
        .execute(&pool)
        .await
        .unwrap();
    let repo = PromptRepository::new(pool);

    assert_eq!(
        repo.active_prompt().await.unwrap(),
        "extract name, price and city"
    );
}

#[tokio::test]
async fn no_active_prompt_is_a_persistence_error() {
    let (pool, _container) = setup_test_db().await;
    let repo = Database::from_pool(pool).prompt_repo();

    let err = repo.read_active().await.unwrap_err();

    assert!(matches!(err, AppError::PersistenceError(_)));
}

#[tokio::test]
async fn health_check_succeeds() {
    let (pool, _container) = setup_test_db().await;

    Database::from_pool(pool).health_check().await.unwrap();
}
