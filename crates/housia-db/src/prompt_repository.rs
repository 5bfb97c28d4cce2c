use housia_core::AppError;
use housia_core::traits::PromptSource;
use sqlx::PgPool;

/// Reads extraction prompts. Exactly one row is expected to be active.
#[derive(Clone)]
pub struct PromptRepository {
    pool: PgPool,
}

impl PromptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Text of the prompt flagged `active`.
    pub async fn read_active(&self) -> Result<String, AppError> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT prompt
            FROM prompts
            WHERE active = true
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::PersistenceError(e.to_string()))?;

        row.map(|(prompt,)| prompt)
            .ok_or_else(|| AppError::PersistenceError("No active prompt found".into()))
    }
}

impl PromptSource for PromptRepository {
    async fn active_prompt(&self) -> Result<String, AppError> {
        self.read_active().await
    }
}
