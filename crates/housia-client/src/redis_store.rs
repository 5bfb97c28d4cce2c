use housia_core::AppError;
use housia_core::job::JobStatusRecord;
use housia_core::traits::StatusStore;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use crate::config::StatusStoreConfig;

/// Writes `ARGV[1]` at `KEYS[1]` unless the stored status ranks above
/// `ARGV[2]` or is terminal. Ranks mirror `JobStatus::rank`.
const ADVANCE_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if current then
  local ranks = { queued = 0, processing = 1, success = 2, error = 2 }
  local rank = ranks[cjson.decode(current)['status']]
  if rank == nil or rank >= 2 or rank > tonumber(ARGV[2]) then
    return 0
  end
end
redis.call('SET', KEYS[1], ARGV[1])
return 1
"#;

/// Job status store backed by Redis: one JSON string per job id.
///
/// Writes are single commands or scripts, so they are atomic against
/// concurrent writers. No TTL is set; eviction is left to the Redis deployment.
#[derive(Clone)]
pub struct RedisStatusStore {
    connection: ConnectionManager,
    advance: Script,
}

impl RedisStatusStore {
    pub async fn connect(config: &StatusStoreConfig) -> Result<Self, AppError> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| AppError::ConnectionError(format!("Invalid Redis url: {e}")))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::ConnectionError(format!("Failed to connect to Redis: {e}")))?;

        tracing::info!("Connected to Redis");
        Ok(Self {
            connection,
            advance: Script::new(ADVANCE_SCRIPT),
        })
    }
}

impl StatusStore for RedisStatusStore {
    async fn get(&self, job_id: &str) -> Result<Option<JobStatusRecord>, AppError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection
            .get(job_id)
            .await
            .map_err(|e| AppError::StatusStoreError(format!("Failed to read {job_id}: {e}")))?;

        decode(raw)
    }

    async fn set_if_absent(&self, record: &JobStatusRecord) -> Result<bool, AppError> {
        let json = serde_json::to_string(record)?;
        let mut connection = self.connection.clone();
        connection
            .set_nx(&record.id, json)
            .await
            .map_err(|e| write_error(&record.id, e))
    }

    async fn advance(&self, record: &JobStatusRecord) -> Result<bool, AppError> {
        let json = serde_json::to_string(record)?;
        let mut connection = self.connection.clone();
        let stored: i32 = self
            .advance
            .key(&record.id)
            .arg(json)
            .arg(u32::from(record.status.rank()))
            .invoke_async(&mut connection)
            .await
            .map_err(|e| write_error(&record.id, e))?;
        Ok(stored == 1)
    }
}

fn write_error(job_id: &str, e: redis::RedisError) -> AppError {
    AppError::StatusStoreError(format!("Failed to write {job_id}: {e}"))
}

fn decode(raw: Option<String>) -> Result<Option<JobStatusRecord>, AppError> {
    match raw {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}
