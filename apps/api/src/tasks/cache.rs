use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

pub fn tasks_key(user_id: Uuid) -> String {
    format!("tasks_{user_id}")
}

pub fn tasks_timestamp_key(user_id: Uuid) -> String {
    format!("tasks_{user_id}_timestamp")
}

/// String key-value store backing the per-user task list.
#[async_trait]
pub trait TaskCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
}

/// Redis-backed cache sharing one multiplexed, auto-reconnecting connection.
///
/// The connection is opened on first use so the API can start while Redis is
/// down; a failed connect is retried by the next operation.
pub struct RedisTaskCache {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
}

impl RedisTaskCache {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            conn: OnceCell::new(),
        }
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let conn = ConnectionManager::new(self.client.clone()).await?;
                info!("Redis connection established");
                Ok::<_, CacheError>(conn)
            })
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl TaskCache for RedisTaskCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }
}
