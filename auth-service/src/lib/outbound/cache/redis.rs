use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use redis::RedisError;

use crate::domain::cache::KeyValueCache;
use crate::domain::errors::StoreError;
use crate::outbound::deadline::with_deadline;

/// Shared cache tier on Redis.
///
/// The connection manager reconnects on its own; each call clones it and runs
/// under the configured deadline.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    timeout: Duration,
}

impl RedisCache {
    /// Open a managed connection to `url`.
    ///
    /// # Errors
    /// * `Unavailable` - URL invalid or server unreachable
    /// * `Timeout` - Initial connection exceeded `timeout`
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(redis_error)?;
        let connection = with_deadline(timeout, async {
            ConnectionManager::new(client).await.map_err(redis_error)
        })
        .await?;

        Ok(Self {
            connection,
            timeout,
        })
    }
}

fn redis_error(e: RedisError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// Whole seconds, rounded up, never below one: `EXPIRE 0` deletes the key.
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

#[async_trait]
impl KeyValueCache for RedisCache {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();

        with_deadline(self.timeout, async {
            connection
                .set_ex::<_, _, ()>(key, value, ttl_secs(ttl))
                .await
                .map_err(redis_error)
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection.clone();

        with_deadline(self.timeout, async {
            connection
                .get::<_, Option<String>>(key)
                .await
                .map_err(redis_error)
        })
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut connection = self.connection.clone();

        with_deadline(self.timeout, async {
            connection.exists::<_, bool>(key).await.map_err(redis_error)
        })
        .await
    }

    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        let counts = self
            .increment_many_with_ttl(&[(key.to_string(), ttl)])
            .await?;

        counts
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Corrupt("empty INCR reply".to_string()))
    }

    async fn increment_many_with_ttl(
        &self,
        entries: &[(String, Duration)],
    ) -> Result<Vec<i64>, StoreError> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, ttl) in entries {
            pipe.incr(key, 1)
                .expire(key, ttl_secs(*ttl) as i64)
                .ignore();
        }

        let mut connection = self.connection.clone();
        let counts: Vec<i64> = with_deadline(self.timeout, async {
            pipe.query_async(&mut connection).await.map_err(redis_error)
        })
        .await?;

        if counts.len() != entries.len() {
            return Err(StoreError::Corrupt(format!(
                "expected {} counters, got {}",
                entries.len(),
                counts.len()
            )));
        }

        tracing::trace!(keys = entries.len(), "Counters incremented");
        Ok(counts)
    }
}
