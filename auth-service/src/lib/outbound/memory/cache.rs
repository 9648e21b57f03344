use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::cache::KeyValueCache;
use crate::domain::errors::StoreError;

#[derive(Debug, Clone)]
struct CachedValue {
    value: String,
    expires_at: Instant,
}

impl CachedValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Entry count below which writes never sweep.
const MIN_SWEEP_AT: usize = 64;

#[derive(Debug)]
struct Entries {
    values: HashMap<String, CachedValue>,
    sweep_at: usize,
}

impl Default for Entries {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
            sweep_at: MIN_SWEEP_AT,
        }
    }
}

impl Entries {
    fn insert(&mut self, key: &str, value: CachedValue, now: Instant) {
        self.values.insert(key.to_string(), value);

        // Reads skip expired entries; writes remove them once the map has
        // doubled since the last sweep.
        if self.values.len() >= self.sweep_at {
            self.values.retain(|_, entry| entry.is_live(now));
            self.sweep_at = (self.values.len() * 2).max(MIN_SWEEP_AT);
        }
    }
}

/// Process-local TTL cache.
///
/// Reads ignore expired entries and writes periodically remove them. Suitable
/// for a single instance only: counters and blacklists are not shared across
/// processes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<RwLock<Entries>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    async fn stored_entries(&self) -> usize {
        self.entries.read().await.values.len()
    }

    fn increment_locked(
        entries: &mut Entries,
        key: &str,
        ttl: Duration,
        now: Instant,
    ) -> Result<i64, StoreError> {
        let current = match entries.values.get(key) {
            Some(entry) if entry.is_live(now) => entry
                .value
                .parse::<i64>()
                .map_err(|_| StoreError::Corrupt(format!("counter `{}` is not an integer", key)))?,
            _ => 0,
        };
        let next = current + 1;

        entries.insert(
            key,
            CachedValue {
                value: next.to_string(),
                expires_at: now + ttl,
            },
            now,
        );
        Ok(next)
    }
}

#[async_trait]
impl KeyValueCache for InMemoryCache {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        self.entries.write().await.insert(
            key,
            CachedValue {
                value: value.to_string(),
                expires_at: now + ttl,
            },
            now,
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.read().await;

        Ok(entries
            .values
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        let mut entries = self.entries.write().await;
        Self::increment_locked(&mut entries, key, ttl, Instant::now())
    }

    async fn increment_many_with_ttl(
        &self,
        entries: &[(String, Duration)],
    ) -> Result<Vec<i64>, StoreError> {
        let now = Instant::now();
        let mut guard = self.entries.write().await;

        entries
            .iter()
            .map(|(key, ttl)| Self::increment_locked(&mut guard, key, *ttl, now))
            .collect()
    }
}
