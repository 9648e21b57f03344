use std::time::Duration;

use async_trait::async_trait;

use crate::domain::errors::StoreError;

/// Port for the shared TTL-capable key/value tier.
///
/// Revocation entries and rate counters live here. Every entry carries a TTL,
/// so the tier never needs an explicit cleanup job.
#[async_trait]
pub trait KeyValueCache: Send + Sync + 'static {
    /// Store `value` under `key`, replacing any previous value and TTL.
    ///
    /// # Errors
    /// * `Unavailable` - Cache tier unreachable
    /// * `Timeout` - Call exceeded its deadline
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Fetch the value stored under `key`, if it has not expired.
    ///
    /// # Errors
    /// * `Unavailable` - Cache tier unreachable
    /// * `Timeout` - Call exceeded its deadline
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Check whether a live entry exists under `key`.
    ///
    /// # Errors
    /// * `Unavailable` - Cache tier unreachable
    /// * `Timeout` - Call exceeded its deadline
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Atomically increment the counter under `key` and refresh its TTL.
    ///
    /// # Returns
    /// Post-increment value (1 for a fresh key)
    ///
    /// # Errors
    /// * `Unavailable` - Cache tier unreachable
    /// * `Timeout` - Call exceeded its deadline
    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64, StoreError>;

    /// Increment several counters in one round trip, refreshing each TTL.
    ///
    /// # Returns
    /// Post-increment values in the same order as `entries`
    ///
    /// # Errors
    /// * `Unavailable` - Cache tier unreachable
    /// * `Timeout` - Call exceeded its deadline
    async fn increment_many_with_ttl(
        &self,
        entries: &[(String, Duration)],
    ) -> Result<Vec<i64>, StoreError>;
}
