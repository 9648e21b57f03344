use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use chrono::TimeZone;
use chrono::Utc;

use crate::domain::cache::KeyValueCache;
use crate::domain::errors::StoreError;
use crate::domain::revocation::models::token_key;
use crate::domain::revocation::models::user_key;
use crate::domain::revocation::models::RevocationEntry;
use crate::domain::user::models::UserId;

/// Distributed blacklist of access tokens and users, backed by the TTL cache.
///
/// Entries expire together with the tokens they police, so nothing here
/// needs a cleanup job.
pub struct RevocationRegistry {
    cache: Arc<dyn KeyValueCache>,
}

impl RevocationRegistry {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self { cache }
    }

    /// Blacklist one access token until its natural expiry.
    ///
    /// No-op if the token has already expired.
    ///
    /// # Errors
    /// * `StoreError` - Cache write failed
    pub async fn revoke_token(
        &self,
        token_id: &str,
        user_id: &UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let Ok(ttl) = (expires_at - now).to_std() else {
            tracing::debug!(token_id = %token_id, "Token already expired, nothing to revoke");
            return Ok(());
        };
        if ttl.is_zero() {
            return Ok(());
        }

        let entry = RevocationEntry {
            user_id: user_id.to_string(),
            revoked_at: now,
        };
        let value =
            serde_json::to_string(&entry).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        self.cache
            .set_with_ttl(&token_key(token_id), &value, ttl)
            .await?;

        tracing::info!(
            token_id = %token_id,
            user_id = %user_id,
            ttl_secs = ttl.as_secs(),
            "Access token revoked"
        );
        Ok(())
    }

    /// Check whether an access token has been blacklisted.
    ///
    /// # Errors
    /// * `StoreError` - Cache read failed
    pub async fn is_token_revoked(&self, token_id: &str) -> Result<bool, StoreError> {
        self.cache.exists(&token_key(token_id)).await
    }

    /// Write or refresh the user-wide marker.
    ///
    /// Access tokens of this user issued at or before now are rejected for `ttl`.
    ///
    /// # Errors
    /// * `StoreError` - Cache write failed
    pub async fn revoke_user(&self, user_id: &UserId, ttl: Duration) -> Result<(), StoreError> {
        let revoked_before = Utc::now().timestamp();

        self.cache
            .set_with_ttl(&user_key(&user_id.to_string()), &revoked_before.to_string(), ttl)
            .await?;

        tracing::info!(
            user_id = %user_id,
            revoked_before = revoked_before,
            ttl_secs = ttl.as_secs(),
            "User-wide revocation marker written"
        );
        Ok(())
    }

    /// Check whether a live user-wide marker exists.
    ///
    /// # Errors
    /// * `StoreError` - Cache read failed
    pub async fn is_user_revoked(&self, user_id: &UserId) -> Result<bool, StoreError> {
        self.cache.exists(&user_key(&user_id.to_string())).await
    }

    /// Instant before which all of the user's access tokens are revoked, if a marker is live.
    ///
    /// # Errors
    /// * `Corrupt` - Marker value is not a Unix timestamp
    /// * `StoreError` - Cache read failed
    pub async fn user_revoked_before(
        &self,
        user_id: &UserId,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let Some(raw) = self.cache.get(&user_key(&user_id.to_string())).await? else {
            return Ok(None);
        };

        let seconds: i64 = raw
            .parse()
            .map_err(|_| StoreError::Corrupt(format!("revocation marker `{}`", raw)))?;

        Utc.timestamp_opt(seconds, 0)
            .single()
            .map(Some)
            .ok_or_else(|| StoreError::Corrupt(format!("revocation marker `{}`", raw)))
    }
}
