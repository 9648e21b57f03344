use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::errors::StoreError;
use crate::domain::session::models::RefreshTokenId;
use crate::domain::session::models::RefreshTokenRecord;
use crate::domain::session::ports::RefreshTokenRepository;
use crate::domain::user::models::UserId;

/// Process-local refresh token store.
///
/// All mutations take the write lock, which gives `revoke` the same
/// compare-and-set semantics as the SQL conditional update.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRefreshTokenRepository {
    records: Arc<RwLock<HashMap<RefreshTokenId, RefreshTokenRecord>>>,
}

impl InMemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored, whatever their state.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenRepository {
    async fn create(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;

        if records.values().any(|r| r.selector == record.selector) {
            return Err(StoreError::Unavailable(
                "refresh token selector already exists".to_string(),
            ));
        }

        records.insert(record.id, record);
        Ok(())
    }

    async fn find_by_selector(
        &self,
        selector: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.selector == selector)
            .cloned())
    }

    async fn find_active_by_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let mut active: Vec<RefreshTokenRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.user_id == *user_id && r.is_active(now))
            .cloned()
            .collect();

        active.sort_by_key(|r| r.created_at);
        Ok(active)
    }

    async fn revoke(
        &self,
        id: &RefreshTokenId,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;

        match records.get_mut(id) {
            Some(record) if record.revoked_at.is_none() => {
                record.revoked_at = Some(revoked_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(
        &self,
        user_id: &UserId,
        revoked_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let mut revoked = 0;

        for record in records
            .values_mut()
            .filter(|r| r.user_id == *user_id && r.revoked_at.is_none())
        {
            record.revoked_at = Some(revoked_at);
            revoked += 1;
        }

        Ok(revoked)
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();

        records.retain(|_, r| {
            let expired = r.expires_at < cutoff;
            let revoked = r.revoked_at.is_some_and(|at| at < cutoff);
            !(expired || revoked)
        });

        Ok((before - records.len()) as u64)
    }
}
