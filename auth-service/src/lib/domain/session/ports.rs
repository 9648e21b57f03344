use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::domain::errors::StoreError;
use crate::domain::session::models::RefreshTokenId;
use crate::domain::session::models::RefreshTokenRecord;
use crate::domain::user::models::UserId;

/// Persistence operations for refresh token records.
///
/// Revocation is the only mutation and is monotonic, so concurrent writers
/// from several instances never need to coordinate beyond the conditional
/// update in [`revoke`](RefreshTokenRepository::revoke).
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync + 'static {
    /// Persist a new record.
    ///
    /// # Errors
    /// * `Unavailable` - Database operation failed (including selector collision)
    /// * `Timeout` - Call exceeded its deadline
    async fn create(&self, record: RefreshTokenRecord) -> Result<(), StoreError>;

    /// Retrieve a record by its public selector, whatever its state.
    ///
    /// # Returns
    /// Optional record (None if no record carries this selector)
    ///
    /// # Errors
    /// * `Unavailable` - Database operation failed
    /// * `Timeout` - Call exceeded its deadline
    async fn find_by_selector(&self, selector: &str)
        -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Retrieve the active records of a user, oldest first.
    ///
    /// # Arguments
    /// * `user_id` - Session owner
    /// * `now` - Reference instant for the expiry check
    ///
    /// # Returns
    /// Records with `revoked_at` unset and `expires_at > now`, ordered by `created_at` ascending
    ///
    /// # Errors
    /// * `Unavailable` - Database operation failed
    /// * `Timeout` - Call exceeded its deadline
    async fn find_active_by_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshTokenRecord>, StoreError>;

    /// Mark one record revoked if it is not already.
    ///
    /// # Returns
    /// `true` if this call set `revoked_at`, `false` if it was already set or the record is gone
    ///
    /// # Errors
    /// * `Unavailable` - Database operation failed
    /// * `Timeout` - Call exceeded its deadline
    async fn revoke(&self, id: &RefreshTokenId, revoked_at: DateTime<Utc>)
        -> Result<bool, StoreError>;

    /// Mark every unrevoked record of a user revoked.
    ///
    /// # Returns
    /// Number of records this call revoked
    ///
    /// # Errors
    /// * `Unavailable` - Database operation failed
    /// * `Timeout` - Call exceeded its deadline
    async fn revoke_all_for_user(
        &self,
        user_id: &UserId,
        revoked_at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Delete records that expired or were revoked before `cutoff`.
    ///
    /// # Returns
    /// Number of deleted records
    ///
    /// # Errors
    /// * `Unavailable` - Database operation failed
    /// * `Timeout` - Call exceeded its deadline
    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}
