use async_trait::async_trait;

use crate::domain::errors::StoreError;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;

/// Read-only lookup of accounts owned by the profile subsystem.
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// Retrieve user by username.
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    ///
    /// # Errors
    /// * `Unavailable` - Database operation failed
    /// * `Corrupt` - Stored row does not form a valid user
    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, StoreError>;

    /// Retrieve user by identifier.
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    ///
    /// # Errors
    /// * `Unavailable` - Database operation failed
    /// * `Corrupt` - Stored row does not form a valid user
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError>;
}
