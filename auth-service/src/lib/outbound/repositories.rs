pub mod refresh_token;
pub mod user;

pub use refresh_token::PostgresRefreshTokenRepository;
pub use user::PostgresUserDirectory;

use crate::domain::errors::StoreError;

pub(crate) fn database_error(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}
