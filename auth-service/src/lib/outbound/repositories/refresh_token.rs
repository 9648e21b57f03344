use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::FromRow;
use sqlx::PgPool;
use uuid::Uuid;

use super::database_error;
use crate::domain::errors::StoreError;
use crate::domain::session::models::RefreshTokenId;
use crate::domain::session::models::RefreshTokenRecord;
use crate::domain::session::ports::RefreshTokenRepository;
use crate::domain::user::models::UserId;
use crate::outbound::deadline::with_deadline;

#[derive(Debug, FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    user_id: Uuid,
    selector: String,
    validator_hash: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl From<RefreshTokenRow> for RefreshTokenRecord {
    fn from(row: RefreshTokenRow) -> Self {
        RefreshTokenRecord {
            id: RefreshTokenId(row.id),
            user_id: UserId(row.user_id),
            selector: row.selector,
            validator_hash: row.validator_hash,
            created_at: row.created_at,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
        }
    }
}

/// Refresh token store on PostgreSQL.
///
/// Every statement runs under the configured deadline.
pub struct PostgresRefreshTokenRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresRefreshTokenRepository {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl RefreshTokenRepository for PostgresRefreshTokenRepository {
    async fn create(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        with_deadline(self.timeout, async {
            sqlx::query(
                r#"
                INSERT INTO refresh_tokens (id, user_id, selector, validator_hash, created_at, expires_at, revoked_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(record.id.0)
            .bind(record.user_id.0)
            .bind(record.selector.as_str())
            .bind(record.validator_hash.as_str())
            .bind(record.created_at)
            .bind(record.expires_at)
            .bind(record.revoked_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let Some(db_err) = e.as_database_error() {
                    if db_err.is_unique_violation() {
                        return StoreError::Unavailable(
                            "refresh token selector already exists".to_string(),
                        );
                    }
                }
                database_error(e)
            })
        })
        .await?;

        Ok(())
    }

    async fn find_by_selector(
        &self,
        selector: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let row = with_deadline(self.timeout, async {
            sqlx::query_as::<_, RefreshTokenRow>(
                r#"
                SELECT id, user_id, selector, validator_hash, created_at, expires_at, revoked_at
                FROM refresh_tokens
                WHERE selector = $1
                "#,
            )
            .bind(selector)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)
        })
        .await?;

        Ok(row.map(RefreshTokenRecord::from))
    }

    async fn find_active_by_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let rows = with_deadline(self.timeout, async {
            sqlx::query_as::<_, RefreshTokenRow>(
                r#"
                SELECT id, user_id, selector, validator_hash, created_at, expires_at, revoked_at
                FROM refresh_tokens
                WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > $2
                ORDER BY created_at ASC
                "#,
            )
            .bind(user_id.0)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(database_error)
        })
        .await?;

        Ok(rows.into_iter().map(RefreshTokenRecord::from).collect())
    }

    async fn revoke(
        &self,
        id: &RefreshTokenId,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = with_deadline(self.timeout, async {
            sqlx::query(
                r#"
                UPDATE refresh_tokens
                SET revoked_at = $2
                WHERE id = $1 AND revoked_at IS NULL
                "#,
            )
            .bind(id.0)
            .bind(revoked_at)
            .execute(&self.pool)
            .await
            .map_err(database_error)
        })
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_all_for_user(
        &self,
        user_id: &UserId,
        revoked_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = with_deadline(self.timeout, async {
            sqlx::query(
                r#"
                UPDATE refresh_tokens
                SET revoked_at = $2
                WHERE user_id = $1 AND revoked_at IS NULL
                "#,
            )
            .bind(user_id.0)
            .bind(revoked_at)
            .execute(&self.pool)
            .await
            .map_err(database_error)
        })
        .await?;

        Ok(result.rows_affected())
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = with_deadline(self.timeout, async {
            sqlx::query(
                r#"
                DELETE FROM refresh_tokens
                WHERE expires_at < $1 OR revoked_at < $1
                "#,
            )
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(database_error)
        })
        .await?;

        Ok(result.rows_affected())
    }
}
