use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::FromRow;
use sqlx::PgPool;
use uuid::Uuid;

use super::database_error;
use crate::domain::errors::StoreError;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::UserRole;
use crate::domain::user::models::Username;
use crate::domain::user::ports::UserDirectory;
use crate::outbound::deadline::with_deadline;

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    role: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId(row.id),
            username: Username::new(row.username)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            role: row
                .role
                .parse::<UserRole>()
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            password_hash: row.password_hash,
            created_at: row.created_at,
        })
    }
}

pub struct PostgresUserDirectory {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, StoreError> {
        let row = with_deadline(self.timeout, async {
            sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, username, role, password_hash, created_at
                FROM users
                WHERE username = $1
                "#,
            )
            .bind(username.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)
        })
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let row = with_deadline(self.timeout, async {
            sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, username, role, password_hash, created_at
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)
        })
        .await?;

        row.map(User::try_from).transpose()
    }
}
