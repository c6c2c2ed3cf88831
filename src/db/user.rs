use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;

use super::store::{CredentialStore, SessionState, StoreError, UserIdentity, UserRecord};

/// SQLite-backed credential store.
#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    full_name: String,
    password_digest: String,
    refresh_token: Option<String>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            identity: UserIdentity {
                id: row.id,
                email: row.email,
                full_name: row.full_name,
                password_digest: row.password_digest,
            },
            session: SessionState {
                current_refresh_token: row.refresh_token,
            },
        }
    }
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Count registered users.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl CredentialStore for UserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, full_name, password_digest, refresh_token \
             FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserRecord::from))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, full_name, password_digest, refresh_token FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserRecord::from))
    }

    async fn create(&self, identity: &UserIdentity) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, email, full_name, password_digest, refresh_token) \
             VALUES (?, ?, ?, ?, NULL)",
        )
        .bind(&identity.id)
        .bind(&identity.email)
        .bind(&identity.full_name)
        .bind(&identity.password_digest)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateEmail
            } else {
                StoreError::from(e)
            }
        })?;
        Ok(())
    }

    async fn set_refresh_token(&self, id: &str, token: Option<&str>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET refresh_token = ? WHERE id = ?")
            .bind(token)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        id: &str,
        expected: &str,
        new: Option<&str>,
    ) -> Result<bool, StoreError> {
        // Single statement, so the compare and the write cannot interleave
        // with another rotation of the same row.
        let result =
            sqlx::query("UPDATE users SET refresh_token = ? WHERE id = ? AND refresh_token = ?")
                .bind(new)
                .bind(id)
                .bind(expected)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound),
        }
    }
}
