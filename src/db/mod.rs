mod memory;
mod store;
mod user;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use memory::MemoryStore;
pub use store::{CredentialStore, SessionState, StoreError, UserIdentity, UserProfile, UserRecord};
pub use user::UserStore;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let pool = if path == ":memory:" {
            // Every SQLite connection to :memory: is its own database, so keep
            // exactly one connection alive for the lifetime of the pool.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect(&format!("sqlite:{}?mode=rwc", path))
                .await?
        };

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                // One row per account; refresh_token is the single session slot
                "CREATE TABLE users (
                    id TEXT PRIMARY KEY NOT NULL,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    full_name TEXT NOT NULL,
                    password_digest TEXT NOT NULL,
                    refresh_token TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_users_email ON users(email)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str, email: &str) -> UserIdentity {
        UserIdentity {
            id: id.to_string(),
            email: email.to_string(),
            full_name: "Alice Example".to_string(),
            password_digest: "digest".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();
        let users = db.users();

        users.create(&identity("uuid-123", "alice@example.com")).await.unwrap();

        let user = users.find_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(user.identity.id, "uuid-123");
        assert_eq!(user.identity.full_name, "Alice Example");
        assert_eq!(user.identity.password_digest, "digest");
        assert_eq!(user.session.current_refresh_token, None);

        let user = users.find_by_id("uuid-123").await.unwrap().unwrap();
        assert_eq!(user.identity.email, "alice@example.com");

        assert_eq!(users.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_email_lookup_ignores_case() {
        let db = Database::open(":memory:").await.unwrap();
        let users = db.users();

        users.create(&identity("uuid-1", "alice@example.com")).await.unwrap();
        assert!(users.find_by_email("ALICE@EXAMPLE.COM").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let db = Database::open(":memory:").await.unwrap();
        let users = db.users();

        users.create(&identity("uuid-1", "alice@example.com")).await.unwrap();
        let result = users.create(&identity("uuid-2", "Alice@example.com")).await;

        assert!(matches!(result, Err(StoreError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_set_refresh_token() {
        let db = Database::open(":memory:").await.unwrap();
        let users = db.users();

        users.create(&identity("uuid-1", "alice@example.com")).await.unwrap();
        users.set_refresh_token("uuid-1", Some("token-1")).await.unwrap();

        let user = users.find_by_id("uuid-1").await.unwrap().unwrap();
        assert_eq!(user.session.current_refresh_token.as_deref(), Some("token-1"));

        users.set_refresh_token("uuid-1", None).await.unwrap();
        let user = users.find_by_id("uuid-1").await.unwrap().unwrap();
        assert_eq!(user.session.current_refresh_token, None);
    }

    #[tokio::test]
    async fn test_set_refresh_token_unknown_user() {
        let db = Database::open(":memory:").await.unwrap();

        let result = db.users().set_refresh_token("missing", Some("token")).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_swap_refresh_token() {
        let db = Database::open(":memory:").await.unwrap();
        let users = db.users();

        users.create(&identity("uuid-1", "alice@example.com")).await.unwrap();
        users.set_refresh_token("uuid-1", Some("token-1")).await.unwrap();

        assert!(!users.swap_refresh_token("uuid-1", "stale", Some("token-2")).await.unwrap());
        assert!(users.swap_refresh_token("uuid-1", "token-1", Some("token-2")).await.unwrap());
        assert!(!users.swap_refresh_token("uuid-1", "token-1", Some("token-3")).await.unwrap());

        let user = users.find_by_id("uuid-1").await.unwrap().unwrap();
        assert_eq!(user.session.current_refresh_token.as_deref(), Some("token-2"));

        let result = users.swap_refresh_token("missing", "token-1", None).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_swap_against_empty_slot_fails() {
        let db = Database::open(":memory:").await.unwrap();
        let users = db.users();

        users.create(&identity("uuid-1", "alice@example.com")).await.unwrap();
        assert!(!users.swap_refresh_token("uuid-1", "token-1", Some("token-2")).await.unwrap());
    }
}
