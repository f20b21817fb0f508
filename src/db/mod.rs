mod account;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use account::{Account, AccountProfile, AccountStore};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        // An in-memory database exists per connection, so the pool must stay
        // at a single connection for every query to see the same data.
        let (url, max_connections) = if path == ":memory:" {
            ("sqlite::memory:".to_string(), 1)
        } else {
            (format!("sqlite:{}?mode=rwc", path), 5)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&url)
            .await?;

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
                // Accounts table. refresh_token is the single active refresh
                // slot: NULL when no session is open.
                "CREATE TABLE accounts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    username TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    full_name TEXT NOT NULL DEFAULT '',
                    password_hash TEXT NOT NULL,
                    refresh_token TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_accounts_uuid ON accounts(uuid)",
                "CREATE INDEX idx_accounts_username ON accounts(username)",
                "CREATE INDEX idx_accounts_email ON accounts(email)",
            ],
        )
        .await
    }

    /// Get the account store.
    pub fn accounts(&self) -> AccountStore {
        AccountStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_account(db: &Database, username: &str, email: &str) -> i64 {
        db.accounts()
            .create(
                &uuid::Uuid::new_v4().to_string(),
                username,
                email,
                "Test User",
                "$argon2id$fake-hash",
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_account() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .accounts()
            .create("uuid-123", "alice", "alice@example.com", "Alice", "hash")
            .await
            .unwrap();

        let account = db.accounts().get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(account.id, id);
        assert_eq!(account.uuid, "uuid-123");
        assert_eq!(account.email, "alice@example.com");
        assert_eq!(account.full_name, "Alice");
        assert!(account.refresh_token.is_none());

        let account = db.accounts().get_by_uuid("uuid-123").await.unwrap().unwrap();
        assert_eq!(account.id, id);

        let account = db
            .accounts()
            .get_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.id, id);
    }

    #[tokio::test]
    async fn test_duplicate_username_fails() {
        let db = Database::open(":memory:").await.unwrap();

        create_account(&db, "alice", "alice@example.com").await;
        let result = db
            .accounts()
            .create("uuid-2", "alice", "other@example.com", "Other", "hash")
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let db = Database::open(":memory:").await.unwrap();

        create_account(&db, "alice", "alice@example.com").await;
        let result = db
            .accounts()
            .create("uuid-2", "bob", "alice@example.com", "Bob", "hash")
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_find_by_identifier_matches_username_or_email() {
        let db = Database::open(":memory:").await.unwrap();
        let id = create_account(&db, "alice", "alice@example.com").await;

        let by_username = db.accounts().find_by_identifier("alice").await.unwrap();
        assert_eq!(by_username.unwrap().id, id);

        let by_email = db
            .accounts()
            .find_by_identifier("alice@example.com")
            .await
            .unwrap();
        assert_eq!(by_email.unwrap().id, id);

        let missing = db.accounts().find_by_identifier("nobody").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_refresh_token_slot() {
        let db = Database::open(":memory:").await.unwrap();
        let id = create_account(&db, "alice", "alice@example.com").await;

        // Blind overwrite
        db.accounts().store_refresh_token(id, "token-1").await.unwrap();
        let account = db.accounts().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(account.refresh_token.as_deref(), Some("token-1"));

        db.accounts().store_refresh_token(id, "token-2").await.unwrap();
        let account = db.accounts().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(account.refresh_token.as_deref(), Some("token-2"));

        // Compare-and-set only succeeds against the current value
        let swapped = db
            .accounts()
            .swap_refresh_token(id, "token-1", "token-3")
            .await
            .unwrap();
        assert!(!swapped);

        let swapped = db
            .accounts()
            .swap_refresh_token(id, "token-2", "token-3")
            .await
            .unwrap();
        assert!(swapped);
        let account = db.accounts().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(account.refresh_token.as_deref(), Some("token-3"));

        // Clear is unconditional and idempotent
        db.accounts().clear_refresh_token(id).await.unwrap();
        db.accounts().clear_refresh_token(id).await.unwrap();
        let account = db.accounts().get_by_id(id).await.unwrap().unwrap();
        assert!(account.refresh_token.is_none());

        // CAS against a cleared slot fails
        let swapped = db
            .accounts()
            .swap_refresh_token(id, "token-3", "token-4")
            .await
            .unwrap();
        assert!(!swapped);
    }

    #[tokio::test]
    async fn test_set_password_hash() {
        let db = Database::open(":memory:").await.unwrap();
        let id = create_account(&db, "alice", "alice@example.com").await;

        let updated = db.accounts().set_password_hash(id, "new-hash").await.unwrap();
        assert!(updated);

        let account = db.accounts().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(account.password_hash, "new-hash");

        let updated = db.accounts().set_password_hash(9999, "x").await.unwrap();
        assert!(!updated);
    }
}
