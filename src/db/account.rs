//! Account storage, including the single refresh-token slot per account.
//!
//! The `refresh_token` column is the server-side source of truth for refresh
//! token validity: a refresh token is only honored while it exactly matches
//! the stored value. Access tokens are stateless and never stored.

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct AccountStore {
    pool: SqlitePool,
}

/// A full account row. Internal to the server; responses use
/// [`AccountProfile`] instead.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub refresh_token: Option<String>,
    pub created_at: String,
}

impl Account {
    /// Response projection: everything except the password hash and the
    /// refresh-token slot.
    pub fn profile(&self) -> AccountProfile {
        AccountProfile {
            uuid: self.uuid.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            created_at: self.created_at.clone(),
        }
    }
}

/// Public account projection returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: i64,
    uuid: String,
    username: String,
    email: String,
    full_name: String,
    password_hash: String,
    refresh_token: Option<String>,
    created_at: String,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            password_hash: row.password_hash,
            refresh_token: row.refresh_token,
            created_at: row.created_at,
        }
    }
}

impl AccountStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new account. Returns the account ID.
    pub async fn create(
        &self,
        uuid: &str,
        username: &str,
        email: &str,
        full_name: &str,
        password_hash: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO accounts (uuid, username, email, full_name, password_hash) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid)
        .bind(username)
        .bind(email)
        .bind(full_name)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get an account by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Account>, sqlx::Error> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT id, uuid, username, email, full_name, password_hash, refresh_token, created_at FROM accounts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    /// Get an account by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Account>, sqlx::Error> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT id, uuid, username, email, full_name, password_hash, refresh_token, created_at FROM accounts WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    /// Get an account by username.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<Account>, sqlx::Error> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT id, uuid, username, email, full_name, password_hash, refresh_token, created_at FROM accounts WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    /// Get an account by email.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<Account>, sqlx::Error> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT id, uuid, username, email, full_name, password_hash, refresh_token, created_at FROM accounts WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    /// Find an account whose username or email matches the identifier.
    /// Username and email are each unique, so at most one row matches.
    pub async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<Account>, sqlx::Error> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT id, uuid, username, email, full_name, password_hash, refresh_token, created_at FROM accounts WHERE username = ? OR email = ?",
        )
        .bind(identifier)
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    /// Replace the stored password hash.
    pub async fn set_password_hash(&self, id: i64, hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE accounts SET password_hash = ? WHERE id = ?")
            .bind(hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Write the refresh-token slot unconditionally, replacing any prior
    /// value. Used on login.
    pub async fn store_refresh_token(&self, id: i64, token: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE accounts SET refresh_token = ? WHERE id = ?")
            .bind(token)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Compare-and-set the refresh-token slot: write `new` only if the slot
    /// still holds `old`. Returns false when the slot held something else,
    /// which means another call rotated (or cleared) it first.
    pub async fn swap_refresh_token(
        &self,
        id: i64,
        old: &str,
        new: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE accounts SET refresh_token = ? WHERE id = ? AND refresh_token = ?")
                .bind(new)
                .bind(id)
                .bind(old)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear the refresh-token slot. Idempotent.
    pub async fn clear_refresh_token(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE accounts SET refresh_token = NULL WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
