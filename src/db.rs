use chrono::{DateTime, Utc};
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

use crate::error::{ApiError, ApiResult};
use crate::models::{Account, Paste};
use crate::settings::Category;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS account (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT,
        created_at DATETIME NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS session (
        token TEXT PRIMARY KEY,
        account_id INTEGER NOT NULL REFERENCES account (id) ON DELETE CASCADE,
        expires_at DATETIME NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS paste (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        random_id TEXT NOT NULL UNIQUE,
        owner_id INTEGER NOT NULL REFERENCES account (id),
        title TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL,
        created_at DATETIME NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS paste_owner_created ON paste (owner_id, created_at DESC, id DESC)",
    "CREATE TABLE IF NOT EXISTS retired_id (
        random_id TEXT PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS setting (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at DATETIME NOT NULL
    )",
];

const PASTE_COLUMNS: &str = "id, random_id, owner_id, title, content, created_at";
const ACCOUNT_COLUMNS: &str = "id, username, password_hash, created_at";

#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
}

impl Database {
    /// Connect to a database by URL and make sure the schema exists.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        let database = Self { pool };
        database.init_schema().await?;
        Ok(database)
    }

    async fn init_schema(&self) -> anyhow::Result<()> {
        let mut conn = self.pool.acquire().await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut conn).await?;
        }
        Ok(())
    }

    /// Insert a paste under `random_id`.
    ///
    /// Fails with [`ApiError::Conflict`] if the identifier is taken or was
    /// ever used by a deleted paste.
    pub async fn insert_paste(
        &self,
        random_id: &str,
        owner_id: i64,
        title: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> ApiResult<Paste> {
        let mut conn = self.pool.acquire().await?;
        let paste = sqlx::query_as::<_, Paste>(&format!(
            "INSERT INTO paste (random_id, owner_id, title, content, created_at) \
             SELECT ?, ?, ?, ?, ? \
             WHERE NOT EXISTS (SELECT 1 FROM retired_id WHERE random_id = ?) \
             RETURNING {PASTE_COLUMNS}"
        ))
        .bind(random_id)
        .bind(owner_id)
        .bind(title)
        .bind(content)
        .bind(created_at)
        .bind(random_id)
        .fetch_optional(&mut conn)
        .await?;

        paste.ok_or(ApiError::Conflict)
    }

    /// Get a paste by its public identifier.
    pub async fn get_paste(&self, random_id: &str) -> ApiResult<Paste> {
        let mut conn = self.pool.acquire().await?;
        let paste = sqlx::query_as::<_, Paste>(&format!(
            "SELECT {PASTE_COLUMNS} FROM paste WHERE random_id = ?"
        ))
        .bind(random_id)
        .fetch_one(&mut conn)
        .await?;
        Ok(paste)
    }

    /// Delete an owner's paste and retire its identifier.
    pub async fn delete_paste(&self, random_id: &str, owner_id: i64) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM paste WHERE random_id = ? AND owner_id = ?")
            .bind(random_id)
            .bind(owner_id)
            .execute(&mut tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(ApiError::NotFound);
        }

        sqlx::query("INSERT INTO retired_id (random_id) VALUES (?)")
            .bind(random_id)
            .execute(&mut tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Count the pastes owned by an account.
    pub async fn count_pastes_by_owner(&self, owner_id: i64) -> ApiResult<i64> {
        let mut conn = self.pool.acquire().await?;
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM paste WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_one(&mut conn)
            .await?;
        Ok(count)
    }

    /// Get a slice of an account's pastes, newest first.
    pub async fn list_pastes_by_owner(
        &self,
        owner_id: i64,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<Paste>> {
        let mut conn = self.pool.acquire().await?;
        let pastes = sqlx::query_as::<_, Paste>(&format!(
            "SELECT {PASTE_COLUMNS} FROM paste WHERE owner_id = ? \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut conn)
        .await?;
        Ok(pastes)
    }

    /// Get an account by username.
    pub async fn get_account(&self, username: &str) -> ApiResult<Account> {
        let mut conn = self.pool.acquire().await?;
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE username = ?"
        ))
        .bind(username)
        .fetch_one(&mut conn)
        .await?;
        Ok(account)
    }

    /// Create an account, or replace the password of an existing one.
    pub async fn upsert_account(
        &self,
        username: &str,
        password_hash: Option<&str>,
    ) -> ApiResult<Account> {
        let mut conn = self.pool.acquire().await?;
        let account = sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO account (username, password_hash, created_at) VALUES (?, ?, ?) \
             ON CONFLICT (username) DO UPDATE SET password_hash = excluded.password_hash \
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(username)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(&mut conn)
        .await?;
        Ok(account)
    }

    /// Get an account by username, creating it without a password if missing.
    pub async fn get_or_create_account(&self, username: &str) -> ApiResult<Account> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query(
            "INSERT INTO account (username, password_hash, created_at) VALUES (?, NULL, ?) \
             ON CONFLICT (username) DO NOTHING",
        )
        .bind(username)
        .bind(Utc::now())
        .execute(&mut conn)
        .await?;
        drop(conn);

        self.get_account(username).await
    }

    /// Insert a session for an account.
    pub async fn insert_session(
        &self,
        token: &str,
        account_id: i64,
        expires_at: DateTime<Utc>,
    ) -> ApiResult<()> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("INSERT INTO session (token, account_id, expires_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(account_id)
            .bind(expires_at)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Get the account behind a session that is still valid at `now`.
    pub async fn get_session_account(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<Option<Account>> {
        let mut conn = self.pool.acquire().await?;
        let account = sqlx::query_as::<_, Account>(
            "SELECT account.id, account.username, account.password_hash, account.created_at \
             FROM session JOIN account ON account.id = session.account_id \
             WHERE session.token = ? AND session.expires_at > ?",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&mut conn)
        .await?;
        Ok(account)
    }

    /// Delete a session by token.
    pub async fn delete_session(&self, token: &str) -> ApiResult<()> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("DELETE FROM session WHERE token = ?")
            .bind(token)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Delete every session that expired before `now`, returning how many.
    pub async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> ApiResult<u64> {
        let mut conn = self.pool.acquire().await?;
        let deleted = sqlx::query("DELETE FROM session WHERE expires_at <= ?")
            .bind(now)
            .execute(&mut conn)
            .await?
            .rows_affected();
        Ok(deleted)
    }

    /// Load a settings record, falling back to its defaults if never saved.
    pub async fn load_settings<T: Category>(&self) -> ApiResult<T> {
        let mut conn = self.pool.acquire().await?;
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM setting WHERE key = ?")
            .bind(T::KEY)
            .fetch_optional(&mut conn)
            .await?;

        match value {
            Some(value) => serde_json::from_str(&value).map_err(|e| {
                ApiError::BadRequest(format!("stored {} settings are unreadable: {e}", T::KEY))
            }),
            None => Ok(T::default()),
        }
    }

    /// Save a settings record.
    pub async fn save_settings<T: Category>(&self, settings: &T) -> ApiResult<()> {
        let value = serde_json::to_string(settings)
            .map_err(|e| ApiError::BadRequest(format!("unserializable settings: {e}")))?;

        let mut conn = self.pool.acquire().await?;
        sqlx::query(
            "INSERT INTO setting (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(T::KEY)
        .bind(value)
        .bind(Utc::now())
        .execute(&mut conn)
        .await?;
        Ok(())
    }

    #[cfg(test)]
    pub async fn count_pastes(&self) -> ApiResult<i64> {
        let mut conn = self.pool.acquire().await?;
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM paste")
            .fetch_one(&mut conn)
            .await?;
        Ok(count)
    }
}
