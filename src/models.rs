use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Paste {
    /// Row id, never leaves the server.
    pub id: i64,
    pub random_id: String,
    pub owner_id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: i64,
    pub username: String,
    /// Argon2 PHC string; accounts created through OAuth2 have none.
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}
