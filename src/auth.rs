//! Session authentication.
//!
//! Sessions are random tokens stored in the database with an expiry and
//! carried in an HttpOnly cookie. Handlers that act on behalf of a user take a
//! [`Caller`], which is only produced for a valid, unexpired session.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::headers::{Cookie, HeaderMapExt};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::db::Database;
use crate::error::{ApiError, ApiResult};
use crate::models::Account;

pub const SESSION_COOKIE: &str = "token";

/// The authenticated user a request acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: i64,
    pub username: String,
}

impl From<Account> for Caller {
    fn from(account: Account) -> Self {
        Caller {
            id: account.id,
            username: account.username,
        }
    }
}

/// A [`Caller`] that is the configured admin account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admin(pub Caller);

/// Whether a caller is the `[auth.admin]` account. Without one, nobody is.
pub fn is_admin(config: &Config, caller: &Caller) -> bool {
    config
        .auth
        .admin
        .as_ref()
        .map_or(false, |admin| admin.username == caller.username)
}

/// Resolve a session token to the account it belongs to.
pub async fn authenticate(db: &Database, token: &str) -> ApiResult<Caller> {
    db.get_session_account(token, Utc::now())
        .await?
        .map(Caller::from)
        .ok_or(ApiError::Unauthenticated)
}

/// Check a username and password, opening a session on success.
pub async fn login(
    db: &Database,
    username: &str,
    password: &str,
    ttl_secs: i64,
) -> ApiResult<String> {
    let account = match db.get_account(username).await {
        Ok(account) => account,
        Err(ApiError::NotFound) => return Err(ApiError::InvalidCredentials),
        Err(e) => return Err(e),
    };

    let Some(hash) = account.password_hash.as_deref() else {
        return Err(ApiError::InvalidCredentials);
    };
    if !verify_password(password, hash)? {
        return Err(ApiError::InvalidCredentials);
    }

    info!("login: user='{username}'");
    open_session(db, account.id, ttl_secs).await
}

/// Create a session for an account and return its token.
pub async fn open_session(db: &Database, account_id: i64, ttl_secs: i64) -> ApiResult<String> {
    let token = Uuid::new_v4().simple().to_string();
    let expires_at = Utc::now() + Duration::seconds(ttl_secs);
    db.insert_session(&token, account_id, expires_at).await?;
    Ok(token)
}

/// End a session. Unknown tokens are ignored.
pub async fn logout(db: &Database, token: &str) -> ApiResult<()> {
    db.delete_session(token).await
}

/// Read a named cookie from request headers.
pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .typed_get::<Cookie>()
        .and_then(|cookie| cookie.get(name).map(str::to_owned))
}

/// `Set-Cookie` value storing `value` under `name`.
pub fn set_cookie(name: &str, value: &str, max_age_secs: i64) -> String {
    format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}")
}

/// `Set-Cookie` value removing the named cookie.
pub fn clear_cookie(name: &str) -> String {
    format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> ApiResult<bool> {
    let parsed_hash = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    Database: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = cookie(&parts.headers, SESSION_COOKIE).ok_or(ApiError::Unauthenticated)?;
        let db = Database::from_ref(state);
        authenticate(&db, &token).await
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Admin
where
    Database: FromRef<S>,
    Config: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let caller = Caller::from_request_parts(parts, state).await?;
        if is_admin(&Config::from_ref(state), &caller) {
            Ok(Admin(caller))
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::header;

    use super::*;
    use crate::test_util::{test_config, test_database};

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct-horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct-horse", &hash).unwrap());
        assert!(!verify_password("battery-staple", &hash).unwrap());
    }

    #[test]
    fn reads_session_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "theme=dark; token=abc123".parse().unwrap());
        assert_eq!(cookie(&headers, SESSION_COOKIE).as_deref(), Some("abc123"));
        assert_eq!(cookie(&HeaderMap::new(), SESSION_COOKIE), None);
    }

    #[tokio::test]
    async fn login_opens_a_session() {
        let db = test_database().await;
        let hash = hash_password("s3cret").unwrap();
        let account = db.upsert_account("alice", Some(&hash)).await.unwrap();

        let token = login(&db, "alice", "s3cret", 60).await.unwrap();
        let caller = authenticate(&db, &token).await.unwrap();
        assert_eq!(caller.id, account.id);
        assert_eq!(caller.username, "alice");

        logout(&db, &token).await.unwrap();
        assert!(matches!(
            authenticate(&db, &token).await,
            Err(ApiError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn bad_credentials_are_indistinguishable() {
        let db = test_database().await;
        let hash = hash_password("s3cret").unwrap();
        db.upsert_account("alice", Some(&hash)).await.unwrap();
        db.get_or_create_account("github:bob").await.unwrap();

        for (username, password) in [("alice", "wrong"), ("nobody", "s3cret"), ("github:bob", "")] {
            assert!(matches!(
                login(&db, username, password, 60).await,
                Err(ApiError::InvalidCredentials)
            ));
        }
    }

    #[test]
    fn only_the_configured_admin_is_admin() {
        let mut config = test_config();
        let caller = |username: &str| Caller {
            id: 1,
            username: username.to_owned(),
        };

        assert!(is_admin(&config, &caller("admin")));
        assert!(!is_admin(&config, &caller("alice")));
        assert!(!is_admin(&config, &caller("github:admin")));

        config.auth.admin = None;
        assert!(!is_admin(&config, &caller("admin")));
    }

    #[tokio::test]
    async fn expired_session_is_rejected() {
        let db = test_database().await;
        let account = db.upsert_account("alice", None).await.unwrap();
        let token = open_session(&db, account.id, -1).await.unwrap();
        assert!(matches!(
            authenticate(&db, &token).await,
            Err(ApiError::Unauthenticated)
        ));
    }
}
