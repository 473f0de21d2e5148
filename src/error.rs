use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// SQLite and Postgres codes for a unique constraint violation.
const UNIQUE_VIOLATION_CODES: [&str; 3] = ["2067", "1555", "23505"];

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ApiError {
    #[error("not authenticated")]
    Unauthenticated,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("permission denied")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("identifier already taken")]
    Conflict,
    #[error("could not allocate a paste identifier")]
    StoreExhausted,
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("{0} is disabled")]
    FeatureDisabled(&'static str),
    #[error("database error")]
    Database { source: sqlx::Error },
    #[error("password hashing error: {0}")]
    PasswordHash(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::StoreExhausted => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::FeatureDisabled(_) => StatusCode::BAD_REQUEST,
            ApiError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status_code.is_server_error() {
            match &self {
                ApiError::Database { source } => error!("{self}: {source}"),
                _ => error!("{self}"),
            }
        }

        (status_code, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(source: sqlx::Error) -> Self {
        match source {
            sqlx::Error::RowNotFound => ApiError::NotFound,
            sqlx::Error::Database(ref db_error)
                if db_error
                    .code()
                    .map_or(false, |code| UNIQUE_VIOLATION_CODES.contains(&&*code)) =>
            {
                ApiError::Conflict
            }
            _ => ApiError::Database { source },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.to_string())
    }
}

impl From<argon2::password_hash::Error> for ApiError {
    fn from(source: argon2::password_hash::Error) -> Self {
        ApiError::PasswordHash(source.to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(source: reqwest::Error) -> Self {
        ApiError::UpstreamUnavailable(source.to_string())
    }
}
