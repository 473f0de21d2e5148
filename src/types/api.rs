use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Paste;

#[derive(Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Deserialize)]
pub struct CreatePaste {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Serialize)]
pub struct CreatedPaste {
    pub random_id: String,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// A paste as shown to clients; the row id and owner stay private.
#[derive(Serialize)]
pub struct PasteView {
    pub random_id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<Paste> for PasteView {
    fn from(paste: Paste) -> Self {
        PasteView {
            random_id: paste.random_id,
            title: paste.title,
            content: paste.content,
            created_at: paste.created_at,
        }
    }
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Serialize)]
pub struct PastePage {
    pub pastes: Vec<PasteView>,
    pub current_page: i64,
    pub total_pages: i64,
    pub page_size: i64,
    pub total_count: i64,
}

#[derive(Deserialize)]
pub struct TitleProbe {
    #[serde(default)]
    pub content: String,
}

#[derive(Serialize)]
pub struct TitleSuggestion {
    pub title: String,
}

#[derive(Serialize)]
pub struct ModelList {
    pub count: usize,
    pub models: Vec<Value>,
}

#[derive(Serialize)]
pub struct OAuth2Status {
    pub oauth2_enabled: bool,
    pub oauth2_name: String,
}

#[derive(Serialize)]
pub struct AuthorizeUrl {
    pub auth_url: String,
}

#[derive(Deserialize)]
pub struct OAuth2Callback {
    pub code: Option<String>,
    pub state: Option<String>,
}
