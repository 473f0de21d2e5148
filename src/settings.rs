//! Runtime settings for the optional integrations.
//!
//! These are edited through the API and persisted in the `setting` table as
//! one JSON record per category, so they are passed around explicitly instead
//! of living in the config file.

use oauth2::url::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

pub trait Category: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    /// Key of the record in the `setting` table.
    const KEY: &'static str;

    /// Check the record before it is saved.
    fn validate(&self) -> ApiResult<()>;

    /// Copy of the record with its secrets masked.
    fn redacted(&self) -> Self;

    /// Put back stored secrets that an update sent masked.
    fn restore_secrets(&mut self, stored: &Self);
}

/// Shown in place of a stored secret.
pub const SECRET_MASK: &str = "***";

/// Title Assist settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Prompt template; `{content}` is replaced with the paste content.
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.openai.com/v1".to_owned(),
            api_key: String::new(),
            model: "gpt-3.5-turbo".to_owned(),
            prompt: "Based on the following code/text content, generate a concise and \
                     descriptive title (less than 50 characters):\n\n{content}"
                .to_owned(),
            max_tokens: 50,
            temperature: 0.7,
        }
    }
}

impl Category for AiConfig {
    const KEY: &'static str = "ai";

    fn validate(&self) -> ApiResult<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return bad_request("temperature must be between 0 and 2");
        }
        if !self.enabled {
            return Ok(());
        }
        check_url("base_url", &self.base_url)?;
        if !self.prompt.contains("{content}") {
            return bad_request("prompt must contain a {content} placeholder");
        }
        if self.max_tokens == 0 {
            return bad_request("max_tokens must be positive");
        }
        Ok(())
    }

    fn redacted(&self) -> Self {
        Self {
            api_key: mask(&self.api_key),
            ..self.clone()
        }
    }

    fn restore_secrets(&mut self, stored: &Self) {
        restore(&mut self.api_key, &stored.api_key);
    }
}

/// OAuth2 login provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuth2Config {
    pub enabled: bool,
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub user_info_url: String,
    pub redirect_url: String,
    /// Space or comma separated.
    pub scopes: String,
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            enabled: false,
            name: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            auth_url: String::new(),
            token_url: String::new(),
            user_info_url: String::new(),
            redirect_url: "http://localhost:8080/api/oauth2/callback".to_owned(),
            scopes: "read:user".to_owned(),
        }
    }
}

impl OAuth2Config {
    /// Provider name shown on the login page.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "OAuth2"
        } else {
            self.name.trim()
        }
    }

    pub fn scope_list(&self) -> Vec<String> {
        self.scopes
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

impl Category for OAuth2Config {
    const KEY: &'static str = "oauth2";

    fn validate(&self) -> ApiResult<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.client_id.trim().is_empty() {
            return bad_request("client_id is required");
        }
        check_url("auth_url", &self.auth_url)?;
        check_url("token_url", &self.token_url)?;
        check_url("user_info_url", &self.user_info_url)?;
        check_url("redirect_url", &self.redirect_url)
    }

    fn redacted(&self) -> Self {
        Self {
            client_secret: mask(&self.client_secret),
            ..self.clone()
        }
    }

    fn restore_secrets(&mut self, stored: &Self) {
        restore(&mut self.client_secret, &stored.client_secret);
    }
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        SECRET_MASK.to_owned()
    }
}

fn restore(secret: &mut String, stored: &str) {
    if *secret == SECRET_MASK {
        *secret = stored.to_owned();
    }
}

fn check_url(field: &str, value: &str) -> ApiResult<()> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| ApiError::BadRequest(format!("{field} is not a valid URL: {e}")))
}

fn bad_request(message: &str) -> ApiResult<()> {
    Err(ApiError::BadRequest(message.to_owned()))
}
