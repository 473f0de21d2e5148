use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub base_url: String,
    pub port: u16,
    pub database: Database,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub auth: Auth,
    #[serde(default)]
    pub http: Http,
}

impl Config {
    /// Read and parse a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&source).context("failed to parse config")
    }

    /// The public short link for a paste.
    pub fn paste_url(&self, random_id: &str) -> String {
        format!("{}/{random_id}", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_upload_size: usize,
    pub default_page_size: i64,
    pub max_page_size: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_upload_size: 1024 * 1024,
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Auth {
    pub session_ttl_secs: i64,
    pub admin: Option<Admin>,
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            session_ttl_secs: 60 * 60 * 24,
            admin: None,
        }
    }
}

/// Account created at startup if it does not exist yet.
#[derive(Debug, Clone, Deserialize)]
pub struct Admin {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Http {
    /// Timeout applied to every outbound request.
    pub timeout_secs: u64,
}

impl Default for Http {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

fn default_max_connections() -> u32 {
    5
}
