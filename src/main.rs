use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use axum::extract::FromRef;
use clap::{Parser, Subcommand};
use directories_next::ProjectDirs;

mod auth;
mod commands;
mod config;
mod controllers;
mod db;
mod error;
mod ids;
mod models;
mod oauth;
mod pagination;
mod settings;
mod title;
pub(crate) mod types;

#[cfg(test)]
mod test_util;

use config::Config;
use db::Database;
use oauth::OAuthBridge;
use title::TitleAssist;

/// Shared state handed to every request.
#[derive(Clone, FromRef)]
pub struct App {
    pub config: Config,
    pub database: Database,
    pub title_assist: TitleAssist,
    pub oauth: OAuthBridge,
}

impl App {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let database = Database::connect(&config.database.url, config.database.max_connections)
            .await
            .context("failed to connect to database")?;
        Self::with_database(config, database)
    }

    pub fn with_database(config: Config, database: Database) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.http.timeout_secs);
        Ok(App {
            title_assist: TitleAssist::new(timeout).context("failed to build http client")?,
            oauth: OAuthBridge::new(timeout).context("failed to build http client")?,
            config,
            database,
        })
    }
}

#[derive(Parser)]
#[command(version, about = "A small pastebin server")]
struct Args {
    /// Path to the config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve,
    /// Create an account, or reset its password.
    AddUser { username: String, password: String },
    /// Delete expired sessions.
    PurgeSessions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)?;
    let app = App::new(config).await?;

    match args.command {
        Command::Serve => commands::serve::run(app).await,
        Command::AddUser { username, password } => {
            commands::add_user::run(app, &username, &password).await
        }
        Command::PurgeSessions => commands::purge_sessions::run(app).await,
    }
}

/// `./config.toml` if present, otherwise the platform config directory.
fn default_config_path() -> anyhow::Result<PathBuf> {
    let local = PathBuf::from("config.toml");
    if local.exists() {
        return Ok(local);
    }

    let dirs = ProjectDirs::from("", "", "pastebin")
        .context("could not determine the config directory")?;
    Ok(dirs.config_dir().join("config.toml"))
}
