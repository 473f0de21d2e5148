use crate::auth::Caller;
use crate::config::Config;
use crate::db::Database;
use crate::App;

/// A fresh in-memory database. One connection, since every sqlite memory
/// connection is its own database.
pub async fn test_database() -> Database {
    Database::connect("sqlite::memory:", 1).await.unwrap()
}

pub fn test_config() -> Config {
    toml::from_str(
        r#"
        base_url = "http://paste.test"
        port = 0

        [database]
        url = "sqlite::memory:"

        [auth.admin]
        username = "admin"
        password = "admin-password"

        [http]
        timeout_secs = 2
        "#,
    )
    .unwrap()
}

pub async fn test_app() -> App {
    App::with_database(test_config(), test_database().await).unwrap()
}

/// An account without a password, as the Auth Gate would resolve it.
pub async fn test_caller(app: &App, username: &str) -> Caller {
    app.database
        .upsert_account(username, None)
        .await
        .unwrap()
        .into()
}
