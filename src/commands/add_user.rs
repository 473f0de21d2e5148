use tracing::info;

use crate::auth::hash_password;
use crate::App;

pub async fn run(app: App, username: &str, password: &str) -> anyhow::Result<()> {
    if username.trim().is_empty() || password.is_empty() {
        anyhow::bail!("username and password must not be empty");
    }

    let hash = hash_password(password)?;
    let account = app.database.upsert_account(username, Some(&hash)).await?;
    info!("saved account '{}' (id {})", account.username, account.id);
    Ok(())
}
