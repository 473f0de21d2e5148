use chrono::Utc;
use tracing::info;

use crate::App;

pub async fn run(app: App) -> anyhow::Result<()> {
    purge(&app).await
}

/// Delete every expired session.
pub async fn purge(app: &App) -> anyhow::Result<()> {
    let count = app.database.delete_expired_sessions(Utc::now()).await?;
    if count > 0 {
        info!("deleted {count} expired sessions");
    }
    Ok(())
}
