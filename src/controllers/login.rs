use tracing::info;
use uuid::Uuid;

use crate::auth;
use crate::error::ApiResult;
use crate::oauth::{self, local_username};
use crate::settings::OAuth2Config;
use crate::App;

/// Log in with a local username and password, returning a session token.
pub async fn password_login(app: &App, username: &str, password: &str) -> ApiResult<String> {
    auth::login(
        &app.database,
        username,
        password,
        app.config.auth.session_ttl_secs,
    )
    .await
}

/// Start an OAuth2 login, returning the provider URL and the CSRF state.
pub async fn begin_oauth_login(app: &App) -> ApiResult<(String, String)> {
    let config = app.database.load_settings::<OAuth2Config>().await?;
    let state = Uuid::new_v4().simple().to_string();
    let url = oauth::build_authorize_url(&config, &state)?;
    Ok((url, state))
}

/// Finish an OAuth2 login, returning a session token for the mapped account.
pub async fn finish_oauth_login(app: &App, code: &str) -> ApiResult<String> {
    let config = app.database.load_settings::<OAuth2Config>().await?;
    let subject = app.oauth.exchange_code(code, &config).await?;

    let username = local_username(&config, &subject);
    let account = app.database.get_or_create_account(&username).await?;
    info!("oauth2 login: user='{username}'");

    auth::open_session(&app.database, account.id, app.config.auth.session_ttl_secs).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::test_util::test_app;

    #[tokio::test]
    async fn oauth_login_is_refused_while_disabled() {
        let app = test_app().await;
        assert!(matches!(
            begin_oauth_login(&app).await,
            Err(ApiError::FeatureDisabled(_))
        ));
        assert!(matches!(
            finish_oauth_login(&app, "code").await,
            Err(ApiError::FeatureDisabled(_))
        ));
    }

    #[tokio::test]
    async fn begin_returns_state_embedded_in_url() {
        let app = test_app().await;
        let config = OAuth2Config {
            enabled: true,
            client_id: "abc".to_owned(),
            auth_url: "https://provider.example/authorize".to_owned(),
            token_url: "https://provider.example/token".to_owned(),
            user_info_url: "https://provider.example/user".to_owned(),
            ..OAuth2Config::default()
        };
        app.database.save_settings(&config).await.unwrap();

        let (url, state) = begin_oauth_login(&app).await.unwrap();
        assert_eq!(state.len(), 32);
        assert!(url.contains(&format!("state={state}")));
    }
}
