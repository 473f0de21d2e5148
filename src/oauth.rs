//! OAuth2 login through an external provider.
//!
//! Only the authorization code grant is supported. The provider identity is
//! read from its user-info endpoint and mapped to a local account named
//! `{provider}:{subject}`.

use std::time::Duration;

use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use reqwest::header::{ACCEPT, USER_AGENT};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::settings::OAuth2Config;

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

#[derive(Clone)]
pub struct OAuthBridge {
    http: reqwest::Client,
}

impl OAuthBridge {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        // token requests must not follow redirects
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }

    /// Exchange an authorization code and return the provider's user id.
    pub async fn exchange_code(&self, code: &str, config: &OAuth2Config) -> ApiResult<String> {
        let client = client(config)?;

        let token = client
            .exchange_code(AuthorizationCode::new(code.to_owned()))
            .request_async(&self.http)
            .await
            .map_err(|e| ApiError::UpstreamUnavailable(format!("token exchange failed: {e}")))?;

        let user_info: Value = self
            .http
            .get(&config.user_info_url)
            .bearer_auth(token.access_token().secret())
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, concat!("pastebin/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        subject(&user_info).ok_or_else(|| {
            ApiError::UpstreamUnavailable("user info has no usable identity".to_owned())
        })
    }
}

/// Build the provider URL the browser is sent to, carrying `state`.
pub fn build_authorize_url(config: &OAuth2Config, state: &str) -> ApiResult<String> {
    let client = client(config)?;
    let state = state.to_owned();
    let (url, _) = client
        .authorize_url(move || CsrfToken::new(state))
        .add_scopes(config.scope_list().into_iter().map(Scope::new))
        .url();
    Ok(url.to_string())
}

/// Name of the local account for a provider identity.
pub fn local_username(config: &OAuth2Config, subject: &str) -> String {
    format!("{}:{subject}", config.display_name().to_lowercase())
}

fn client(config: &OAuth2Config) -> ApiResult<ConfiguredClient> {
    if !config.enabled {
        return Err(ApiError::FeatureDisabled("OAuth2 login"));
    }

    let mut client = BasicClient::new(ClientId::new(config.client_id.clone()))
        .set_auth_uri(AuthUrl::new(config.auth_url.clone()).map_err(invalid_url)?)
        .set_token_uri(TokenUrl::new(config.token_url.clone()).map_err(invalid_url)?)
        .set_redirect_uri(RedirectUrl::new(config.redirect_url.clone()).map_err(invalid_url)?);

    if !config.client_secret.is_empty() {
        client = client.set_client_secret(ClientSecret::new(config.client_secret.clone()));
    }

    Ok(client)
}

fn invalid_url(e: oauth2::url::ParseError) -> ApiError {
    ApiError::BadRequest(format!("invalid OAuth2 endpoint: {e}"))
}

/// Pick the most readable identity a provider reports.
fn subject(user_info: &Value) -> Option<String> {
    ["login", "name", "email"]
        .iter()
        .find_map(|key| user_info[*key].as_str().filter(|s| !s.is_empty()))
        .map(str::to_owned)
        .or_else(|| match &user_info["id"] {
            Value::Number(id) => Some(id.to_string()),
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            _ => None,
        })
}
