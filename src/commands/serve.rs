use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{AppendHeaders, IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{
    self, clear_cookie, cookie, hash_password, set_cookie, Admin, Caller, SESSION_COOKIE,
};
use crate::commands::purge_sessions;
use crate::controllers::{login, paste};
use crate::error::{ApiError, ApiResult};
use crate::settings::{AiConfig, Category, OAuth2Config};
use crate::types::api::{
    AuthStatus, AuthorizeUrl, CreatePaste, CreatedPaste, Login, ModelList, OAuth2Callback,
    OAuth2Status, PageQuery, PastePage, PasteView, TitleProbe, TitleSuggestion,
};
use crate::App;

const OAUTH_STATE_COOKIE: &str = "oauth2_state";
const OAUTH_STATE_TTL_SECS: i64 = 600;
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Sent to Title Assist when a probe comes without content.
const SAMPLE_CONTENT: &str = "console.log('Hello World');";

pub async fn run(app: App) -> anyhow::Result<()> {
    seed_admin(&app).await?;

    let purge_app = app.clone();
    let purge_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = purge_sessions::purge(&purge_app).await {
                warn!("failed to purge sessions: {e:#}");
            }
        }
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], app.config.port));
    info!("listening on {addr}");

    axum::Server::bind(&addr)
        .serve(router(app).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    purge_task.abort();
    info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

pub fn router(app: App) -> Router {
    Router::new()
        .route("/api/login", post(login_password))
        .route("/api/logout", post(logout))
        .route("/api/auth/check", get(check_auth))
        .route("/api/paste", post(create_paste))
        .route("/api/paste/:id", get(get_paste).delete(delete_paste))
        .route("/api/pastes/paginated", get(list_pastes))
        .route("/api/config/ai", get(get_settings::<AiConfig>).put(put_settings::<AiConfig>))
        .route(
            "/api/config/oauth2",
            get(get_settings::<OAuth2Config>).put(put_settings::<OAuth2Config>),
        )
        .route("/api/test/ai", post(test_title_assist))
        .route("/api/models", get(list_models))
        .route("/api/oauth2/status", get(oauth2_status))
        .route("/api/oauth2/login", get(oauth2_login))
        .route("/api/oauth2/callback", get(oauth2_callback))
        .route("/raw/:id", get(get_raw))
        .route("/:id", get(get_raw))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(
            app.config.limits.max_upload_size,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

/// Create the configured admin account unless it already exists.
async fn seed_admin(app: &App) -> anyhow::Result<()> {
    let Some(admin) = &app.config.auth.admin else { return Ok(()) };

    match app.database.get_account(&admin.username).await {
        Ok(_) => Ok(()),
        Err(ApiError::NotFound) => {
            let hash = hash_password(&admin.password)?;
            app.database
                .upsert_account(&admin.username, Some(&hash))
                .await?;
            info!("created admin account '{}'", admin.username);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn login_password(
    State(app): State<App>,
    body: Result<Json<Login>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(body) = body?;
    let token = login::password_login(&app, &body.username, &body.password).await?;
    let cookie = set_cookie(SESSION_COOKIE, &token, app.config.auth.session_ttl_secs);
    Ok((AppendHeaders([(header::SET_COOKIE, cookie)]), Json(json!({}))))
}

async fn logout(State(app): State<App>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    if let Some(token) = cookie(&headers, SESSION_COOKIE) {
        auth::logout(&app.database, &token).await?;
    }
    Ok((
        AppendHeaders([(header::SET_COOKIE, clear_cookie(SESSION_COOKIE))]),
        Json(json!({})),
    ))
}

async fn check_auth(caller: Option<Caller>) -> Json<AuthStatus> {
    Json(AuthStatus {
        authenticated: caller.is_some(),
        username: caller.map(|caller| caller.username),
    })
}

async fn create_paste(
    State(app): State<App>,
    caller: Caller,
    body: Result<Json<CreatePaste>, JsonRejection>,
) -> ApiResult<Json<CreatedPaste>> {
    let Json(body) = body?;
    let paste = paste::create(&app, &caller, &body.title, &body.content).await?;
    Ok(Json(CreatedPaste {
        url: app.config.paste_url(&paste.random_id),
        random_id: paste.random_id,
        title: paste.title,
        created_at: paste.created_at,
    }))
}

async fn get_paste(
    State(app): State<App>,
    Path(random_id): Path<String>,
) -> ApiResult<Json<PasteView>> {
    let paste = paste::fetch(&app, &random_id).await?;
    Ok(Json(paste.into()))
}

async fn get_raw(
    State(app): State<App>,
    Path(random_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let paste = paste::fetch(&app, &random_id).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        paste.content,
    ))
}

async fn delete_paste(
    State(app): State<App>,
    caller: Caller,
    Path(random_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    paste::delete(&app, &caller, &random_id).await?;
    Ok(Json(json!({})))
}

async fn list_pastes(
    State(app): State<App>,
    caller: Caller,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<PastePage>> {
    let Query(query) = query?;
    let listing = paste::list(&app, &caller, query.page, query.page_size).await?;
    Ok(Json(PastePage {
        pastes: listing.pastes.into_iter().map(PasteView::from).collect(),
        current_page: listing.window.current_page,
        total_pages: listing.window.total_pages,
        page_size: listing.window.page_size,
        total_count: listing.total_count,
    }))
}

async fn get_settings<T: Category>(State(app): State<App>, _admin: Admin) -> ApiResult<Json<T>> {
    let settings = app.database.load_settings::<T>().await?;
    Ok(Json(settings.redacted()))
}

async fn put_settings<T: Category>(
    State(app): State<App>,
    Admin(caller): Admin,
    settings: Result<Json<T>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Json(mut settings) = settings?;
    let stored = app.database.load_settings::<T>().await?;
    settings.restore_secrets(&stored);
    settings.validate()?;
    app.database.save_settings(&settings).await?;
    info!("{} settings updated by '{}'", T::KEY, caller.username);
    Ok(Json(json!({})))
}

async fn test_title_assist(
    State(app): State<App>,
    _admin: Admin,
    probe: Result<Json<TitleProbe>, JsonRejection>,
) -> ApiResult<Json<TitleSuggestion>> {
    let Json(probe) = probe?;
    let content = if probe.content.trim().is_empty() {
        SAMPLE_CONTENT
    } else {
        probe.content.as_str()
    };

    let config = app.database.load_settings::<AiConfig>().await?;
    let title = app.title_assist.suggest_title(content, &config).await?;
    Ok(Json(TitleSuggestion { title }))
}

async fn list_models(State(app): State<App>, _admin: Admin) -> ApiResult<Json<ModelList>> {
    let config = app.database.load_settings::<AiConfig>().await?;
    let models = app.title_assist.list_models(&config).await?;
    Ok(Json(ModelList {
        count: models.len(),
        models,
    }))
}

async fn oauth2_status(State(app): State<App>) -> ApiResult<Json<OAuth2Status>> {
    let config = app.database.load_settings::<OAuth2Config>().await?;
    Ok(Json(OAuth2Status {
        oauth2_enabled: config.enabled,
        oauth2_name: config.display_name().to_owned(),
    }))
}

async fn oauth2_login(State(app): State<App>) -> ApiResult<impl IntoResponse> {
    let (auth_url, state) = login::begin_oauth_login(&app).await?;
    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            set_cookie(OAUTH_STATE_COOKIE, &state, OAUTH_STATE_TTL_SECS),
        )]),
        Json(AuthorizeUrl { auth_url }),
    ))
}

async fn oauth2_callback(
    State(app): State<App>,
    headers: HeaderMap,
    callback: Result<Query<OAuth2Callback>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(callback) = callback?;
    let expected_state = cookie(&headers, OAUTH_STATE_COOKIE);
    if expected_state.is_none() || expected_state != callback.state {
        return Err(ApiError::BadRequest("invalid state parameter".to_owned()));
    }

    let code = callback
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing authorization code".to_owned()))?;

    let token = login::finish_oauth_login(&app, &code).await?;

    Ok((
        AppendHeaders([
            (header::SET_COOKIE, clear_cookie(OAUTH_STATE_COOKIE)),
            (
                header::SET_COOKIE,
                set_cookie(SESSION_COOKIE, &token, app.config.auth.session_ttl_secs),
            ),
        ]),
        Redirect::temporary("/"),
    ))
}
