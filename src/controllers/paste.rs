use chrono::Utc;
use tracing::{info, warn};

use crate::auth::Caller;
use crate::db::Database;
use crate::error::{ApiError, ApiResult};
use crate::ids::generate_random_id;
use crate::models::Paste;
use crate::pagination::{self, Window};
use crate::settings::AiConfig;
use crate::App;

/// Identifier draws before giving up on a single paste.
const MAX_ID_ATTEMPTS: usize = 5;

/// Create a paste owned by `caller`.
///
/// An empty title is filled in by Title Assist when it is enabled. Title
/// Assist never fails the creation; the title just stays empty.
pub async fn create(app: &App, caller: &Caller, title: &str, content: &str) -> ApiResult<Paste> {
    if content.trim().is_empty() {
        return Err(ApiError::BadRequest("content must not be empty".to_owned()));
    }

    let title = if title.trim().is_empty() {
        suggest_title(app, content).await
    } else {
        title.to_owned()
    };

    insert_with_fresh_id(&app.database, caller, &title, content, generate_random_id).await
}

async fn suggest_title(app: &App, content: &str) -> String {
    let config = match app.database.load_settings::<AiConfig>().await {
        Ok(config) => config,
        Err(e) => {
            warn!("could not load title assist settings: {e}");
            return String::new();
        }
    };

    if !config.enabled {
        return String::new();
    }

    match app.title_assist.suggest_title(content, &config).await {
        Ok(title) => title,
        Err(e) => {
            warn!("title assist unavailable: {e}");
            String::new()
        }
    }
}

async fn insert_with_fresh_id(
    db: &Database,
    caller: &Caller,
    title: &str,
    content: &str,
    mut next_id: impl FnMut() -> String,
) -> ApiResult<Paste> {
    let created_at = Utc::now();

    for _ in 0..MAX_ID_ATTEMPTS {
        let random_id = next_id();
        match db
            .insert_paste(&random_id, caller.id, title, content, created_at)
            .await
        {
            Ok(paste) => {
                info!(
                    "new paste: key='{random_id}', owner='{owner}', size={size}",
                    owner = caller.username,
                    size = content.len()
                );
                return Ok(paste);
            }
            Err(ApiError::Conflict) => warn!("identifier '{random_id}' already taken, redrawing"),
            Err(e) => return Err(e),
        }
    }

    Err(ApiError::StoreExhausted)
}

/// Fetch a paste by its public identifier. Anyone holding the link may read.
pub async fn fetch(app: &App, random_id: &str) -> ApiResult<Paste> {
    app.database.get_paste(random_id).await
}

/// Delete one of the caller's pastes.
pub async fn delete(app: &App, caller: &Caller, random_id: &str) -> ApiResult<()> {
    let paste = app.database.get_paste(random_id).await?;
    if paste.owner_id != caller.id {
        return Err(ApiError::Forbidden);
    }

    app.database.delete_paste(random_id, caller.id).await?;
    info!("deleted paste: key='{random_id}', owner='{}'", caller.username);
    Ok(())
}

/// One page of the caller's pastes, newest first.
pub struct Listing {
    pub pastes: Vec<Paste>,
    pub window: Window,
    pub total_count: i64,
}

pub async fn list(
    app: &App,
    caller: &Caller,
    page: Option<i64>,
    page_size: Option<i64>,
) -> ApiResult<Listing> {
    let limits = &app.config.limits;
    let total_count = app.database.count_pastes_by_owner(caller.id).await?;
    let window = pagination::resolve(
        page.unwrap_or(1),
        page_size.unwrap_or(limits.default_page_size),
        limits.max_page_size,
        total_count,
    )?;

    let pastes = app
        .database
        .list_pastes_by_owner(caller.id, window.page_size, window.offset)
        .await?;

    Ok(Listing {
        pastes,
        window,
        total_count,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::test_util::{test_app, test_caller};

    #[tokio::test]
    async fn create_then_fetch_round_trips() {
        let app = test_app().await;
        let alice = test_caller(&app, "alice").await;

        let created = create(&app, &alice, "hello", "print(1)").await.unwrap();
        assert!((6..=10).contains(&created.random_id.len()));

        let fetched = fetch(&app, &created.random_id).await.unwrap();
        assert_eq!(fetched.title, "hello");
        assert_eq!(fetched.content, "print(1)");
        assert_eq!(fetched.owner_id, alice.id);
    }

    #[tokio::test]
    async fn empty_content_is_rejected() {
        let app = test_app().await;
        let alice = test_caller(&app, "alice").await;

        let result = create(&app, &alice, "title", "  \n").await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
        assert_eq!(app.database.count_pastes_by_owner(alice.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_title_stays_empty_without_title_assist() {
        let app = test_app().await;
        let alice = test_caller(&app, "alice").await;

        let paste = create(&app, &alice, "", "print(1)").await.unwrap();
        assert_eq!(paste.title, "");

        // enabled but unreachable
        let config = AiConfig {
            enabled: true,
            base_url: "http://127.0.0.1:9/v1".to_owned(),
            api_key: "sk-test".to_owned(),
            ..AiConfig::default()
        };
        app.database.save_settings(&config).await.unwrap();

        let paste = create(&app, &alice, "", "print(2)").await.unwrap();
        assert_eq!(paste.title, "");
    }

    #[tokio::test]
    async fn only_the_owner_may_delete() {
        let app = test_app().await;
        let alice = test_caller(&app, "alice").await;
        let bob = test_caller(&app, "bob").await;

        let paste = create(&app, &alice, "", "secret").await.unwrap();

        assert!(matches!(
            delete(&app, &bob, &paste.random_id).await,
            Err(ApiError::Forbidden)
        ));
        assert!(fetch(&app, &paste.random_id).await.is_ok());

        delete(&app, &alice, &paste.random_id).await.unwrap();
        assert!(matches!(
            fetch(&app, &paste.random_id).await,
            Err(ApiError::NotFound)
        ));
        assert!(matches!(
            delete(&app, &alice, &paste.random_id).await,
            Err(ApiError::NotFound)
        ));
    }

    #[tokio::test]
    async fn exhausted_identifiers_fail_the_creation() {
        let app = test_app().await;
        let alice = test_caller(&app, "alice").await;

        let fixed = || "SameId42".to_owned();
        insert_with_fresh_id(&app.database, &alice, "", "one", fixed)
            .await
            .unwrap();

        let result = insert_with_fresh_id(&app.database, &alice, "", "two", fixed).await;
        assert!(matches!(result, Err(ApiError::StoreExhausted)));
        assert_eq!(app.database.count_pastes_by_owner(alice.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn collision_is_retried_with_a_new_identifier() {
        let app = test_app().await;
        let alice = test_caller(&app, "alice").await;

        insert_with_fresh_id(&app.database, &alice, "", "one", || "Taken123".to_owned())
            .await
            .unwrap();

        let mut draws = vec!["Fresh456".to_owned(), "Taken123".to_owned()];
        let paste = insert_with_fresh_id(&app.database, &alice, "", "two", || {
            draws.pop().unwrap()
        })
        .await
        .unwrap();
        assert_eq!(paste.random_id, "Fresh456");
    }

    #[tokio::test]
    async fn listing_pages_newest_first() {
        let app = test_app().await;
        let alice = test_caller(&app, "alice").await;
        let bob = test_caller(&app, "bob").await;

        for i in 0..25 {
            create(&app, &alice, &format!("paste {i}"), "body").await.unwrap();
        }
        create(&app, &bob, "not alice's", "body").await.unwrap();

        let first = list(&app, &alice, Some(1), Some(10)).await.unwrap();
        let second = list(&app, &alice, Some(2), Some(10)).await.unwrap();
        let last = list(&app, &alice, Some(3), Some(10)).await.unwrap();
        let beyond = list(&app, &alice, Some(4), Some(10)).await.unwrap();

        assert_eq!(first.window.total_pages, 3);
        assert_eq!(first.total_count, 25);
        assert_eq!(first.pastes.len(), 10);
        assert_eq!(second.pastes.len(), 10);
        assert_eq!(last.pastes.len(), 5);
        assert_eq!(first.pastes[0].title, "paste 24");
        assert_eq!(last.pastes[4].title, "paste 0");

        let ids = |listing: &Listing| -> HashSet<String> {
            listing.pastes.iter().map(|p| p.random_id.clone()).collect()
        };
        assert!(ids(&first).is_disjoint(&ids(&second)));
        assert!(first
            .pastes
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at));

        assert_eq!(beyond.window.current_page, 3);
        assert_eq!(ids(&beyond), ids(&last));
    }

    #[tokio::test]
    async fn empty_listing_has_one_page() {
        let app = test_app().await;
        let alice = test_caller(&app, "alice").await;

        let listing = list(&app, &alice, None, None).await.unwrap();
        assert!(listing.pastes.is_empty());
        assert_eq!(listing.window.current_page, 1);
        assert_eq!(listing.window.total_pages, 1);
    }

    #[tokio::test]
    async fn listing_rejects_non_positive_page_size() {
        let app = test_app().await;
        let alice = test_caller(&app, "alice").await;

        assert!(matches!(
            list(&app, &alice, Some(1), Some(0)).await,
            Err(ApiError::BadRequest(_))
        ));
    }
}
