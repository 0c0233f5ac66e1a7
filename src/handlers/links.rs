use std::future::Future;

use actix_web::{web, HttpResponse};
use http::header::LOCATION;
use tokio::sync::Mutex;
use tracing::debug;

use super::LinkCache;
use crate::auth::Identity;
use crate::cache::Cache;
use crate::config::ServerConfig;
use crate::db::{self, DbPool};
use crate::error::AppError;
use crate::payloads::ShortLinkView;
use crate::shortlink;

pub async fn get_link(
    config: web::Data<ServerConfig>,
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let recipe_id = path.into_inner();
    let recipe_url = config.recipe_url(recipe_id);
    let code_len = config.short_code_length;
    debug!("short link for recipe {} requested by {:?}", recipe_id, identity.user_id());

    let link = db::run(&pool, move |conn| {
        shortlink::mint_or_fetch(conn, recipe_id, &recipe_url, code_len)
    })
    .await?;

    Ok(HttpResponse::Ok().json(ShortLinkView {
        short_link: config.short_url(&link.short_code),
    }))
}

fn found(dest_url: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((LOCATION, dest_url))
        .finish()
}

/// Destination for `code`, from the cache or else from `lookup`.
///
/// The lock is held until a looked-up URL is cached. Deleting a recipe
/// evicts under the same lock, so a row read before the delete committed
/// cannot be cached after the eviction.
async fn cached_destination<F, Fut>(
    cache: &Mutex<Cache>,
    code: String,
    lookup: F,
) -> Result<String, AppError>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<String, AppError>>,
{
    let mut lock = cache.lock().await;
    if let Some(dest_url) = lock.get(&code) {
        debug!("cache hit {}", code);
        return Ok(dest_url);
    }
    debug!("cache miss {}", code);
    let dest_url = lookup(code.clone()).await?;
    lock.insert(code, dest_url.clone());
    Ok(dest_url)
}

pub async fn redirect(
    cache: LinkCache,
    pool: web::Data<DbPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let dest_url = cached_destination(&cache, path.into_inner(), |code| async move {
        let link = db::run(&pool, move |conn| shortlink::resolve(conn, &code)).await?;
        Ok(link.original_url)
    })
    .await?;
    Ok(found(&dest_url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use diesel::pg::PgConnection;
    use diesel::r2d2::{ConnectionManager, Pool};
    use std::num::NonZeroUsize;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    /// A pool that never connects unless a handler asks it to.
    fn idle_pool() -> DbPool {
        Pool::builder().build_unchecked(ConnectionManager::<PgConnection>::new(
            "postgres://localhost/unused",
        ))
    }

    #[actix_rt::test]
    async fn cached_code_redirects_without_the_database() {
        let mut cache = Cache::new(NonZeroUsize::new(8).unwrap());
        cache.insert(
            "4f1a2b3c4d".to_string(),
            "https://food.example.com/recipes/42".to_string(),
        );
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(idle_pool()))
                .app_data(web::Data::new(Mutex::new(cache)))
                .route("/s/{code}", web::get().to(redirect)),
        )
        .await;

        let req = test::TestRequest::get().uri("/s/4f1a2b3c4d").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 302);
        assert_eq!(
            resp.headers().get(LOCATION).unwrap(),
            "https://food.example.com/recipes/42"
        );
    }

    #[actix_rt::test]
    async fn delete_during_a_miss_leaves_nothing_cached() {
        let cache = Arc::new(Mutex::new(Cache::new(NonZeroUsize::new(8).unwrap())));
        let (read_tx, read_rx) = oneshot::channel::<()>();
        let (deleted_tx, deleted_rx) = oneshot::channel::<()>();

        let miss = actix_rt::spawn({
            let cache = cache.clone();
            async move {
                cached_destination(&cache, "4f1a2b3c4d".to_string(), move |_| async move {
                    // The row is read, then the recipe is deleted.
                    let _ = read_tx.send(());
                    let _ = deleted_rx.await;
                    Ok("https://food.example.com/recipes/42".to_string())
                })
                .await
            }
        });

        read_rx.await.unwrap();
        deleted_tx.send(()).unwrap();
        cache.lock().await.evict("4f1a2b3c4d");

        let dest_url = miss.await.unwrap().unwrap();
        assert_eq!(dest_url, "https://food.example.com/recipes/42");
        assert_eq!(cache.lock().await.get("4f1a2b3c4d"), None);
    }

    #[actix_rt::test]
    async fn failed_lookup_caches_nothing() {
        let cache = Mutex::new(Cache::new(NonZeroUsize::new(8).unwrap()));
        let err = cached_destination(&cache, "gone".to_string(), |_| async {
            Err(AppError::NotFound("short link"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(cache.lock().await.get("gone"), None);
    }
}
