use actix_web::{web, HttpResponse};
use http::header::CONTENT_DISPOSITION;
use tracing::info;

use super::LinkCache;
use crate::auth::Identity;
use crate::db::{self, DbPool};
use crate::error::AppError;
use crate::payloads::{Page, RecipeFilter, RecipePayload, RecipeShort};
use crate::shopping;
use crate::store::recipes as store;
use crate::store::relations::{self, RecipeList};

pub async fn list_recipes(
    pool: web::Data<DbPool>,
    identity: Identity,
    query: web::Query<Vec<(String, String)>>,
) -> Result<HttpResponse, AppError> {
    let filter = RecipeFilter::from_pairs(&query)?;
    let viewer = identity.user_id();
    let (results, count) = db::run(&pool, move |conn| store::list(conn, viewer, &filter)).await?;
    Ok(HttpResponse::Ok().json(Page { count, results }))
}

pub async fn get_recipe(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let recipe_id = path.into_inner();
    let viewer = identity.user_id();
    let recipe = db::run(&pool, move |conn| store::detail(conn, viewer, recipe_id)).await?;
    Ok(HttpResponse::Ok().json(recipe))
}

pub async fn create_recipe(
    pool: web::Data<DbPool>,
    identity: Identity,
    payload: web::Json<RecipePayload>,
) -> Result<HttpResponse, AppError> {
    let user_id = identity.require()?;
    let payload = payload.into_inner();
    let recipe = db::run(&pool, move |conn| {
        let created = store::create(conn, user_id, &payload)?;
        store::detail(conn, Some(user_id), created.id)
    })
    .await?;
    info!("user {} created recipe {}", user_id, recipe.id);
    Ok(HttpResponse::Created().json(recipe))
}

pub async fn update_recipe(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<i32>,
    payload: web::Json<RecipePayload>,
) -> Result<HttpResponse, AppError> {
    let user_id = identity.require()?;
    let recipe_id = path.into_inner();
    let payload = payload.into_inner();
    let recipe = db::run(&pool, move |conn| {
        store::update(conn, user_id, recipe_id, &payload)?;
        store::detail(conn, Some(user_id), recipe_id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(recipe))
}

pub async fn delete_recipe(
    pool: web::Data<DbPool>,
    cache: LinkCache,
    identity: Identity,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user_id = identity.require()?;
    let recipe_id = path.into_inner();
    let code = db::run(&pool, move |conn| store::delete(conn, user_id, recipe_id)).await?;
    if let Some(code) = code {
        cache.lock().await.evict(&code);
    }
    info!("user {} deleted recipe {}", user_id, recipe_id);
    Ok(HttpResponse::NoContent().finish())
}

async fn add_to(
    list: RecipeList,
    pool: web::Data<DbPool>,
    identity: Identity,
    recipe_id: i32,
) -> Result<HttpResponse, AppError> {
    let user_id = identity.require()?;
    let recipe = db::run(&pool, move |conn| relations::add(conn, list, user_id, recipe_id)).await?;
    Ok(HttpResponse::Created().json(RecipeShort::from(recipe)))
}

async fn remove_from(
    list: RecipeList,
    pool: web::Data<DbPool>,
    identity: Identity,
    recipe_id: i32,
) -> Result<HttpResponse, AppError> {
    let user_id = identity.require()?;
    db::run(&pool, move |conn| relations::remove(conn, list, user_id, recipe_id)).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn add_favorite(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    add_to(RecipeList::Favorites, pool, identity, path.into_inner()).await
}

pub async fn remove_favorite(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    remove_from(RecipeList::Favorites, pool, identity, path.into_inner()).await
}

pub async fn add_to_cart(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    add_to(RecipeList::ShoppingCart, pool, identity, path.into_inner()).await
}

pub async fn remove_from_cart(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    remove_from(RecipeList::ShoppingCart, pool, identity, path.into_inner()).await
}

fn attachment(text: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .insert_header((
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", shopping::FILENAME),
        ))
        .body(text)
}

pub async fn download_shopping_cart(
    pool: web::Data<DbPool>,
    identity: Identity,
) -> Result<HttpResponse, AppError> {
    let user_id = identity.require()?;
    let lines = db::run(&pool, move |conn| shopping::cart_lines(conn, user_id)).await?;
    let items = shopping::aggregate(lines);
    info!("shopping list for user {} has {} items", user_id, items.len());
    Ok(attachment(shopping::render(&items)))
}
