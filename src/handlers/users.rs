use actix_web::{web, HttpResponse};
use tracing::info;

use crate::auth::Identity;
use crate::db::{self, DbPool};
use crate::error::AppError;
use crate::payloads::{AvatarPayload, Page, Pagination, RecipesLimit, SubscriptionsQuery};
use crate::store::users as store;

pub async fn list_users(
    pool: web::Data<DbPool>,
    identity: Identity,
    query: web::Query<Pagination>,
) -> Result<HttpResponse, AppError> {
    let (limit, offset) = query.bounds();
    let viewer = identity.user_id();
    let page = db::run(&pool, move |conn| {
        let (users, count) = store::list_users(conn, limit, offset)?;
        let results = store::user_views(conn, viewer, users)?;
        Ok(Page { count, results })
    })
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn me(pool: web::Data<DbPool>, identity: Identity) -> Result<HttpResponse, AppError> {
    let user_id = identity.require()?;
    let user = db::run(&pool, move |conn| store::user_view(conn, Some(user_id), user_id)).await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn get_user(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    let viewer = identity.user_id();
    let user = db::run(&pool, move |conn| store::user_view(conn, viewer, user_id)).await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn set_avatar(
    pool: web::Data<DbPool>,
    identity: Identity,
    payload: web::Json<AvatarPayload>,
) -> Result<HttpResponse, AppError> {
    let user_id = identity.require()?;
    let avatar = payload.into_inner().avatar;
    if avatar.trim().is_empty() {
        return Err(AppError::invalid("avatar", "must not be empty"));
    }
    let user = db::run(&pool, move |conn| {
        store::set_avatar(conn, user_id, Some(avatar.as_str()))
    })
    .await?;
    Ok(HttpResponse::Ok().json(AvatarPayload {
        avatar: user.avatar.unwrap_or_default(),
    }))
}

pub async fn delete_avatar(
    pool: web::Data<DbPool>,
    identity: Identity,
) -> Result<HttpResponse, AppError> {
    let user_id = identity.require()?;
    db::run(&pool, move |conn| {
        if store::get_user(conn, user_id)?.avatar.is_none() {
            return Err(AppError::NotFound("avatar"));
        }
        store::set_avatar(conn, user_id, None)
    })
    .await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn subscribe(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<i32>,
    query: web::Query<RecipesLimit>,
) -> Result<HttpResponse, AppError> {
    let user_id = identity.require()?;
    let author_id = path.into_inner();
    let recipes_limit = query.recipes_limit;
    let author = db::run(&pool, move |conn| {
        let author = store::subscribe(conn, user_id, author_id)?;
        store::author_with_recipes(conn, Some(user_id), author, recipes_limit)
    })
    .await?;
    info!("user {} subscribed to {}", user_id, author_id);
    Ok(HttpResponse::Created().json(author))
}

pub async fn unsubscribe(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user_id = identity.require()?;
    let author_id = path.into_inner();
    db::run(&pool, move |conn| store::unsubscribe(conn, user_id, author_id)).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn subscriptions(
    pool: web::Data<DbPool>,
    identity: Identity,
    query: web::Query<SubscriptionsQuery>,
) -> Result<HttpResponse, AppError> {
    let user_id = identity.require()?;
    let (limit, offset) = Pagination {
        limit: query.limit,
        offset: query.offset,
    }
    .bounds();
    let recipes_limit = query.recipes_limit;
    let page = db::run(&pool, move |conn| {
        let (authors, count) = store::followed_authors(conn, user_id, limit, offset)?;
        let results = authors
            .into_iter()
            .map(|author| store::author_with_recipes(conn, Some(user_id), author, recipes_limit))
            .collect::<Result<Vec<_>, AppError>>()?;
        Ok(Page { count, results })
    })
    .await?;
    Ok(HttpResponse::Ok().json(page))
}
