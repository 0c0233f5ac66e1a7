use actix_web::{web, HttpResponse};

use crate::db::{self, DbPool};
use crate::error::AppError;
use crate::payloads::IngredientSearch;
use crate::store::catalog as store;

pub async fn list_tags(pool: web::Data<DbPool>) -> Result<HttpResponse, AppError> {
    let tags = db::run(&pool, store::list_tags).await?;
    Ok(HttpResponse::Ok().json(tags))
}

pub async fn get_tag(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let tag_id = path.into_inner();
    let tag = db::run(&pool, move |conn| store::get_tag(conn, tag_id)).await?;
    Ok(HttpResponse::Ok().json(tag))
}

pub async fn list_ingredients(
    pool: web::Data<DbPool>,
    query: web::Query<IngredientSearch>,
) -> Result<HttpResponse, AppError> {
    let prefix = query.into_inner().name;
    let ingredients =
        db::run(&pool, move |conn| store::search_ingredients(conn, prefix.as_deref())).await?;
    Ok(HttpResponse::Ok().json(ingredients))
}

pub async fn get_ingredient(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let ingredient_id = path.into_inner();
    let ingredient = db::run(&pool, move |conn| store::get_ingredient(conn, ingredient_id)).await?;
    Ok(HttpResponse::Ok().json(ingredient))
}
