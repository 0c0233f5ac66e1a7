use actix_web::web;
use tokio::sync::Mutex;

use crate::cache::Cache;
use crate::error::AppError;

pub mod catalog;
pub mod links;
pub mod recipes;
pub mod users;

pub type LinkCache = web::Data<Mutex<Cache>>;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| {
        AppError::invalid("non_field_errors", err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _| {
        AppError::invalid("non_field_errors", err.to_string()).into()
    }))
    .route("/api/users", web::get().to(users::list_users))
    .route("/api/users/me", web::get().to(users::me))
    .route("/api/users/me/avatar", web::put().to(users::set_avatar))
    .route("/api/users/me/avatar", web::delete().to(users::delete_avatar))
    .route("/api/users/subscriptions", web::get().to(users::subscriptions))
    .route("/api/users/{id}", web::get().to(users::get_user))
    .route("/api/users/{id}/subscribe", web::post().to(users::subscribe))
    .route("/api/users/{id}/subscribe", web::delete().to(users::unsubscribe))
    .route("/api/tags", web::get().to(catalog::list_tags))
    .route("/api/tags/{id}", web::get().to(catalog::get_tag))
    .route("/api/ingredients", web::get().to(catalog::list_ingredients))
    .route("/api/ingredients/{id}", web::get().to(catalog::get_ingredient))
    .route("/api/recipes", web::get().to(recipes::list_recipes))
    .route("/api/recipes", web::post().to(recipes::create_recipe))
    .route(
        "/api/recipes/download_shopping_cart",
        web::get().to(recipes::download_shopping_cart),
    )
    .route("/api/recipes/{id}", web::get().to(recipes::get_recipe))
    .route("/api/recipes/{id}", web::patch().to(recipes::update_recipe))
    .route("/api/recipes/{id}", web::delete().to(recipes::delete_recipe))
    .route("/api/recipes/{id}/favorite", web::post().to(recipes::add_favorite))
    .route("/api/recipes/{id}/favorite", web::delete().to(recipes::remove_favorite))
    .route("/api/recipes/{id}/shopping_cart", web::post().to(recipes::add_to_cart))
    .route("/api/recipes/{id}/shopping_cart", web::delete().to(recipes::remove_from_cart))
    .route("/api/recipes/{id}/get-link", web::get().to(links::get_link))
    .route("/s/{code}", web::get().to(links::redirect));
}
