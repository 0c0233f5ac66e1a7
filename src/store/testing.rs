//! Fixtures for store tests that talk to Postgres. They run only when
//! `DATABASE_URL` is set, each inside a transaction that is rolled back.

use std::sync::Once;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel_migrations::MigrationHarness;

use crate::db::MIGRATIONS;
use crate::error::AppError;
use crate::models::Recipe;
use crate::payloads::{IngredientAmount, RecipePayload};
use crate::schema::{ingredients, shopping_cart, tags, users};
use crate::store::recipes;

static MIGRATE: Once = Once::new();

pub fn with_db<F>(f: F)
where
    F: FnOnce(&mut PgConnection) -> Result<(), AppError>,
{
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL is not set, skipping");
            return;
        }
    };
    let mut conn = PgConnection::establish(&url).unwrap();
    MIGRATE.call_once(|| {
        conn.run_pending_migrations(MIGRATIONS).unwrap();
    });
    conn.test_transaction::<_, AppError, _>(f);
}

pub fn user(conn: &mut PgConnection, username: &str) -> Result<i32, AppError> {
    let id = diesel::insert_into(users::table)
        .values((
            users::email.eq(format!("{}@test.example.com", username)),
            users::username.eq(username),
            users::first_name.eq(username),
            users::last_name.eq("Tester"),
        ))
        .returning(users::id)
        .get_result(conn)?;
    Ok(id)
}

pub fn tag(conn: &mut PgConnection, slug: &str) -> Result<i32, AppError> {
    let id = diesel::insert_into(tags::table)
        .values((tags::name.eq(slug), tags::slug.eq(slug)))
        .returning(tags::id)
        .get_result(conn)?;
    Ok(id)
}

pub fn ingredient(conn: &mut PgConnection, name: &str, unit: &str) -> Result<i32, AppError> {
    let id = diesel::insert_into(ingredients::table)
        .values((
            ingredients::name.eq(name),
            ingredients::measurement_unit.eq(unit),
        ))
        .returning(ingredients::id)
        .get_result(conn)?;
    Ok(id)
}

pub fn payload(name: &str, tag_id: i32, lines: &[(i32, i64)]) -> RecipePayload {
    RecipePayload {
        ingredients: lines
            .iter()
            .map(|&(id, amount)| IngredientAmount { id, amount })
            .collect(),
        tags: vec![tag_id],
        image: "recipes/images/test.png".to_string(),
        name: name.to_string(),
        text: "Cook it.".to_string(),
        cooking_time: 10,
    }
}

/// A recipe with one tag of its own.
pub fn recipe(
    conn: &mut PgConnection,
    author_id: i32,
    name: &str,
    lines: &[(i32, i64)],
) -> Result<Recipe, AppError> {
    let tag_id = tag(conn, &format!("test-{}", name.to_lowercase().replace(' ', "-")))?;
    recipes::create(conn, author_id, &payload(name, tag_id, lines))
}

pub fn put_in_cart(conn: &mut PgConnection, user_id: i32, recipe_id: i32) -> Result<(), AppError> {
    diesel::insert_into(shopping_cart::table)
        .values((
            shopping_cart::user_id.eq(user_id),
            shopping_cart::recipe_id.eq(recipe_id),
        ))
        .execute(conn)?;
    Ok(())
}
