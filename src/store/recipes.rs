use std::collections::HashMap;
use std::convert::TryFrom;

use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;

use crate::error::{AppError, FieldErrors};
use crate::models::{
    IngredientLine, NewRecipe, NewRecipeIngredient, NewRecipeTag, Recipe, RecipeChanges, Tag,
    User,
};
use crate::payloads::{
    into_result, merge_errors, RecipeFilter, RecipePayload, RecipeView, UserView,
};
use crate::schema::{
    favorites, ingredients, recipe_ingredients, recipe_tags, recipes, shopping_cart, short_links,
    tags, users,
};
use crate::store::catalog::{missing_ingredients, missing_tags};
use crate::store::relations::{contained, RecipeList};
use crate::store::users::user_views;

pub fn get_recipe(conn: &mut PgConnection, recipe_id: i32) -> Result<Recipe, AppError> {
    recipes::table
        .find(recipe_id)
        .select(Recipe::as_select())
        .first(conn)
        .optional()?
        .ok_or(AppError::NotFound("recipe"))
}

fn filtered(filter: &RecipeFilter, viewer: Option<i32>) -> recipes::BoxedQuery<'static, Pg> {
    let mut query = recipes::table.into_boxed();
    if let Some(author) = filter.author {
        query = query.filter(recipes::author_id.eq(author));
    }
    if !filter.tags.is_empty() {
        let tagged = recipe_tags::table
            .inner_join(tags::table)
            .filter(tags::slug.eq_any(filter.tags.clone()))
            .select(recipe_tags::recipe_id);
        query = query.filter(recipes::id.eq_any(tagged));
    }
    // Both flags only mean something for a signed-in viewer.
    if let Some(user_id) = viewer {
        if filter.is_favorited {
            let favorited = favorites::table
                .filter(favorites::user_id.eq(user_id))
                .select(favorites::recipe_id);
            query = query.filter(recipes::id.eq_any(favorited));
        }
        if filter.is_in_shopping_cart {
            let in_cart = shopping_cart::table
                .filter(shopping_cart::user_id.eq(user_id))
                .select(shopping_cart::recipe_id);
            query = query.filter(recipes::id.eq_any(in_cart));
        }
    }
    query
}

pub fn list(
    conn: &mut PgConnection,
    viewer: Option<i32>,
    filter: &RecipeFilter,
) -> Result<(Vec<RecipeView>, i64), AppError> {
    let (limit, offset) = filter.page;
    let count = filtered(filter, viewer).count().get_result::<i64>(conn)?;
    let rows = filtered(filter, viewer)
        .order((recipes::pub_date.desc(), recipes::id.desc()))
        .limit(limit)
        .offset(offset)
        .select(Recipe::as_select())
        .load(conn)?;
    Ok((views(conn, viewer, rows)?, count))
}

pub fn detail(
    conn: &mut PgConnection,
    viewer: Option<i32>,
    recipe_id: i32,
) -> Result<RecipeView, AppError> {
    let recipe = get_recipe(conn, recipe_id)?;
    views(conn, viewer, vec![recipe])?
        .pop()
        .ok_or(AppError::NotFound("recipe"))
}

/// Loads everything a recipe response shows, a handful of queries for the
/// whole batch.
fn views(
    conn: &mut PgConnection,
    viewer: Option<i32>,
    rows: Vec<Recipe>,
) -> Result<Vec<RecipeView>, AppError> {
    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();

    let mut tags_by_recipe: HashMap<i32, Vec<Tag>> = HashMap::new();
    let tag_rows = recipe_tags::table
        .inner_join(tags::table)
        .filter(recipe_tags::recipe_id.eq_any(&ids))
        .order(tags::id)
        .select((recipe_tags::recipe_id, Tag::as_select()))
        .load::<(i32, Tag)>(conn)?;
    for (recipe_id, tag) in tag_rows {
        tags_by_recipe.entry(recipe_id).or_default().push(tag);
    }

    let mut lines_by_recipe: HashMap<i32, Vec<IngredientLine>> = HashMap::new();
    let line_rows = recipe_ingredients::table
        .inner_join(ingredients::table)
        .filter(recipe_ingredients::recipe_id.eq_any(&ids))
        .order(ingredients::name)
        .select((
            recipe_ingredients::recipe_id,
            (
                ingredients::id,
                ingredients::name,
                ingredients::measurement_unit,
                recipe_ingredients::amount,
            ),
        ))
        .load::<(i32, IngredientLine)>(conn)?;
    for (recipe_id, line) in line_rows {
        lines_by_recipe.entry(recipe_id).or_default().push(line);
    }

    let author_ids: Vec<i32> = rows.iter().map(|r| r.author_id).collect();
    let authors = users::table
        .filter(users::id.eq_any(&author_ids))
        .select(User::as_select())
        .load(conn)?;
    let authors: HashMap<i32, UserView> = user_views(conn, viewer, authors)?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let favorited = contained(conn, RecipeList::Favorites, viewer, &ids)?;
    let in_cart = contained(conn, RecipeList::ShoppingCart, viewer, &ids)?;

    rows.into_iter()
        .map(|recipe| -> Result<RecipeView, AppError> {
            let author = authors
                .get(&recipe.author_id)
                .cloned()
                .ok_or(AppError::NotFound("user"))?;
            Ok(RecipeView {
                id: recipe.id,
                tags: tags_by_recipe.remove(&recipe.id).unwrap_or_default(),
                ingredients: lines_by_recipe.remove(&recipe.id).unwrap_or_default(),
                author,
                is_favorited: favorited.contains(&recipe.id),
                is_in_shopping_cart: in_cart.contains(&recipe.id),
                name: recipe.name,
                image: recipe.image,
                text: recipe.text,
                cooking_time: recipe.cooking_time,
                pub_date: recipe.pub_date,
            })
        })
        .collect()
}

/// Names every tag and ingredient id that does not exist.
fn reference_errors(
    conn: &mut PgConnection,
    payload: &RecipePayload,
) -> Result<FieldErrors, AppError> {
    let mut errors = FieldErrors::new();
    let tags = missing_tags(conn, &payload.tags)?;
    if !tags.is_empty() {
        errors.insert("tags", vec![format!("unknown tag ids: {}", join_ids(&tags))]);
    }
    let ingredient_ids: Vec<i32> = payload.ingredients.iter().map(|i| i.id).collect();
    let ingredients = missing_ingredients(conn, &ingredient_ids)?;
    if !ingredients.is_empty() {
        errors.insert(
            "ingredients",
            vec![format!("unknown ingredient ids: {}", join_ids(&ingredients))],
        );
    }
    Ok(errors)
}

/// Shape and reference checks together, failing once with every error.
fn check_payload(conn: &mut PgConnection, payload: &RecipePayload) -> Result<i32, AppError> {
    let mut errors = payload.field_errors();
    merge_errors(&mut errors, reference_errors(conn, payload)?);
    into_result(errors)?;
    to_i32("cooking_time", payload.cooking_time)
}

fn join_ids(ids: &[i32]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn to_i32(field: &'static str, value: i64) -> Result<i32, AppError> {
    i32::try_from(value).map_err(|_| AppError::invalid(field, "value is out of range"))
}

/// Replaces the recipe's tags and ingredient lines with the payload's.
fn write_components(
    conn: &mut PgConnection,
    recipe_id: i32,
    payload: &RecipePayload,
) -> Result<(), AppError> {
    diesel::delete(recipe_tags::table.filter(recipe_tags::recipe_id.eq(recipe_id)))
        .execute(conn)?;
    diesel::delete(recipe_ingredients::table.filter(recipe_ingredients::recipe_id.eq(recipe_id)))
        .execute(conn)?;

    let tag_rows: Vec<NewRecipeTag> = payload
        .tags
        .iter()
        .map(|&tag_id| NewRecipeTag { recipe_id, tag_id })
        .collect();
    diesel::insert_into(recipe_tags::table)
        .values(&tag_rows)
        .execute(conn)?;

    let lines = payload
        .ingredients
        .iter()
        .map(|line| {
            Ok(NewRecipeIngredient {
                recipe_id,
                ingredient_id: line.id,
                amount: to_i32("ingredients", line.amount)?,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;
    diesel::insert_into(recipe_ingredients::table)
        .values(&lines)
        .execute(conn)?;
    Ok(())
}

pub fn create(
    conn: &mut PgConnection,
    author_id: i32,
    payload: &RecipePayload,
) -> Result<Recipe, AppError> {
    conn.transaction::<_, AppError, _>(|conn| {
        let cooking_time = check_payload(conn, payload)?;
        let recipe = diesel::insert_into(recipes::table)
            .values(NewRecipe {
                author_id,
                name: payload.name.trim(),
                image: &payload.image,
                text: &payload.text,
                cooking_time,
            })
            .returning(Recipe::as_returning())
            .get_result(conn)?;
        write_components(conn, recipe.id, payload)?;
        Ok(recipe)
    })
}

fn owned_recipe(conn: &mut PgConnection, user_id: i32, recipe_id: i32) -> Result<Recipe, AppError> {
    let recipe = get_recipe(conn, recipe_id)?;
    if recipe.author_id != user_id {
        return Err(AppError::PermissionDenied(
            "only the author can change this recipe",
        ));
    }
    Ok(recipe)
}

pub fn update(
    conn: &mut PgConnection,
    user_id: i32,
    recipe_id: i32,
    payload: &RecipePayload,
) -> Result<Recipe, AppError> {
    owned_recipe(conn, user_id, recipe_id)?;
    conn.transaction::<_, AppError, _>(|conn| {
        let cooking_time = check_payload(conn, payload)?;
        let recipe = diesel::update(recipes::table.find(recipe_id))
            .set(RecipeChanges {
                name: payload.name.trim(),
                image: &payload.image,
                text: &payload.text,
                cooking_time,
            })
            .returning(Recipe::as_returning())
            .get_result(conn)?;
        write_components(conn, recipe_id, payload)?;
        Ok(recipe)
    })
}

/// Deletes the recipe and everything hanging off it. Returns the recipe's
/// short code, if one was minted, so callers can drop cached redirects.
pub fn delete(
    conn: &mut PgConnection,
    user_id: i32,
    recipe_id: i32,
) -> Result<Option<String>, AppError> {
    owned_recipe(conn, user_id, recipe_id)?;
    conn.transaction::<_, AppError, _>(|conn| {
        let code = short_links::table
            .filter(short_links::recipe_id.eq(recipe_id))
            .select(short_links::short_code)
            .first::<String>(conn)
            .optional()?;
        diesel::delete(recipes::table.find(recipe_id)).execute(conn)?;
        Ok(code)
    })
}
