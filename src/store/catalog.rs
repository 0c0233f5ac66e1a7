use std::collections::HashSet;

use diesel::pg::PgConnection;
use diesel::prelude::*;

use crate::error::AppError;
use crate::models::{Ingredient, NewIngredient, NewTag, Tag};
use crate::schema::{ingredients, tags};

pub fn list_tags(conn: &mut PgConnection) -> Result<Vec<Tag>, AppError> {
    let rows = tags::table
        .order(tags::id)
        .select(Tag::as_select())
        .load(conn)?;
    Ok(rows)
}

pub fn get_tag(conn: &mut PgConnection, tag_id: i32) -> Result<Tag, AppError> {
    tags::table
        .find(tag_id)
        .select(Tag::as_select())
        .first(conn)
        .optional()?
        .ok_or(AppError::NotFound("tag"))
}

/// Escapes LIKE wildcards so the prefix matches literally.
pub fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub fn search_ingredients(
    conn: &mut PgConnection,
    prefix: Option<&str>,
) -> Result<Vec<Ingredient>, AppError> {
    let mut query = ingredients::table
        .select(Ingredient::as_select())
        .order(ingredients::name)
        .into_boxed();
    if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
        query = query.filter(ingredients::name.ilike(like_prefix(prefix)));
    }
    Ok(query.load(conn)?)
}

pub fn get_ingredient(conn: &mut PgConnection, ingredient_id: i32) -> Result<Ingredient, AppError> {
    ingredients::table
        .find(ingredient_id)
        .select(Ingredient::as_select())
        .first(conn)
        .optional()?
        .ok_or(AppError::NotFound("ingredient"))
}

pub fn missing_tags(conn: &mut PgConnection, ids: &[i32]) -> Result<Vec<i32>, AppError> {
    let found: HashSet<i32> = tags::table
        .filter(tags::id.eq_any(ids))
        .select(tags::id)
        .load::<i32>(conn)?
        .into_iter()
        .collect();
    Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
}

pub fn missing_ingredients(conn: &mut PgConnection, ids: &[i32]) -> Result<Vec<i32>, AppError> {
    let found: HashSet<i32> = ingredients::table
        .filter(ingredients::id.eq_any(ids))
        .select(ingredients::id)
        .load::<i32>(conn)?
        .into_iter()
        .collect();
    Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
}

pub fn ingredient_names(conn: &mut PgConnection) -> Result<HashSet<String>, AppError> {
    let names = ingredients::table
        .select(ingredients::name)
        .load::<String>(conn)?;
    Ok(names.into_iter().collect())
}

pub fn tag_slugs(conn: &mut PgConnection) -> Result<HashSet<String>, AppError> {
    let slugs = tags::table.select(tags::slug).load::<String>(conn)?;
    Ok(slugs.into_iter().collect())
}

/// Inserts the rows in one transaction, skipping ones that conflict.
/// Returns how many were added.
pub fn insert_ingredients(
    conn: &mut PgConnection,
    rows: &[NewIngredient],
) -> Result<usize, AppError> {
    conn.transaction::<_, AppError, _>(|conn| {
        let added = diesel::insert_into(ingredients::table)
            .values(rows)
            .on_conflict_do_nothing()
            .execute(conn)?;
        Ok(added)
    })
}

pub fn insert_tags(conn: &mut PgConnection, rows: &[NewTag]) -> Result<usize, AppError> {
    conn.transaction::<_, AppError, _>(|conn| {
        let added = diesel::insert_into(tags::table)
            .values(rows)
            .on_conflict_do_nothing()
            .execute(conn)?;
        Ok(added)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_pattern_escapes_wildcards() {
        assert_eq!(like_prefix("fl"), "fl%");
        assert_eq!(like_prefix("100%_"), "100\\%\\_%");
        assert_eq!(like_prefix("a\\b"), "a\\\\b%");
        assert_eq!(like_prefix(""), "%");
    }
}
