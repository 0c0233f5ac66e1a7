//! Favorites and shopping-cart entries: (user, recipe) pairs that are only
//! ever created or deleted.

use std::collections::HashSet;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::error::AppError;
use crate::models::Recipe;
use crate::schema::{favorites, shopping_cart};
use crate::store::recipes::get_recipe;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    fn duplicate(self) -> AppError {
        match self {
            RecipeList::Favorites => AppError::Conflict("recipe is already in favorites"),
            RecipeList::ShoppingCart => AppError::Conflict("recipe is already in the shopping cart"),
        }
    }

    fn missing(self) -> AppError {
        match self {
            RecipeList::Favorites => AppError::NotFound("favorite"),
            RecipeList::ShoppingCart => AppError::NotFound("shopping cart entry"),
        }
    }
}

pub fn add(
    conn: &mut PgConnection,
    list: RecipeList,
    user_id: i32,
    recipe_id: i32,
) -> Result<Recipe, AppError> {
    let recipe = get_recipe(conn, recipe_id)?;
    let inserted = match list {
        RecipeList::Favorites => diesel::insert_into(favorites::table)
            .values((
                favorites::user_id.eq(user_id),
                favorites::recipe_id.eq(recipe_id),
            ))
            .execute(conn),
        RecipeList::ShoppingCart => diesel::insert_into(shopping_cart::table)
            .values((
                shopping_cart::user_id.eq(user_id),
                shopping_cart::recipe_id.eq(recipe_id),
            ))
            .execute(conn),
    };
    match inserted {
        Ok(_) => Ok(recipe),
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            Err(list.duplicate())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn remove(
    conn: &mut PgConnection,
    list: RecipeList,
    user_id: i32,
    recipe_id: i32,
) -> Result<(), AppError> {
    get_recipe(conn, recipe_id)?;
    let deleted = match list {
        RecipeList::Favorites => diesel::delete(
            favorites::table
                .filter(favorites::user_id.eq(user_id))
                .filter(favorites::recipe_id.eq(recipe_id)),
        )
        .execute(conn)?,
        RecipeList::ShoppingCart => diesel::delete(
            shopping_cart::table
                .filter(shopping_cart::user_id.eq(user_id))
                .filter(shopping_cart::recipe_id.eq(recipe_id)),
        )
        .execute(conn)?,
    };
    if deleted == 0 {
        return Err(list.missing());
    }
    Ok(())
}

/// Which of `recipe_ids` are in the viewer's list.
pub fn contained(
    conn: &mut PgConnection,
    list: RecipeList,
    viewer: Option<i32>,
    recipe_ids: &[i32],
) -> Result<HashSet<i32>, AppError> {
    let user_id = match viewer {
        Some(id) if !recipe_ids.is_empty() => id,
        _ => return Ok(HashSet::new()),
    };
    let ids = match list {
        RecipeList::Favorites => favorites::table
            .filter(favorites::user_id.eq(user_id))
            .filter(favorites::recipe_id.eq_any(recipe_ids))
            .select(favorites::recipe_id)
            .load::<i32>(conn)?,
        RecipeList::ShoppingCart => shopping_cart::table
            .filter(shopping_cart::user_id.eq(user_id))
            .filter(shopping_cart::recipe_id.eq_any(recipe_ids))
            .select(shopping_cart::recipe_id)
            .load::<i32>(conn)?,
    };
    Ok(ids.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{ingredient, recipe, user, with_db};

    #[test]
    fn adding_twice_conflicts() {
        for list in [RecipeList::Favorites, RecipeList::ShoppingCart] {
            with_db(|conn| {
                let cook = user(conn, "rel_cook")?;
                let eater = user(conn, "rel_eater")?;
                let salt = ingredient(conn, "rel salt", "g")?;
                let soup = recipe(conn, cook, "Soup", &[(salt, 5)])?;
                assert_eq!(add(conn, list, eater, soup.id)?.id, soup.id);
                assert!(matches!(
                    add(conn, list, eater, soup.id),
                    Err(AppError::Conflict(_))
                ));
                Ok(())
            });
        }
    }

    #[test]
    fn removing_an_absent_entry_is_not_found() {
        for list in [RecipeList::Favorites, RecipeList::ShoppingCart] {
            with_db(|conn| {
                let cook = user(conn, "rel_cook")?;
                let salt = ingredient(conn, "rel salt", "g")?;
                let soup = recipe(conn, cook, "Soup", &[(salt, 5)])?;
                assert!(matches!(
                    remove(conn, list, cook, soup.id),
                    Err(AppError::NotFound(_))
                ));
                add(conn, list, cook, soup.id)?;
                remove(conn, list, cook, soup.id)?;
                assert!(contained(conn, list, Some(cook), &[soup.id])?.is_empty());
                Ok(())
            });
        }
    }

    #[test]
    fn unknown_recipe_is_not_found() {
        with_db(|conn| {
            let eater = user(conn, "rel_eater")?;
            assert!(matches!(
                add(conn, RecipeList::Favorites, eater, -1),
                Err(AppError::NotFound("recipe"))
            ));
            Ok(())
        });
    }
}
