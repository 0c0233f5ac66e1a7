use std::collections::HashSet;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::error::AppError;
use crate::models::{Recipe, User};
use crate::payloads::{AuthorWithRecipes, RecipeShort, UserView};
use crate::schema::{recipes, subscriptions, users};

pub fn get_user(conn: &mut PgConnection, user_id: i32) -> Result<User, AppError> {
    users::table
        .find(user_id)
        .select(User::as_select())
        .first(conn)
        .optional()?
        .ok_or(AppError::NotFound("user"))
}

pub fn list_users(
    conn: &mut PgConnection,
    limit: i64,
    offset: i64,
) -> Result<(Vec<User>, i64), AppError> {
    let count = users::table.count().get_result::<i64>(conn)?;
    let rows = users::table
        .order(users::username)
        .limit(limit)
        .offset(offset)
        .select(User::as_select())
        .load(conn)?;
    Ok((rows, count))
}

/// Which of `author_ids` the viewer follows.
pub fn followed_among(
    conn: &mut PgConnection,
    viewer: Option<i32>,
    author_ids: &[i32],
) -> Result<HashSet<i32>, AppError> {
    let viewer = match viewer {
        Some(id) if !author_ids.is_empty() => id,
        _ => return Ok(HashSet::new()),
    };
    let followed = subscriptions::table
        .filter(subscriptions::user_id.eq(viewer))
        .filter(subscriptions::author_id.eq_any(author_ids))
        .select(subscriptions::author_id)
        .load::<i32>(conn)?;
    Ok(followed.into_iter().collect())
}

pub fn user_views(
    conn: &mut PgConnection,
    viewer: Option<i32>,
    users: Vec<User>,
) -> Result<Vec<UserView>, AppError> {
    let ids: Vec<i32> = users.iter().map(|u| u.id).collect();
    let followed = followed_among(conn, viewer, &ids)?;
    Ok(users
        .into_iter()
        .map(|u| {
            let subscribed = followed.contains(&u.id);
            UserView::new(u, subscribed)
        })
        .collect())
}

pub fn user_view(
    conn: &mut PgConnection,
    viewer: Option<i32>,
    user_id: i32,
) -> Result<UserView, AppError> {
    let user = get_user(conn, user_id)?;
    let mut views = user_views(conn, viewer, vec![user])?;
    views.pop().ok_or(AppError::NotFound("user"))
}

pub fn set_avatar(
    conn: &mut PgConnection,
    user_id: i32,
    avatar: Option<&str>,
) -> Result<User, AppError> {
    let user = diesel::update(users::table.find(user_id))
        .set(users::avatar.eq(avatar))
        .returning(User::as_returning())
        .get_result(conn)?;
    Ok(user)
}

pub fn author_recipes(
    conn: &mut PgConnection,
    author_id: i32,
    recipes_limit: Option<i64>,
) -> Result<(Vec<Recipe>, i64), AppError> {
    let count = recipes::table
        .filter(recipes::author_id.eq(author_id))
        .count()
        .get_result::<i64>(conn)?;
    let mut query = recipes::table
        .filter(recipes::author_id.eq(author_id))
        .order((recipes::pub_date.desc(), recipes::id.desc()))
        .select(Recipe::as_select())
        .into_boxed();
    if let Some(limit) = recipes_limit {
        query = query.limit(limit.max(0));
    }
    Ok((query.load(conn)?, count))
}

/// An author as shown in subscription responses, from the viewer's side.
pub fn author_with_recipes(
    conn: &mut PgConnection,
    viewer: Option<i32>,
    author: User,
    recipes_limit: Option<i64>,
) -> Result<AuthorWithRecipes, AppError> {
    let (recipes, recipes_count) = author_recipes(conn, author.id, recipes_limit)?;
    let subscribed = !followed_among(conn, viewer, &[author.id])?.is_empty();
    Ok(AuthorWithRecipes {
        user: UserView::new(author, subscribed),
        recipes: recipes.into_iter().map(RecipeShort::from).collect(),
        recipes_count,
    })
}

pub fn check_not_self(user_id: i32, author_id: i32) -> Result<(), AppError> {
    if author_id == user_id {
        return Err(AppError::invalid(
            "author",
            "you cannot subscribe to yourself",
        ));
    }
    Ok(())
}

pub fn subscribe(conn: &mut PgConnection, user_id: i32, author_id: i32) -> Result<User, AppError> {
    check_not_self(user_id, author_id)?;
    let author = get_user(conn, author_id)?;
    diesel::insert_into(subscriptions::table)
        .values((
            subscriptions::user_id.eq(user_id),
            subscriptions::author_id.eq(author_id),
        ))
        .execute(conn)
        .map_err(|e| match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::Conflict("already subscribed to this user")
            }
            e => e.into(),
        })?;
    Ok(author)
}

pub fn unsubscribe(conn: &mut PgConnection, user_id: i32, author_id: i32) -> Result<(), AppError> {
    get_user(conn, author_id)?;
    let deleted = diesel::delete(
        subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .filter(subscriptions::author_id.eq(author_id)),
    )
    .execute(conn)?;
    if deleted == 0 {
        return Err(AppError::NotFound("subscription"));
    }
    Ok(())
}

/// Authors the user follows, ordered by username.
pub fn followed_authors(
    conn: &mut PgConnection,
    user_id: i32,
    limit: i64,
    offset: i64,
) -> Result<(Vec<User>, i64), AppError> {
    let count = subscriptions::table
        .filter(subscriptions::user_id.eq(user_id))
        .count()
        .get_result::<i64>(conn)?;
    let authors = users::table
        .inner_join(subscriptions::table.on(subscriptions::author_id.eq(users::id)))
        .filter(subscriptions::user_id.eq(user_id))
        .order(users::username)
        .limit(limit)
        .offset(offset)
        .select(User::as_select())
        .load(conn)?;
    Ok((authors, count))
}
