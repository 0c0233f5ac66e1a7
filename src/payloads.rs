//! JSON shapes of requests and responses, and the checks run on request
//! bodies before anything touches the store.

use std::collections::HashSet;

use chrono::NaiveDateTime;

use crate::error::{AppError, FieldErrors};
use crate::models::{IngredientLine, Recipe, Tag, User};

pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;
const MAX_RECIPE_NAME: usize = 256;

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// `(limit, offset)` clamped to sane values.
    pub fn bounds(&self) -> (i64, i64) {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .max(1)
            .min(MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub results: Vec<T>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserView {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub is_subscribed: bool,
}

impl UserView {
    pub fn new(user: User, is_subscribed: bool) -> Self {
        UserView {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            avatar: user.avatar,
            is_subscribed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecipeShort {
    pub id: i32,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl From<Recipe> for RecipeShort {
    fn from(recipe: Recipe) -> Self {
        RecipeShort {
            id: recipe.id,
            name: recipe.name,
            image: recipe.image,
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthorWithRecipes {
    #[serde(flatten)]
    pub user: UserView,
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: i64,
}

#[derive(Debug, Serialize)]
pub struct RecipeView {
    pub id: i32,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<IngredientLine>,
    pub author: UserView,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: NaiveDateTime,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

#[derive(Serialize)]
pub struct ShortLinkView {
    #[serde(rename = "short-link")]
    pub short_link: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AvatarPayload {
    #[serde(default)]
    pub avatar: String,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct RecipesLimit {
    pub recipes_limit: Option<i64>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct SubscriptionsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub recipes_limit: Option<i64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct IngredientSearch {
    pub name: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct IngredientAmount {
    pub id: i32,
    pub amount: i64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RecipePayload {
    pub ingredients: Vec<IngredientAmount>,
    pub tags: Vec<i32>,
    pub image: String,
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
}

impl RecipePayload {
    pub fn validate(&self) -> Result<(), AppError> {
        into_result(self.field_errors())
    }

    /// Shape checks, every failure kept. Whether the referenced tags and
    /// ingredients exist is checked against the store separately.
    pub fn field_errors(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        let mut push = |field: &'static str, message: String| {
            errors.entry(field).or_insert_with(Vec::new).push(message);
        };

        let name = self.name.trim();
        if name.is_empty() {
            push("name", "must not be empty".to_string());
        } else if name.chars().count() > MAX_RECIPE_NAME {
            push(
                "name",
                format!("must be at most {} characters", MAX_RECIPE_NAME),
            );
        }
        if self.text.trim().is_empty() {
            push("text", "must not be empty".to_string());
        }
        if self.image.trim().is_empty() {
            push("image", "must not be empty".to_string());
        }
        if self.cooking_time < 1 {
            push("cooking_time", "must be at least 1 minute".to_string());
        } else if self.cooking_time > i64::from(i32::MAX) {
            push("cooking_time", "value is out of range".to_string());
        }

        if self.tags.is_empty() {
            push("tags", "must not be empty".to_string());
        } else if let Some(id) = first_duplicate(self.tags.iter().copied()) {
            push("tags", format!("tag {} is listed more than once", id));
        }

        if self.ingredients.is_empty() {
            push("ingredients", "must not be empty".to_string());
        } else {
            if let Some(id) = first_duplicate(self.ingredients.iter().map(|i| i.id)) {
                push(
                    "ingredients",
                    format!("ingredient {} is listed more than once", id),
                );
            }
            for line in &self.ingredients {
                if line.amount < 1 {
                    push(
                        "ingredients",
                        format!("amount of ingredient {} must be at least 1", line.id),
                    );
                } else if line.amount > i64::from(i32::MAX) {
                    push(
                        "ingredients",
                        format!("amount of ingredient {} is out of range", line.id),
                    );
                }
            }
        }

        errors
    }
}

/// Folds `more` into `errors`, keeping every message.
pub fn merge_errors(errors: &mut FieldErrors, more: FieldErrors) {
    for (field, messages) in more {
        errors.entry(field).or_insert_with(Vec::new).extend(messages);
    }
}

pub fn into_result(errors: FieldErrors) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

fn first_duplicate<I: IntoIterator<Item = i32>>(ids: I) -> Option<i32> {
    let mut seen = HashSet::new();
    ids.into_iter().find(|id| !seen.insert(*id))
}

/// Query parameters of the recipe list. `tags` may repeat, so the query
/// string is read as raw pairs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecipeFilter {
    pub author: Option<i32>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub page: (i64, i64),
}

impl RecipeFilter {
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, AppError> {
        let mut filter = RecipeFilter::default();
        let mut pagination = Pagination::default();
        for (key, value) in pairs {
            match key.as_str() {
                "author" => filter.author = Some(parse_param("author", value)?),
                "tags" => filter.tags.push(value.clone()),
                "is_favorited" => filter.is_favorited = is_truthy(value),
                "is_in_shopping_cart" => filter.is_in_shopping_cart = is_truthy(value),
                "limit" => pagination.limit = Some(parse_param("limit", value)?),
                "offset" => pagination.offset = Some(parse_param("offset", value)?),
                _ => {}
            }
        }
        filter.page = pagination.bounds();
        Ok(filter)
    }
}

fn parse_param<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, AppError> {
    value
        .parse()
        .map_err(|_| AppError::invalid(field, format!("{:?} is not a valid number", value)))
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "True")
}
