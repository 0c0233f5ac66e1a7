use chrono::NaiveDateTime;
use diesel::prelude::*;

use super::schema::{
    ingredients, recipe_ingredients, recipe_tags, recipes, short_links, tags, users,
};

#[derive(Clone, Debug, PartialEq, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = tags)]
pub struct Tag {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

#[derive(Clone, Debug, Insertable, Deserialize)]
#[diesel(table_name = tags)]
pub struct NewTag {
    pub name: String,
    pub slug: String,
}

#[derive(Clone, Debug, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = ingredients)]
pub struct Ingredient {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Clone, Debug, Insertable, Deserialize)]
#[diesel(table_name = ingredients)]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Clone, Debug, PartialEq, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = recipes)]
pub struct Recipe {
    pub id: i32,
    pub author_id: i32,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = recipes)]
pub struct NewRecipe<'a> {
    pub author_id: i32,
    pub name: &'a str,
    pub image: &'a str,
    pub text: &'a str,
    pub cooking_time: i32,
}

#[derive(AsChangeset)]
#[diesel(table_name = recipes)]
pub struct RecipeChanges<'a> {
    pub name: &'a str,
    pub image: &'a str,
    pub text: &'a str,
    pub cooking_time: i32,
}

#[derive(Insertable)]
#[diesel(table_name = recipe_ingredients)]
pub struct NewRecipeIngredient {
    pub recipe_id: i32,
    pub ingredient_id: i32,
    pub amount: i32,
}

#[derive(Insertable)]
#[diesel(table_name = recipe_tags)]
pub struct NewRecipeTag {
    pub recipe_id: i32,
    pub tag_id: i32,
}

/// An ingredient line of a recipe, joined with its ingredient.
#[derive(Clone, Debug, PartialEq, Queryable, Serialize)]
pub struct IngredientLine {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Clone, Default, Debug, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = short_links)]
pub struct ShortLink {
    pub id: i32,
    pub recipe_id: i32,
    pub original_url: String,
    pub short_code: String,
}

#[derive(Clone, Debug, Insertable)]
#[diesel(table_name = short_links)]
pub struct NewShortLink {
    pub recipe_id: i32,
    pub original_url: String,
    pub short_code: String,
}
