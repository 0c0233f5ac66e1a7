use std::collections::BTreeMap;
use std::fmt::Write;

use diesel::pg::PgConnection;
use diesel::prelude::*;

use crate::error::AppError;
use crate::schema::{ingredients, recipe_ingredients, shopping_cart};

pub const FILENAME: &str = "shopping_cart.txt";
const HEADER: &str = "Shopping list:";

/// One ingredient line of one recipe in the cart.
#[derive(Clone, Debug, PartialEq, Queryable)]
pub struct CartLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShoppingItem {
    pub name: String,
    pub measurement_unit: String,
    pub total: i64,
}

pub fn cart_lines(conn: &mut PgConnection, user_id: i32) -> Result<Vec<CartLine>, AppError> {
    let lines = recipe_ingredients::table
        .inner_join(ingredients::table)
        .inner_join(
            shopping_cart::table.on(shopping_cart::recipe_id.eq(recipe_ingredients::recipe_id)),
        )
        .filter(shopping_cart::user_id.eq(user_id))
        .select((
            ingredients::name,
            ingredients::measurement_unit,
            recipe_ingredients::amount,
        ))
        .load::<CartLine>(conn)?;
    Ok(lines)
}

/// Merges lines of the same ingredient, sorted by name ignoring case, then
/// unit.
pub fn aggregate<I>(lines: I) -> Vec<ShoppingItem>
where
    I: IntoIterator<Item = CartLine>,
{
    // The lowercased name only orders; (name, unit) is the identity.
    let mut totals: BTreeMap<(String, String, String), i64> = BTreeMap::new();
    for line in lines {
        *totals
            .entry((line.name.to_lowercase(), line.name, line.measurement_unit))
            .or_insert(0) += i64::from(line.amount);
    }
    totals
        .into_iter()
        .map(|((_, name, measurement_unit), total)| ShoppingItem {
            name,
            measurement_unit,
            total,
        })
        .collect()
}

pub fn render(items: &[ShoppingItem]) -> String {
    let mut text = format!("{}\n\n", HEADER);
    for item in items {
        // Writing to a String cannot fail.
        let _ = writeln!(text, "{} ({}) - {}", item.name, item.measurement_unit, item.total);
    }
    text
}
