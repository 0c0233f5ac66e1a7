//! Short links for recipes.
//!
//! A recipe gets at most one link, minted lazily the first time someone asks
//! for it. The code is derived from the recipe's canonical URL, so the first
//! candidate for a recipe is always the same; the unique constraints on the
//! `short_links` table settle collisions and concurrent mints.

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::{NewShortLink, ShortLink};
use crate::schema::{recipes, short_links};

pub const MAX_MINT_ATTEMPTS: u32 = 5;

#[derive(Debug)]
pub enum InsertError {
    /// A unique constraint rejected the row.
    Duplicate,
    Failed(AppError),
}

/// The queries minting and resolving need.
pub trait LinkStore {
    fn recipe_exists(&mut self, recipe_id: i32) -> Result<bool, AppError>;
    fn link_for_recipe(&mut self, recipe_id: i32) -> Result<Option<ShortLink>, AppError>;
    fn link_for_code(&mut self, code: &str) -> Result<Option<ShortLink>, AppError>;
    fn insert_link(&mut self, link: &NewShortLink) -> Result<ShortLink, InsertError>;
}

impl LinkStore for PgConnection {
    fn recipe_exists(&mut self, recipe_id: i32) -> Result<bool, AppError> {
        let exists = diesel::select(diesel::dsl::exists(recipes::table.find(recipe_id)))
            .get_result::<bool>(self)?;
        Ok(exists)
    }

    fn link_for_recipe(&mut self, recipe_id: i32) -> Result<Option<ShortLink>, AppError> {
        let link = short_links::table
            .filter(short_links::recipe_id.eq(recipe_id))
            .select(ShortLink::as_select())
            .first(self)
            .optional()?;
        Ok(link)
    }

    fn link_for_code(&mut self, code: &str) -> Result<Option<ShortLink>, AppError> {
        let link = short_links::table
            .filter(short_links::short_code.eq(code))
            .select(ShortLink::as_select())
            .first(self)
            .optional()?;
        Ok(link)
    }

    fn insert_link(&mut self, link: &NewShortLink) -> Result<ShortLink, InsertError> {
        diesel::insert_into(short_links::table)
            .values(link)
            .returning(ShortLink::as_returning())
            .get_result(self)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    InsertError::Duplicate
                }
                e => InsertError::Failed(e.into()),
            })
    }
}

/// Hex SHA-256 of the URL, truncated to `len`. Later attempts salt the
/// URL with the attempt number.
pub fn derive_code(url: &str, attempt: u32, len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    if attempt > 0 {
        hasher.update(format!("#{}", attempt).as_bytes());
    }
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(len);
    hex
}

/// Returns the recipe's link, creating it if this is the first request.
pub fn mint_or_fetch<S: LinkStore>(
    store: &mut S,
    recipe_id: i32,
    recipe_url: &str,
    code_len: usize,
) -> Result<ShortLink, AppError> {
    if let Some(link) = store.link_for_recipe(recipe_id)? {
        return Ok(link);
    }
    if !store.recipe_exists(recipe_id)? {
        return Err(AppError::NotFound("recipe"));
    }

    for attempt in 0..MAX_MINT_ATTEMPTS {
        let new_link = NewShortLink {
            recipe_id,
            original_url: recipe_url.to_string(),
            short_code: derive_code(recipe_url, attempt, code_len),
        };
        match store.insert_link(&new_link) {
            Ok(link) => {
                info!("minted short code {} for recipe {}", link.short_code, recipe_id);
                return Ok(link);
            }
            Err(InsertError::Duplicate) => {
                // Lost a race with another mint for this recipe.
                if let Some(link) = store.link_for_recipe(recipe_id)? {
                    return Ok(link);
                }
                warn!(
                    "short code {} is taken, recipe {} attempt {}",
                    new_link.short_code, recipe_id, attempt
                );
            }
            Err(InsertError::Failed(e)) => return Err(e),
        }
    }

    Err(AppError::Conflict("could not allocate a unique short code"))
}

pub fn resolve<S: LinkStore>(store: &mut S, code: &str) -> Result<ShortLink, AppError> {
    store
        .link_for_code(code)?
        .ok_or(AppError::NotFound("short link"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Default)]
    struct MemoryStore {
        recipes: HashSet<i32>,
        links: Vec<ShortLink>,
        /// Row another writer commits right before our next insert.
        racing: Option<NewShortLink>,
        inserts: usize,
    }

    impl MemoryStore {
        fn with_recipes(ids: &[i32]) -> Self {
            MemoryStore {
                recipes: ids.iter().copied().collect(),
                ..Default::default()
            }
        }

        fn put(&mut self, link: &NewShortLink) -> Result<ShortLink, InsertError> {
            let taken = self.links.iter().any(|l| {
                l.recipe_id == link.recipe_id
                    || l.short_code == link.short_code
                    || l.original_url == link.original_url
            });
            if taken {
                return Err(InsertError::Duplicate);
            }
            let row = ShortLink {
                id: self.links.len() as i32 + 1,
                recipe_id: link.recipe_id,
                original_url: link.original_url.clone(),
                short_code: link.short_code.clone(),
            };
            self.links.push(row.clone());
            Ok(row)
        }
    }

    impl LinkStore for MemoryStore {
        fn recipe_exists(&mut self, recipe_id: i32) -> Result<bool, AppError> {
            Ok(self.recipes.contains(&recipe_id))
        }

        fn link_for_recipe(&mut self, recipe_id: i32) -> Result<Option<ShortLink>, AppError> {
            Ok(self.links.iter().find(|l| l.recipe_id == recipe_id).cloned())
        }

        fn link_for_code(&mut self, code: &str) -> Result<Option<ShortLink>, AppError> {
            Ok(self.links.iter().find(|l| l.short_code == code).cloned())
        }

        fn insert_link(&mut self, link: &NewShortLink) -> Result<ShortLink, InsertError> {
            self.inserts += 1;
            if let Some(winner) = self.racing.take() {
                self.put(&winner)?;
            }
            self.put(link)
        }
    }

    fn url(id: i32) -> String {
        format!("https://food.example.com/recipes/{}", id)
    }

    #[test]
    fn codes_are_stable_and_sized() {
        let a = derive_code(&url(42), 0, 10);
        assert_eq!(a.len(), 10);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, derive_code(&url(42), 0, 10));
        assert_ne!(a, derive_code(&url(42), 1, 10));
        assert_ne!(a, derive_code(&url(43), 0, 10));
        assert_eq!(derive_code(&url(42), 0, 20).len(), 20);
    }

    #[test]
    fn code_is_a_hex_sha256_prefix() {
        assert_eq!(derive_code("abc", 0, 10), "ba7816bf8f");
        assert_eq!(derive_code("abc", 0, 64).len(), 64);
    }

    #[test]
    fn minting_twice_returns_the_same_code() {
        let mut store = MemoryStore::with_recipes(&[42]);
        let first = mint_or_fetch(&mut store, 42, &url(42), 10).unwrap();
        let second = mint_or_fetch(&mut store, 42, &url(42), 10).unwrap();
        assert_eq!(first.short_code, second.short_code);
        assert_eq!(store.links.len(), 1);
        assert_eq!(store.inserts, 1);
    }

    #[test]
    fn distinct_recipes_get_distinct_codes() {
        let ids: Vec<i32> = (1..=50).collect();
        let mut store = MemoryStore::with_recipes(&ids);
        let codes: HashSet<String> = ids
            .iter()
            .map(|&id| mint_or_fetch(&mut store, id, &url(id), 6).unwrap().short_code)
            .collect();
        assert_eq!(codes.len(), ids.len());
    }

    #[test]
    fn missing_recipe_creates_nothing() {
        let mut store = MemoryStore::with_recipes(&[1]);
        let err = mint_or_fetch(&mut store, 2, &url(2), 10).unwrap_err();
        assert!(matches!(err, AppError::NotFound("recipe")));
        assert!(store.links.is_empty());
    }

    #[test]
    fn collision_moves_to_the_next_candidate() {
        let mut store = MemoryStore::with_recipes(&[1, 2]);
        store.links.push(ShortLink {
            id: 99,
            recipe_id: 2,
            original_url: url(2),
            short_code: derive_code(&url(1), 0, 10),
        });
        let link = mint_or_fetch(&mut store, 1, &url(1), 10).unwrap();
        assert_eq!(link.short_code, derive_code(&url(1), 1, 10));
        assert_eq!(store.inserts, 2);
    }

    #[test]
    fn losing_a_race_returns_the_winner() {
        let mut store = MemoryStore::with_recipes(&[7]);
        store.racing = Some(NewShortLink {
            recipe_id: 7,
            original_url: url(7),
            short_code: "winner0001".to_string(),
        });
        let link = mint_or_fetch(&mut store, 7, &url(7), 10).unwrap();
        assert_eq!(link.short_code, "winner0001");
        assert_eq!(store.links.len(), 1);
    }

    #[test]
    fn gives_up_after_bounded_attempts() {
        let mut store = MemoryStore::with_recipes(&[1]);
        for attempt in 0..MAX_MINT_ATTEMPTS {
            store.links.push(ShortLink {
                id: attempt as i32 + 100,
                recipe_id: 1000 + attempt as i32,
                original_url: url(1000 + attempt as i32),
                short_code: derive_code(&url(1), attempt, 10),
            });
        }
        let err = mint_or_fetch(&mut store, 1, &url(1), 10).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.inserts, MAX_MINT_ATTEMPTS as usize);
    }

    #[test]
    fn resolve_finds_minted_links_only() {
        let mut store = MemoryStore::with_recipes(&[42]);
        let link = mint_or_fetch(&mut store, 42, &url(42), 10).unwrap();
        let found = resolve(&mut store, &link.short_code).unwrap();
        assert_eq!(found.original_url, url(42));
        assert!(matches!(
            resolve(&mut store, "nope"),
            Err(AppError::NotFound(_))
        ));
    }
}
