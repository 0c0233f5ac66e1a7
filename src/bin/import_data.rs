use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde::de::DeserializeOwned;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use recipe_share::db::{establish_connection, run_migrations};
use recipe_share::models::{NewIngredient, NewTag};
use recipe_share::store::catalog;

type Result<T> = std::result::Result<T, Box<dyn Error + Send + Sync + 'static>>;

/// Loads reference data into the recipe database.
#[derive(Parser, Debug)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// JSON array of `{"name", "measurement_unit"}` objects.
    Ingredients {
        #[arg(long, default_value = "data/ingredients.json")]
        file: PathBuf,
    },
    /// JSON array of `{"name", "slug"}` objects.
    Tags {
        #[arg(long, default_value = "data/tags.json")]
        file: PathBuf,
    },
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn main() -> Result<()> {
    dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let database_url = std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;
    let pool = establish_connection(&database_url)?;
    run_migrations(&pool)?;
    let mut conn = pool.get()?;

    match args.commands {
        Commands::Ingredients { file } => {
            let existing = catalog::ingredient_names(&mut conn)?;
            let (new, skipped): (Vec<_>, Vec<_>) = read_json::<NewIngredient>(&file)?
                .into_iter()
                .partition(|i| !existing.contains(&i.name));
            for ingredient in &skipped {
                warn!("ingredient {:?} already exists", ingredient.name);
            }
            let added = catalog::insert_ingredients(&mut conn, &new)?;
            info!("added {} ingredients from {}", added, file.display());
        }
        Commands::Tags { file } => {
            let existing = catalog::tag_slugs(&mut conn)?;
            let (new, skipped): (Vec<_>, Vec<_>) = read_json::<NewTag>(&file)?
                .into_iter()
                .partition(|t| !existing.contains(&t.slug));
            for tag in &skipped {
                warn!("tag with slug {:?} already exists", tag.slug);
            }
            let added = catalog::insert_tags(&mut conn, &new)?;
            info!("added {} tags from {}", added, file.display());
        }
    }
    Ok(())
}
