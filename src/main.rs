use std::error::Error;

use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use recipe_share::cache::Cache;
use recipe_share::config::ServerConfig;
use recipe_share::db::{establish_connection, run_migrations};
use recipe_share::handlers;

#[actix_rt::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = ServerConfig::from_env()?;

    info!("Connecting to the database...");
    let pool = establish_connection(&config.database_url)?;
    run_migrations(&pool)?;

    let cache = web::Data::new(Mutex::new(Cache::new(config.link_cache_size)));
    let bind_address = config.bind_address.clone();
    let pool = web::Data::new(pool);
    let config = web::Data::new(config);

    info!("Binding to {}", bind_address);
    HttpServer::new(move || {
        App::new()
            .app_data(pool.clone())
            .app_data(config.clone())
            .app_data(cache.clone())
            .configure(handlers::routes)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    info!("Server shut down");
    Ok(())
}
