//! Huntboard Server
//!
//! REST API for the bounty hunter marketplace.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use huntboard_server::logstream::LogStream;
use huntboard_server::objectstore::ObjectStore;
use huntboard_server::pricefeed::PriceFeed;
use huntboard_server::scoring::MeanScoreThreshold;
use huntboard_server::{create_router, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Huntboard server");

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

    let pool = db::create_pool(&database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database ready");

    let host = std::env::var("HUNTBOARD_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("HUNTBOARD_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let pricefeed_url = std::env::var("PRICEFEED_URL")
        .unwrap_or_else(|_| "https://api.coingecko.com/api/v3/simple/price".to_string());
    let coin_ids = std::env::var("PRICEFEED_COINS")
        .unwrap_or_else(|_| "bitcoin,ethereum,usd-coin".to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let uploads_dir = std::env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_string());
    let file_url_base = std::env::var("FILE_URL_BASE")
        .unwrap_or_else(|_| "http://localhost:9000/huntboard".to_string());
    let signing_secret = std::env::var("FILE_SIGNING_SECRET")
        .map_err(|_| anyhow::anyhow!("FILE_SIGNING_SECRET environment variable is required"))?;

    let logstream_url =
        std::env::var("LOGSTREAM_URL").unwrap_or_else(|_| "http://localhost:3100".to_string());

    let state = AppState {
        pool,
        prices: Arc::new(PriceFeed::new(pricefeed_url, coin_ids, "usd".to_string())),
        objects: Arc::new(ObjectStore::new(
            file_url_base,
            signing_secret,
            PathBuf::from(uploads_dir),
        )),
        logs: Arc::new(LogStream::new(logstream_url)),
        strategy: Arc::new(MeanScoreThreshold::default()),
    };

    let app = create_router(state);
    let addr = format!("{}:{}", host, port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
