//! API routes for the huntboard server.

pub mod bounties;
pub mod files;
pub mod prices;
pub mod screeners;
pub mod scoring_jobs;
pub mod submissions;
pub mod suggestions;

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::logstream::LogStream;
use crate::objectstore::ObjectStore;
use crate::pricefeed::PriceFeed;
use crate::scoring::OutcomeStrategy;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub prices: Arc<PriceFeed>,
    pub objects: Arc<ObjectStore>,
    pub logs: Arc<LogStream>,
    /// Policy combining scoring-job outcomes into a submission status.
    pub strategy: Arc<dyn OutcomeStrategy>,
}

/// Creates the main API router with all routes mounted.
pub fn create_router(state: AppState) -> Router {
    let uploads = Router::new()
        .route("/uploads/{*path}", get(files::serve_upload))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health))
        .merge(uploads)
        .nest("/api/v1", api_v1_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Creates the v1 API routes.
fn api_v1_routes(state: AppState) -> Router {
    Router::new()
        .nest("/bounties", bounties::router(state.clone()))
        .nest("/submissions", submissions::router(state.clone()))
        .nest("/scoring-jobs", scoring_jobs::router(state.clone()))
        .nest("/screeners", screeners::router(state.clone()))
        .nest("/files", files::router(state.clone()))
        .nest("/suggestions", suggestions::router(state.clone()))
        .nest("/prices", prices::router(state))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "healthy": true,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
