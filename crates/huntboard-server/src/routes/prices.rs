//! Fiat price endpoint for reward denominations.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::AppError;
use crate::pricefeed::PriceSnapshot;
use crate::routes::AppState;

/// Creates the prices router.
pub fn router(state: AppState) -> Router {
    Router::new().route("/", get(get_prices)).with_state(state)
}

/// Current cached prices; served stale when the feed is unreachable.
async fn get_prices(State(state): State<AppState>) -> Result<Json<PriceSnapshot>, AppError> {
    let snapshot = state.prices.current().await?;
    Ok(Json(snapshot))
}
