//! Screener registry endpoints. Administrator only.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Requester;
use crate::error::AppError;
use crate::models::{NewScreener, Screener};
use crate::routes::AppState;

/// Creates the screeners router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_screeners).post(register_screener))
        .with_state(state)
}

const SCREENER_COLUMNS: &str = "id, name, identity_key, endpoint, active, priority, capacity, \
     current_load, created_at";

async fn list_screeners(
    State(state): State<AppState>,
    requester: Requester,
) -> Result<Json<Vec<Screener>>, AppError> {
    requester.require_admin()?;

    let screeners: Vec<Screener> = sqlx::query_as(&format!(
        "SELECT {} FROM screeners ORDER BY priority DESC, name",
        SCREENER_COLUMNS
    ))
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(screeners))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterScreenerRequest {
    pub name: String,
    pub identity_key: String,
    pub endpoint: String,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub capacity: Option<i32>,
}

async fn register_screener(
    State(state): State<AppState>,
    requester: Requester,
    Json(request): Json<RegisterScreenerRequest>,
) -> Result<Json<Screener>, AppError> {
    requester.require_admin()?;

    if request.name.trim().is_empty() {
        return Err(AppError::BadRequest("Screener name cannot be empty".to_string()));
    }
    if request.identity_key.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Screener identity key cannot be empty".to_string(),
        ));
    }
    if request.endpoint.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Screener endpoint cannot be empty".to_string(),
        ));
    }
    let capacity = request.capacity.unwrap_or(1);
    if capacity < 1 {
        return Err(AppError::BadRequest(
            "Screener capacity must be at least 1".to_string(),
        ));
    }

    let new_screener = NewScreener {
        name: request.name.trim().to_string(),
        identity_key: request.identity_key.trim().to_string(),
        endpoint: request.endpoint.trim().to_string(),
        priority: request.priority.unwrap_or(0),
        capacity,
    };

    let screener: Screener = sqlx::query_as(&format!(
        "INSERT INTO screeners (id, name, identity_key, endpoint, priority, capacity) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {}",
        SCREENER_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(&new_screener.name)
    .bind(&new_screener.identity_key)
    .bind(&new_screener.endpoint)
    .bind(new_screener.priority)
    .bind(new_screener.capacity)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("A screener with this identity key already exists".to_string())
        }
        _ => AppError::from(e),
    })?;

    tracing::info!(screener_id = %screener.id, name = %screener.name, "Screener registered");
    Ok(Json(screener))
}
