//! Suggested bounty endpoints.
//!
//! Users propose bounties; admins review them. Approval materializes a
//! draft bounty and links it back to the suggestion in one transaction.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Requester;
use crate::error::AppError;
use crate::models::{SuggestedBounty, SuggestionStatus};
use crate::routes::AppState;

/// Creates the suggestions router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_suggestions).post(create_suggestion))
        .route("/{id}/approve", post(approve_suggestion))
        .route("/{id}/reject", post(reject_suggestion))
        .with_state(state)
}

const SUGGESTION_COLUMNS: &str = "id, suggester_id, title, description, status, review_note, \
     bounty_id, created_at, reviewed_at";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateSuggestionRequest {
    pub title: String,
    pub description: String,
}

/// Propose a bounty for admin review.
async fn create_suggestion(
    State(state): State<AppState>,
    requester: Requester,
    Json(request): Json<CreateSuggestionRequest>,
) -> Result<Json<SuggestedBounty>, AppError> {
    let title = request.title.trim();
    let description = request.description.trim();
    if title.is_empty() || title.len() > 200 {
        return Err(AppError::BadRequest("Title must be 1-200 characters".to_string()));
    }
    if description.is_empty() || description.len() > 10000 {
        return Err(AppError::BadRequest(
            "Description must be 1-10000 characters".to_string(),
        ));
    }

    let suggestion: SuggestedBounty = sqlx::query_as(&format!(
        "INSERT INTO suggested_bounties (id, suggester_id, title, description) \
         VALUES ($1, $2, $3, $4) RETURNING {}",
        SUGGESTION_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(requester.id)
    .bind(title)
    .bind(description)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(suggestion))
}

#[derive(Debug, Deserialize)]
pub struct ListSuggestionsQuery {
    pub status: Option<SuggestionStatus>,
}

/// List suggestions: admins see all (optionally by status), everyone else
/// sees their own.
async fn list_suggestions(
    State(state): State<AppState>,
    requester: Requester,
    Query(query): Query<ListSuggestionsQuery>,
) -> Result<Json<Vec<SuggestedBounty>>, AppError> {
    let suggestions: Vec<SuggestedBounty> = if requester.is_admin {
        match query.status {
            Some(status) => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM suggested_bounties WHERE status = $1 ORDER BY created_at DESC",
                    SUGGESTION_COLUMNS
                ))
                .bind(status)
                .fetch_all(&state.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM suggested_bounties ORDER BY created_at DESC",
                    SUGGESTION_COLUMNS
                ))
                .fetch_all(&state.pool)
                .await?
            }
        }
    } else {
        sqlx::query_as(&format!(
            "SELECT {} FROM suggested_bounties WHERE suggester_id = $1 ORDER BY created_at DESC",
            SUGGESTION_COLUMNS
        ))
        .bind(requester.id)
        .fetch_all(&state.pool)
        .await?
    };

    Ok(Json(suggestions))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveSuggestionResponse {
    pub suggestion: SuggestedBounty,
    /// The draft bounty materialized from the suggestion.
    pub bounty_id: Uuid,
}

/// Approve a suggestion, materializing it into a draft bounty. The insert
/// and the back-link happen in one transaction.
async fn approve_suggestion(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<Uuid>,
) -> Result<Json<ApproveSuggestionResponse>, AppError> {
    requester.require_admin()?;

    let mut tx = state.pool.begin().await?;

    let suggestion: Option<SuggestedBounty> = sqlx::query_as(&format!(
        "SELECT {} FROM suggested_bounties WHERE id = $1 FOR UPDATE",
        SUGGESTION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    let suggestion =
        suggestion.ok_or_else(|| AppError::NotFound(format!("Suggestion not found: {}", id)))?;

    if suggestion.status != SuggestionStatus::Pending {
        return Err(AppError::Conflict(format!(
            "Suggestion has already been {:?}",
            suggestion.status
        )));
    }

    let bounty_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO bounties (id, creator_id, title, description, status) \
         VALUES ($1, $2, $3, $4, 'draft')",
    )
    .bind(bounty_id)
    .bind(requester.id)
    .bind(&suggestion.title)
    .bind(&suggestion.description)
    .execute(&mut *tx)
    .await?;

    let updated: SuggestedBounty = sqlx::query_as(&format!(
        "UPDATE suggested_bounties \
         SET status = 'approved', bounty_id = $2, reviewed_at = NOW() \
         WHERE id = $1 RETURNING {}",
        SUGGESTION_COLUMNS
    ))
    .bind(id)
    .bind(bounty_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(suggestion_id = %id, bounty_id = %bounty_id, "Suggestion approved");
    Ok(Json(ApproveSuggestionResponse {
        suggestion: updated,
        bounty_id,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectSuggestionRequest {
    #[serde(default)]
    pub note: Option<String>,
}

/// Reject a suggestion with an optional note.
async fn reject_suggestion(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectSuggestionRequest>,
) -> Result<Json<SuggestedBounty>, AppError> {
    requester.require_admin()?;

    let updated: Option<SuggestedBounty> = sqlx::query_as(&format!(
        "UPDATE suggested_bounties \
         SET status = 'rejected', review_note = $2, reviewed_at = NOW() \
         WHERE id = $1 AND status = 'pending' RETURNING {}",
        SUGGESTION_COLUMNS
    ))
    .bind(id)
    .bind(&request.note)
    .fetch_optional(&state.pool)
    .await?;

    match updated {
        Some(suggestion) => Ok(Json(suggestion)),
        None => {
            // Distinguish a missing suggestion from one already reviewed.
            let exists: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM suggested_bounties WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&state.pool)
                    .await?;
            match exists {
                Some(_) => Err(AppError::Conflict(
                    "Suggestion has already been reviewed".to_string(),
                )),
                None => Err(AppError::NotFound(format!("Suggestion not found: {}", id))),
            }
        }
    }
}
