//! File download endpoints.
//!
//! Current files live in blob storage and are handed out as signed URLs.
//! The uploads route is a legacy fallback serving files stored on the local
//! filesystem before the blob store existed; it resolves request paths
//! against the uploads directory with a traversal guard.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use crate::auth::MaybeRequester;
use crate::error::AppError;
use crate::models::BountyStatus;
use crate::objectstore::SignedUrl;
use crate::policy;
use crate::routes::AppState;

/// Creates the files router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/{id}/download", get(download_file))
        .with_state(state)
}

/// Issue a time-limited signed download URL for a file, gated by the same
/// access rule as the owning submission's content.
async fn download_file(
    State(state): State<AppState>,
    MaybeRequester(requester): MaybeRequester,
    Path(id): Path<Uuid>,
) -> Result<Json<SignedUrl>, AppError> {
    let row: Option<(String, Uuid, Uuid, BountyStatus)> = sqlx::query_as(
        "SELECT f.storage_key, s.submitter_id, b.creator_id, b.status \
         FROM submission_files f \
         JOIN submissions s ON s.id = f.submission_id \
         JOIN bounties b ON b.id = s.bounty_id \
         WHERE f.id = $1",
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?;

    let (storage_key, submitter_id, creator_id, bounty_status) =
        row.ok_or_else(|| AppError::NotFound(format!("File not found: {}", id)))?;

    if !policy::can_access_file(submitter_id, creator_id, bounty_status, requester.as_ref()) {
        return Err(AppError::Forbidden(
            "You do not have access to this file".to_string(),
        ));
    }

    Ok(Json(state.objects.signed_download_url(&storage_key)))
}

/// Serve a legacy upload from the local uploads directory.
pub async fn serve_upload(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let resolved = state.objects.resolve_upload_path(&path)?;

    let bytes = tokio::fs::read(&resolved).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::NotFound("Upload not found".to_string())
        } else {
            AppError::Internal(format!("Failed to read upload: {}", e))
        }
    })?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    )
        .into_response())
}
