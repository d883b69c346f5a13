//! Submission endpoints: detail view, updates, voting and rescoring.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::{MaybeRequester, Requester};
use crate::error::AppError;
use crate::models::submission::validate_content;
use crate::models::{
    Bounty, ContentType, Submission, SubmissionFile, SubmissionStatus, Vote, VoteAction, VoteType,
};
use crate::policy::{self, HIDDEN_CONTENT_PLACEHOLDER};
use crate::routes::AppState;
use crate::scoring;

/// Creates the submissions router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/{id}", get(get_submission).put(update_submission))
        .route("/{id}/vote", post(cast_vote))
        .route("/{id}/rescore", post(rescore_submission))
        .with_state(state)
}

/// A submission as serialized to clients.
///
/// Redaction happens here, at the serialization boundary: hidden
/// submissions keep their identity, status, score and vote score, while
/// the descriptive fields are replaced by the privacy placeholder. Records
/// are never omitted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    pub id: Uuid,
    pub bounty_id: Uuid,
    pub submitter_id: Uuid,
    pub title: String,
    pub description: String,
    pub content: Option<String>,
    pub urls: Vec<String>,
    pub content_type: ContentType,
    pub status: SubmissionStatus,
    /// Aggregate screener score as a decimal string.
    pub score: Option<String>,
    /// Upvotes minus downvotes.
    pub vote_score: i64,
    pub is_anonymized: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubmissionView {
    pub fn build(submission: Submission, vote_score: i64, can_view_content: bool) -> Self {
        let (description, content, urls) = if can_view_content {
            (submission.description, submission.content, submission.urls)
        } else {
            (
                HIDDEN_CONTENT_PLACEHOLDER.to_string(),
                submission
                    .content
                    .map(|_| HIDDEN_CONTENT_PLACEHOLDER.to_string()),
                if submission.urls.is_empty() {
                    vec![]
                } else {
                    vec![HIDDEN_CONTENT_PLACEHOLDER.to_string()]
                },
            )
        };

        Self {
            id: submission.id,
            bounty_id: submission.bounty_id,
            submitter_id: submission.submitter_id,
            title: submission.title,
            description,
            content,
            urls,
            content_type: submission.content_type,
            status: submission.status,
            score: submission.score.map(|s| s.to_string()),
            vote_score,
            is_anonymized: !can_view_content,
            created_at: submission.created_at,
            updated_at: submission.updated_at,
        }
    }
}

/// Detail response: the view plus file metadata (withheld alongside the
/// rest of the content when hidden).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDetailResponse {
    #[serde(flatten)]
    pub submission: SubmissionView,
    pub files: Vec<SubmissionFile>,
}

const SUBMISSION_COLUMNS: &str = "id, bounty_id, submitter_id, title, description, content, \
     urls, content_type, status, score, scored_by, created_at, updated_at";

pub(crate) async fn load_submission(
    pool: &sqlx::PgPool,
    id: Uuid,
) -> Result<Submission, AppError> {
    let submission: Option<Submission> = sqlx::query_as(&format!(
        "SELECT {} FROM submissions WHERE id = $1",
        SUBMISSION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    submission.ok_or_else(|| AppError::NotFound(format!("Submission not found: {}", id)))
}

pub(crate) async fn load_bounty(pool: &sqlx::PgPool, id: Uuid) -> Result<Bounty, AppError> {
    let bounty: Option<Bounty> = sqlx::query_as(
        "SELECT id, creator_id, title, description, status, accepted_content_types, deadline, \
         created_at, updated_at FROM bounties WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    bounty.ok_or_else(|| AppError::NotFound(format!("Bounty not found: {}", id)))
}

pub(crate) async fn vote_score(pool: &sqlx::PgPool, submission_id: Uuid) -> Result<i64, AppError> {
    let (score,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(CASE WHEN vote_type = 'upvote' THEN 1 ELSE -1 END), 0)::BIGINT \
         FROM votes WHERE submission_id = $1",
    )
    .bind(submission_id)
    .fetch_one(pool)
    .await?;
    Ok(score)
}

async fn list_files(
    pool: &sqlx::PgPool,
    submission_id: Uuid,
) -> Result<Vec<SubmissionFile>, AppError> {
    let files: Vec<SubmissionFile> = sqlx::query_as(
        "SELECT id, submission_id, original_name, storage_key, size_bytes, mime_type, category, \
         created_at FROM submission_files WHERE submission_id = $1 ORDER BY created_at",
    )
    .bind(submission_id)
    .fetch_all(pool)
    .await?;
    Ok(files)
}

/// Fetch a single submission, redacted per the requester.
async fn get_submission(
    State(state): State<AppState>,
    MaybeRequester(requester): MaybeRequester,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmissionDetailResponse>, AppError> {
    let submission = load_submission(&state.pool, id).await?;
    let bounty = load_bounty(&state.pool, submission.bounty_id).await?;
    let can_view = policy::submission_content_visible(&submission, &bounty, requester.as_ref());
    let votes = vote_score(&state.pool, id).await?;

    let files = if can_view {
        list_files(&state.pool, id).await?
    } else {
        vec![]
    };

    Ok(Json(SubmissionDetailResponse {
        submission: SubmissionView::build(submission, votes, can_view),
        files,
    }))
}

/// Allow-listed patch for a submission. Unknown fields are rejected rather
/// than forwarded to the store.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateSubmissionRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub urls: Option<Vec<String>>,
}

/// Update a submission. Allowed for its submitter while the submission is
/// still pending, and for administrators at any time.
async fn update_submission(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateSubmissionRequest>,
) -> Result<Json<SubmissionView>, AppError> {
    let submission = load_submission(&state.pool, id).await?;

    let is_owner = submission.submitter_id == requester.id;
    if !requester.is_admin {
        if !is_owner {
            return Err(AppError::Forbidden(
                "Only the submitter may update this submission".to_string(),
            ));
        }
        if submission.status != SubmissionStatus::Pending {
            return Err(AppError::Conflict(
                "Submission can no longer be edited once screening has started".to_string(),
            ));
        }
    }

    let title = request.title.unwrap_or(submission.title);
    let description = request.description.unwrap_or(submission.description);
    let content = request.content.or(submission.content);
    let urls = request.urls.unwrap_or(submission.urls);

    if title.trim().is_empty() || title.len() > 200 {
        return Err(AppError::BadRequest(
            "Title must be 1-200 characters".to_string(),
        ));
    }
    if description.trim().is_empty() || description.len() > 10000 {
        return Err(AppError::BadRequest(
            "Description must be 1-10000 characters".to_string(),
        ));
    }

    let (file_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM submission_files WHERE submission_id = $1")
            .bind(id)
            .fetch_one(&state.pool)
            .await?;
    validate_content(
        submission.content_type,
        content.as_deref(),
        &urls,
        file_count as usize,
    )
    .map_err(AppError::BadRequest)?;

    let updated: Submission = sqlx::query_as(&format!(
        "UPDATE submissions SET title = $2, description = $3, content = $4, urls = $5, \
         updated_at = NOW() WHERE id = $1 RETURNING {}",
        SUBMISSION_COLUMNS
    ))
    .bind(id)
    .bind(&title)
    .bind(&description)
    .bind(&content)
    .bind(&urls)
    .fetch_one(&state.pool)
    .await?;

    let votes = vote_score(&state.pool, id).await?;
    Ok(Json(SubmissionView::build(updated, votes, true)))
}

/// Request body for casting a vote.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    pub vote_type: VoteType,
}

/// Response after a vote cast.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteResponse {
    /// Upvotes minus downvotes after the cast.
    pub vote_score: i64,
    /// The requester's vote after the cast, if any.
    pub your_vote: Option<VoteType>,
}

/// Cast a vote with toggle semantics: re-casting the same type removes the
/// vote, casting the other type switches it in place. A concurrent first
/// cast that loses the uniqueness race reports a conflict instead of
/// double-voting.
async fn cast_vote(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<Uuid>,
    Json(request): Json<CastVoteRequest>,
) -> Result<Json<CastVoteResponse>, AppError> {
    // Existence check keeps the FK violation from surfacing as a 500.
    load_submission(&state.pool, id).await?;

    let existing: Option<(VoteType,)> =
        sqlx::query_as("SELECT vote_type FROM votes WHERE submission_id = $1 AND user_id = $2")
            .bind(id)
            .bind(requester.id)
            .fetch_optional(&state.pool)
            .await?;

    let cast = request.vote_type;
    let your_vote = match VoteAction::for_cast(existing.map(|(v,)| v), cast) {
        VoteAction::Insert => {
            let vote: Vote = sqlx::query_as(
                "INSERT INTO votes (id, submission_id, user_id, vote_type) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, submission_id, user_id, vote_type, created_at",
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(requester.id)
            .bind(cast)
            .fetch_one(&state.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(
                    "A concurrent vote for this submission was already recorded".to_string(),
                ),
                _ => AppError::from(e),
            })?;
            Some(vote.vote_type)
        }
        VoteAction::Remove => {
            sqlx::query("DELETE FROM votes WHERE submission_id = $1 AND user_id = $2")
                .bind(id)
                .bind(requester.id)
                .execute(&state.pool)
                .await?;
            None
        }
        VoteAction::Switch => {
            let vote: Vote = sqlx::query_as(
                "UPDATE votes SET vote_type = $3 WHERE submission_id = $1 AND user_id = $2 \
                 RETURNING id, submission_id, user_id, vote_type, created_at",
            )
            .bind(id)
            .bind(requester.id)
            .bind(cast)
            .fetch_one(&state.pool)
            .await?;
            Some(vote.vote_type)
        }
    };

    let votes = vote_score(&state.pool, id).await?;
    Ok(Json(CastVoteResponse {
        vote_score: votes,
        your_vote,
    }))
}

/// Discard all scoring history for a submission and return it to pending.
/// Administrator only.
async fn rescore_submission(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    requester.require_admin()?;
    scoring::rescore_submission(&state.pool, id).await?;

    Ok(Json(json!({
        "success": true,
        "submissionId": id,
        "status": "pending",
    })))
}
