//! Bounty marketplace endpoints.
//!
//! The list endpoint reports each bounty's headline `currentReward` as the
//! first-place reward, while detail and update responses report the sum
//! across all positions. The divergence is deliberate; see
//! [`crate::rewards`].

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::{MaybeRequester, Requester};
use crate::error::AppError;
use crate::models::submission::validate_content;
use crate::models::{
    Bounty, BountyStatus, ContentType, FileCategory, NewBounty, NewSubmission, NewSubmissionFile,
    Submission, WinningSpot,
};
use crate::policy;
use crate::rewards;
use crate::routes::submissions::SubmissionView;
use crate::routes::AppState;

/// Creates the bounties router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_bounties).post(create_bounty))
        .route("/{id}", get(get_bounty).put(update_bounty))
        .route(
            "/{id}/submissions",
            get(list_bounty_submissions).post(create_submission),
        )
        .with_state(state)
}

// ===== Validation helpers =====

/// Validates the title is not empty and within length limits.
fn validate_title(title: &str) -> Result<(), AppError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Title cannot be empty".to_string()));
    }
    if trimmed.len() > 200 {
        return Err(AppError::BadRequest(
            "Title must be 200 characters or less".to_string(),
        ));
    }
    Ok(())
}

/// Validates the description is not empty and within length limits.
fn validate_description(description: &str) -> Result<(), AppError> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(
            "Description cannot be empty".to_string(),
        ));
    }
    if trimmed.len() > 10000 {
        return Err(AppError::BadRequest(
            "Description must be 10000 characters or less".to_string(),
        ));
    }
    Ok(())
}

/// Validates the deadline, when given, lies in the future.
fn validate_deadline(deadline: Option<DateTime<Utc>>) -> Result<(), AppError> {
    if let Some(deadline) = deadline {
        if deadline <= Utc::now() {
            return Err(AppError::BadRequest(
                "Deadline must be in the future".to_string(),
            ));
        }
    }
    Ok(())
}

/// Admin-controlled bounty status changes. Completed and cancelled are
/// final.
fn can_change_status(from: BountyStatus, to: BountyStatus) -> bool {
    use BountyStatus::*;
    if from == to {
        return true;
    }
    match (from, to) {
        (Draft, Active) | (Draft, Cancelled) => true,
        (Active, Paused) | (Active, Completed) | (Active, Cancelled) => true,
        (Paused, Active) | (Paused, Completed) | (Paused, Cancelled) => true,
        _ => false,
    }
}

// ===== Winning spots =====

/// One reward tier in a create/update request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinningSpotInput {
    pub position: i32,
    /// Decimal string, e.g. "250.00000000".
    pub reward: String,
    /// Decimal string; must be at least `reward`.
    pub reward_cap: String,
    pub payout_key: String,
}

struct ParsedSpot {
    position: i32,
    reward: BigDecimal,
    reward_cap: BigDecimal,
    payout_key: String,
}

fn parse_spots(inputs: &[WinningSpotInput]) -> Result<Vec<ParsedSpot>, AppError> {
    let mut parsed = Vec::with_capacity(inputs.len());
    for input in inputs {
        let reward = BigDecimal::from_str(&input.reward)
            .map_err(|e| AppError::BadRequest(format!("Invalid reward amount: {}", e)))?;
        let reward_cap = BigDecimal::from_str(&input.reward_cap)
            .map_err(|e| AppError::BadRequest(format!("Invalid reward cap: {}", e)))?;
        if input.payout_key.trim().is_empty() {
            return Err(AppError::BadRequest("Payout key cannot be empty".to_string()));
        }
        parsed.push(ParsedSpot {
            position: input.position,
            reward,
            reward_cap,
            payout_key: input.payout_key.trim().to_string(),
        });
    }

    let triples: Vec<(i32, BigDecimal, BigDecimal)> = parsed
        .iter()
        .map(|s| (s.position, s.reward.clone(), s.reward_cap.clone()))
        .collect();
    rewards::validate_spots(&triples).map_err(AppError::BadRequest)?;

    Ok(parsed)
}

async fn replace_spots(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    bounty_id: Uuid,
    spots: &[ParsedSpot],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM winning_spots WHERE bounty_id = $1")
        .bind(bounty_id)
        .execute(&mut **tx)
        .await?;

    for spot in spots {
        sqlx::query(
            "INSERT INTO winning_spots (bounty_id, position, reward, reward_cap, payout_key) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(bounty_id)
        .bind(spot.position)
        .bind(&spot.reward)
        .bind(&spot.reward_cap)
        .bind(&spot.payout_key)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn load_spots(pool: &sqlx::PgPool, bounty_id: Uuid) -> Result<Vec<WinningSpot>, AppError> {
    let spots: Vec<WinningSpot> = sqlx::query_as(
        "SELECT id, bounty_id, position, reward, reward_cap, payout_key \
         FROM winning_spots WHERE bounty_id = $1 ORDER BY position",
    )
    .bind(bounty_id)
    .fetch_all(pool)
    .await?;
    Ok(spots)
}

// ===== Responses =====

/// Row of the bounty list: headline reward is first place only.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BountySummary {
    pub id: Uuid,
    pub title: String,
    pub status: BountyStatus,
    /// First-place reward as a decimal string.
    pub current_reward: String,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One reward tier as serialized to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinningSpotView {
    pub position: i32,
    pub reward: String,
    pub reward_cap: String,
    pub payout_key: String,
}

/// Bounty detail: reward totals are summed across all positions.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BountyDetailResponse {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: BountyStatus,
    pub accepted_content_types: Vec<ContentType>,
    pub deadline: Option<DateTime<Utc>>,
    pub winning_spots: Vec<WinningSpotView>,
    /// Sum of rewards across all positions, as a decimal string.
    pub total_reward: String,
    /// Sum of reward caps across all positions, as a decimal string.
    pub total_reward_cap: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn detail_response(bounty: Bounty, spots: Vec<WinningSpot>) -> BountyDetailResponse {
    let total_reward = rewards::total_reward(&spots).to_string();
    let total_reward_cap = rewards::total_reward_cap(&spots).to_string();

    BountyDetailResponse {
        id: bounty.id,
        creator_id: bounty.creator_id,
        title: bounty.title,
        description: bounty.description,
        status: bounty.status,
        accepted_content_types: bounty.accepted_content_types,
        deadline: bounty.deadline,
        winning_spots: spots
            .into_iter()
            .map(|s| WinningSpotView {
                position: s.position,
                reward: s.reward.to_string(),
                reward_cap: s.reward_cap.to_string(),
                payout_key: s.payout_key,
            })
            .collect(),
        total_reward,
        total_reward_cap,
        created_at: bounty.created_at,
        updated_at: bounty.updated_at,
    }
}

// ===== List =====

#[derive(Debug, Deserialize)]
pub struct ListBountiesQuery {
    pub status: Option<BountyStatus>,
}

#[derive(Debug, FromRow)]
struct BountyListRow {
    #[sqlx(flatten)]
    bounty: Bounty,
    current_reward: Option<BigDecimal>,
}

/// List bounties. The public sees active and completed bounties; admins
/// may filter by any status.
async fn list_bounties(
    State(state): State<AppState>,
    MaybeRequester(requester): MaybeRequester,
    Query(query): Query<ListBountiesQuery>,
) -> Result<Json<Vec<BountySummary>>, AppError> {
    let is_admin = requester.map(|r| r.is_admin).unwrap_or(false);
    let statuses: Vec<BountyStatus> = match (is_admin, query.status) {
        (true, Some(status)) => vec![status],
        (true, None) => vec![
            BountyStatus::Draft,
            BountyStatus::Active,
            BountyStatus::Paused,
            BountyStatus::Completed,
            BountyStatus::Cancelled,
        ],
        (false, Some(status))
            if status == BountyStatus::Active || status == BountyStatus::Completed =>
        {
            vec![status]
        }
        (false, _) => vec![BountyStatus::Active, BountyStatus::Completed],
    };

    let rows: Vec<BountyListRow> = sqlx::query_as(
        "SELECT b.id, b.creator_id, b.title, b.description, b.status, \
                b.accepted_content_types, b.deadline, b.created_at, b.updated_at, \
                ws.reward AS current_reward \
         FROM bounties b \
         LEFT JOIN winning_spots ws ON ws.bounty_id = b.id AND ws.position = 1 \
         WHERE b.status = ANY($1) \
         ORDER BY b.created_at DESC",
    )
    .bind(&statuses)
    .fetch_all(&state.pool)
    .await?;

    let summaries = rows
        .into_iter()
        .map(|row| BountySummary {
            id: row.bounty.id,
            title: row.bounty.title,
            status: row.bounty.status,
            current_reward: row
                .current_reward
                .unwrap_or_else(|| BigDecimal::from(0))
                .to_string(),
            deadline: row.bounty.deadline,
            created_at: row.bounty.created_at,
        })
        .collect();

    Ok(Json(summaries))
}

// ===== Create =====

/// Request body for creating a bounty. Administrator only.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateBountyRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub accepted_content_types: Vec<ContentType>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub winning_spots: Vec<WinningSpotInput>,
}

/// Creates a new bounty in draft status.
async fn create_bounty(
    State(state): State<AppState>,
    requester: Requester,
    Json(request): Json<CreateBountyRequest>,
) -> Result<Json<BountyDetailResponse>, AppError> {
    requester.require_admin()?;

    validate_title(&request.title)?;
    validate_description(&request.description)?;
    validate_deadline(request.deadline)?;
    let spots = parse_spots(&request.winning_spots)?;

    let new_bounty = NewBounty {
        creator_id: requester.id,
        title: request.title.trim().to_string(),
        description: request.description.trim().to_string(),
        accepted_content_types: request.accepted_content_types,
        deadline: request.deadline,
    };

    let bounty_id = Uuid::new_v4();
    let mut tx = state.pool.begin().await?;

    let bounty: Bounty = sqlx::query_as(
        "INSERT INTO bounties (id, creator_id, title, description, status, \
                               accepted_content_types, deadline) \
         VALUES ($1, $2, $3, $4, 'draft', $5, $6) \
         RETURNING id, creator_id, title, description, status, accepted_content_types, \
                   deadline, created_at, updated_at",
    )
    .bind(bounty_id)
    .bind(new_bounty.creator_id)
    .bind(&new_bounty.title)
    .bind(&new_bounty.description)
    .bind(&new_bounty.accepted_content_types)
    .bind(new_bounty.deadline)
    .fetch_one(&mut *tx)
    .await?;

    replace_spots(&mut tx, bounty_id, &spots).await?;
    tx.commit().await?;

    tracing::info!(bounty_id = %bounty_id, creator_id = %requester.id, "Bounty created");

    let spots = load_spots(&state.pool, bounty_id).await?;
    Ok(Json(detail_response(bounty, spots)))
}

// ===== Detail =====

/// Fetch a bounty. Draft and cancelled bounties are visible only to their
/// creator and admins; others get a 404 rather than a hint they exist.
async fn get_bounty(
    State(state): State<AppState>,
    MaybeRequester(requester): MaybeRequester,
    Path(id): Path<Uuid>,
) -> Result<Json<BountyDetailResponse>, AppError> {
    let bounty = super::submissions::load_bounty(&state.pool, id).await?;

    let hidden = matches!(bounty.status, BountyStatus::Draft | BountyStatus::Cancelled);
    if hidden {
        let allowed = requester
            .map(|r| r.is_admin || r.id == bounty.creator_id)
            .unwrap_or(false);
        if !allowed {
            return Err(AppError::NotFound(format!("Bounty not found: {}", id)));
        }
    }

    let spots = load_spots(&state.pool, id).await?;
    Ok(Json(detail_response(bounty, spots)))
}

// ===== Update =====

/// Allow-listed patch for a bounty. Unknown fields are rejected rather
/// than forwarded to the store.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateBountyRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<BountyStatus>,
    pub deadline: Option<DateTime<Utc>>,
    pub accepted_content_types: Option<Vec<ContentType>>,
    pub winning_spots: Option<Vec<WinningSpotInput>>,
}

/// Update a bounty. Administrator only; each present field is validated
/// before anything is written.
async fn update_bounty(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateBountyRequest>,
) -> Result<Json<BountyDetailResponse>, AppError> {
    requester.require_admin()?;

    let bounty = super::submissions::load_bounty(&state.pool, id).await?;

    let title = match request.title {
        Some(title) => {
            validate_title(&title)?;
            title.trim().to_string()
        }
        None => bounty.title,
    };
    let description = match request.description {
        Some(description) => {
            validate_description(&description)?;
            description.trim().to_string()
        }
        None => bounty.description,
    };
    let status = match request.status {
        Some(status) => {
            if !can_change_status(bounty.status, status) {
                return Err(AppError::Conflict(format!(
                    "Bounty cannot move from {:?} to {:?}",
                    bounty.status, status
                )));
            }
            status
        }
        None => bounty.status,
    };
    let deadline = match request.deadline {
        Some(deadline) => {
            validate_deadline(Some(deadline))?;
            Some(deadline)
        }
        None => bounty.deadline,
    };
    let accepted_content_types = request
        .accepted_content_types
        .unwrap_or(bounty.accepted_content_types);
    let spots = request.winning_spots.as_deref().map(parse_spots).transpose()?;

    let mut tx = state.pool.begin().await?;

    let updated: Bounty = sqlx::query_as(
        "UPDATE bounties SET title = $2, description = $3, status = $4, deadline = $5, \
                accepted_content_types = $6, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING id, creator_id, title, description, status, accepted_content_types, \
                   deadline, created_at, updated_at",
    )
    .bind(id)
    .bind(&title)
    .bind(&description)
    .bind(status)
    .bind(deadline)
    .bind(&accepted_content_types)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(spots) = &spots {
        replace_spots(&mut tx, id, spots).await?;
    }
    tx.commit().await?;

    let spots = load_spots(&state.pool, id).await?;
    Ok(Json(detail_response(updated, spots)))
}

// ===== Submissions under a bounty =====

#[derive(Debug, FromRow)]
struct SubmissionWithVotes {
    #[sqlx(flatten)]
    submission: Submission,
    vote_score: i64,
}

/// List a bounty's submissions, redacted per the requester.
async fn list_bounty_submissions(
    State(state): State<AppState>,
    MaybeRequester(requester): MaybeRequester,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SubmissionView>>, AppError> {
    let bounty = super::submissions::load_bounty(&state.pool, id).await?;

    let rows: Vec<SubmissionWithVotes> = sqlx::query_as(
        "SELECT s.id, s.bounty_id, s.submitter_id, s.title, s.description, s.content, \
                s.urls, s.content_type, s.status, s.score, s.scored_by, s.created_at, \
                s.updated_at, \
                COALESCE(SUM(CASE WHEN v.vote_type = 'upvote' THEN 1 \
                                  WHEN v.vote_type = 'downvote' THEN -1 END), 0)::BIGINT \
                    AS vote_score \
         FROM submissions s \
         LEFT JOIN votes v ON v.submission_id = s.id \
         WHERE s.bounty_id = $1 \
         GROUP BY s.id \
         ORDER BY s.created_at",
    )
    .bind(id)
    .fetch_all(&state.pool)
    .await?;

    let views = rows
        .into_iter()
        .map(|row| {
            let can_view =
                policy::submission_content_visible(&row.submission, &bounty, requester.as_ref());
            SubmissionView::build(row.submission, row.vote_score, can_view)
        })
        .collect();

    Ok(Json(views))
}

/// Request body for submitting work to a bounty.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateSubmissionRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    pub content_type: ContentType,
    /// Files already uploaded to blob storage, registered by key.
    #[serde(default)]
    pub files: Vec<NewSubmissionFile>,
}

/// Submit work to an active bounty.
async fn create_submission(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateSubmissionRequest>,
) -> Result<Json<SubmissionView>, AppError> {
    let bounty = super::submissions::load_bounty(&state.pool, id).await?;

    if !bounty.is_open_for_submissions() {
        return Err(AppError::BadRequest(
            "Bounty is not accepting submissions".to_string(),
        ));
    }
    if !bounty.accepts(request.content_type) {
        return Err(AppError::BadRequest(format!(
            "Bounty does not accept {:?} submissions",
            request.content_type
        )));
    }

    validate_title(&request.title)?;
    validate_description(&request.description)?;
    validate_content(
        request.content_type,
        request.content.as_deref(),
        &request.urls,
        request.files.len(),
    )
    .map_err(AppError::BadRequest)?;

    for file in &request.files {
        if file.original_name.trim().is_empty() || file.storage_key.trim().is_empty() {
            return Err(AppError::BadRequest(
                "File entries require a name and storage key".to_string(),
            ));
        }
        if file.size_bytes < 0 {
            return Err(AppError::BadRequest("File size cannot be negative".to_string()));
        }
    }

    let new_submission = NewSubmission {
        bounty_id: id,
        submitter_id: requester.id,
        title: request.title.trim().to_string(),
        description: request.description.trim().to_string(),
        content: request.content,
        urls: request.urls,
        content_type: request.content_type,
    };

    let submission_id = Uuid::new_v4();
    let mut tx = state.pool.begin().await?;

    let submission: Submission = sqlx::query_as(
        "INSERT INTO submissions (id, bounty_id, submitter_id, title, description, content, \
                                  urls, content_type, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending') \
         RETURNING id, bounty_id, submitter_id, title, description, content, urls, \
                   content_type, status, score, scored_by, created_at, updated_at",
    )
    .bind(submission_id)
    .bind(new_submission.bounty_id)
    .bind(new_submission.submitter_id)
    .bind(&new_submission.title)
    .bind(&new_submission.description)
    .bind(&new_submission.content)
    .bind(&new_submission.urls)
    .bind(new_submission.content_type)
    .fetch_one(&mut *tx)
    .await?;

    for file in &request.files {
        sqlx::query(
            "INSERT INTO submission_files (id, submission_id, original_name, storage_key, \
                                           size_bytes, mime_type, category) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(submission_id)
        .bind(file.original_name.trim())
        .bind(file.storage_key.trim())
        .bind(file.size_bytes)
        .bind(&file.mime_type)
        .bind(FileCategory::from_mime(&file.mime_type))
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::info!(
        submission_id = %submission_id,
        bounty_id = %id,
        submitter_id = %requester.id,
        "Submission created"
    );

    Ok(Json(SubmissionView::build(submission, 0, true)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_changes_out_of_draft() {
        use BountyStatus::*;
        assert!(can_change_status(Draft, Active));
        assert!(can_change_status(Draft, Cancelled));
        assert!(!can_change_status(Draft, Completed));
        assert!(!can_change_status(Draft, Paused));
    }

    #[test]
    fn test_status_changes_are_final_after_completion() {
        use BountyStatus::*;
        for target in [Draft, Active, Paused, Cancelled] {
            assert!(!can_change_status(Completed, target));
            assert!(!can_change_status(Cancelled, target) || target == Cancelled);
        }
        // No-op updates are always fine.
        assert!(can_change_status(Completed, Completed));
    }

    #[test]
    fn test_pause_and_resume() {
        use BountyStatus::*;
        assert!(can_change_status(Active, Paused));
        assert!(can_change_status(Paused, Active));
        assert!(can_change_status(Paused, Completed));
    }

    #[test]
    fn test_parse_spots_rejects_bad_decimal() {
        let inputs = vec![WinningSpotInput {
            position: 1,
            reward: "not-a-number".to_string(),
            reward_cap: "10".to_string(),
            payout_key: "usdc".to_string(),
        }];
        assert!(parse_spots(&inputs).is_err());
    }

    #[test]
    fn test_parse_spots_rejects_duplicate_positions() {
        let spot = |position| WinningSpotInput {
            position,
            reward: "10".to_string(),
            reward_cap: "20".to_string(),
            payout_key: "usdc".to_string(),
        };
        assert!(parse_spots(&[spot(1), spot(2)]).is_ok());
        assert!(parse_spots(&[spot(1), spot(1)]).is_err());
    }

    #[test]
    fn test_parse_spots_rejects_blank_payout_key() {
        let inputs = vec![WinningSpotInput {
            position: 1,
            reward: "10".to_string(),
            reward_cap: "20".to_string(),
            payout_key: "   ".to_string(),
        }];
        assert!(parse_spots(&inputs).is_err());
    }
}
