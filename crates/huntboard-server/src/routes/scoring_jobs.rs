//! Scoring job endpoints.
//!
//! Job dispatch runs in an external process; these endpoints expose the job
//! records, accept outcome reports from screeners, and proxy per-job log
//! queries to the log-aggregation backend.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{MaybeRequester, Requester};
use crate::error::AppError;
use crate::logstream::LogEntry;
use crate::models::{ScoringJob, ScoringJobStatus, ScoringTask};
use crate::routes::AppState;
use crate::scoring::{self, JobFilter, JobOutcome, JobWithContext};

/// Header screeners present when reporting outcomes.
pub const SCREENER_KEY_HEADER: &str = "x-screener-key";

/// Creates the scoring jobs router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_jobs))
        .route("/{id}", get(get_job))
        .route("/{id}/outcome", post(record_outcome))
        .route("/{id}/logs", get(job_logs))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListJobsQuery {
    pub submission_id: Option<Uuid>,
    pub status: Option<ScoringJobStatus>,
}

/// List scoring jobs visible to the requester.
async fn list_jobs(
    State(state): State<AppState>,
    requester: Requester,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<JobWithContext>>, AppError> {
    let jobs = scoring::list_jobs(
        &state.pool,
        JobFilter {
            submission_id: query.submission_id,
            status: query.status,
        },
        &requester,
    )
    .await?;
    Ok(Json(jobs))
}

/// Job detail: the job with its context plus its per-dimension tasks.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetailResponse {
    #[serde(flatten)]
    pub job: JobWithContext,
    pub tasks: Vec<ScoringTask>,
}

/// Fetch one scoring job with its submission/bounty/screener context.
async fn get_job(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<Uuid>,
) -> Result<Json<JobDetailResponse>, AppError> {
    let job = scoring::get_job_with_access(&state.pool, id, &requester).await?;

    let tasks: Vec<ScoringTask> = sqlx::query_as(
        "SELECT id, job_id, dimension, weight, score, detail, created_at \
         FROM scoring_tasks WHERE job_id = $1 ORDER BY created_at",
    )
    .bind(id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(JobDetailResponse { job, tasks }))
}

/// Record a job outcome.
///
/// Authorized for the job's own screener (via its identity key header) or
/// an administrator.
async fn record_outcome(
    State(state): State<AppState>,
    headers: HeaderMap,
    MaybeRequester(requester): MaybeRequester,
    Path(id): Path<Uuid>,
    Json(outcome): Json<JobOutcome>,
) -> Result<Json<ScoringJob>, AppError> {
    let identity_key: Option<(String,)> = sqlx::query_as(
        "SELECT sc.identity_key FROM scoring_jobs j \
         JOIN screeners sc ON sc.id = j.screener_id \
         WHERE j.id = $1",
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?;

    let (identity_key,) =
        identity_key.ok_or_else(|| AppError::NotFound(format!("Scoring job not found: {}", id)))?;

    let presented_key = headers
        .get(SCREENER_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    let authorized = match presented_key {
        Some(key) => key == identity_key,
        None => requester.map(|r| r.is_admin).unwrap_or(false),
    };
    if !authorized {
        if presented_key.is_none() && requester.is_none() {
            return Err(AppError::Unauthorized(
                "Screener key or admin session required".to_string(),
            ));
        }
        return Err(AppError::Forbidden(
            "Not authorized to report outcomes for this job".to_string(),
        ));
    }

    let job = scoring::record_job_outcome(&state.pool, id, outcome, &*state.strategy).await?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLogsQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLogsResponse {
    pub job_id: Uuid,
    pub entries: Vec<LogEntry>,
}

/// Proxy a time-range log query for one job. Same access rules as viewing
/// the job itself.
async fn job_logs(
    State(state): State<AppState>,
    requester: Requester,
    Path(id): Path<Uuid>,
    Query(query): Query<JobLogsQuery>,
) -> Result<Json<JobLogsResponse>, AppError> {
    let job = scoring::get_job_with_access(&state.pool, id, &requester).await?;

    let start = query.start.unwrap_or(job.job.created_at);
    let end = query.end.unwrap_or_else(Utc::now);
    if end < start {
        return Err(AppError::BadRequest(
            "Log range end precedes its start".to_string(),
        ));
    }
    let limit = query.limit.unwrap_or(500);

    let entries = state.logs.job_logs(id, start, end, limit).await?;
    Ok(Json(JobLogsResponse {
        job_id: id,
        entries,
    }))
}
