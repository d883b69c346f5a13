//! Scoring lifecycle manager.
//!
//! Owns the consistency between a submission and its scoring jobs as jobs
//! progress, fail, and are reset. Job dispatch itself happens in an
//! external process; this module validates reported transitions against the
//! job state machine and keeps the owning submission's status, score and
//! scorer list in step, inside one transaction per reported outcome.
//!
//! Job state machine:
//!
//! ```text
//! pending -> assigned -> scoring -> { completed | failed }
//! failed  -> pending            (while retry_count < max_retries)
//! any non-terminal -> cancelled
//! ```
//!
//! `completed` and `cancelled` are never left again; only
//! [`rescore_submission`] restarts a chain, by deleting it wholesale.

use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::auth::Requester;
use crate::error::AppError;
use crate::models::{ScoringJob, ScoringJobStatus, SubmissionStatus};
use crate::policy;

/// Check if a job may move from `from` to `to`.
///
/// The `failed -> pending` edge is the retry path; callers gate it on the
/// job's remaining retry budget.
pub fn can_transition(from: ScoringJobStatus, to: ScoringJobStatus) -> bool {
    use ScoringJobStatus::*;
    match (from, to) {
        (Pending, Assigned) => true,
        (Assigned, Scoring) => true,
        (Scoring, Completed) => true,
        (Scoring, Failed) => true,
        (Failed, Pending) => true,
        (Pending | Assigned | Scoring, Cancelled) => true,
        _ => false,
    }
}

/// Outcome a screener (or admin) reports for a job.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    /// Screener acknowledged the assignment.
    Assigned,
    /// Screener started scoring.
    Scoring,
    /// Screener finished with a score.
    Completed { score: BigDecimal },
    /// Screener failed; re-queued while retries remain.
    Failed {
        #[serde(default)]
        error: Option<String>,
    },
    /// Job withdrawn before completion.
    Cancelled,
}

impl JobOutcome {
    fn target_status(&self) -> ScoringJobStatus {
        match self {
            JobOutcome::Assigned => ScoringJobStatus::Assigned,
            JobOutcome::Scoring => ScoringJobStatus::Scoring,
            JobOutcome::Completed { .. } => ScoringJobStatus::Completed,
            JobOutcome::Failed { .. } => ScoringJobStatus::Failed,
            JobOutcome::Cancelled => ScoringJobStatus::Cancelled,
        }
    }
}

/// Policy combining the outcomes of a submission's jobs into one submission
/// status. The combination rule is product-defined, so it is pluggable; the
/// server wires in [`MeanScoreThreshold`] by default.
pub trait OutcomeStrategy: Send + Sync {
    /// Aggregate score across jobs. `None` when no job completed.
    fn aggregate_score(&self, jobs: &[ScoringJob]) -> Option<BigDecimal>;

    /// Final submission status, consulted once every job is terminal.
    /// Never yields `winner`; winners are an explicit completion act.
    fn decide(&self, jobs: &[ScoringJob]) -> SubmissionStatus;
}

/// Default strategy: mean of completed-job scores, approved at or above a
/// threshold, rejected below it or when nothing completed.
#[derive(Debug, Clone)]
pub struct MeanScoreThreshold {
    pub approve_at: BigDecimal,
}

impl Default for MeanScoreThreshold {
    fn default() -> Self {
        Self {
            approve_at: BigDecimal::from(70),
        }
    }
}

impl OutcomeStrategy for MeanScoreThreshold {
    fn aggregate_score(&self, jobs: &[ScoringJob]) -> Option<BigDecimal> {
        let completed: Vec<&BigDecimal> = jobs
            .iter()
            .filter(|j| j.status == ScoringJobStatus::Completed)
            .filter_map(|j| j.score.as_ref())
            .collect();

        if completed.is_empty() {
            return None;
        }

        let sum = completed
            .iter()
            .fold(BigDecimal::zero(), |acc, score| acc + *score);
        Some(sum / BigDecimal::from(completed.len() as i64))
    }

    fn decide(&self, jobs: &[ScoringJob]) -> SubmissionStatus {
        match self.aggregate_score(jobs) {
            Some(avg) if avg >= self.approve_at => SubmissionStatus::Approved,
            _ => SubmissionStatus::Rejected,
        }
    }
}

/// A scoring job joined with the context needed for access checks and
/// display.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JobWithContext {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub job: ScoringJob,
    pub submitter_id: Uuid,
    pub bounty_id: Uuid,
    pub bounty_creator_id: Uuid,
    pub screener_name: String,
}

const JOB_CONTEXT_QUERY: &str = r#"
    SELECT j.id, j.submission_id, j.screener_id, j.status, j.score, j.error,
           j.retry_count, j.max_retries, j.started_at, j.completed_at, j.created_at,
           s.submitter_id, s.bounty_id, b.creator_id AS bounty_creator_id,
           sc.name AS screener_name
    FROM scoring_jobs j
    JOIN submissions s ON s.id = j.submission_id
    JOIN bounties b ON b.id = s.bounty_id
    JOIN screeners sc ON sc.id = j.screener_id
"#;

/// Load a job with its context, enforcing the scoring-data access policy.
pub async fn get_job_with_access(
    pool: &PgPool,
    job_id: Uuid,
    requester: &Requester,
) -> Result<JobWithContext, AppError> {
    let row: Option<JobWithContext> =
        sqlx::query_as(&format!("{} WHERE j.id = $1", JOB_CONTEXT_QUERY))
            .bind(job_id)
            .fetch_optional(pool)
            .await?;

    let row = row.ok_or_else(|| AppError::NotFound(format!("Scoring job not found: {}", job_id)))?;

    if !policy::can_view_scoring_job(row.submitter_id, row.bounty_creator_id, Some(requester)) {
        return Err(AppError::Forbidden(
            "You do not have access to this scoring job".to_string(),
        ));
    }

    Ok(row)
}

/// Filters accepted by [`list_jobs`].
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub submission_id: Option<Uuid>,
    pub status: Option<ScoringJobStatus>,
}

/// List jobs visible to the requester.
///
/// Non-admins are restricted to jobs on their own submissions; asking for
/// someone else's submission explicitly is Forbidden rather than empty.
pub async fn list_jobs(
    pool: &PgPool,
    filter: JobFilter,
    requester: &Requester,
) -> Result<Vec<JobWithContext>, AppError> {
    if let Some(submission_id) = filter.submission_id {
        let owner: Option<(Uuid,)> =
            sqlx::query_as("SELECT submitter_id FROM submissions WHERE id = $1")
                .bind(submission_id)
                .fetch_optional(pool)
                .await?;

        let (submitter_id,) = owner.ok_or_else(|| {
            AppError::NotFound(format!("Submission not found: {}", submission_id))
        })?;

        if !requester.is_admin && submitter_id != requester.id {
            return Err(AppError::Forbidden(
                "You do not have access to this submission's scoring jobs".to_string(),
            ));
        }

        let rows: Vec<JobWithContext> = match filter.status {
            Some(status) => {
                sqlx::query_as(&format!(
                    "{} WHERE j.submission_id = $1 AND j.status = $2 ORDER BY j.created_at",
                    JOB_CONTEXT_QUERY
                ))
                .bind(submission_id)
                .bind(status)
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "{} WHERE j.submission_id = $1 ORDER BY j.created_at",
                    JOB_CONTEXT_QUERY
                ))
                .bind(submission_id)
                .fetch_all(pool)
                .await?
            }
        };
        return Ok(rows);
    }

    let rows: Vec<JobWithContext> = match (requester.is_admin, filter.status) {
        (true, Some(status)) => {
            sqlx::query_as(&format!(
                "{} WHERE j.status = $1 ORDER BY j.created_at DESC LIMIT 500",
                JOB_CONTEXT_QUERY
            ))
            .bind(status)
            .fetch_all(pool)
            .await?
        }
        (true, None) => {
            sqlx::query_as(&format!(
                "{} ORDER BY j.created_at DESC LIMIT 500",
                JOB_CONTEXT_QUERY
            ))
            .fetch_all(pool)
            .await?
        }
        (false, Some(status)) => {
            sqlx::query_as(&format!(
                "{} WHERE s.submitter_id = $1 AND j.status = $2 ORDER BY j.created_at DESC",
                JOB_CONTEXT_QUERY
            ))
            .bind(requester.id)
            .bind(status)
            .fetch_all(pool)
            .await?
        }
        (false, None) => {
            sqlx::query_as(&format!(
                "{} WHERE s.submitter_id = $1 ORDER BY j.created_at DESC",
                JOB_CONTEXT_QUERY
            ))
            .bind(requester.id)
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows)
}

/// Record a job outcome and reconcile the owning submission, atomically.
pub async fn record_job_outcome(
    pool: &PgPool,
    job_id: Uuid,
    outcome: JobOutcome,
    strategy: &dyn OutcomeStrategy,
) -> Result<ScoringJob, AppError> {
    let mut tx = pool.begin().await?;

    let job: Option<ScoringJob> = sqlx::query_as(
        r#"
        SELECT id, submission_id, screener_id, status, score, error,
               retry_count, max_retries, started_at, completed_at, created_at
        FROM scoring_jobs
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(job_id)
    .fetch_optional(&mut *tx)
    .await?;

    let job = job.ok_or_else(|| AppError::NotFound(format!("Scoring job not found: {}", job_id)))?;

    let target = outcome.target_status();
    if !can_transition(job.status, target) {
        return Err(AppError::Conflict(format!(
            "Scoring job cannot move from {:?} to {:?}",
            job.status, target
        )));
    }

    let updated: ScoringJob = match &outcome {
        JobOutcome::Assigned => {
            sqlx::query_as(
                r#"
                UPDATE scoring_jobs SET status = 'assigned'
                WHERE id = $1
                RETURNING id, submission_id, screener_id, status, score, error,
                          retry_count, max_retries, started_at, completed_at, created_at
                "#,
            )
            .bind(job_id)
            .fetch_one(&mut *tx)
            .await?
        }
        JobOutcome::Scoring => {
            sqlx::query_as(
                r#"
                UPDATE scoring_jobs
                SET status = 'scoring', started_at = COALESCE(started_at, NOW())
                WHERE id = $1
                RETURNING id, submission_id, screener_id, status, score, error,
                          retry_count, max_retries, started_at, completed_at, created_at
                "#,
            )
            .bind(job_id)
            .fetch_one(&mut *tx)
            .await?
        }
        JobOutcome::Completed { score } => {
            sqlx::query_as(
                r#"
                UPDATE scoring_jobs
                SET status = 'completed', score = $2, error = NULL, completed_at = NOW()
                WHERE id = $1
                RETURNING id, submission_id, screener_id, status, score, error,
                          retry_count, max_retries, started_at, completed_at, created_at
                "#,
            )
            .bind(job_id)
            .bind(score)
            .fetch_one(&mut *tx)
            .await?
        }
        JobOutcome::Failed { error } => {
            if job.can_retry() {
                // Re-queue for the dispatcher instead of sticking as failed.
                sqlx::query_as(
                    r#"
                    UPDATE scoring_jobs
                    SET status = 'pending', error = $2, retry_count = retry_count + 1,
                        started_at = NULL
                    WHERE id = $1
                    RETURNING id, submission_id, screener_id, status, score, error,
                              retry_count, max_retries, started_at, completed_at, created_at
                    "#,
                )
                .bind(job_id)
                .bind(error.as_deref())
                .fetch_one(&mut *tx)
                .await?
            } else {
                sqlx::query_as(
                    r#"
                    UPDATE scoring_jobs
                    SET status = 'failed', error = $2, completed_at = NOW()
                    WHERE id = $1
                    RETURNING id, submission_id, screener_id, status, score, error,
                              retry_count, max_retries, started_at, completed_at, created_at
                    "#,
                )
                .bind(job_id)
                .bind(error.as_deref())
                .fetch_one(&mut *tx)
                .await?
            }
        }
        JobOutcome::Cancelled => {
            sqlx::query_as(
                r#"
                UPDATE scoring_jobs SET status = 'cancelled', completed_at = NOW()
                WHERE id = $1
                RETURNING id, submission_id, screener_id, status, score, error,
                          retry_count, max_retries, started_at, completed_at, created_at
                "#,
            )
            .bind(job_id)
            .fetch_one(&mut *tx)
            .await?
        }
    };

    reconcile_submission(&mut tx, &updated, &outcome, strategy).await?;

    tx.commit().await?;
    Ok(updated)
}

/// Bring the owning submission's status, score and scorer list in step with
/// its jobs after one job changed. Runs inside the caller's transaction.
async fn reconcile_submission(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    job: &ScoringJob,
    outcome: &JobOutcome,
    strategy: &dyn OutcomeStrategy,
) -> Result<(), AppError> {
    let (status, scored_by): (SubmissionStatus, Vec<Uuid>) = {
        let row: (SubmissionStatus, Vec<Uuid>) =
            sqlx::query_as("SELECT status, scored_by FROM submissions WHERE id = $1 FOR UPDATE")
                .bind(job.submission_id)
                .fetch_one(&mut **tx)
                .await?;
        row
    };

    let jobs: Vec<ScoringJob> = sqlx::query_as(
        r#"
        SELECT id, submission_id, screener_id, status, score, error,
               retry_count, max_retries, started_at, completed_at, created_at
        FROM scoring_jobs
        WHERE submission_id = $1
        ORDER BY created_at
        "#,
    )
    .bind(job.submission_id)
    .fetch_all(&mut **tx)
    .await?;

    // First job entering scoring moves the submission to validating.
    if matches!(outcome, JobOutcome::Scoring) && status == SubmissionStatus::Pending {
        sqlx::query(
            "UPDATE submissions SET status = 'validating', updated_at = NOW() WHERE id = $1",
        )
        .bind(job.submission_id)
        .execute(&mut **tx)
        .await?;
    }

    // A completed score is copied onto the submission immediately.
    if matches!(outcome, JobOutcome::Completed { .. }) {
        let aggregate = strategy.aggregate_score(&jobs);
        let mut scorers = scored_by.clone();
        if !scorers.contains(&job.screener_id) {
            scorers.push(job.screener_id);
        }
        sqlx::query(
            "UPDATE submissions SET score = $2, scored_by = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(job.submission_id)
        .bind(aggregate)
        .bind(&scorers)
        .execute(&mut **tx)
        .await?;
    }

    // Once every job is terminal, the combination policy settles the status.
    let all_terminal = !jobs.is_empty() && jobs.iter().all(|j| j.is_terminal());
    if all_terminal && status.is_awaiting_outcome() {
        let final_status = strategy.decide(&jobs);
        sqlx::query("UPDATE submissions SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(job.submission_id)
            .bind(final_status)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

/// Discard all scoring history for a submission and return it to pending.
///
/// Deletes every scoring task, then every scoring job, then resets the
/// submission's status, score and scorer list, all inside one transaction
/// so readers never observe a partially reset submission. The admin check
/// happens at the route boundary.
pub async fn rescore_submission(pool: &PgPool, submission_id: Uuid) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let exists: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM submissions WHERE id = $1 FOR UPDATE")
            .bind(submission_id)
            .fetch_optional(&mut *tx)
            .await?;

    if exists.is_none() {
        return Err(AppError::NotFound(format!(
            "Submission not found: {}",
            submission_id
        )));
    }

    sqlx::query(
        r#"
        DELETE FROM scoring_tasks
        WHERE job_id IN (SELECT id FROM scoring_jobs WHERE submission_id = $1)
        "#,
    )
    .bind(submission_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM scoring_jobs WHERE submission_id = $1")
        .bind(submission_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        UPDATE submissions
        SET status = 'pending', score = NULL, scored_by = '{}', updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(submission_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(submission_id = %submission_id, "Submission reset for rescoring");
    Ok(())
}
