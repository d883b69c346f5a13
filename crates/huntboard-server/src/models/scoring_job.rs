//! Scoring job and scoring task models.
//!
//! A scoring job is one assignment of a submission to a screener. Jobs are
//! created and dispatched by an external process; this service owns their
//! lifecycle records and the consistency between jobs and their submission.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Status of a scoring job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "scoring_job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScoringJobStatus {
    /// Waiting for the dispatcher to hand the job to its screener.
    Pending,
    /// Screener has acknowledged the job.
    Assigned,
    /// Screener is actively scoring.
    Scoring,
    /// Screener produced a score.
    Completed,
    /// Screener failed; may re-queue while retries remain.
    Failed,
    /// Job was withdrawn before completion.
    Cancelled,
}

impl ScoringJobStatus {
    /// Terminal states are never re-entered; only a rescore restarts the chain.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScoringJobStatus::Completed | ScoringJobStatus::Failed | ScoringJobStatus::Cancelled
        )
    }
}

/// One assignment of a submission to a screener.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScoringJob {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub screener_id: Uuid,
    pub status: ScoringJobStatus,
    /// Score reported by the screener on completion.
    pub score: Option<BigDecimal>,
    /// Failure detail reported by the screener, if any.
    pub error: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One evaluation dimension under a scoring job. Cascades with its parent.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScoringTask {
    pub id: Uuid,
    pub job_id: Uuid,
    pub dimension: String,
    pub weight: BigDecimal,
    pub score: Option<BigDecimal>,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ScoringJob {
    /// Check if a failure may be re-queued instead of sticking as failed.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ScoringJobStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&ScoringJobStatus::Scoring).unwrap(),
            "\"scoring\""
        );
        assert_eq!(
            serde_json::to_string(&ScoringJobStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ScoringJobStatus::Pending.is_terminal());
        assert!(!ScoringJobStatus::Assigned.is_terminal());
        assert!(!ScoringJobStatus::Scoring.is_terminal());
        assert!(ScoringJobStatus::Completed.is_terminal());
        assert!(ScoringJobStatus::Failed.is_terminal());
        assert!(ScoringJobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_can_retry() {
        let now = Utc::now();
        let mut job = ScoringJob {
            id: Uuid::new_v4(),
            submission_id: Uuid::new_v4(),
            screener_id: Uuid::new_v4(),
            status: ScoringJobStatus::Failed,
            score: None,
            error: Some("screener timeout".to_string()),
            retry_count: 0,
            max_retries: 3,
            started_at: None,
            completed_at: None,
            created_at: now,
        };

        assert!(job.can_retry());
        job.retry_count = 3;
        assert!(!job.can_retry());
    }
}
