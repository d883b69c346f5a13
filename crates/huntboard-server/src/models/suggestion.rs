//! Suggested bounty model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Review status of a user-proposed bounty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "suggestion_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Approved,
    Rejected,
}

/// A user-proposed bounty awaiting admin review. On approval it is
/// materialized into a real bounty and linked via `bounty_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SuggestedBounty {
    pub id: Uuid,
    pub suggester_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: SuggestionStatus,
    pub review_note: Option<String>,
    /// Set when the suggestion is approved and materialized.
    pub bounty_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&SuggestionStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&SuggestionStatus::Approved).unwrap(),
            "\"approved\""
        );
    }
}
