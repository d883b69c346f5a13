//! Vote model.
//!
//! A user holds at most one vote per submission, enforced by a UNIQUE
//! constraint on (submission_id, user_id). Re-casting the same type removes
//! the vote; casting the other type switches it in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Direction of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "vote_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VoteType {
    Upvote,
    Downvote,
}

/// A user's vote on a submission.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vote {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub user_id: Uuid,
    pub vote_type: VoteType,
    pub created_at: DateTime<Utc>,
}

/// Storage action a cast resolves to, given the voter's existing vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    /// No existing vote: insert the cast type.
    Insert,
    /// Existing vote of the same type: remove it.
    Remove,
    /// Existing vote of the other type: switch it in place.
    Switch,
}

impl VoteAction {
    /// Resolve the toggle semantics of a cast against the current vote.
    pub fn for_cast(existing: Option<VoteType>, cast: VoteType) -> Self {
        match existing {
            None => VoteAction::Insert,
            Some(current) if current == cast => VoteAction::Remove,
            Some(_) => VoteAction::Switch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_type_serialization() {
        assert_eq!(
            serde_json::to_string(&VoteType::Upvote).unwrap(),
            "\"upvote\""
        );
        assert_eq!(
            serde_json::to_string(&VoteType::Downvote).unwrap(),
            "\"downvote\""
        );
    }

    #[test]
    fn test_first_cast_inserts() {
        assert_eq!(
            VoteAction::for_cast(None, VoteType::Upvote),
            VoteAction::Insert
        );
        assert_eq!(
            VoteAction::for_cast(None, VoteType::Downvote),
            VoteAction::Insert
        );
    }

    #[test]
    fn test_same_type_removes() {
        assert_eq!(
            VoteAction::for_cast(Some(VoteType::Upvote), VoteType::Upvote),
            VoteAction::Remove
        );
        assert_eq!(
            VoteAction::for_cast(Some(VoteType::Downvote), VoteType::Downvote),
            VoteAction::Remove
        );
    }

    #[test]
    fn test_other_type_switches() {
        assert_eq!(
            VoteAction::for_cast(Some(VoteType::Upvote), VoteType::Downvote),
            VoteAction::Switch
        );
        assert_eq!(
            VoteAction::for_cast(Some(VoteType::Downvote), VoteType::Upvote),
            VoteAction::Switch
        );
    }
}
