//! Bounty model for the huntboard marketplace.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use crate::models::submission::ContentType;

/// Possible states of a bounty in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "bounty_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BountyStatus {
    /// Bounty exists but is not yet visible to hunters.
    Draft,
    /// Bounty is live and accepting submissions.
    Active,
    /// Bounty is temporarily closed to new submissions.
    Paused,
    /// A winner has been finalized; submission content becomes public.
    Completed,
    /// Bounty was withdrawn by its creator.
    Cancelled,
}

/// Represents a bounty posted by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bounty {
    /// Unique identifier for this bounty.
    pub id: Uuid,
    /// User id of the administrator who posted the bounty.
    pub creator_id: Uuid,
    /// Title of the bounty.
    pub title: String,
    /// Detailed description of the task.
    pub description: String,
    /// Current status of the bounty.
    pub status: BountyStatus,
    /// Submission content types this bounty accepts. Empty means any.
    pub accepted_content_types: Vec<ContentType>,
    /// Optional deadline for submissions.
    pub deadline: Option<DateTime<Utc>>,
    /// When this bounty was created.
    pub created_at: DateTime<Utc>,
    /// When this bounty was last updated.
    pub updated_at: DateTime<Utc>,
}

/// One reward tier of a bounty.
///
/// Positions are unique within a bounty and start at 1.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WinningSpot {
    pub id: Uuid,
    pub bounty_id: Uuid,
    /// Rank this spot pays out for (1 = first place).
    pub position: i32,
    /// Reward paid to this position.
    pub reward: BigDecimal,
    /// Upper bound the reward may grow to.
    pub reward_cap: BigDecimal,
    /// Key identifying the payout destination/denomination.
    pub payout_key: String,
}

/// Data required to create a new bounty.
#[derive(Debug, Clone)]
pub struct NewBounty {
    pub creator_id: Uuid,
    pub title: String,
    pub description: String,
    pub accepted_content_types: Vec<ContentType>,
    pub deadline: Option<DateTime<Utc>>,
}

impl Bounty {
    /// Check if the bounty is live and accepting submissions.
    pub fn is_active(&self) -> bool {
        self.status == BountyStatus::Active
    }

    /// Check if a winner has been finalized.
    pub fn is_completed(&self) -> bool {
        self.status == BountyStatus::Completed
    }

    /// Check if the bounty has passed its deadline.
    pub fn is_expired(&self) -> bool {
        match self.deadline {
            Some(deadline) => Utc::now() > deadline,
            None => false,
        }
    }

    /// Check if new submissions are accepted right now.
    pub fn is_open_for_submissions(&self) -> bool {
        self.is_active() && !self.is_expired()
    }

    /// Check if the given content type is accepted by this bounty.
    pub fn accepts(&self, content_type: ContentType) -> bool {
        self.accepted_content_types.is_empty()
            || self.accepted_content_types.contains(&content_type)
    }
}
