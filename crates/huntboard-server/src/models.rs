//! Database models for the huntboard marketplace.

pub mod bounty;
pub mod scoring_job;
pub mod screener;
pub mod submission;
pub mod submission_file;
pub mod suggestion;
pub mod vote;

pub use bounty::{Bounty, BountyStatus, NewBounty, WinningSpot};
pub use scoring_job::{ScoringJob, ScoringJobStatus, ScoringTask};
pub use screener::{NewScreener, Screener};
pub use submission::{ContentType, NewSubmission, Submission, SubmissionStatus};
pub use submission_file::{FileCategory, NewSubmissionFile, SubmissionFile};
pub use suggestion::{SuggestedBounty, SuggestionStatus};
pub use vote::{Vote, VoteAction, VoteType};
