//! Submission model for the huntboard marketplace.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "submission_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Submission is awaiting screener assignment.
    Pending,
    /// Submission is being scored by one or more screeners.
    Validating,
    /// Screening finished and the submission passed.
    Approved,
    /// Screening finished and the submission did not pass.
    Rejected,
    /// Submission was selected as a winning entry.
    Winner,
}

/// Kind of content a submission carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "submission_content_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// One or more URLs pointing at the work.
    Url,
    /// One or more uploaded files.
    File,
    /// Free-form text content.
    Text,
    /// Any combination of the above.
    Mixed,
}

/// Represents a hunter's entry against a bounty.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Submission {
    /// Unique identifier for this submission.
    pub id: Uuid,
    /// ID of the bounty this submission targets.
    pub bounty_id: Uuid,
    /// User id of the submitter.
    pub submitter_id: Uuid,
    /// Title of the entry.
    pub title: String,
    /// Description of the work.
    pub description: String,
    /// Free-form text content (required for `text`, optional otherwise).
    pub content: Option<String>,
    /// URLs pointing at the work.
    pub urls: Vec<String>,
    /// Kind of content this submission carries.
    pub content_type: ContentType,
    /// Current status of the submission.
    pub status: SubmissionStatus,
    /// Aggregate score assigned by screeners, if any.
    pub score: Option<BigDecimal>,
    /// Screener ids that have contributed a completed score.
    pub scored_by: Vec<Uuid>,
    /// When this submission was created.
    pub created_at: DateTime<Utc>,
    /// When this submission was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a new submission.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub bounty_id: Uuid,
    pub submitter_id: Uuid,
    pub title: String,
    pub description: String,
    pub content: Option<String>,
    pub urls: Vec<String>,
    pub content_type: ContentType,
}

impl SubmissionStatus {
    /// Statuses a screening outcome may advance a submission from.
    pub fn is_awaiting_outcome(&self) -> bool {
        matches!(self, SubmissionStatus::Pending | SubmissionStatus::Validating)
    }
}

impl Submission {
    pub fn is_pending(&self) -> bool {
        self.status == SubmissionStatus::Pending
    }

    pub fn is_winner(&self) -> bool {
        self.status == SubmissionStatus::Winner
    }
}

/// Validates that the fields required by a content type are present.
///
/// `file_count` is the number of files declared alongside the submission;
/// file rows are registered after this check passes.
pub fn validate_content(
    content_type: ContentType,
    content: Option<&str>,
    urls: &[String],
    file_count: usize,
) -> Result<(), String> {
    let has_text = content.map(|c| !c.trim().is_empty()).unwrap_or(false);
    let has_urls = !urls.is_empty();
    let has_files = file_count > 0;

    if urls.iter().any(|u| u.trim().is_empty()) {
        return Err("URLs cannot be empty".to_string());
    }

    match content_type {
        ContentType::Url if !has_urls => {
            Err("URL submissions require at least one URL".to_string())
        }
        ContentType::Text if !has_text => {
            Err("Text submissions require non-empty content".to_string())
        }
        ContentType::File if !has_files => {
            Err("File submissions require at least one file".to_string())
        }
        ContentType::Mixed if !(has_text || has_urls || has_files) => {
            Err("Mixed submissions require content, URLs or files".to_string())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&SubmissionStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&SubmissionStatus::Validating).unwrap(),
            "\"validating\""
        );
        assert_eq!(
            serde_json::to_string(&SubmissionStatus::Winner).unwrap(),
            "\"winner\""
        );
    }

    #[test]
    fn test_content_type_round_trip() {
        for (ty, text) in [
            (ContentType::Url, "\"url\""),
            (ContentType::File, "\"file\""),
            (ContentType::Text, "\"text\""),
            (ContentType::Mixed, "\"mixed\""),
        ] {
            assert_eq!(serde_json::to_string(&ty).unwrap(), text);
            assert_eq!(serde_json::from_str::<ContentType>(text).unwrap(), ty);
        }
    }

    #[test]
    fn test_awaiting_outcome() {
        assert!(SubmissionStatus::Pending.is_awaiting_outcome());
        assert!(SubmissionStatus::Validating.is_awaiting_outcome());
        assert!(!SubmissionStatus::Approved.is_awaiting_outcome());
        assert!(!SubmissionStatus::Rejected.is_awaiting_outcome());
        assert!(!SubmissionStatus::Winner.is_awaiting_outcome());
    }

    #[test]
    fn test_validate_url_submission() {
        assert!(validate_content(ContentType::Url, None, &["https://example.com/x".into()], 0).is_ok());
        assert!(validate_content(ContentType::Url, None, &[], 0).is_err());
        assert!(validate_content(ContentType::Url, None, &["  ".into()], 0).is_err());
    }

    #[test]
    fn test_validate_text_submission() {
        assert!(validate_content(ContentType::Text, Some("writeup"), &[], 0).is_ok());
        assert!(validate_content(ContentType::Text, Some("   "), &[], 0).is_err());
        assert!(validate_content(ContentType::Text, None, &[], 0).is_err());
    }

    #[test]
    fn test_validate_file_submission() {
        assert!(validate_content(ContentType::File, None, &[], 2).is_ok());
        assert!(validate_content(ContentType::File, None, &[], 0).is_err());
    }

    #[test]
    fn test_validate_mixed_submission() {
        assert!(validate_content(ContentType::Mixed, Some("notes"), &[], 0).is_ok());
        assert!(validate_content(ContentType::Mixed, None, &["https://e.com".into()], 0).is_ok());
        assert!(validate_content(ContentType::Mixed, None, &[], 1).is_ok());
        assert!(validate_content(ContentType::Mixed, None, &[], 0).is_err());
    }
}
