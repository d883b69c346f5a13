//! Submission file metadata.
//!
//! File bytes live in external object storage, addressed by an opaque
//! storage key. This service only records metadata and signs download URLs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Coarse category of an uploaded file, derived from its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "file_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Document,
    Image,
    Archive,
    Other,
}

impl FileCategory {
    /// Derive a category from a MIME type.
    pub fn from_mime(mime_type: &str) -> Self {
        let mime = mime_type.to_ascii_lowercase();
        if mime.starts_with("image/") {
            FileCategory::Image
        } else if mime.starts_with("text/")
            || mime == "application/pdf"
            || mime == "application/msword"
            || mime.starts_with("application/vnd.openxmlformats-officedocument")
        {
            FileCategory::Document
        } else if mime == "application/zip"
            || mime == "application/gzip"
            || mime == "application/x-tar"
            || mime == "application/x-7z-compressed"
        {
            FileCategory::Archive
        } else {
            FileCategory::Other
        }
    }
}

/// Metadata of a file owned by exactly one submission.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubmissionFile {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub original_name: String,
    /// Opaque key addressing the object in blob storage.
    pub storage_key: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub category: FileCategory,
    pub created_at: DateTime<Utc>,
}

/// Data required to register an uploaded file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubmissionFile {
    pub original_name: String,
    pub storage_key: String,
    pub size_bytes: i64,
    pub mime_type: String,
}
