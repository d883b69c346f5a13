//! Object storage addressing.
//!
//! File bytes live in external blob storage; this service hands out
//! time-limited signed download URLs and never streams object bytes itself.
//! The one exception is the legacy uploads fallback, which serves files
//! from a local directory for submissions predating the blob store, with a
//! traversal guard on the requested path.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;

/// Default lifetime of a signed download URL.
pub const DOWNLOAD_URL_TTL_SECS: i64 = 3600;

/// A time-limited download URL for one stored object.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs download URLs and resolves legacy upload paths.
pub struct ObjectStore {
    base_url: String,
    signing_secret: String,
    uploads_dir: PathBuf,
}

impl ObjectStore {
    pub fn new(base_url: String, signing_secret: String, uploads_dir: PathBuf) -> Self {
        Self {
            base_url,
            signing_secret,
            uploads_dir,
        }
    }

    /// Produce a signed download URL for a storage key, valid for
    /// [`DOWNLOAD_URL_TTL_SECS`].
    pub fn signed_download_url(&self, storage_key: &str) -> SignedUrl {
        let expires_at = Utc::now() + Duration::seconds(DOWNLOAD_URL_TTL_SECS);
        let expires = expires_at.timestamp();
        let signature = self.signature(storage_key, expires);

        SignedUrl {
            url: format!(
                "{}/{}?expires={}&signature={}",
                self.base_url.trim_end_matches('/'),
                storage_key,
                expires,
                signature
            ),
            expires_at,
        }
    }

    fn signature(&self, storage_key: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_secret.as_bytes());
        hasher.update(b":");
        hasher.update(storage_key.as_bytes());
        hasher.update(b":");
        hasher.update(expires.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Resolve a legacy upload request path against the uploads directory.
    ///
    /// Rejects absolute paths and any `..` component so a request can never
    /// escape the uploads root.
    pub fn resolve_upload_path(&self, requested: &str) -> Result<PathBuf, AppError> {
        let clean = sanitize_relative_path(Path::new(requested))?;
        Ok(self.uploads_dir.join(clean))
    }

    /// Generate a fresh storage key for an uploaded file.
    pub fn generate_storage_key(original_name: &str) -> String {
        let nonce: u32 = rand::random();
        format!(
            "submissions/{}-{:08x}-{}",
            Uuid::new_v4(),
            nonce,
            sanitize_file_name(original_name)
        )
    }
}

fn sanitize_relative_path(path: &Path) -> Result<PathBuf, AppError> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(AppError::Forbidden("Invalid upload path".to_string()));
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(AppError::BadRequest("Empty upload path".to_string()));
    }
    Ok(clean)
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ObjectStore {
        ObjectStore::new(
            "https://files.example.com/objects".to_string(),
            "test-secret".to_string(),
            PathBuf::from("/var/huntboard/uploads"),
        )
    }

    #[test]
    fn test_signed_url_shape() {
        let signed = store().signed_download_url("submissions/abc/report.pdf");
        assert!(signed
            .url
            .starts_with("https://files.example.com/objects/submissions/abc/report.pdf?expires="));
        assert!(signed.url.contains("&signature="));
        assert!(signed.expires_at > Utc::now());
    }

    #[test]
    fn test_signature_depends_on_key_and_expiry() {
        let store = store();
        let a = store.signature("key-a", 1000);
        let b = store.signature("key-b", 1000);
        let c = store.signature("key-a", 2000);
        assert_ne!(a, b);
        assert_ne!(a, c);
        // Deterministic for identical inputs.
        assert_eq!(a, store.signature("key-a", 1000));
    }

    #[test]
    fn test_upload_path_resolves_inside_uploads_dir() {
        let resolved = store().resolve_upload_path("2024/report.pdf").unwrap();
        assert_eq!(
            resolved,
            PathBuf::from("/var/huntboard/uploads/2024/report.pdf")
        );
    }

    #[test]
    fn test_upload_path_rejects_traversal() {
        let store = store();
        assert!(store.resolve_upload_path("../etc/passwd").is_err());
        assert!(store.resolve_upload_path("2024/../../etc/passwd").is_err());
        assert!(store.resolve_upload_path("/etc/passwd").is_err());
        assert!(store.resolve_upload_path("").is_err());
    }

    #[test]
    fn test_upload_path_allows_current_dir_components() {
        let resolved = store().resolve_upload_path("./2024/./report.pdf").unwrap();
        assert_eq!(
            resolved,
            PathBuf::from("/var/huntboard/uploads/2024/report.pdf")
        );
    }

    #[test]
    fn test_storage_key_sanitizes_name() {
        let key = ObjectStore::generate_storage_key("my report (final).pdf");
        assert!(key.starts_with("submissions/"));
        assert!(key.ends_with("my_report__final_.pdf"));
        assert!(!key.contains(' '));
    }
}
