use std::fmt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::TransferError;

/// Identifies a (file, endpoint) pair across upload attempts.
///
/// Two attempts with the same fingerprint target the same remote upload,
/// so a new attempt continues the old one instead of starting over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derives a fingerprint from file identity and the upload endpoint.
    pub fn new(path: &Path, size: u64, modified: Option<SystemTime>, endpoint: &str) -> Self {
        let modified_ms = modified
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis())
            .unwrap_or(0);

        let mut hasher = Sha256::new();
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update([0]);
        hasher.update(size.to_le_bytes());
        hasher.update(modified_ms.to_le_bytes());
        hasher.update([0]);
        hasher.update(endpoint.trim_end_matches('/').as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Reads the file's metadata and derives its fingerprint for `endpoint`.
    pub async fn for_file(path: &Path, endpoint: &str) -> Result<Self, TransferError> {
        let canonical = tokio::fs::canonicalize(path).await?;
        let metadata = tokio::fs::metadata(&canonical).await?;
        Ok(Self::new(
            &canonical,
            metadata.len(),
            metadata.modified().ok(),
            endpoint,
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const ENDPOINT: &str = "https://p.storage.example.com/storage/v1/upload/resumable";

    fn at(ms: u64) -> Option<SystemTime> {
        Some(UNIX_EPOCH + Duration::from_millis(ms))
    }

    #[test]
    fn deterministic() {
        let a = Fingerprint::new(Path::new("/v/clip.mp4"), 10, at(5), ENDPOINT);
        let b = Fingerprint::new(Path::new("/v/clip.mp4"), 10, at(5), ENDPOINT);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn differs_per_endpoint() {
        let a = Fingerprint::new(Path::new("/v/clip.mp4"), 10, at(5), ENDPOINT);
        let b = Fingerprint::new(Path::new("/v/clip.mp4"), 10, at(5), "https://other/upload");
        assert_ne!(a, b);
    }

    #[test]
    fn trailing_slash_on_endpoint_ignored() {
        let a = Fingerprint::new(Path::new("/v/clip.mp4"), 10, at(5), ENDPOINT);
        let b = Fingerprint::new(Path::new("/v/clip.mp4"), 10, at(5), &format!("{ENDPOINT}/"));
        assert_eq!(a, b);
    }

    #[test]
    fn differs_when_file_changes() {
        let base = Fingerprint::new(Path::new("/v/clip.mp4"), 10, at(5), ENDPOINT);
        let resized = Fingerprint::new(Path::new("/v/clip.mp4"), 11, at(5), ENDPOINT);
        let touched = Fingerprint::new(Path::new("/v/clip.mp4"), 10, at(6), ENDPOINT);
        let moved = Fingerprint::new(Path::new("/w/clip.mp4"), 10, at(5), ENDPOINT);
        assert_ne!(base, resized);
        assert_ne!(base, touched);
        assert_ne!(base, moved);
    }

    #[tokio::test]
    async fn for_file_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"video").unwrap();

        let a = Fingerprint::for_file(&path, ENDPOINT).await.unwrap();
        let b = Fingerprint::for_file(&path, ENDPOINT).await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn serializes_as_plain_string() {
        let fp = Fingerprint::new(Path::new("/v/clip.mp4"), 10, None, ENDPOINT);
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, format!("\"{}\"", fp.as_str()));
    }
}
