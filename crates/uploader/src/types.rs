use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use reelup_protocol::UploadProgress;
use reelup_protocol::constants::headers::X_UPSERT;
use reelup_protocol::types::UploadSession;
use reelup_transfer::RetrySchedule;

use crate::error::UploadError;

/// Cache lifetime, in seconds, requested for uploaded objects.
pub const CACHE_CONTROL_SECS: &str = "3600";

/// Everything needed to upload one local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub path: PathBuf,
    /// Resumable-upload endpoint on the storage host.
    pub endpoint: String,
    /// Extra headers sent with every protocol request.
    pub headers: HashMap<String, String>,
    /// Bytes per chunk. 0 selects the default.
    pub chunk_size: u64,
    /// Upload metadata sent at creation time.
    pub metadata: BTreeMap<String, String>,
}

impl UploadRequest {
    /// Builds the request for `path` from an issued session.
    ///
    /// The storage host expects the caller's bearer token, the upsert flag,
    /// and the bucket, object, content type and cache lifetime as metadata.
    pub fn from_session(
        path: impl Into<PathBuf>,
        session: &UploadSession,
        access_token: &str,
    ) -> Self {
        let path = path.into();
        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .to_string();

        let mut headers = HashMap::new();
        headers.insert("authorization".to_string(), format!("Bearer {access_token}"));
        headers.insert(X_UPSERT.to_string(), "true".to_string());

        let mut metadata = BTreeMap::new();
        metadata.insert("bucketName".to_string(), session.bucket_name.clone());
        metadata.insert("objectName".to_string(), session.object_name.clone());
        metadata.insert("contentType".to_string(), content_type);
        metadata.insert("cacheControl".to_string(), CACHE_CONTROL_SECS.to_string());

        Self {
            path,
            endpoint: session.upload_endpoint.clone(),
            headers,
            chunk_size: session.chunk_size,
            metadata,
        }
    }
}

/// Behaviour switches for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub retry: RetrySchedule,
    /// Forget the resume state once the upload completes.
    pub remove_fingerprint_on_success: bool,
    /// Send the first chunk with the creation request.
    pub upload_data_during_creation: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            retry: RetrySchedule::default(),
            remove_fingerprint_on_success: true,
            upload_data_during_creation: true,
        }
    }
}

/// Events emitted while an upload runs.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    Progress(UploadProgress),
    /// `metadata` is what the remote upload was created with. After a
    /// resume it can differ from the request's.
    Completed {
        upload_url: String,
        metadata: BTreeMap<String, String>,
    },
    Failed(Arc<UploadError>),
}

/// How an upload ended.
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Completed {
        upload_url: String,
        metadata: BTreeMap<String, String>,
    },
    Failed(Arc<UploadError>),
    Cancelled,
}

impl UploadOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Object key the file was stored under, for a completed upload.
    pub fn object_name(&self) -> Option<&str> {
        match self {
            Self::Completed { metadata, .. } => metadata.get("objectName").map(String::as_str),
            _ => None,
        }
    }
}
