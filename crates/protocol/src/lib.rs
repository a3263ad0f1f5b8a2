//! Wire types shared by the session issuer and the uploader.

pub mod constants;
pub mod types;

// Re-export primary types for convenience.
pub use constants::{DEFAULT_EXTENSION, MEDIA_BUCKET, SESSION_CHUNK_SIZE};
pub use types::{ErrorResponse, IssueSessionRequest, UploadProgress, UploadSession};
