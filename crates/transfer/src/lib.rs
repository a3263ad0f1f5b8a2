//! Chunked file reading with resume support.
//!
//! Provides the pieces the uploader composes: an async [`ChunkReader`],
//! the [`Fingerprint`] that ties a local file to an upload endpoint,
//! [`ResumeStore`] implementations that remember interrupted uploads,
//! and the fixed [`RetrySchedule`].

mod chunked;
mod fingerprint;
mod retry;
mod store;

pub use chunked::{Chunk, ChunkReader};
pub use fingerprint::Fingerprint;
pub use retry::RetrySchedule;
pub use store::{
    FileResumeStore, MemoryResumeStore, ResumeState, ResumeStore, default_store_path,
};

/// Default chunk size: the one the session issuer hands out (6 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = reelup_protocol::constants::SESSION_CHUNK_SIZE;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("offset {offset} is beyond the file size {size}")]
    OffsetOutOfRange { offset: u64, size: u64 },
}
