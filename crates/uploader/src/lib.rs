//! Client side of the resumable reel upload path.
//!
//! This crate implements the **upload logic**: it resumes or creates a
//! remote upload, sends the file in sequential chunks with retry, and
//! reports progress. It talks to the storage server through the
//! [`UploadTransport`] trait; [`TusTransport`] is the HTTP implementation.
//!
//! # Flow
//!
//! 1. **Session**: [`SessionClient`] asks the issuer for upload parameters
//! 2. **Resume**: look up an earlier upload of the same file and query its offset
//! 3. **Create**: otherwise create a new upload, optionally with the first chunk
//! 4. **Upload**: send the remaining chunks, emitting progress events
//! 5. **Finish**: clear the resume state and emit `Completed`

pub mod error;
pub mod orchestrator;
pub mod session;
pub mod transport;
pub mod tus;
pub mod types;

pub use error::{ChunkError, UploadError};
pub use orchestrator::{UploadHandle, UploadOrchestrator};
pub use session::SessionClient;
pub use transport::{CreateUpload, CreatedUpload, TransportFuture, UploadTransport};
pub use tus::TusTransport;
pub use types::{UploadEvent, UploadOptions, UploadOutcome, UploadRequest};
