//! Upload transport trait.
//!
//! `UploadTransport` separates the orchestration logic (resume, retry,
//! progress) from the wire protocol. [`crate::TusTransport`] is the HTTP
//! implementation; tests use in-memory mocks.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;

use crate::error::ChunkError;

/// Boxed future returned by transport methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ChunkError>> + Send + 'a>>;

/// Parameters of an upload creation request.
#[derive(Debug, Clone)]
pub struct CreateUpload<'a> {
    pub endpoint: &'a str,
    /// Total size of the file.
    pub length: u64,
    pub metadata: &'a BTreeMap<String, String>,
    pub headers: &'a HashMap<String, String>,
    /// First bytes of the file, sent with the creation request.
    pub initial_data: Option<&'a [u8]>,
}

/// A newly created remote upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedUpload {
    /// Absolute URL of the upload resource.
    pub upload_url: String,
    /// Bytes the server has accepted so far.
    pub offset: u64,
}

/// Abstract connection to a resumable-upload server.
pub trait UploadTransport: Send + Sync {
    /// Creates a new upload resource.
    fn create<'a>(&'a self, request: CreateUpload<'a>) -> TransportFuture<'a, CreatedUpload>;

    /// Asks the server how many bytes of `upload_url` it holds.
    fn query_offset<'a>(
        &'a self,
        upload_url: &'a str,
        headers: &'a HashMap<String, String>,
    ) -> TransportFuture<'a, u64>;

    /// Sends `data` starting at `offset`. Returns the server's new offset.
    fn send_chunk<'a>(
        &'a self,
        upload_url: &'a str,
        headers: &'a HashMap<String, String>,
        offset: u64,
        data: &'a [u8],
    ) -> TransportFuture<'a, u64>;
}
