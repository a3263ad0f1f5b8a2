//! Upload orchestrator.
//!
//! Runs one upload per spawned task: resumes or creates the remote upload,
//! sends chunks sequentially with retry, reports progress over a channel
//! and supports cancellation.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use reelup_protocol::UploadProgress;
use reelup_protocol::constants::{MAX_RECOMMENDED_CHUNK_SIZE, MIN_RECOMMENDED_CHUNK_SIZE};
use reelup_transfer::{ChunkReader, Fingerprint, ResumeState, ResumeStore, TransferError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ChunkError, UploadError};
use crate::transport::{CreateUpload, UploadTransport};
use crate::types::{UploadEvent, UploadOptions, UploadOutcome, UploadRequest};

/// Capacity of each upload's event channel.
///
/// Progress events never take the last slot, which stays free for the
/// terminal event.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Starts uploads and keeps at most one running per fingerprint.
pub struct UploadOrchestrator {
    transport: Arc<dyn UploadTransport>,
    store: Arc<dyn ResumeStore>,
    options: UploadOptions,
    active: Arc<Mutex<HashSet<Fingerprint>>>,
}

impl UploadOrchestrator {
    /// Creates an orchestrator with default options.
    pub fn new(transport: Arc<dyn UploadTransport>, store: Arc<dyn ResumeStore>) -> Self {
        Self {
            transport,
            store,
            options: UploadOptions::default(),
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_options(mut self, options: UploadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Number of uploads currently running.
    pub fn active_uploads(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Starts uploading `request.path` to `request.endpoint`.
    ///
    /// Returns as soon as the upload task is spawned. Fails with
    /// [`UploadError::AlreadyInProgress`] if the same file is already being
    /// uploaded to the same endpoint.
    pub async fn start(&self, request: UploadRequest) -> Result<UploadHandle, UploadError> {
        let fingerprint = Fingerprint::for_file(&request.path, &request.endpoint).await?;
        let guard = ActiveGuard::claim(self.active.clone(), fingerprint.clone())?;

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let task = UploadTask {
            transport: self.transport.clone(),
            store: self.store.clone(),
            options: self.options.clone(),
            request,
            fingerprint,
            cancel: cancel.clone(),
            events_tx,
        };

        let task = tokio::spawn(async move {
            let _guard = guard;
            task.run().await
        });

        Ok(UploadHandle {
            events: Some(events_rx),
            cancel,
            task,
        })
    }
}

/// Caller's view of a running upload.
pub struct UploadHandle {
    events: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
    task: JoinHandle<UploadOutcome>,
}

impl UploadHandle {
    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events.take()
    }

    /// Aborts the upload. In-flight requests and backoff sleeps stop at once.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns a cancellation token for this upload.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the upload to end.
    ///
    /// Events not yet taken are discarded.
    pub async fn wait(mut self) -> UploadOutcome {
        drop(self.events.take());
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => UploadOutcome::Failed(Arc::new(UploadError::Io(std::io::Error::other(
                format!("upload task failed: {e}"),
            )))),
        }
    }
}

/// Marks a fingerprint as active until dropped.
struct ActiveGuard {
    active: Arc<Mutex<HashSet<Fingerprint>>>,
    fingerprint: Fingerprint,
}

impl ActiveGuard {
    fn claim(
        active: Arc<Mutex<HashSet<Fingerprint>>>,
        fingerprint: Fingerprint,
    ) -> Result<Self, UploadError> {
        let inserted = active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fingerprint.clone());
        if !inserted {
            return Err(UploadError::AlreadyInProgress);
        }
        Ok(Self {
            active,
            fingerprint,
        })
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.fingerprint);
    }
}

/// A single upload attempt, owned by its spawned task.
struct UploadTask {
    transport: Arc<dyn UploadTransport>,
    store: Arc<dyn ResumeStore>,
    options: UploadOptions,
    request: UploadRequest,
    fingerprint: Fingerprint,
    cancel: CancellationToken,
    events_tx: mpsc::Sender<UploadEvent>,
}

impl UploadTask {
    async fn run(self) -> UploadOutcome {
        let file = self.request.path.display().to_string();

        match self.drive().await {
            Ok(RemoteUpload {
                url: upload_url,
                metadata,
                ..
            }) => {
                info!(file = %file, url = %upload_url, "upload completed");
                self.emit(UploadEvent::Completed {
                    upload_url: upload_url.clone(),
                    metadata: metadata.clone(),
                })
                .await;
                UploadOutcome::Completed {
                    upload_url,
                    metadata,
                }
            }
            Err(UploadError::Cancelled) => {
                info!(file = %file, "upload cancelled");
                UploadOutcome::Cancelled
            }
            Err(e) => {
                error!(file = %file, error = %e, "upload failed");
                let e = Arc::new(e);
                self.emit(UploadEvent::Failed(e.clone())).await;
                UploadOutcome::Failed(e)
            }
        }
    }

    /// Runs the transfer to completion.
    async fn drive(&self) -> Result<RemoteUpload, UploadError> {
        self.check_cancelled()?;

        let mut reader = ChunkReader::open(&self.request.path, self.request.chunk_size).await?;
        let chunk_size = reader.chunk_size();
        if !(MIN_RECOMMENDED_CHUNK_SIZE..=MAX_RECOMMENDED_CHUNK_SIZE).contains(&chunk_size) {
            warn!(chunk_size, "chunk size outside the recommended 5-10 MiB range");
        }
        let total = reader.file_size();

        let remote = match self.resume_previous(total).await? {
            Some(resumed) => resumed,
            None => self.create_upload(&mut reader).await?,
        };
        let upload_url = remote.url.as_str();
        let mut offset = remote.offset;

        reader.seek_to(offset).await?;
        if offset > 0 || total == 0 {
            self.emit_progress(offset, total);
        }

        while offset < total {
            self.check_cancelled()?;

            let chunk = reader
                .next_chunk()
                .await?
                .ok_or(TransferError::OffsetOutOfRange {
                    offset,
                    size: total,
                })?;

            let acked = self
                .retrying("upload chunk", || {
                    self.transport.send_chunk(
                        upload_url,
                        &self.request.headers,
                        chunk.offset,
                        &chunk.data,
                    )
                })
                .await?;

            if acked <= chunk.offset || acked > total {
                return Err(UploadError::Terminal {
                    operation: "upload chunk",
                    source: ChunkError::Protocol(format!(
                        "server acknowledged offset {acked} for chunk at {} of {total}",
                        chunk.offset
                    )),
                });
            }
            debug!(offset = acked, total, "chunk acknowledged");

            if acked != chunk.end() {
                reader.seek_to(acked).await?;
            }
            offset = acked;
            self.emit_progress(offset, total);
        }

        if self.options.remove_fingerprint_on_success
            && let Err(e) = self.store.remove(&self.fingerprint)
        {
            warn!(error = %e, "failed to clear resume state");
        }

        Ok(RemoteUpload { offset, ..remote })
    }

    /// Looks for an earlier upload of this file and asks the server where
    /// it stopped. Stale state is discarded.
    ///
    /// A resumed upload keeps the metadata it was created with, which may
    /// name a different object than the current request.
    async fn resume_previous(&self, total: u64) -> Result<Option<RemoteUpload>, UploadError> {
        let Some(state) = self.store.latest(&self.fingerprint)? else {
            return Ok(None);
        };

        if state.size != total {
            warn!(url = %state.upload_url, "discarding resume state for a different file size");
            self.store.remove(&self.fingerprint)?;
            return Ok(None);
        }

        let result = self
            .retrying("query offset", || {
                self.transport
                    .query_offset(&state.upload_url, &self.request.headers)
            })
            .await;

        match result {
            Ok(offset) if offset <= total => {
                info!(url = %state.upload_url, offset, total, "resuming upload");
                let metadata = if state.metadata.is_empty() {
                    self.request.metadata.clone()
                } else {
                    state.metadata
                };
                if metadata != self.request.metadata {
                    info!(
                        object = metadata.get("objectName").map(String::as_str).unwrap_or_default(),
                        "resumed upload keeps its original metadata"
                    );
                }
                Ok(Some(RemoteUpload {
                    url: state.upload_url,
                    offset,
                    metadata,
                }))
            }
            Ok(offset) => {
                warn!(url = %state.upload_url, offset, total, "server offset beyond file size, starting over");
                self.store.remove(&self.fingerprint)?;
                Ok(None)
            }
            Err(UploadError::Terminal { source, .. }) => {
                warn!(url = %state.upload_url, error = %source, "discarding stale resume state");
                self.store.remove(&self.fingerprint)?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Creates a new remote upload and records it for later resumption.
    async fn create_upload(&self, reader: &mut ChunkReader) -> Result<RemoteUpload, UploadError> {
        let total = reader.file_size();
        let first = if self.options.upload_data_during_creation {
            reader.next_chunk().await?
        } else {
            None
        };

        let created = self
            .retrying("create upload", || {
                self.transport.create(CreateUpload {
                    endpoint: &self.request.endpoint,
                    length: total,
                    metadata: &self.request.metadata,
                    headers: &self.request.headers,
                    initial_data: first.as_ref().map(|c| c.data.as_slice()),
                })
            })
            .await?;

        if created.offset > total {
            return Err(UploadError::Terminal {
                operation: "create upload",
                source: ChunkError::Protocol(format!(
                    "server reported offset {} for a {total} byte file",
                    created.offset
                )),
            });
        }

        self.store.save(
            &self.fingerprint,
            ResumeState {
                upload_url: created.upload_url.clone(),
                size: total,
                created_at: Utc::now(),
                metadata: self.request.metadata.clone(),
            },
        )?;

        info!(url = %created.upload_url, total, "created upload");
        Ok(RemoteUpload {
            url: created.upload_url,
            offset: created.offset,
            metadata: self.request.metadata.clone(),
        })
    }

    /// Runs `call` under the retry schedule.
    ///
    /// Each attempt waits for its scheduled delay first. Cancellation
    /// interrupts both the delay and the request.
    async fn retrying<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, UploadError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChunkError>>,
    {
        let attempts = self.options.retry.attempts();
        let mut attempt = 1;

        loop {
            let delay = self
                .options
                .retry
                .delay_for_attempt(attempt)
                .unwrap_or_default();
            if !delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            self.check_cancelled()?;

            let result = tokio::select! {
                _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                result = call() => result,
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(operation, attempt, error = %e, "request failed, will retry");
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    return Err(UploadError::RetriesExhausted {
                        operation,
                        attempts,
                        source: e,
                    });
                }
                Err(e) => return Err(UploadError::Terminal { operation, source: e }),
            }
        }
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Reports progress without waiting on the receiver. Dropped when the
    /// channel is down to its last slot.
    fn emit_progress(&self, bytes_uploaded: u64, bytes_total: u64) {
        if self.events_tx.capacity() <= 1 {
            debug!(bytes_uploaded, "event channel full, dropping progress");
            return;
        }
        let _ = self.events_tx.try_send(UploadEvent::Progress(UploadProgress {
            bytes_uploaded,
            bytes_total,
        }));
    }

    /// Sends a terminal event, giving up if the upload is cancelled first.
    async fn emit(&self, event: UploadEvent) {
        tokio::select! {
            biased;
            _ = self.events_tx.send(event) => {}
            _ = self.cancel.cancelled() => {}
        }
    }
}

/// The remote upload being written to.
struct RemoteUpload {
    url: String,
    offset: u64,
    /// Metadata the remote upload was created with.
    metadata: BTreeMap<String, String>,
}
