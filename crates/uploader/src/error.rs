//! Upload error types.

use reelup_transfer::TransferError;

/// Outcome of a single failed protocol request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChunkError {
    #[error("network error: {0}")]
    Network(String),

    /// 5xx, 409 (offset conflict) or 423 (upload locked).
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("request rejected with {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The remote upload no longer exists (404/410).
    #[error("upload not found on server")]
    Gone,

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ChunkError {
    /// Whether another attempt of the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }

    /// Classifies an HTTP status that is not a success.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            404 | 410 => Self::Gone,
            409 | 423 | 500..=599 => Self::Server { status, body },
            _ => Self::Rejected { status, body },
        }
    }
}

impl From<reqwest::Error> for ChunkError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// Terminal errors reported by an upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: usize,
        #[source]
        source: ChunkError,
    },

    #[error("{operation} failed: {source}")]
    Terminal {
        operation: &'static str,
        #[source]
        source: ChunkError,
    },

    #[error("an upload for this file is already in progress")]
    AlreadyInProgress,

    #[error("cancelled")]
    Cancelled,

    #[error("session request failed with {status}: {message}")]
    Session { status: u16, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(ChunkError::from_status(404, String::new()), ChunkError::Gone));
        assert!(matches!(ChunkError::from_status(410, String::new()), ChunkError::Gone));
        assert!(ChunkError::from_status(500, String::new()).is_retryable());
        assert!(ChunkError::from_status(503, String::new()).is_retryable());
        assert!(ChunkError::from_status(409, String::new()).is_retryable());
        assert!(ChunkError::from_status(423, String::new()).is_retryable());
        assert!(!ChunkError::from_status(400, String::new()).is_retryable());
        assert!(!ChunkError::from_status(403, String::new()).is_retryable());
        assert!(!ChunkError::from_status(413, String::new()).is_retryable());
    }

    #[test]
    fn network_and_protocol_retryability() {
        assert!(ChunkError::Network("reset".into()).is_retryable());
        assert!(!ChunkError::Protocol("bad offset".into()).is_retryable());
        assert!(!ChunkError::Gone.is_retryable());
    }

    #[test]
    fn error_messages() {
        let err = UploadError::RetriesExhausted {
            operation: "upload chunk",
            attempts: 5,
            source: ChunkError::Server {
                status: 502,
                body: "bad gateway".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "upload chunk failed after 5 attempts: server returned 502: bad gateway"
        );
        assert_eq!(UploadError::Cancelled.to_string(), "cancelled");
    }
}
