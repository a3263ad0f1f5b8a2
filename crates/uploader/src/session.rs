//! Client for the session issuer.

use reelup_protocol::types::{ErrorResponse, IssueSessionRequest, UploadSession};
use tracing::debug;

use crate::error::UploadError;

/// Requests upload sessions from a session issuer.
#[derive(Debug, Clone)]
pub struct SessionClient {
    http: reqwest::Client,
    issuer_url: String,
}

impl SessionClient {
    /// Creates a client for the issuer at `issuer_url`.
    pub fn new(issuer_url: impl Into<String>) -> Result<Self, UploadError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_client(http, issuer_url))
    }

    pub fn with_client(http: reqwest::Client, issuer_url: impl Into<String>) -> Self {
        Self {
            http,
            issuer_url: issuer_url.into(),
        }
    }

    /// Asks the issuer for a new upload session.
    ///
    /// Non-success responses become [`UploadError::Session`] carrying the
    /// issuer's error message when it sent one.
    pub async fn request_session(
        &self,
        access_token: &str,
        file_name: Option<&str>,
    ) -> Result<UploadSession, UploadError> {
        let body = IssueSessionRequest {
            file_name: file_name.map(str::to_string),
        };

        let resp = self
            .http
            .post(&self.issuer_url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            return Err(UploadError::Session {
                status: status.as_u16(),
                message,
            });
        }

        let session: UploadSession = resp.json().await?;
        debug!(object = %session.object_name, "received upload session");
        Ok(session)
    }
}
