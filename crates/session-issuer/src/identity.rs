//! Caller identity resolution.
//!
//! `IdentityResolver` maps a bearer credential to the caller's identity.
//! [`AuthApiResolver`] asks the hosted auth provider; tests use mocks.

use std::future::Future;
use std::pin::Pin;

use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Errors from identity resolution. All of them mean "not authenticated".
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("auth provider rejected the credential with {status}")]
    Rejected { status: u16 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Boxed future returned by [`IdentityResolver::resolve`].
pub type ResolveFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CallerIdentity, IdentityError>> + Send + 'a>>;

/// Resolves a bearer credential to a caller.
pub trait IdentityResolver: Send + Sync {
    fn resolve<'a>(&'a self, token: &'a str) -> ResolveFuture<'a>;
}

/// Resolver backed by the auth provider's `GET /auth/v1/user` endpoint.
#[derive(Debug, Clone)]
pub struct AuthApiResolver {
    http: reqwest::Client,
    project_url: String,
    anon_key: String,
}

impl AuthApiResolver {
    pub fn new(project_url: impl Into<String>, anon_key: impl Into<String>) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            project_url: project_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        })
    }

    async fn fetch_user(&self, token: &str) -> Result<CallerIdentity, IdentityError> {
        let url = format!("{}/auth/v1/user", self.project_url);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header("apikey", &self.anon_key)
            .send()
            .await?;
        let status = resp.status();

        if !status.is_success() {
            return Err(IdentityError::Rejected {
                status: status.as_u16(),
            });
        }

        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl IdentityResolver for AuthApiResolver {
    fn resolve<'a>(&'a self, token: &'a str) -> ResolveFuture<'a> {
        Box::pin(self.fetch_user(token))
    }
}

/// Extracts the credential from an `authorization: Bearer <token>` value.
///
/// The scheme is matched case-insensitively. Empty tokens are rejected.
pub fn bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    let value = value?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
