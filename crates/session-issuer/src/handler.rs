//! HTTP surface of the session issuer.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW,
    AUTHORIZATION,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use reelup_protocol::types::{ErrorResponse, IssueSessionRequest, UploadSession};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::IssuerError;
use crate::identity::{IdentityResolver, bearer_token};
use crate::session::issue_upload_session;

const ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";
const ALLOW_METHODS: &str = "POST, OPTIONS";

/// Shared issuer state.
#[derive(Clone)]
pub struct IssuerState {
    inner: Arc<IssuerStateInner>,
}

struct IssuerStateInner {
    resolver: Arc<dyn IdentityResolver>,
    upload_endpoint: String,
}

impl IssuerState {
    pub fn new(resolver: Arc<dyn IdentityResolver>, upload_endpoint: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(IssuerStateInner {
                resolver,
                upload_endpoint: upload_endpoint.into(),
            }),
        }
    }

    pub fn upload_endpoint(&self) -> &str {
        &self.inner.upload_endpoint
    }
}

/// Builds the issuer router.
pub fn router(state: IssuerState) -> Router {
    Router::new()
        .route("/", post(issue_session).fallback(method_not_allowed))
        .fallback(not_found)
        .layer(middleware::from_fn(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Answers preflight requests and stamps CORS headers on every response.
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    response
}

async fn issue_session(
    State(state): State<IssuerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadSession>, IssuerError> {
    let token = bearer_token(headers.get(AUTHORIZATION)).ok_or(IssuerError::Unauthorized)?;

    let caller = state.inner.resolver.resolve(token).await.map_err(|e| {
        warn!(error = %e, "credential rejected");
        IssuerError::Unauthorized
    })?;

    let request = parse_request(&body);
    let session = issue_upload_session(
        &caller,
        request.file_name.as_deref(),
        state.upload_endpoint(),
        Utc::now(),
    )?;

    info!(caller = %caller.id, object = %session.object_name, "issued upload session");
    Ok(Json(session))
}

/// Parses the request body. Empty or malformed bodies count as `{}`.
fn parse_request(body: &[u8]) -> IssueSessionRequest {
    if body.is_empty() {
        return IssueSessionRequest::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        debug!(error = %e, "unreadable session request body, using defaults");
        IssueSessionRequest::default()
    })
}

async fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new("Not found")))
}

async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(ALLOW, ALLOW_METHODS)],
        Json(ErrorResponse::new("Method not allowed")),
    )
}
