//! tus 1.0.0 client.
//!
//! Async HTTP implementation of [`UploadTransport`] using `reqwest`.

use std::collections::{BTreeMap, HashMap};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reelup_protocol::constants::headers::{
    TUS_RESUMABLE, UPLOAD_LENGTH, UPLOAD_METADATA, UPLOAD_OFFSET,
};
use reelup_protocol::constants::{OFFSET_OCTET_STREAM, TUS_VERSION};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, LOCATION};
use reqwest::{Response, Url};
use tracing::debug;

use crate::error::{ChunkError, UploadError};
use crate::transport::{CreateUpload, CreatedUpload, TransportFuture, UploadTransport};

/// Resumable-upload client speaking tus over HTTP.
#[derive(Debug, Clone)]
pub struct TusTransport {
    http: reqwest::Client,
}

impl TusTransport {
    /// Creates a transport with its own HTTP client.
    pub fn new() -> Result<Self, UploadError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http })
    }

    /// Creates a transport sharing an existing HTTP client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn do_create(&self, request: CreateUpload<'_>) -> Result<CreatedUpload, ChunkError> {
        let endpoint = Url::parse(request.endpoint)
            .map_err(|e| ChunkError::Protocol(format!("invalid endpoint {}: {e}", request.endpoint)))?;

        let mut builder = self
            .http
            .post(endpoint.clone())
            .headers(request_headers(request.headers)?)
            .header(UPLOAD_LENGTH, request.length);

        let metadata = encode_metadata(request.metadata);
        if !metadata.is_empty() {
            builder = builder.header(UPLOAD_METADATA, metadata);
        }
        if let Some(data) = request.initial_data {
            builder = builder
                .header(CONTENT_TYPE, OFFSET_OCTET_STREAM)
                .body(data.to_vec());
        }

        let resp = check_status(builder.send().await?).await?;

        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ChunkError::Protocol("creation response has no Location".into()))?;
        let upload_url = endpoint
            .join(location)
            .map_err(|e| ChunkError::Protocol(format!("invalid Location {location}: {e}")))?;

        let offset = if resp.headers().contains_key(UPLOAD_OFFSET) {
            parse_offset(&resp)?
        } else {
            0
        };

        debug!(url = %upload_url, offset, "created upload");
        Ok(CreatedUpload {
            upload_url: upload_url.to_string(),
            offset,
        })
    }

    async fn do_query_offset(
        &self,
        upload_url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<u64, ChunkError> {
        let resp = self
            .http
            .head(upload_url)
            .headers(request_headers(headers)?)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        parse_offset(&resp)
    }

    async fn do_send_chunk(
        &self,
        upload_url: &str,
        headers: &HashMap<String, String>,
        offset: u64,
        data: &[u8],
    ) -> Result<u64, ChunkError> {
        let resp = self
            .http
            .patch(upload_url)
            .headers(request_headers(headers)?)
            .header(UPLOAD_OFFSET, offset)
            .header(CONTENT_TYPE, OFFSET_OCTET_STREAM)
            .body(data.to_vec())
            .send()
            .await?;
        let resp = check_status(resp).await?;
        parse_offset(&resp)
    }
}

impl UploadTransport for TusTransport {
    fn create<'a>(&'a self, request: CreateUpload<'a>) -> TransportFuture<'a, CreatedUpload> {
        Box::pin(self.do_create(request))
    }

    fn query_offset<'a>(
        &'a self,
        upload_url: &'a str,
        headers: &'a HashMap<String, String>,
    ) -> TransportFuture<'a, u64> {
        Box::pin(self.do_query_offset(upload_url, headers))
    }

    fn send_chunk<'a>(
        &'a self,
        upload_url: &'a str,
        headers: &'a HashMap<String, String>,
        offset: u64,
        data: &'a [u8],
    ) -> TransportFuture<'a, u64> {
        Box::pin(self.do_send_chunk(upload_url, headers, offset, data))
    }
}

/// Builds the header map for a request: caller headers plus `Tus-Resumable`.
fn request_headers(headers: &HashMap<String, String>) -> Result<HeaderMap, ChunkError> {
    let mut map = HeaderMap::with_capacity(headers.len() + 1);
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ChunkError::Protocol(format!("invalid header name {name:?}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ChunkError::Protocol(format!("invalid value for header {name}")))?;
        map.insert(name, value);
    }
    map.insert(TUS_RESUMABLE, HeaderValue::from_static(TUS_VERSION));
    Ok(map)
}

/// Encodes metadata as `key base64(value)` pairs separated by commas.
pub fn encode_metadata(metadata: &BTreeMap<String, String>) -> String {
    metadata
        .iter()
        .map(|(key, value)| format!("{key} {}", STANDARD.encode(value)))
        .collect::<Vec<_>>()
        .join(",")
}

async fn check_status(resp: Response) -> Result<Response, ChunkError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ChunkError::from_status(status.as_u16(), body))
}

fn parse_offset(resp: &Response) -> Result<u64, ChunkError> {
    let value = resp
        .headers()
        .get(UPLOAD_OFFSET)
        .ok_or_else(|| ChunkError::Protocol("response has no Upload-Offset".into()))?;
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| ChunkError::Protocol(format!("invalid Upload-Offset {value:?}")))
}
