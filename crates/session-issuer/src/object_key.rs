//! Object keys and storage endpoints.

use reelup_protocol::constants::{DEFAULT_EXTENSION, RESUMABLE_UPLOAD_PATH};
use reqwest::Url;
use uuid::Uuid;

use crate::error::IssuerError;

/// Longest extension accepted from a client file name.
const MAX_EXTENSION_LEN: usize = 16;

/// Host label inserted after the project label of the project URL.
const STORAGE_LABEL: &str = "storage";

/// Returns the extension of `file_name`, or `mp4` if it has none.
///
/// Suffixes that are empty, too long or not ASCII alphanumeric are
/// treated as missing.
pub fn file_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or(DEFAULT_EXTENSION)
        .to_string()
}

/// Builds `{caller_id}/{timestamp_millis}_{token}.{ext}`.
pub fn object_name(caller_id: &str, timestamp_millis: i64, token: Uuid, ext: &str) -> String {
    format!("{caller_id}/{timestamp_millis}_{token}.{ext}")
}

/// Derives the resumable-upload endpoint.
///
/// With `storage_url` set, its origin is used as is. Otherwise the storage
/// host is derived from `project_url` by inserting a `storage` label after
/// the first one (`abc.example.com` becomes `abc.storage.example.com`).
/// IP addresses and single-label hosts are left alone.
pub fn resumable_endpoint(project_url: &str, storage_url: Option<&str>) -> Result<String, IssuerError> {
    let mut url = match storage_url {
        Some(storage) => parse_base(storage)?,
        None => storage_host(parse_base(project_url)?)?,
    };
    url.set_path(RESUMABLE_UPLOAD_PATH);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

fn parse_base(raw: &str) -> Result<Url, IssuerError> {
    let url = Url::parse(raw).map_err(|e| IssuerError::Config(format!("invalid URL {raw:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(IssuerError::Config(format!("{raw:?} is not an http(s) URL")));
    }
    Ok(url)
}

fn storage_host(mut url: Url) -> Result<Url, IssuerError> {
    let Some(domain) = url.domain() else {
        return Ok(url);
    };
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels[1] == STORAGE_LABEL {
        return Ok(url);
    }

    let host = format!("{}.{STORAGE_LABEL}.{}", labels[0], labels[1..].join("."));
    url.set_host(Some(&host))
        .map_err(|e| IssuerError::Config(format!("invalid storage host {host:?}: {e}")))?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_from_name() {
        assert_eq!(file_extension(Some("clip.mov")), "mov");
        assert_eq!(file_extension(Some("holiday.final.webm")), "webm");
        assert_eq!(file_extension(Some("CLIP.MP4")), "MP4");
    }

    #[test]
    fn extension_defaults_to_mp4() {
        assert_eq!(file_extension(None), "mp4");
        assert_eq!(file_extension(Some("clip")), "mp4");
        assert_eq!(file_extension(Some("")), "mp4");
        assert_eq!(file_extension(Some("clip.")), "mp4");
    }

    #[test]
    fn malformed_extension_defaults_to_mp4() {
        assert_eq!(file_extension(Some("clip.m/ov")), "mp4");
        assert_eq!(file_extension(Some("../../etc.pass wd")), "mp4");
        assert_eq!(file_extension(Some("clip.abcdefghijklmnopq")), "mp4");
        assert_eq!(file_extension(Some("clip.abcdefghijklmnop")), "abcdefghijklmnop");
    }

    #[test]
    fn object_name_layout() {
        let token = Uuid::nil();
        assert_eq!(
            object_name("user-1", 1_700_000_000_000, token, "mov"),
            "user-1/1700000000000_00000000-0000-0000-0000-000000000000.mov"
        );
    }

    #[test]
    fn endpoint_inserts_storage_label() {
        assert_eq!(
            resumable_endpoint("https://abc.example.com", None).unwrap(),
            "https://abc.storage.example.com/storage/v1/upload/resumable"
        );
        assert_eq!(
            resumable_endpoint("https://abc.example.com/some/path?x=1", None).unwrap(),
            "https://abc.storage.example.com/storage/v1/upload/resumable"
        );
    }

    #[test]
    fn endpoint_keeps_existing_storage_label() {
        assert_eq!(
            resumable_endpoint("https://abc.storage.example.com", None).unwrap(),
            "https://abc.storage.example.com/storage/v1/upload/resumable"
        );
    }

    #[test]
    fn endpoint_for_local_hosts() {
        assert_eq!(
            resumable_endpoint("http://localhost:54321", None).unwrap(),
            "http://localhost:54321/storage/v1/upload/resumable"
        );
        assert_eq!(
            resumable_endpoint("http://127.0.0.1:54321", None).unwrap(),
            "http://127.0.0.1:54321/storage/v1/upload/resumable"
        );
    }

    #[test]
    fn endpoint_override() {
        assert_eq!(
            resumable_endpoint("https://abc.example.com", Some("https://files.internal:9000")).unwrap(),
            "https://files.internal:9000/storage/v1/upload/resumable"
        );
    }

    #[test]
    fn endpoint_rejects_bad_urls() {
        assert!(matches!(
            resumable_endpoint("not a url", None),
            Err(IssuerError::Config(_))
        ));
        assert!(matches!(
            resumable_endpoint("mailto:a@b.c", None),
            Err(IssuerError::Config(_))
        ));
    }
}
