use chrono::{DateTime, Utc};
use reelup_protocol::constants::{MEDIA_BUCKET, SESSION_CHUNK_SIZE};
use reelup_protocol::types::UploadSession;
use uuid::Uuid;

use crate::error::IssuerError;
use crate::identity::CallerIdentity;
use crate::object_key::{file_extension, object_name};

/// Builds the upload session for an authenticated caller.
///
/// Pure apart from the random object token: nothing is stored.
pub fn issue_upload_session(
    caller: &CallerIdentity,
    file_name: Option<&str>,
    upload_endpoint: &str,
    now: DateTime<Utc>,
) -> Result<UploadSession, IssuerError> {
    let timestamp = now.timestamp_millis();
    if timestamp < 0 {
        return Err(IssuerError::Internal(
            "system clock is before the Unix epoch".into(),
        ));
    }

    let ext = file_extension(file_name);
    Ok(UploadSession {
        bucket_name: MEDIA_BUCKET.to_string(),
        object_name: object_name(&caller.id, timestamp, Uuid::new_v4(), &ext),
        upload_endpoint: upload_endpoint.to_string(),
        chunk_size: SESSION_CHUNK_SIZE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ENDPOINT: &str = "https://abc.storage.example.com/storage/v1/upload/resumable";

    fn caller() -> CallerIdentity {
        CallerIdentity {
            id: "user-1".into(),
            email: None,
        }
    }

    #[test]
    fn session_fields() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let session = issue_upload_session(&caller(), Some("clip.mov"), ENDPOINT, now).unwrap();

        assert_eq!(session.bucket_name, "media");
        assert_eq!(session.upload_endpoint, ENDPOINT);
        assert_eq!(session.chunk_size, 6_291_456);

        let rest = session.object_name.strip_prefix("user-1/").unwrap();
        let (stem, ext) = rest.rsplit_once('.').unwrap();
        assert_eq!(ext, "mov");
        let (ts, token) = stem.split_once('_').unwrap();
        assert_eq!(ts, "1700000000123");
        assert!(Uuid::parse_str(token).is_ok());
    }

    #[test]
    fn missing_name_gets_mp4() {
        let session = issue_upload_session(&caller(), None, ENDPOINT, Utc::now()).unwrap();
        assert!(session.object_name.ends_with(".mp4"));
    }

    #[test]
    fn object_names_are_unique() {
        let now = Utc::now();
        let a = issue_upload_session(&caller(), None, ENDPOINT, now).unwrap();
        let b = issue_upload_session(&caller(), None, ENDPOINT, now).unwrap();
        assert_ne!(a.object_name, b.object_name);
    }

    #[test]
    fn clock_before_epoch_is_internal_error() {
        let now = Utc.timestamp_millis_opt(-1).unwrap();
        assert!(matches!(
            issue_upload_session(&caller(), None, ENDPOINT, now),
            Err(IssuerError::Internal(_))
        ));
    }
}
