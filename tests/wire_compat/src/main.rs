fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use reelup_protocol::{ErrorResponse, IssueSessionRequest, UploadProgress, UploadSession};
    use reelup_transfer::ResumeState;

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values. Returns the parsed value for further checks.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  Rust:    {reserialized}"
        );
        parsed
    }

    // --- Session issuer contract ---

    #[test]
    fn fixture_upload_session() {
        let session = roundtrip_test::<UploadSession>("upload_session.json");
        assert_eq!(session.bucket_name, reelup_protocol::MEDIA_BUCKET);
        assert_eq!(session.chunk_size, reelup_protocol::SESSION_CHUNK_SIZE);
        assert!(
            session
                .object_name
                .starts_with("3f0c2a8e-5b1d-4c7a-9e2f-1a2b3c4d5e6f/")
        );
    }

    #[test]
    fn fixture_issue_session_request() {
        let req = roundtrip_test::<IssueSessionRequest>("issue_session_request.json");
        assert_eq!(req.file_name.as_deref(), Some("clip.mov"));
    }

    #[test]
    fn fixture_issue_session_request_empty() {
        let req = roundtrip_test::<IssueSessionRequest>("issue_session_request_empty.json");
        assert!(req.file_name.is_none());
    }

    #[test]
    fn fixture_error_unauthorized() {
        let err = roundtrip_test::<ErrorResponse>("error_unauthorized.json");
        assert_eq!(err.error, "Unauthorized");
    }

    #[test]
    fn fixture_error_not_found() {
        roundtrip_test::<ErrorResponse>("error_not_found.json");
    }

    // --- Client-side records ---

    #[test]
    fn fixture_upload_progress() {
        let progress = roundtrip_test::<UploadProgress>("upload_progress.json");
        assert!((progress.percentage() - 60.0).abs() < 1e-9);
        assert!(!progress.is_complete());
    }

    #[test]
    fn fixture_resume_state() {
        let state = roundtrip_test::<ResumeState>("resume_state.json");
        assert_eq!(state.size, 20_971_520);
        assert_eq!(state.metadata["contentType"], "video/quicktime");
        assert_eq!(state.created_at.timestamp(), 1_714_566_600);
    }

    #[test]
    fn resume_state_without_metadata() {
        let state: ResumeState = serde_json::from_str(
            r#"{"uploadUrl":"https://x/y","size":1,"createdAt":"2024-05-01T12:30:00Z"}"#,
        )
        .unwrap();
        assert!(state.metadata.is_empty());
        let value = serde_json::to_value(&state).unwrap();
        assert!(value.get("metadata").is_none());
    }
}
