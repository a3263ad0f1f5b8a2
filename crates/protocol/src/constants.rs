/// Storage bucket every reel upload lands in.
pub const MEDIA_BUCKET: &str = "media";

/// Chunk size handed out with every upload session (6 MiB).
pub const SESSION_CHUNK_SIZE: u64 = 6 * 1024 * 1024;

/// Smallest chunk size the storage service handles well (5 MiB).
pub const MIN_RECOMMENDED_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Largest chunk size the storage service handles well (10 MiB).
pub const MAX_RECOMMENDED_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// Extension used when the requested file name carries none.
pub const DEFAULT_EXTENSION: &str = "mp4";

/// Path of the resumable-upload endpoint on the storage host.
pub const RESUMABLE_UPLOAD_PATH: &str = "/storage/v1/upload/resumable";

/// Resumable upload protocol version sent with every request.
pub const TUS_VERSION: &str = "1.0.0";

/// Content type of chunk bodies.
pub const OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

/// Header names of the resumable upload protocol, in canonical lowercase.
pub mod headers {
    pub const TUS_RESUMABLE: &str = "tus-resumable";
    pub const UPLOAD_LENGTH: &str = "upload-length";
    pub const UPLOAD_OFFSET: &str = "upload-offset";
    pub const UPLOAD_METADATA: &str = "upload-metadata";
    pub const X_UPSERT: &str = "x-upsert";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_chunk_size_is_six_mib() {
        assert_eq!(SESSION_CHUNK_SIZE, 6_291_456);
    }

    #[test]
    fn session_chunk_size_within_recommended_range() {
        assert!(SESSION_CHUNK_SIZE >= MIN_RECOMMENDED_CHUNK_SIZE);
        assert!(SESSION_CHUNK_SIZE <= MAX_RECOMMENDED_CHUNK_SIZE);
    }
}
