use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Object metadata as observed by the storage backend.
///
/// Arrives with an upload notification; `content_type` may be absent
/// depending on the backend, in which case the reconciler fetches complete
/// metadata from storage before comparing. The expected side of the
/// comparison is the `FileRecord` itself, which already carries the
/// declared size and content type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActualMetadata {
    pub key: String,
    pub size: i64,
    pub etag: String,
    pub content_type: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub version_id: Option<String>,
}
