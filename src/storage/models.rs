/// Storage data models
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored artifact as seen by project listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFileInfo {
    pub project_name: String,
    pub version: String,
    pub filename: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Artifact content together with its SHA-256 digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContents {
    pub filename: String,
    pub content: Bytes,
    pub sha256_digest: String,
}
