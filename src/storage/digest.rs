/// SHA-256 content digests for stored artifacts
use crate::error::{IndexError, IndexResult};
use sha2::{Digest, Sha256};

/// Suffix of the sidecar file holding an artifact's digest (filesystem backend)
pub const DIGEST_SUFFIX: &str = ".sha256";

/// Object metadata key holding an artifact's digest (object storage backend)
pub const DIGEST_METADATA_KEY: &str = "sha256";

/// Compute the lowercase hex SHA-256 digest of data
pub fn compute_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Resolve the digest to persist for an upload.
///
/// A supplied digest must be well-formed and match the content; otherwise the
/// digest is computed from the content.
pub fn resolve_upload_digest(content: &[u8], supplied: Option<&str>) -> IndexResult<String> {
    let actual = compute_digest(content);

    let Some(supplied) = supplied.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(actual);
    };

    if supplied.len() != 64 || !supplied.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(IndexError::Validation(format!(
            "Malformed SHA256 digest: {}",
            supplied
        )));
    }

    let expected = supplied.to_ascii_lowercase();
    if expected != actual {
        return Err(IndexError::DigestMismatch { expected, actual });
    }

    Ok(actual)
}

/// Name of the sidecar file for an artifact
pub fn sidecar_name(filename: &str) -> String {
    format!("{}{}", filename, DIGEST_SUFFIX)
}
