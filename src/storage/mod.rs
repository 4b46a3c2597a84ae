/// Package Storage System
///
/// Stores versioned package artifacts under a project namespace.
/// Supports multiple backend implementations (local filesystem, Azure Blob).

pub mod azure_blob;
pub mod digest;
pub mod localfs;
pub mod models;
pub mod naming;
pub mod selector;

pub use models::*;
pub use selector::select_backend;

use crate::error::{IndexError, IndexResult};
use async_trait::async_trait;
use bytes::Bytes;

/// Package storage backend trait
///
/// Not-found conditions are reported through empty or absent results, never as errors.
#[async_trait]
pub trait PackageBackend: Send + Sync {
    /// All project names, sorted and deduplicated
    async fn list_projects(&self) -> IndexResult<Vec<String>>;

    /// Versions of a project, sorted ascending
    async fn list_versions(&self, project: &str) -> IndexResult<Vec<String>>;

    /// Every artifact of a project across all versions, sorted by (version, filename)
    async fn list_files(&self, project: &str) -> IndexResult<Vec<ProjectFileInfo>>;

    /// Artifact content and digest, computing and persisting a missing digest
    async fn get_contents(
        &self,
        project: &str,
        version: &str,
        filename: &str,
    ) -> IndexResult<Option<FileContents>>;

    /// Store an artifact and its digest
    async fn upload(
        &self,
        project: &str,
        version: &str,
        filename: &str,
        content: Bytes,
        sha256_digest: Option<&str>,
    ) -> IndexResult<()>;

    /// Remove every artifact of a version; false if nothing existed
    async fn delete_version(&self, project: &str, version: &str) -> IndexResult<bool>;

    /// Remove a single artifact and its digest; false if it did not exist
    async fn delete_file(&self, project: &str, version: &str, filename: &str)
        -> IndexResult<bool>;
}

/// Overwrite guard shared by every backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverwritePolicy {
    pub allow_overwrite: bool,
}

impl OverwritePolicy {
    pub fn new(allow_overwrite: bool) -> Self {
        Self { allow_overwrite }
    }

    /// Whether the backend has to check for an existing artifact before writing
    pub fn requires_existence_check(&self) -> bool {
        !self.allow_overwrite
    }

    /// Reject an upload onto an existing artifact unless overwriting is allowed
    pub fn check(&self, exists: bool, project: &str, filename: &str) -> IndexResult<()> {
        if exists && !self.allow_overwrite {
            tracing::error!(
                "File {} for project {} already exists and overwrite is disabled",
                filename,
                project
            );
            return Err(IndexError::FileExists {
                project: project.to_string(),
                filename: filename.to_string(),
            });
        }
        Ok(())
    }
}

/// Backend-independent property tests, run against every backend
#[cfg(test)]
pub(crate) mod contract {
    use super::*;
    use crate::storage::digest::compute_digest;

    pub const WHEEL: &str = "testproj-0.1.0-py3-none-any.whl";

    pub async fn round_trip(backend: &dyn PackageBackend) {
        backend
            .upload("testproj", "0.1.0", WHEEL, Bytes::from_static(b"fake wheel content"), None)
            .await
            .unwrap();

        let fc = backend
            .get_contents("testproj", "0.1.0", WHEEL)
            .await
            .unwrap()
            .expect("uploaded file should exist");
        assert_eq!(fc.filename, WHEEL);
        assert_eq!(fc.content, Bytes::from_static(b"fake wheel content"));
        assert_eq!(fc.sha256_digest, compute_digest(b"fake wheel content"));

        assert!(backend.list_projects().await.unwrap().contains(&"testproj".to_string()));

        let files = backend.list_files("testproj").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].version, "0.1.0");
        assert_eq!(files[0].filename, WHEEL);
        assert_eq!(files[0].size, b"fake wheel content".len() as u64);
    }

    pub async fn listing_is_sorted(backend: &dyn PackageBackend) {
        let uploads = [
            ("testproj", "0.2.0a1", "testproj-0.2.0a1-py3-none-any.whl", &b"another fake wheel content"[..]),
            ("anotherproj", "1.0.0", "anotherproj-1.0.0-py3-none-any.whl", &b"yet another fake wheel content"[..]),
            ("testproj", "0.1.0", WHEEL, &b"fake wheel content"[..]),
            ("testproj", "0.1.0", "testproj-0.1.0.tar.gz", &b"fake sdist content"[..]),
        ];
        for (project, version, filename, content) in uploads {
            backend
                .upload(project, version, filename, Bytes::copy_from_slice(content), None)
                .await
                .unwrap();
        }

        assert_eq!(backend.list_projects().await.unwrap(), vec!["anotherproj", "testproj"]);
        assert_eq!(backend.list_versions("testproj").await.unwrap(), vec!["0.1.0", "0.2.0a1"]);

        let files: Vec<(String, String)> = backend
            .list_files("testproj")
            .await
            .unwrap()
            .into_iter()
            .map(|f| (f.version, f.filename))
            .collect();
        assert_eq!(
            files,
            vec![
                ("0.1.0".to_string(), "testproj-0.1.0-py3-none-any.whl".to_string()),
                ("0.1.0".to_string(), "testproj-0.1.0.tar.gz".to_string()),
                ("0.2.0a1".to_string(), "testproj-0.2.0a1-py3-none-any.whl".to_string()),
            ]
        );
    }

    pub async fn missing_entries_are_empty(backend: &dyn PackageBackend) {
        assert!(backend.list_projects().await.unwrap().is_empty());
        assert!(backend.list_versions("nonexistentproj").await.unwrap().is_empty());
        assert!(backend.list_files("nonexistentproj").await.unwrap().is_empty());
        assert!(backend
            .get_contents("nonexistentproj", "0.1.0", "nonexistentfile.whl")
            .await
            .unwrap()
            .is_none());
        assert!(!backend.delete_version("nonexistentproj", "0.1.0").await.unwrap());
        assert!(!backend
            .delete_file("nonexistentproj", "0.1.0", "nonexistentfile.whl")
            .await
            .unwrap());
    }

    /// Expects a backend with overwriting disabled
    pub async fn overwrite_rejected(backend: &dyn PackageBackend) {
        backend
            .upload("testproj", "0.1.0", WHEEL, Bytes::from_static(b"original"), None)
            .await
            .unwrap();

        let err = backend
            .upload("testproj", "0.1.0", WHEEL, Bytes::from_static(b"replacement"), None)
            .await
            .unwrap_err();
        match err {
            IndexError::FileExists { project, filename } => {
                assert_eq!(project, "testproj");
                assert_eq!(filename, WHEEL);
            }
            other => panic!("expected FileExists, got {:?}", other),
        }

        let fc = backend.get_contents("testproj", "0.1.0", WHEEL).await.unwrap().unwrap();
        assert_eq!(fc.content, Bytes::from_static(b"original"));
        assert_eq!(fc.sha256_digest, compute_digest(b"original"));
    }

    /// Expects a backend with overwriting enabled
    pub async fn overwrite_replaces(backend: &dyn PackageBackend) {
        backend
            .upload("testproj", "0.1.0", WHEEL, Bytes::from_static(b"original"), None)
            .await
            .unwrap();
        let replacement_digest = compute_digest(b"replacement");
        backend
            .upload(
                "testproj",
                "0.1.0",
                WHEEL,
                Bytes::from_static(b"replacement"),
                Some(&replacement_digest),
            )
            .await
            .unwrap();

        let fc = backend.get_contents("testproj", "0.1.0", WHEEL).await.unwrap().unwrap();
        assert_eq!(fc.content, Bytes::from_static(b"replacement"));
        assert_eq!(fc.sha256_digest, replacement_digest);
        assert_eq!(backend.list_files("testproj").await.unwrap().len(), 1);
    }

    pub async fn delete_version(backend: &dyn PackageBackend) {
        backend
            .upload("testproj", "0.1.0", WHEEL, Bytes::from_static(b"fake wheel content"), None)
            .await
            .unwrap();
        backend
            .upload("testproj", "0.2.0", "testproj-0.2.0-py3-none-any.whl", Bytes::from_static(b"v2"), None)
            .await
            .unwrap();

        assert!(backend.delete_version("testproj", "0.1.0").await.unwrap());
        assert!(backend.get_contents("testproj", "0.1.0", WHEEL).await.unwrap().is_none());
        assert!(!backend.delete_version("testproj", "0.1.0").await.unwrap());

        assert_eq!(backend.list_versions("testproj").await.unwrap(), vec!["0.2.0"]);
    }

    pub async fn delete_file(backend: &dyn PackageBackend) {
        backend
            .upload("testproj", "0.1.0", WHEEL, Bytes::from_static(b"fake wheel content"), None)
            .await
            .unwrap();
        backend
            .upload("testproj", "0.1.0", "testproj-0.1.0.tar.gz", Bytes::from_static(b"sdist"), None)
            .await
            .unwrap();

        assert!(backend.delete_file("testproj", "0.1.0", WHEEL).await.unwrap());
        assert!(backend.get_contents("testproj", "0.1.0", WHEEL).await.unwrap().is_none());
        assert!(!backend.delete_file("testproj", "0.1.0", WHEEL).await.unwrap());

        let sibling = backend
            .get_contents("testproj", "0.1.0", "testproj-0.1.0.tar.gz")
            .await
            .unwrap()
            .expect("sibling should survive");
        assert_eq!(sibling.content, Bytes::from_static(b"sdist"));
        assert_eq!(backend.list_files("testproj").await.unwrap().len(), 1);

        // A version emptied file by file no longer exists
        assert!(backend
            .delete_file("testproj", "0.1.0", "testproj-0.1.0.tar.gz")
            .await
            .unwrap());
        assert!(backend.list_versions("testproj").await.unwrap().is_empty());
        assert!(!backend.delete_version("testproj", "0.1.0").await.unwrap());
    }

    pub async fn project_names_are_normalized(backend: &dyn PackageBackend) {
        backend
            .upload("Test_Proj", "1.0", "test_proj-1.0.tar.gz", Bytes::from_static(b"sdist"), None)
            .await
            .unwrap();

        assert_eq!(backend.list_projects().await.unwrap(), vec!["test-proj"]);
        assert_eq!(backend.list_versions("test.proj").await.unwrap(), vec!["1.0"]);
        assert!(backend
            .get_contents("TEST-PROJ", "1.0", "test_proj-1.0.tar.gz")
            .await
            .unwrap()
            .is_some());
    }

    pub async fn malformed_input_rejected(backend: &dyn PackageBackend) {
        let err = backend
            .upload("testproj", "../escape", WHEEL, Bytes::from_static(b"x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Validation(_)));

        let err = backend.get_contents("testproj", "0.1.0", "a/b.whl").await.unwrap_err();
        assert!(matches!(err, IndexError::Validation(_)));

        let err = backend
            .upload("testproj", "0.1.0", WHEEL, Bytes::from_static(b"x"), Some("deadbeef"))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Validation(_)));
        assert!(backend.list_projects().await.unwrap().is_empty());

        // Digest sidecar names are not addressable as artifacts
        backend
            .upload("testproj", "0.1.0", WHEEL, Bytes::from_static(b"real wheel"), None)
            .await
            .unwrap();
        let sidecar = format!("{}.sha256", WHEEL);
        let err = backend
            .upload("testproj", "0.1.0", &sidecar, Bytes::from("0".repeat(64)), None)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Validation(_)));
        let err = backend.get_contents("testproj", "0.1.0", &sidecar).await.unwrap_err();
        assert!(matches!(err, IndexError::Validation(_)));
        let err = backend.delete_file("testproj", "0.1.0", &sidecar).await.unwrap_err();
        assert!(matches!(err, IndexError::Validation(_)));

        let fc = backend.get_contents("testproj", "0.1.0", WHEEL).await.unwrap().unwrap();
        assert_eq!(fc.sha256_digest, compute_digest(b"real wheel"));
        assert_eq!(backend.list_files("testproj").await.unwrap().len(), 1);
    }

    /// Expects a backend with overwriting enabled.
    ///
    /// Either upload may win; the stored content is always one of
    /// the two payloads and the digest belongs to one of them.
    pub async fn concurrent_uploads_keep_one_payload(backend: &dyn PackageBackend) {
        let (first, second) = tokio::join!(
            backend.upload("testproj", "0.1.0", WHEEL, Bytes::from_static(b"payload one"), None),
            backend.upload("testproj", "0.1.0", WHEEL, Bytes::from_static(b"payload two"), None),
        );
        first.unwrap();
        second.unwrap();

        let fc = backend.get_contents("testproj", "0.1.0", WHEEL).await.unwrap().unwrap();
        assert!(
            fc.content == Bytes::from_static(b"payload one")
                || fc.content == Bytes::from_static(b"payload two"),
            "unexpected content {:?}",
            fc.content
        );
        assert!(
            fc.sha256_digest == compute_digest(b"payload one")
                || fc.sha256_digest == compute_digest(b"payload two")
        );
        assert_eq!(backend.list_files("testproj").await.unwrap().len(), 1);
    }
}
