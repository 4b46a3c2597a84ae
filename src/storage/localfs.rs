/// Local filesystem package storage backend
use crate::{
    error::{IndexError, IndexResult},
    storage::{
        digest::{compute_digest, resolve_upload_digest, sidecar_name},
        naming::{is_artifact, is_hidden, project_segment, validate_filename, validate_segment},
        FileContents, OverwritePolicy, PackageBackend, ProjectFileInfo,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Configuration for the local filesystem backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFsConfig {
    pub root_path: PathBuf,
}

/// Local filesystem backend
///
/// Layout: `{root}/{normalized-project}/{version}/{filename}` with the digest
/// stored next to each artifact in `{filename}.sha256`.
#[derive(Debug, Clone)]
pub struct LocalFsBackend {
    root_path: PathBuf,
    policy: OverwritePolicy,
}

impl LocalFsBackend {
    /// Create a new filesystem backend
    pub fn new(config: LocalFsConfig, policy: OverwritePolicy) -> Self {
        Self {
            root_path: config.root_path,
            policy,
        }
    }

    fn project_dir(&self, project: &str) -> IndexResult<PathBuf> {
        Ok(self.root_path.join(project_segment(project)?))
    }

    fn version_dir(&self, project: &str, version: &str) -> IndexResult<PathBuf> {
        validate_segment("Version", version)?;
        Ok(self.project_dir(project)?.join(version))
    }

    fn artifact_path(&self, project: &str, version: &str, filename: &str) -> IndexResult<PathBuf> {
        validate_filename(filename)?;
        Ok(self.version_dir(project, version)?.join(filename))
    }

    /// Non-hidden subdirectories of a directory; empty if it does not exist
    async fn list_subdirs(dir: &Path) -> IndexResult<Vec<String>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !is_hidden(name) {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    /// Artifact files of a version directory with their metadata, sorted by name
    async fn list_artifacts(dir: &Path) -> IndexResult<Vec<(String, std::fs::Metadata)>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_artifact(&name) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if metadata.is_file() {
                files.push((name, metadata));
            }
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    /// Versions of a project that hold at least one artifact
    async fn versions_in(project_dir: &Path) -> IndexResult<Vec<String>> {
        let mut versions = Vec::new();
        for version in Self::list_subdirs(project_dir).await? {
            if !Self::list_artifacts(&project_dir.join(&version)).await?.is_empty() {
                versions.push(version);
            }
        }
        Ok(versions)
    }

    /// Write a file via a hidden temp file and rename, so readers never see partial content
    async fn write_atomic(dir: &Path, filename: &str, data: &[u8]) -> IndexResult<()> {
        let temp_path = dir.join(format!(".{}.{}.tmp", filename, uuid::Uuid::new_v4()));
        let final_path = dir.join(filename);

        let result: std::io::Result<()> = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, &final_path).await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path).await;
            return Err(IndexError::Storage(format!(
                "Failed to write {}: {}",
                final_path.display(),
                e
            )));
        }

        Ok(())
    }

    /// Read the sidecar digest, computing and persisting it when missing
    async fn read_or_heal_digest(
        version_dir: &Path,
        filename: &str,
        content: &[u8],
    ) -> IndexResult<String> {
        let sidecar = sidecar_name(filename);

        match fs::read_to_string(version_dir.join(&sidecar)).await {
            Ok(stored) if !stored.trim().is_empty() => return Ok(stored.trim().to_string()),
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        warn!(
            "SHA256 digest sidecar missing for {}, recomputing",
            version_dir.join(filename).display()
        );
        let digest = compute_digest(content);
        Self::write_atomic(version_dir, &sidecar, digest.as_bytes()).await?;
        Ok(digest)
    }
}

/// Remove a directory tree, skipping entries that fail to delete.
///
/// Returns the number of entries that could not be removed.
fn remove_tree_best_effort(path: &Path) -> usize {
    let mut failures = 0;

    if let Ok(entries) = std::fs::read_dir(path) {
        for entry in entries.flatten() {
            let entry_path = entry.path();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                failures += remove_tree_best_effort(&entry_path);
            } else if std::fs::remove_file(&entry_path).is_err() {
                failures += 1;
            }
        }
    }

    if std::fs::remove_dir(path).is_err() {
        failures += 1;
    }
    failures
}

#[async_trait]
impl PackageBackend for LocalFsBackend {
    async fn list_projects(&self) -> IndexResult<Vec<String>> {
        let mut projects = Vec::new();
        for project in Self::list_subdirs(&self.root_path).await? {
            if !Self::versions_in(&self.root_path.join(&project)).await?.is_empty() {
                projects.push(project);
            }
        }
        Ok(projects)
    }

    async fn list_versions(&self, project: &str) -> IndexResult<Vec<String>> {
        let project_dir = self.project_dir(project)?;
        let versions = Self::versions_in(&project_dir).await?;
        if versions.is_empty() {
            debug!("No versions found for project {}", project);
        }
        Ok(versions)
    }

    async fn list_files(&self, project: &str) -> IndexResult<Vec<ProjectFileInfo>> {
        let project_name = project_segment(project)?;
        let project_dir = self.root_path.join(&project_name);

        let mut files = Vec::new();
        for version in Self::list_subdirs(&project_dir).await? {
            for (filename, metadata) in Self::list_artifacts(&project_dir.join(&version)).await? {
                files.push(ProjectFileInfo {
                    project_name: project_name.clone(),
                    version: version.clone(),
                    filename,
                    size: metadata.len(),
                    last_modified: DateTime::<Utc>::from(metadata.modified()?),
                });
            }
        }

        if files.is_empty() {
            debug!("No files found for project {}", project);
        }
        Ok(files)
    }

    async fn get_contents(
        &self,
        project: &str,
        version: &str,
        filename: &str,
    ) -> IndexResult<Option<FileContents>> {
        let file_path = self.artifact_path(project, version, filename)?;

        let content = match fs::read(&file_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("File not found: {}", file_path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let version_dir = self.version_dir(project, version)?;
        let sha256_digest = Self::read_or_heal_digest(&version_dir, filename, &content).await?;

        Ok(Some(FileContents {
            filename: filename.to_string(),
            content: Bytes::from(content),
            sha256_digest,
        }))
    }

    async fn upload(
        &self,
        project: &str,
        version: &str,
        filename: &str,
        content: Bytes,
        sha256_digest: Option<&str>,
    ) -> IndexResult<()> {
        let file_path = self.artifact_path(project, version, filename)?;
        let version_dir = self.version_dir(project, version)?;
        let digest = resolve_upload_digest(&content, sha256_digest)?;

        if self.policy.requires_existence_check() {
            let exists = fs::try_exists(&file_path).await?;
            self.policy.check(exists, project, filename)?;
        }

        fs::create_dir_all(&version_dir).await?;

        // Content first: a crash before the sidecar lands is healed on next read
        Self::write_atomic(&version_dir, filename, &content).await?;
        Self::write_atomic(&version_dir, &sidecar_name(filename), digest.as_bytes()).await?;

        info!(
            "Stored {} for project {} version {} ({} bytes, sha256 {})",
            filename,
            project,
            version,
            content.len(),
            digest
        );
        Ok(())
    }

    async fn delete_version(&self, project: &str, version: &str) -> IndexResult<bool> {
        let version_dir = self.version_dir(project, version)?;

        // A directory holding no artifacts is not a version
        if Self::list_artifacts(&version_dir).await?.is_empty() {
            warn!("Version {} of project {} not found", version, project);
            return Ok(false);
        }

        let dir = version_dir.clone();
        let failures = tokio::task::spawn_blocking(move || remove_tree_best_effort(&dir))
            .await
            .map_err(|e| IndexError::Internal(format!("Delete task failed: {}", e)))?;
        if failures > 0 {
            warn!(
                "Ignored {} removal failures while deleting {}",
                failures,
                version_dir.display()
            );
        }

        info!("Deleted version {} of project {}", version, project);
        Ok(true)
    }

    async fn delete_file(&self, project: &str, version: &str, filename: &str) -> IndexResult<bool> {
        let file_path = self.artifact_path(project, version, filename)?;

        match fs::remove_file(&file_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("File not found: {}", file_path.display());
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        let sidecar_path = self.version_dir(project, version)?.join(sidecar_name(filename));
        match fs::remove_file(&sidecar_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Sidecar already absent: {}", sidecar_path.display());
            }
            Err(e) => return Err(e.into()),
        }

        info!("Deleted {} from project {} version {}", filename, project, version);
        Ok(true)
    }
}
