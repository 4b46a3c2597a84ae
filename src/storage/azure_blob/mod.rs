/// Azure Blob package storage backend
///
/// Blob names follow `<base path><normalized-project>/<version>/<filename>`;
/// the artifact digest travels with each blob as `sha256` metadata.

pub mod client;
pub mod config;

pub use client::{AzureConnector, ContainerClient, ContainerConnector};
pub use config::{AzureBlobConfig, AzureBlobDestination, ConnectionMethod};

use crate::{
    error::{IndexError, IndexResult},
    storage::{
        digest::{compute_digest, resolve_upload_digest, DIGEST_METADATA_KEY},
        naming::{is_artifact, is_hidden, project_segment, validate_filename, validate_segment},
        FileContents, OverwritePolicy, PackageBackend, ProjectFileInfo,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use object_store::{
    path::Path, Attribute, Attributes, ObjectMeta, PutMode, PutOptions, PutPayload, UpdateVersion,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

fn digest_attribute() -> Attribute {
    Attribute::Metadata(DIGEST_METADATA_KEY.into())
}

/// Write a computed digest back onto the blob it was read from.
///
/// The write is conditional on the blob still matching `meta`; when it has
/// changed since the read the write-back is skipped and the blob is left as is.
async fn heal_digest(
    client: &ContainerClient,
    location: &Path,
    meta: &ObjectMeta,
    content: &Bytes,
    mut attributes: Attributes,
) -> IndexResult<String> {
    let digest = compute_digest(content);

    if meta.e_tag.is_none() {
        warn!("Blob {} has no ETag, not persisting recomputed digest", location);
        return Ok(digest);
    }

    attributes.insert(digest_attribute(), digest.clone().into());

    // No metadata-only update in the object store API: rewrite the same bytes
    let result = client
        .store()
        .put_opts(
            location,
            PutPayload::from(content.clone()),
            PutOptions {
                mode: PutMode::Update(UpdateVersion {
                    e_tag: meta.e_tag.clone(),
                    version: meta.version.clone(),
                }),
                attributes,
                ..Default::default()
            },
        )
        .await;

    match result {
        Ok(_) => {}
        Err(object_store::Error::Precondition { .. }) => {
            warn!(
                "Blob {} changed while its digest was recomputed, skipping write-back",
                location
            );
        }
        Err(e) => return Err(e.into()),
    }

    Ok(digest)
}

/// Azure Blob storage backend
///
/// Holds no connection between calls: each operation opens a scoped
/// [`ContainerClient`] and drops it before returning.
#[derive(Clone)]
pub struct AzureBlobBackend {
    connector: Arc<dyn ContainerConnector>,
    policy: OverwritePolicy,
}

impl AzureBlobBackend {
    /// Create a backend for Azure Blob Storage.
    ///
    /// Destination path and credential material are validated here, before any I/O.
    pub fn new(config: &AzureBlobConfig, policy: OverwritePolicy) -> IndexResult<Self> {
        let connector = AzureConnector::new(config)?;
        // Building a client is offline; it surfaces bad credential material early
        drop(connector.connect()?);

        info!(
            "Initializing Azure Blob storage (account: {}, container: {}, base path: {})",
            connector.destination().account_url,
            connector.destination().container,
            connector.destination().base_path
        );

        Ok(Self::with_connector(Arc::new(connector), policy))
    }

    /// Create a backend over any container connector
    pub fn with_connector(connector: Arc<dyn ContainerConnector>, policy: OverwritePolicy) -> Self {
        Self { connector, policy }
    }
}

#[async_trait]
impl PackageBackend for AzureBlobBackend {
    async fn list_projects(&self) -> IndexResult<Vec<String>> {
        let client = self.connector.connect()?;
        client.list_dirs(client.base_path()).await
    }

    async fn list_versions(&self, project: &str) -> IndexResult<Vec<String>> {
        let project = project_segment(project)?;
        let client = self.connector.connect()?;
        client.list_dirs(&client.project_prefix(&project)).await
    }

    async fn list_files(&self, project: &str) -> IndexResult<Vec<ProjectFileInfo>> {
        let project = project_segment(project)?;
        let client = self.connector.connect()?;
        let prefix = client.project_prefix(&project);

        let mut files = Vec::new();
        for meta in client.list_blobs(&prefix).await? {
            let Some(parts) = meta.location.prefix_match(&prefix) else {
                continue;
            };
            let parts: Vec<String> = parts.map(|p| p.as_ref().to_string()).collect();

            // Exactly <version>/<filename>; anything shallower or deeper is not an artifact
            let [version, filename] = parts.as_slice() else {
                continue;
            };
            if is_hidden(version) {
                continue;
            }
            let (version, filename) = (version.clone(), filename.clone());
            if !is_artifact(&filename) {
                continue;
            }

            files.push(ProjectFileInfo {
                project_name: project.clone(),
                version,
                filename,
                size: meta.size as u64,
                last_modified: meta.last_modified,
            });
        }

        files.sort_by(|a, b| (&a.version, &a.filename).cmp(&(&b.version, &b.filename)));
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
        let project = project_segment(project)?;
        validate_segment("Version", version)?;
        validate_filename(filename)?;

        let client = self.connector.connect()?;
        let location = client.blob_path(&project, version, filename);

        let result = match client.store().get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                warn!("Blob not found: {}", location);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let attributes = result.attributes.clone();
        let meta = result.meta.clone();
        let content = result.bytes().await?;

        let stored_digest = attributes
            .get(&digest_attribute())
            .map(|value| value.as_ref().trim().to_string())
            .filter(|value| !value.is_empty());

        let sha256_digest = match stored_digest {
            Some(digest) => digest,
            None => {
                warn!("SHA256 digest metadata missing for blob {}, recomputing", location);
                heal_digest(&client, &location, &meta, &content, attributes).await?
            }
        };

        Ok(Some(FileContents {
            filename: filename.to_string(),
            content,
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
        let project_name = project_segment(project)?;
        validate_segment("Version", version)?;
        validate_filename(filename)?;
        let digest = resolve_upload_digest(&content, sha256_digest)?;

        let client = self.connector.connect()?;
        let location = client.blob_path(&project_name, version, filename);

        if self.policy.requires_existence_check() {
            let exists = client.exists(&location).await?;
            self.policy.check(exists, project, filename)?;
        }

        let mut attributes = Attributes::new();
        attributes.insert(digest_attribute(), digest.clone().into());

        let mode = if self.policy.allow_overwrite {
            PutMode::Overwrite
        } else {
            PutMode::Create
        };

        let size = content.len();
        match client
            .store()
            .put_opts(
                &location,
                PutPayload::from(content),
                PutOptions {
                    mode,
                    attributes,
                    ..Default::default()
                },
            )
            .await
        {
            Ok(_) => {}
            // Lost a race with a concurrent upload after the existence check
            Err(object_store::Error::AlreadyExists { .. }) => {
                return Err(IndexError::FileExists {
                    project: project.to_string(),
                    filename: filename.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            "Uploaded blob {} ({} bytes, sha256 {})",
            location, size, digest
        );
        Ok(())
    }

    async fn delete_version(&self, project: &str, version: &str) -> IndexResult<bool> {
        let project_name = project_segment(project)?;
        validate_segment("Version", version)?;

        let client = self.connector.connect()?;
        let blobs = client
            .list_blobs(&client.version_prefix(&project_name, version))
            .await?;

        if blobs.is_empty() {
            warn!("Version {} of project {} not found", version, project);
            return Ok(false);
        }

        // One request per blob; a failure part-way leaves the rest in place
        for blob in &blobs {
            client.store().delete(&blob.location).await?;
        }

        info!(
            "Deleted version {} of project {} ({} blobs)",
            version,
            project,
            blobs.len()
        );
        Ok(true)
    }

    async fn delete_file(&self, project: &str, version: &str, filename: &str) -> IndexResult<bool> {
        let project_name = project_segment(project)?;
        validate_segment("Version", version)?;
        validate_filename(filename)?;

        let client = self.connector.connect()?;
        let location = client.blob_path(&project_name, version, filename);

        if !client.exists(&location).await? {
            warn!("Blob not found: {}", location);
            return Ok(false);
        }

        client.store().delete(&location).await?;
        info!("Deleted blob {}", location);
        Ok(true)
    }
}
