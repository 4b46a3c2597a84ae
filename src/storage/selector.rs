/// Backend selection from configuration
use crate::{
    config::StorageConfig,
    error::{IndexError, IndexResult},
    storage::{
        azure_blob::AzureBlobBackend, localfs::LocalFsBackend, OverwritePolicy, PackageBackend,
    },
};
use std::{fmt, str::FromStr, sync::Arc};
use tracing::info;

/// Storage backend discriminator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    #[default]
    LocalFs,
    AzureBlob,
}

impl FromStr for BackendKind {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "localfs" => Ok(BackendKind::LocalFs),
            "azure_blob" => Ok(BackendKind::AzureBlob),
            other => Err(IndexError::Config(format!(
                "Unknown storage backend '{}' (expected 'localfs' or 'azure_blob')",
                other
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::LocalFs => write!(f, "localfs"),
            BackendKind::AzureBlob => write!(f, "azure_blob"),
        }
    }
}

/// Construct the configured backend
pub fn select_backend(config: &StorageConfig) -> IndexResult<Arc<dyn PackageBackend>> {
    let policy = OverwritePolicy::new(config.allow_overwrite);

    info!(
        "Using {} storage backend (allow_overwrite: {})",
        config.backend, config.allow_overwrite
    );

    let backend: Arc<dyn PackageBackend> = match config.backend {
        BackendKind::LocalFs => {
            let localfs = config.localfs.as_ref().ok_or_else(|| {
                IndexError::Config("localfs backend selected but not configured".to_string())
            })?;
            Arc::new(LocalFsBackend::new(localfs.clone(), policy))
        }
        BackendKind::AzureBlob => {
            let azure = config.azure_blob.as_ref().ok_or_else(|| {
                IndexError::Config("azure_blob backend selected but not configured".to_string())
            })?;
            Arc::new(AzureBlobBackend::new(azure, policy)?)
        }
    };

    Ok(backend)
}
