/// Scoped container clients for the Azure Blob backend
use crate::{
    error::{IndexError, IndexResult},
    storage::azure_blob::config::{
        AzureBlobConfig, AzureBlobDestination, ConnectionMethod, ConnectionString,
    },
};
use futures::TryStreamExt;
use object_store::{
    azure::{AzureConfigKey, MicrosoftAzureBuilder},
    path::Path,
    ObjectMeta, ObjectStore,
};
use std::sync::Arc;
use tracing::debug;

/// A container client scoped to a single backend operation.
///
/// Every blob name handed out is rooted at the configured base path. The
/// underlying connection is released when the client is dropped.
pub struct ContainerClient {
    store: Arc<dyn ObjectStore>,
    base_path: Path,
}

impl ContainerClient {
    pub fn new(store: Arc<dyn ObjectStore>, base_path: Path) -> Self {
        Self { store, base_path }
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// `<base>/<project>`
    pub fn project_prefix(&self, project: &str) -> Path {
        self.base_path.child(project)
    }

    /// `<base>/<project>/<version>`
    pub fn version_prefix(&self, project: &str, version: &str) -> Path {
        self.project_prefix(project).child(version)
    }

    /// `<base>/<project>/<version>/<filename>`
    pub fn blob_path(&self, project: &str, version: &str, filename: &str) -> Path {
        self.version_prefix(project, version).child(filename)
    }

    /// Directory-like children of a prefix (hierarchical listing), sorted and non-hidden
    pub async fn list_dirs(&self, prefix: &Path) -> IndexResult<Vec<String>> {
        let listing = self.store.list_with_delimiter(Some(prefix)).await?;

        let mut names: Vec<String> = listing
            .common_prefixes
            .iter()
            .filter_map(|p| p.filename().map(str::to_string))
            .filter(|name| !name.starts_with('.'))
            .collect();

        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Every blob below a prefix (flat listing)
    pub async fn list_blobs(&self, prefix: &Path) -> IndexResult<Vec<ObjectMeta>> {
        let blobs: Vec<ObjectMeta> = self.store.list(Some(prefix)).try_collect().await?;

        // Keep the match segment-aware: "proj" must not pick up "proj2/..."
        Ok(blobs
            .into_iter()
            .filter(|meta| meta.location.prefix_match(prefix).is_some())
            .collect())
    }

    /// Whether a blob exists
    pub async fn exists(&self, location: &Path) -> IndexResult<bool> {
        match self.store.head(location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Opens a scoped container client for each backend operation
pub trait ContainerConnector: Send + Sync {
    fn connect(&self) -> IndexResult<ContainerClient>;
}

/// Connector for Azure Blob Storage
#[derive(Debug, Clone)]
pub struct AzureConnector {
    destination: AzureBlobDestination,
    connection_string: Option<ConnectionString>,
    connection_method: ConnectionMethod,
}

impl AzureConnector {
    /// Validate the configuration; performs no I/O
    pub fn new(config: &AzureBlobConfig) -> IndexResult<Self> {
        let destination = AzureBlobDestination::parse(&config.destination_path)?;
        let connection_string = config
            .connection_string
            .as_deref()
            .map(ConnectionString::parse)
            .transpose()?;

        Ok(Self {
            destination,
            connection_string,
            connection_method: config.connection_method,
        })
    }

    pub fn destination(&self) -> &AzureBlobDestination {
        &self.destination
    }

    fn builder(&self) -> MicrosoftAzureBuilder {
        let destination = &self.destination;

        let builder = match &self.connection_string {
            Some(cs) => {
                let mut builder = MicrosoftAzureBuilder::new();
                if cs.use_development_storage {
                    builder = builder.with_use_emulator(true);
                }
                if let Some(account) = &cs.account_name {
                    builder = builder.with_account(account);
                }
                if let Some(key) = &cs.account_key {
                    builder = builder.with_access_key(key);
                }
                if let Some(sas) = &cs.shared_access_signature {
                    builder = builder.with_config(AzureConfigKey::SasKey, sas);
                }
                match cs.endpoint() {
                    Some(endpoint) => builder
                        .with_allow_http(endpoint.starts_with("http://"))
                        .with_endpoint(endpoint),
                    None => builder,
                }
            }
            None => {
                let builder = match self.connection_method {
                    ConnectionMethod::Default => MicrosoftAzureBuilder::from_env(),
                    // No explicit credentials: the client authenticates through IMDS
                    ConnectionMethod::ManagedIdentity => MicrosoftAzureBuilder::new(),
                };
                builder
                    .with_account(destination.account_name())
                    .with_endpoint(destination.account_url.clone())
                    .with_allow_http(destination.is_http())
            }
        };

        builder.with_container_name(&destination.container)
    }
}

impl ContainerConnector for AzureConnector {
    fn connect(&self) -> IndexResult<ContainerClient> {
        let store = self.builder().build().map_err(|e| {
            IndexError::Config(format!(
                "Failed to create Azure Blob client for container {}: {}",
                self.destination.container, e
            ))
        })?;

        debug!(
            "Opened Azure Blob client for {}/{}",
            self.destination.account_url, self.destination.container
        );

        Ok(ContainerClient::new(
            Arc::new(store),
            Path::from(self.destination.base_path.as_str()),
        ))
    }
}
