/// Application context and dependency injection
use crate::{
    access::{AccessPolicy, AllowAll},
    config::ServerConfig,
    error::IndexResult,
    storage::{select_backend, PackageBackend},
};
use std::sync::Arc;
use tracing::info;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub backend: Arc<dyn PackageBackend>,
    pub access_policy: Arc<dyn AccessPolicy>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub fn new(config: ServerConfig) -> IndexResult<Self> {
        config.validate()?;

        let backend = select_backend(&config.storage)?;

        info!("Application context initialized");

        Ok(Self::with_parts(config, backend, Arc::new(AllowAll)))
    }

    /// Assemble a context from already constructed services
    pub fn with_parts(
        config: ServerConfig,
        backend: Arc<dyn PackageBackend>,
        access_policy: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            backend,
            access_policy,
        }
    }

    /// Whether unknown projects redirect to the upstream index
    pub fn fallback_url(&self) -> Option<&str> {
        self.config
            .fallback
            .enabled
            .then_some(self.config.fallback.url.as_str())
    }

    /// Filesystem-backed context for tests, mounted at `/fast-pypi`
    #[cfg(test)]
    pub fn for_tests(root: &std::path::Path, access_policy: Arc<dyn AccessPolicy>) -> Self {
        let root = root.to_string_lossy().to_string();
        let config = ServerConfig::from_lookup(|key| match key {
            "FAST_PYPI_LOCALFS_ROOT_PATH" => Some(root.clone()),
            _ => None,
        })
        .expect("test configuration");

        Self::with_parts(
            config.clone(),
            select_backend(&config.storage).expect("test backend"),
            access_policy,
        )
    }
}
