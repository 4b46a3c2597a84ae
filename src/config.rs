/// Configuration management for the package index
use crate::{
    error::{IndexError, IndexResult},
    storage::{
        azure_blob::{AzureBlobConfig, AzureBlobDestination, ConnectionMethod},
        localfs::LocalFsConfig,
        selector::BackendKind,
    },
};
use std::env;
use std::path::PathBuf;

const DEFAULT_MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;

/// Main server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub fallback: FallbackConfig,
}

/// Service-level configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Prefix every route is nested under; empty mounts at the root
    pub mount_path: String,
    pub max_upload_size: usize,
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub allow_overwrite: bool,
    pub localfs: Option<LocalFsConfig>,
    pub azure_blob: Option<AzureBlobConfig>,
}

/// Redirect unknown projects to an upstream index
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub url: String,
}

fn parse_flag(value: Option<String>) -> bool {
    value
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> IndexResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> IndexResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let hostname = lookup("FAST_PYPI_HOSTNAME").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = lookup("FAST_PYPI_PORT")
            .unwrap_or_else(|| "8000".to_string())
            .parse()
            .map_err(|_| IndexError::Config("Invalid port number".to_string()))?;
        let mount_path =
            lookup("FAST_PYPI_MOUNT_PATH").unwrap_or_else(|| "/fast-pypi".to_string());
        let max_upload_size = match lookup("FAST_PYPI_MAX_UPLOAD_SIZE") {
            Some(raw) => raw.parse().map_err(|_| {
                IndexError::Config(format!("Invalid FAST_PYPI_MAX_UPLOAD_SIZE '{}'", raw))
            })?,
            None => DEFAULT_MAX_UPLOAD_SIZE,
        };

        let backend: BackendKind = lookup("FAST_PYPI_BACKEND")
            .unwrap_or_else(|| "localfs".to_string())
            .parse()?;
        let allow_overwrite = parse_flag(lookup("FAST_PYPI_ALLOW_OVERWRITE"));

        // Only the selected backend's settings are required
        let localfs = match backend {
            BackendKind::LocalFs => Some(LocalFsConfig {
                root_path: lookup("FAST_PYPI_LOCALFS_ROOT_PATH")
                    .map(PathBuf::from)
                    .ok_or_else(|| {
                        IndexError::Config(
                            "FAST_PYPI_LOCALFS_ROOT_PATH is required for the localfs backend"
                                .to_string(),
                        )
                    })?,
            }),
            BackendKind::AzureBlob => None,
        };

        let azure_blob = match backend {
            BackendKind::AzureBlob => Some(AzureBlobConfig {
                destination_path: lookup("FAST_PYPI_AZURE_BLOB_DESTINATION_PATH").ok_or_else(
                    || {
                        IndexError::Config(
                            "FAST_PYPI_AZURE_BLOB_DESTINATION_PATH is required for the azure_blob backend"
                                .to_string(),
                        )
                    },
                )?,
                connection_string: lookup("FAST_PYPI_AZURE_BLOB_CONNECTION_STRING")
                    .filter(|s| !s.trim().is_empty()),
                connection_method: match lookup("FAST_PYPI_AZURE_BLOB_CONNECTION_METHOD") {
                    Some(method) => method.parse()?,
                    None => ConnectionMethod::default(),
                },
            }),
            BackendKind::LocalFs => None,
        };

        let fallback_enabled = parse_flag(lookup("FAST_PYPI_FALLBACK_ENABLED"));
        let fallback_url = lookup("FAST_PYPI_FALLBACK_URL")
            .unwrap_or_else(|| "https://pypi.org/simple/".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                mount_path,
                max_upload_size,
            },
            storage: StorageConfig {
                backend,
                allow_overwrite,
                localfs,
                azure_blob,
            },
            fallback: FallbackConfig {
                enabled: fallback_enabled,
                url: fallback_url,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> IndexResult<()> {
        if self.service.hostname.is_empty() {
            return Err(IndexError::Config("Hostname cannot be empty".to_string()));
        }

        if self.service.max_upload_size == 0 {
            return Err(IndexError::Config(
                "Maximum upload size must be greater than zero".to_string(),
            ));
        }

        let mount_path = &self.service.mount_path;
        if !mount_path.is_empty()
            && (!mount_path.starts_with('/') || mount_path.ends_with('/') || mount_path.contains("//"))
        {
            return Err(IndexError::Config(format!(
                "Mount path '{}' must start with '/' and must not end with '/'",
                mount_path
            )));
        }

        if self.fallback.enabled && !self.fallback.url.starts_with("http") {
            return Err(IndexError::Config(format!(
                "Fallback URL '{}' must be an http(s) URL",
                self.fallback.url
            )));
        }

        match self.storage.backend {
            BackendKind::LocalFs => {
                let localfs = self.storage.localfs.as_ref().ok_or_else(|| {
                    IndexError::Config("localfs backend is not configured".to_string())
                })?;
                if localfs.root_path.as_os_str().is_empty() {
                    return Err(IndexError::Config(
                        "FAST_PYPI_LOCALFS_ROOT_PATH cannot be empty".to_string(),
                    ));
                }
            }
            BackendKind::AzureBlob => {
                let azure = self.storage.azure_blob.as_ref().ok_or_else(|| {
                    IndexError::Config("azure_blob backend is not configured".to_string())
                })?;
                AzureBlobDestination::parse(&azure.destination_path)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    fn load(vars: &[(&str, &str)]) -> IndexResult<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("FAST_PYPI_LOCALFS_ROOT_PATH", "/srv/packages")]).unwrap();

        assert_eq!(config.service.hostname, "0.0.0.0");
        assert_eq!(config.service.port, 8000);
        assert_eq!(config.service.mount_path, "/fast-pypi");
        assert_eq!(config.service.max_upload_size, 100 * 1024 * 1024);
        assert_eq!(config.storage.backend, BackendKind::LocalFs);
        assert!(!config.storage.allow_overwrite);
        assert_eq!(
            config.storage.localfs.as_ref().unwrap().root_path,
            PathBuf::from("/srv/packages")
        );
        assert!(config.storage.azure_blob.is_none());
        assert!(!config.fallback.enabled);
        assert_eq!(config.fallback.url, "https://pypi.org/simple/");
        assert_ok!(config.validate());
    }

    #[test]
    fn test_allow_overwrite_flag() {
        for (raw, expected) in [("true", true), ("TRUE", true), ("True", true), ("1", false), ("no", false)] {
            let config = load(&[
                ("FAST_PYPI_LOCALFS_ROOT_PATH", "/srv/packages"),
                ("FAST_PYPI_ALLOW_OVERWRITE", raw),
            ])
            .unwrap();
            assert_eq!(config.storage.allow_overwrite, expected, "{}", raw);
        }
    }

    #[test]
    fn test_azure_blob_backend() {
        let config = load(&[
            ("FAST_PYPI_BACKEND", "azure_blob"),
            (
                "FAST_PYPI_AZURE_BLOB_DESTINATION_PATH",
                "https://account.blob.core.windows.net/container/path/",
            ),
            ("FAST_PYPI_AZURE_BLOB_CONNECTION_METHOD", "managed_identity"),
        ])
        .unwrap();

        assert_eq!(config.storage.backend, BackendKind::AzureBlob);
        assert!(config.storage.localfs.is_none());
        let azure = config.storage.azure_blob.as_ref().unwrap();
        assert_eq!(azure.connection_method, ConnectionMethod::ManagedIdentity);
        assert!(azure.connection_string.is_none());
        assert_ok!(config.validate());
    }

    #[test]
    fn test_missing_backend_settings_rejected() {
        assert_err!(load(&[]));
        assert_err!(load(&[("FAST_PYPI_BACKEND", "azure_blob")]));
        assert_err!(load(&[("FAST_PYPI_BACKEND", "s3")]));
        assert_err!(load(&[
            ("FAST_PYPI_BACKEND", "azure_blob"),
            ("FAST_PYPI_AZURE_BLOB_DESTINATION_PATH", "https://a.blob.core.windows.net/c/p/"),
            ("FAST_PYPI_AZURE_BLOB_CONNECTION_METHOD", "service_principal"),
        ]));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = load(&[
            ("FAST_PYPI_BACKEND", "azure_blob"),
            ("FAST_PYPI_AZURE_BLOB_DESTINATION_PATH", "https://a.blob.core.windows.net/c"),
        ])
        .unwrap();
        assert_err!(config.validate());

        for mount_path in ["fast-pypi", "/fast-pypi/", "//x"] {
            let config = load(&[
                ("FAST_PYPI_LOCALFS_ROOT_PATH", "/srv/packages"),
                ("FAST_PYPI_MOUNT_PATH", mount_path),
            ])
            .unwrap();
            assert_err!(config.validate());
        }

        let config = load(&[
            ("FAST_PYPI_LOCALFS_ROOT_PATH", "/srv/packages"),
            ("FAST_PYPI_MOUNT_PATH", ""),
        ])
        .unwrap();
        assert_ok!(config.validate());

        assert_err!(load(&[
            ("FAST_PYPI_LOCALFS_ROOT_PATH", "/srv/packages"),
            ("FAST_PYPI_PORT", "not-a-port"),
        ]));
    }
}
