/// Azure Blob backend configuration
use crate::error::{IndexError, IndexResult};
use std::fmt;
use std::str::FromStr;

/// Configuration for the Azure Blob backend
#[derive(Clone, PartialEq, Eq)]
pub struct AzureBlobConfig {
    /// `<account url>/<container>/<base path>/`,
    /// e.g. `https://account.blob.core.windows.net/container/packages/`
    pub destination_path: String,

    /// Optional connection string; takes precedence over `connection_method`
    pub connection_string: Option<String>,

    /// Credential source used when no connection string is configured
    pub connection_method: ConnectionMethod,
}

impl fmt::Debug for AzureBlobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureBlobConfig")
            .field("destination_path", &self.destination_path)
            .field(
                "connection_string",
                &self.connection_string.as_ref().map(|_| "<redacted>"),
            )
            .field("connection_method", &self.connection_method)
            .finish()
    }
}

/// Credential source for the blob client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionMethod {
    /// Environment credentials, falling back to managed identity
    #[default]
    Default,
    /// Managed identity only
    ManagedIdentity,
}

impl FromStr for ConnectionMethod {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(ConnectionMethod::Default),
            "managed_identity" => Ok(ConnectionMethod::ManagedIdentity),
            other => Err(IndexError::Config(format!(
                "Unknown Azure Blob connection method '{}' (expected 'default' or 'managed_identity')",
                other
            ))),
        }
    }
}

/// Parsed destination path: account URL, container and base path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureBlobDestination {
    pub account_url: String,
    pub container: String,
    /// Always ends with `/`
    pub base_path: String,
}

impl AzureBlobDestination {
    /// Parse `scheme://host[:port]/container/base/path/`
    pub fn parse(destination: &str) -> IndexResult<Self> {
        let malformed = || {
            IndexError::Config(format!(
                "Malformed destination path '{}': expected scheme://host[:port]/container/base/path/",
                destination
            ))
        };

        let (scheme, rest) = destination.split_once("://").ok_or_else(malformed)?;
        if scheme != "http" && scheme != "https" {
            return Err(malformed());
        }

        let (authority, path) = rest.split_once('/').ok_or_else(malformed)?;
        let host = match authority.split_once(':') {
            Some((host, port)) => {
                if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
                    return Err(malformed());
                }
                host
            }
            None => authority,
        };
        if host.is_empty() {
            return Err(malformed());
        }

        let (container, base_path) = path.split_once('/').ok_or_else(malformed)?;
        if container.is_empty() || !base_path.ends_with('/') || base_path.trim_matches('/').is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            account_url: format!("{}://{}", scheme, authority),
            container: container.to_string(),
            base_path: base_path.to_string(),
        })
    }

    /// Storage account name, taken from the first label of the host
    pub fn account_name(&self) -> &str {
        let authority = self
            .account_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.account_url);
        let host = authority.split(':').next().unwrap_or(authority);
        host.split('.').next().unwrap_or(host)
    }

    pub fn is_http(&self) -> bool {
        self.account_url.starts_with("http://")
    }
}

/// Parsed Azure Storage connection string
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    pub protocol: Option<String>,
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    pub blob_endpoint: Option<String>,
    pub endpoint_suffix: Option<String>,
    pub shared_access_signature: Option<String>,
    pub use_development_storage: bool,
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("protocol", &self.protocol)
            .field("account_name", &self.account_name)
            .field("blob_endpoint", &self.blob_endpoint)
            .field("use_development_storage", &self.use_development_storage)
            .finish_non_exhaustive()
    }
}

impl ConnectionString {
    /// Parse `Key=Value;Key=Value;...`
    pub fn parse(raw: &str) -> IndexResult<Self> {
        let mut parsed = ConnectionString::default();

        for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // Values (account keys, SAS tokens) may themselves contain '='
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                IndexError::Config("Malformed Azure Blob connection string".to_string())
            })?;
            let value = value.to_string();

            match key.to_ascii_lowercase().as_str() {
                "defaultendpointsprotocol" => parsed.protocol = Some(value),
                "accountname" => parsed.account_name = Some(value),
                "accountkey" => parsed.account_key = Some(value),
                "blobendpoint" => parsed.blob_endpoint = Some(value),
                "endpointsuffix" => parsed.endpoint_suffix = Some(value),
                "sharedaccesssignature" => parsed.shared_access_signature = Some(value),
                "usedevelopmentstorage" => {
                    parsed.use_development_storage = value.eq_ignore_ascii_case("true")
                }
                // Queue/table/file endpoints are irrelevant to blob access
                _ => {}
            }
        }

        if parsed.account_name.is_none() && !parsed.use_development_storage {
            return Err(IndexError::Config(
                "Azure Blob connection string is missing AccountName".to_string(),
            ));
        }

        Ok(parsed)
    }

    /// Blob endpoint to use, if it differs from the public Azure default
    pub fn endpoint(&self) -> Option<String> {
        if let Some(endpoint) = &self.blob_endpoint {
            return Some(endpoint.trim_end_matches('/').to_string());
        }
        match (&self.account_name, &self.endpoint_suffix) {
            (Some(account), Some(suffix)) if suffix != "core.windows.net" => Some(format!(
                "{}://{}.blob.{}",
                self.protocol.as_deref().unwrap_or("https"),
                account,
                suffix
            )),
            _ => None,
        }
    }
}
