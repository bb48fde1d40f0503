//! Generic server configuration and its completion step.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pager_core::meta::VersionInfo;
use pager_state::RestOptionsGetter;
use thiserror::Error;
use tracing::debug;

use crate::generic::server::{DelegationTarget, GenericApiServer, ServerResult};

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8443";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_REQUEST_BODY_BYTES: usize = 3 * 1024 * 1024;
pub const DEFAULT_API_GROUP_PREFIX: &str = "/apis";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("bind address must be set")]
    MissingBindAddress,

    #[error("invalid bind address {address:?}: {source}")]
    InvalidBindAddress {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("a REST options getter is required to build storage")]
    MissingRestOptionsGetter,

    #[error("api group prefix {0:?} must start with '/' and not end with one")]
    InvalidApiGroupPrefix(String),
}

/// Draft configuration for a generic API server. Unset fields are filled in
/// by [`RecommendedConfig::complete`].
#[derive(Clone)]
pub struct RecommendedConfig {
    pub bind_address: String,
    /// Address clients use to reach the server; defaults from the bind address.
    pub external_address: Option<String>,
    pub request_timeout: Option<Duration>,
    pub max_request_body_bytes: Option<usize>,
    pub api_group_prefix: Option<String>,
    /// Build metadata served on `/version`.
    pub version: Option<VersionInfo>,
    pub rest_options_getter: Option<Arc<dyn RestOptionsGetter>>,
}

impl Default for RecommendedConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            external_address: None,
            request_timeout: None,
            max_request_body_bytes: None,
            api_group_prefix: None,
            version: None,
            rest_options_getter: None,
        }
    }
}

impl fmt::Debug for RecommendedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecommendedConfig")
            .field("bind_address", &self.bind_address)
            .field("external_address", &self.external_address)
            .field("request_timeout", &self.request_timeout)
            .field("max_request_body_bytes", &self.max_request_body_bytes)
            .field("api_group_prefix", &self.api_group_prefix)
            .field("version", &self.version)
            .field("rest_options_getter", &self.rest_options_getter.is_some())
            .finish()
    }
}

impl RecommendedConfig {
    pub fn new(rest_options_getter: Arc<dyn RestOptionsGetter>) -> Self {
        Self {
            rest_options_getter: Some(rest_options_getter),
            ..Default::default()
        }
    }

    /// Fill in every unset field required to build a server.
    pub fn complete(self) -> Result<CompletedGenericConfig, ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::MissingBindAddress);
        }
        let bind_address: SocketAddr =
            self.bind_address
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidBindAddress {
                    address: self.bind_address.clone(),
                    source,
                })?;
        let rest_options_getter = self
            .rest_options_getter
            .ok_or(ConfigError::MissingRestOptionsGetter)?;

        let api_group_prefix = self
            .api_group_prefix
            .unwrap_or_else(|| DEFAULT_API_GROUP_PREFIX.to_string());
        if !api_group_prefix.starts_with('/') || api_group_prefix.ends_with('/') {
            return Err(ConfigError::InvalidApiGroupPrefix(api_group_prefix));
        }

        let external_address = self.external_address.unwrap_or_else(|| {
            if bind_address.ip().is_unspecified() {
                format!("localhost:{}", bind_address.port())
            } else {
                bind_address.to_string()
            }
        });

        let completed = CompletedGenericConfig {
            bind_address,
            external_address,
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            max_request_body_bytes: self
                .max_request_body_bytes
                .unwrap_or(DEFAULT_MAX_REQUEST_BODY_BYTES),
            api_group_prefix,
            version: self.version,
            rest_options_getter,
        };
        debug!(bind_address = %completed.bind_address, external_address = %completed.external_address, "generic config completed");
        Ok(completed)
    }
}

/// A generic configuration with every required field populated.
#[derive(Clone)]
pub struct CompletedGenericConfig {
    bind_address: SocketAddr,
    external_address: String,
    request_timeout: Duration,
    max_request_body_bytes: usize,
    api_group_prefix: String,
    version: Option<VersionInfo>,
    rest_options_getter: Arc<dyn RestOptionsGetter>,
}

impl fmt::Debug for CompletedGenericConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletedGenericConfig")
            .field("bind_address", &self.bind_address)
            .field("external_address", &self.external_address)
            .field("request_timeout", &self.request_timeout)
            .field("max_request_body_bytes", &self.max_request_body_bytes)
            .field("api_group_prefix", &self.api_group_prefix)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl CompletedGenericConfig {
    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    pub fn external_address(&self) -> &str {
        &self.external_address
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn max_request_body_bytes(&self) -> usize {
        self.max_request_body_bytes
    }

    pub fn api_group_prefix(&self) -> &str {
        &self.api_group_prefix
    }

    pub fn version(&self) -> Option<&VersionInfo> {
        self.version.as_ref()
    }

    pub fn rest_options_getter(&self) -> &Arc<dyn RestOptionsGetter> {
        &self.rest_options_getter
    }

    /// Stamp build metadata after completion.
    pub fn with_version(mut self, version: VersionInfo) -> Self {
        self.version = Some(version);
        self
    }

    /// Build a generic server named `name` that hands unmatched requests to
    /// `delegate`.
    pub fn new(
        &self,
        name: &str,
        delegate: impl DelegationTarget + 'static,
    ) -> ServerResult<GenericApiServer> {
        GenericApiServer::new(name, self, Box::new(delegate))
    }
}
