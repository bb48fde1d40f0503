//! GenericApiServer — installs API groups and serves them over HTTP.
//!
//! Groups are installed before the server starts. Each installed group keeps
//! its version → resource → storage tables; the router built from them
//! resolves every request against those tables.

use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use pager_core::meta::VersionInfo;
use pager_core::{CodecFactory, GroupMeta, GroupVersion, GroupVersionKind, ParameterCodec};
use pager_state::Storage;
use thiserror::Error;
use tracing::{debug, info};

use crate::generic::config::CompletedGenericConfig;
use crate::generic::group_info::{ApiGroupInfo, ResourceStorageMap};
use crate::generic::handlers;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server name must not be empty")]
    InvalidName,

    #[error("group {0} is not registered")]
    GroupNotRegistered(String),

    #[error("group {0} is already installed")]
    GroupAlreadyInstalled(String),

    #[error("group {0} has no resources to install")]
    NoResources(String),

    #[error("version {0} is not enabled")]
    VersionNotEnabled(GroupVersion),

    #[error("version {0} has an empty resource table")]
    EmptyVersion(GroupVersion),

    #[error("preferred version {0} is not served")]
    PreferredVersionNotServed(GroupVersion),

    #[error("invalid resource name {0:?}")]
    InvalidResourceName(String),

    #[error("subresource {subresource} in {version} has no parent resource")]
    OrphanSubresource {
        version: GroupVersion,
        subresource: String,
    },

    #[error("storage for {resource} serves unregistered kind {gvk}")]
    KindNotRegistered {
        resource: String,
        gvk: GroupVersionKind,
    },

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serves whatever this server does not.
pub trait DelegationTarget: Send + Sync {
    /// Router for requests no installed group matched.
    fn unprotected_router(&self) -> Option<Router>;

    /// Paths advertised on `/`.
    fn listed_paths(&self) -> Vec<String>;
}

/// A delegate that serves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyDelegate;

impl DelegationTarget for EmptyDelegate {
    fn unprotected_router(&self) -> Option<Router> {
        None
    }

    fn listed_paths(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Serving parameters taken from the completed configuration.
#[derive(Debug, Clone)]
pub struct ServingInfo {
    pub name: String,
    pub bind_address: SocketAddr,
    pub external_address: String,
    pub request_timeout: Duration,
    pub max_request_body_bytes: usize,
    pub api_group_prefix: String,
    pub version: Option<VersionInfo>,
}

/// A group as installed: metadata, codecs, and its version tables.
#[derive(Clone)]
pub struct InstalledGroup {
    pub meta: GroupMeta,
    pub codecs: CodecFactory,
    pub parameter_codec: ParameterCodec,
    pub versions: BTreeMap<String, ResourceStorageMap>,
}

impl InstalledGroup {
    /// Served versions in the group's priority order.
    pub fn served_versions(&self) -> Vec<GroupVersion> {
        self.meta
            .group_versions
            .iter()
            .filter(|gv| self.versions.contains_key(&gv.version))
            .cloned()
            .collect()
    }
}

pub struct GenericApiServer {
    serving: ServingInfo,
    delegate: Box<dyn DelegationTarget>,
    groups: BTreeMap<String, InstalledGroup>,
}

impl GenericApiServer {
    pub(crate) fn new(
        name: &str,
        config: &CompletedGenericConfig,
        delegate: Box<dyn DelegationTarget>,
    ) -> ServerResult<Self> {
        if name.trim().is_empty() {
            return Err(ServerError::InvalidName);
        }
        let serving = ServingInfo {
            name: name.to_string(),
            bind_address: config.bind_address(),
            external_address: config.external_address().to_string(),
            request_timeout: config.request_timeout(),
            max_request_body_bytes: config.max_request_body_bytes(),
            api_group_prefix: config.api_group_prefix().to_string(),
            version: config.version().cloned(),
        };
        debug!(%name, "generic api server created");
        Ok(Self {
            serving,
            delegate,
            groups: BTreeMap::new(),
        })
    }

    pub fn serving_info(&self) -> &ServingInfo {
        &self.serving
    }

    /// Validate and install `info`. On error nothing is installed.
    pub fn install_api_group(&mut self, info: &ApiGroupInfo) -> ServerResult<()> {
        let group = info.group_name().to_string();
        if self.groups.contains_key(&group) {
            return Err(ServerError::GroupAlreadyInstalled(group));
        }
        if info.versioned_resources_storage_map.is_empty() {
            return Err(ServerError::NoResources(group));
        }

        let preferred = &info.group_meta.group_version;
        if !info
            .versioned_resources_storage_map
            .contains_key(&preferred.version)
        {
            return Err(ServerError::PreferredVersionNotServed(preferred.clone()));
        }

        for (version, table) in &info.versioned_resources_storage_map {
            let gv = GroupVersion::new(group.clone(), version.clone());
            if !info.registry.is_enabled_version(&gv) {
                return Err(ServerError::VersionNotEnabled(gv));
            }
            if table.is_empty() {
                return Err(ServerError::EmptyVersion(gv));
            }
            for (resource, storage) in table {
                validate_resource(&gv, resource, table)?;
                let gvk = gv.with_kind(storage.kind());
                if !info.scheme.recognizes(&gvk) {
                    return Err(ServerError::KindNotRegistered {
                        resource: resource.clone(),
                        gvk,
                    });
                }
            }
        }

        let installed = InstalledGroup {
            meta: info.group_meta.clone(),
            codecs: info.codecs.clone(),
            parameter_codec: info.parameter_codec,
            versions: info.versioned_resources_storage_map.clone(),
        };
        for gv in installed.served_versions() {
            let resources: Vec<&String> = installed.versions[&gv.version].keys().collect();
            info!(group_version = %gv, ?resources, "api group version installed");
        }
        self.groups.insert(group, installed);
        Ok(())
    }

    pub fn installed_groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn installed_group(&self, group: &str) -> Option<&InstalledGroup> {
        self.groups.get(group)
    }

    /// The storage object serving `resource` at `gv`.
    pub fn storage_for(&self, gv: &GroupVersion, resource: &str) -> Option<Arc<dyn Storage>> {
        self.groups
            .get(&gv.group)
            .and_then(|g| g.versions.get(&gv.version))
            .and_then(|table| table.get(resource))
            .cloned()
    }

    /// Paths advertised on `/`, including the delegate's.
    pub fn listed_paths(&self) -> Vec<String> {
        let prefix = &self.serving.api_group_prefix;
        let mut paths = vec![
            "/healthz".to_string(),
            "/version".to_string(),
            prefix.clone(),
        ];
        for (name, group) in &self.groups {
            paths.push(format!("{prefix}/{name}"));
            for gv in group.served_versions() {
                paths.push(format!("{prefix}/{gv}"));
            }
        }
        paths.extend(self.delegate.listed_paths());
        paths.sort();
        paths.dedup();
        paths
    }

    /// Build the HTTP router for everything installed so far.
    pub fn router(&self) -> Router {
        let state = handlers::ApiState {
            serving: Arc::new(self.serving.clone()),
            groups: Arc::new(self.groups.clone()),
            paths: Arc::new(self.listed_paths()),
        };
        handlers::build_router(state, self.delegate.unprotected_router())
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        let addr = self.serving.bind_address;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, name = %self.serving.name, "API server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!(name = %self.serving.name, "API server stopped");
        Ok(())
    }
}

/// `resource` must be `name` or `name/subresource`, lower-case, with the
/// parent present in the same table.
fn validate_resource(
    gv: &GroupVersion,
    resource: &str,
    table: &ResourceStorageMap,
) -> ServerResult<()> {
    let invalid = || ServerError::InvalidResourceName(resource.to_string());
    let parts: Vec<&str> = resource.split('/').collect();
    if parts.len() > 2 {
        return Err(invalid());
    }
    for part in &parts {
        let ok = !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !ok {
            return Err(invalid());
        }
    }
    if parts.len() == 2 && !table.contains_key(parts[0]) {
        return Err(ServerError::OrphanSubresource {
            version: gv.clone(),
            subresource: resource.to_string(),
        });
    }
    Ok(())
}
