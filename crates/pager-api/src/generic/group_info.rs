//! The descriptor a group hands to [`GenericApiServer::install_api_group`].
//!
//! [`GenericApiServer::install_api_group`]: crate::generic::GenericApiServer::install_api_group

use std::collections::BTreeMap;
use std::sync::Arc;

use pager_core::{
    ApiRegistrationManager, CodecFactory, GroupMeta, GroupVersion, ParameterCodec, Scheme,
};
use pager_state::Storage;

use crate::generic::server::{ServerError, ServerResult};

/// Resource name (`alerts`, `alerts/status`) → storage object.
pub type ResourceStorageMap = BTreeMap<String, Arc<dyn Storage>>;

/// Everything needed to serve one API group.
#[derive(Clone)]
pub struct ApiGroupInfo {
    pub group_meta: GroupMeta,
    pub registry: Arc<ApiRegistrationManager>,
    pub scheme: Arc<Scheme>,
    pub parameter_codec: ParameterCodec,
    pub codecs: CodecFactory,
    /// Version → resource table. A storage object may appear under several
    /// versions; the scheme converts between them.
    pub versioned_resources_storage_map: BTreeMap<String, ResourceStorageMap>,
}

impl ApiGroupInfo {
    /// Group info with the registry's metadata for `group` and no resources.
    pub fn new_default(
        group: &str,
        registry: Arc<ApiRegistrationManager>,
        scheme: Arc<Scheme>,
        parameter_codec: ParameterCodec,
        codecs: CodecFactory,
    ) -> ServerResult<Self> {
        let group_meta = registry
            .group(group)
            .cloned()
            .ok_or_else(|| ServerError::GroupNotRegistered(group.to_string()))?;
        Ok(Self {
            group_meta,
            registry,
            scheme,
            parameter_codec,
            codecs,
            versioned_resources_storage_map: BTreeMap::new(),
        })
    }

    pub fn group_name(&self) -> &str {
        self.group_meta.group_name()
    }

    /// Override the preferred version advertised by discovery.
    pub fn set_preferred_version(&mut self, gv: &GroupVersion) -> ServerResult<()> {
        if gv.group != self.group_name() || !self.group_meta.group_versions.contains(gv) {
            return Err(ServerError::VersionNotEnabled(gv.clone()));
        }
        self.group_meta.group_version = gv.clone();
        Ok(())
    }

    /// Versions of this group the registry has enabled, in priority order.
    pub fn enabled_versions(&self) -> Vec<GroupVersion> {
        self.registry.enabled_versions_for_group(self.group_name())
    }

    pub fn storage(&self, version: &str, resource: &str) -> Option<&Arc<dyn Storage>> {
        self.versioned_resources_storage_map
            .get(version)
            .and_then(|table| table.get(resource))
    }
}
