//! Group/version registry.
//!
//! Two steps, both performed once at process start:
//!
//! 1. **Announce**: a group declares its name, version preference order and
//!    the functions that add its kinds to a scheme ([`GroupFactoryRegistry`]).
//! 2. **Register**: the announced versions permitted by the operator are
//!    added to the scheme and recorded as enabled ([`ApiRegistrationManager`]).
//!
//! Discovery reads the registration manager to learn which versions exist and
//! which one is preferred.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::{debug, info};

use crate::scheme::{Scheme, SchemeError, SchemeResult};
use crate::schema::{GroupVersion, ParseError};

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("group {0} has already been announced")]
    AlreadyAnnounced(String),

    #[error("group {0} has already been registered")]
    AlreadyRegistered(String),

    #[error("version {version} of group {group} is announced twice")]
    DuplicateVersion { group: String, version: String },

    #[error("group {0} has no enabled versions")]
    NoEnabledVersions(String),

    #[error("version {0} is not allowed by the enabled version list")]
    VersionNotAllowed(GroupVersion),

    #[error("invalid enabled version list: {0}")]
    InvalidVersionList(#[from] ParseError),

    #[error(transparent)]
    Scheme(#[from] SchemeError),
}

/// Adds one version's (or the internal version's) kinds to a scheme.
pub type AddToScheme = fn(&mut Scheme) -> SchemeResult<()>;

/// Registration metadata for a group once its versions are enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMeta {
    /// The preferred (default) version for the group.
    pub group_version: GroupVersion,
    /// Enabled versions in priority order.
    pub group_versions: Vec<GroupVersion>,
    /// Kinds that are not namespaced.
    pub root_scoped_kinds: BTreeSet<String>,
}

impl GroupMeta {
    pub fn group_name(&self) -> &str {
        &self.group_version.group
    }
}

/// Static description of a group, supplied by its `install` module.
pub struct GroupMetaFactoryArgs {
    pub group_name: &'static str,
    /// Most preferred first.
    pub version_preference_order: Vec<&'static str>,
    pub root_scoped_kinds: BTreeSet<String>,
    pub add_internal_objects: AddToScheme,
}

/// An announced group and its per-version scheme functions.
pub struct GroupMetaFactory {
    args: GroupMetaFactoryArgs,
    versions: Vec<(&'static str, AddToScheme)>,
}

impl GroupMetaFactory {
    pub fn new(args: GroupMetaFactoryArgs) -> Self {
        Self {
            args,
            versions: Vec::new(),
        }
    }

    /// Declare that `version` exists and how to add its kinds to a scheme.
    pub fn version(mut self, version: &'static str, add_to_scheme: AddToScheme) -> Self {
        self.versions.push((version, add_to_scheme));
        self
    }

    pub fn group_name(&self) -> &'static str {
        self.args.group_name
    }

    /// Add the enabled versions (and the internal version) to `scheme` and
    /// register the group with `manager`.
    pub fn register_and_enable(
        &self,
        manager: &mut ApiRegistrationManager,
        scheme: &mut Scheme,
    ) -> RegistryResult<()> {
        let group = self.args.group_name;
        if manager.is_registered(group) {
            return Err(RegistryError::AlreadyRegistered(group.to_string()));
        }

        let mut enabled = Vec::new();
        for version in &self.args.version_preference_order {
            let gv = GroupVersion::new(group, *version);
            if !manager.is_allowed_version(&gv) {
                debug!(%gv, "version disabled by enabled version list");
                continue;
            }
            if let Some((_, add)) = self.versions.iter().find(|(v, _)| v == version) {
                enabled.push((gv, *add));
            }
        }
        let Some(preferred) = enabled.first().map(|(gv, _)| gv.clone()) else {
            return Err(RegistryError::NoEnabledVersions(group.to_string()));
        };

        // Versioned conversions refer to the internal kinds.
        (self.args.add_internal_objects)(scheme)?;
        for (_, add) in &enabled {
            add(scheme)?;
        }
        let enabled: Vec<GroupVersion> = enabled.into_iter().map(|(gv, _)| gv).collect();

        manager.register_group(GroupMeta {
            group_version: preferred,
            group_versions: enabled.clone(),
            root_scoped_kinds: self.args.root_scoped_kinds.clone(),
        })?;
        manager.enable_versions(&enabled)?;
        info!(%group, versions = enabled.len(), "api group registered");
        Ok(())
    }
}

/// Groups announced by their install modules, keyed by group name.
#[derive(Default)]
pub struct GroupFactoryRegistry {
    groups: BTreeMap<&'static str, GroupMetaFactory>,
}

impl GroupFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a group. A name may only be announced once per process.
    pub fn announce(&mut self, factory: GroupMetaFactory) -> RegistryResult<&GroupMetaFactory> {
        let name = factory.group_name();
        if self.groups.contains_key(name) {
            return Err(RegistryError::AlreadyAnnounced(name.to_string()));
        }
        let mut seen = BTreeSet::new();
        for (version, _) in &factory.versions {
            if !seen.insert(*version) {
                return Err(RegistryError::DuplicateVersion {
                    group: name.to_string(),
                    version: version.to_string(),
                });
            }
        }
        debug!(group = name, "api group announced");
        Ok(self.groups.entry(name).or_insert(factory))
    }

    pub fn is_announced(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    pub fn announced_groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().copied()
    }
}

/// Tracks registered groups and enabled versions.
#[derive(Debug, Default)]
pub struct ApiRegistrationManager {
    groups: BTreeMap<String, GroupMeta>,
    enabled: BTreeSet<GroupVersion>,
    /// `None` allows every announced version.
    allowed: Option<BTreeSet<GroupVersion>>,
}

impl ApiRegistrationManager {
    /// `enabled_versions` is a comma-separated list of `group/version`;
    /// empty allows everything.
    pub fn new(enabled_versions: &str) -> RegistryResult<Self> {
        let allowed = if enabled_versions.trim().is_empty() {
            None
        } else {
            Some(
                enabled_versions
                    .split(',')
                    .map(GroupVersion::parse)
                    .collect::<Result<BTreeSet<_>, _>>()?,
            )
        };
        Ok(Self {
            allowed,
            ..Default::default()
        })
    }

    pub fn is_allowed_version(&self, gv: &GroupVersion) -> bool {
        self.allowed.as_ref().is_none_or(|allowed| allowed.contains(gv))
    }

    pub fn register_group(&mut self, meta: GroupMeta) -> RegistryResult<()> {
        let name = meta.group_name().to_string();
        if self.groups.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.groups.insert(name, meta);
        Ok(())
    }

    pub fn enable_versions(&mut self, versions: &[GroupVersion]) -> RegistryResult<()> {
        if let Some(gv) = versions.iter().find(|gv| !self.is_allowed_version(gv)) {
            return Err(RegistryError::VersionNotAllowed(gv.clone()));
        }
        self.enabled.extend(versions.iter().cloned());
        Ok(())
    }

    pub fn is_registered(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    pub fn is_enabled_version(&self, gv: &GroupVersion) -> bool {
        self.enabled.contains(gv)
    }

    pub fn group(&self, name: &str) -> Option<&GroupMeta> {
        self.groups.get(name)
    }

    pub fn registered_groups(&self) -> impl Iterator<Item = &GroupMeta> {
        self.groups.values()
    }

    /// Enabled versions of `group` in its priority order.
    pub fn enabled_versions_for_group(&self, group: &str) -> Vec<GroupVersion> {
        self.groups
            .get(group)
            .map(|meta| {
                meta.group_versions
                    .iter()
                    .filter(|gv| self.enabled.contains(gv))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every enabled version, groups in name order, versions in priority order.
    pub fn prioritized_versions_all_groups(&self) -> Vec<GroupVersion> {
        self.groups
            .keys()
            .flat_map(|group| self.enabled_versions_for_group(group))
            .collect()
    }
}
