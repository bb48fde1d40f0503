//! Storage options handed to storage providers.
//!
//! The serving configuration carries a [`RestOptionsGetter`]; a storage
//! provider asks it for the options of the resource it is about to build and
//! opens its [`StateStore`] from them.

use std::path::PathBuf;

use pager_core::GroupResource;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::store::StateStore;

/// Where objects are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    InMemory,
    Redb { data_dir: PathBuf },
}

/// Options for one resource's storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestOptions {
    pub backend: StorageBackend,
    /// Key prefix under which the resource's objects are stored.
    pub resource_prefix: String,
}

impl RestOptions {
    /// Open the backing store described by these options.
    pub fn open_store(&self) -> StateResult<StateStore> {
        match &self.backend {
            StorageBackend::InMemory => StateStore::open_in_memory(),
            StorageBackend::Redb { data_dir } => {
                std::fs::create_dir_all(data_dir).map_err(|e| {
                    StateError::Open(format!("creating {}: {e}", data_dir.display()))
                })?;
                let file = self.resource_prefix.trim_matches('/').replace('/', "_");
                StateStore::open(&data_dir.join(format!("{file}.redb")))
            }
        }
    }
}

/// Supplies storage options per resource.
pub trait RestOptionsGetter: Send + Sync {
    fn get_rest_options(&self, resource: &GroupResource) -> StateResult<RestOptions>;
}

/// The default options getter: one backend for every resource, keyed under
/// `/{prefix}/{group}/{resource}`.
#[derive(Debug, Clone)]
pub struct StorageFactory {
    backend: StorageBackend,
    prefix: String,
}

impl StorageFactory {
    pub const DEFAULT_PREFIX: &'static str = "registry";

    pub fn new(backend: StorageBackend) -> Self {
        Self {
            backend,
            prefix: Self::DEFAULT_PREFIX.to_string(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(StorageBackend::InMemory)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }
}

impl RestOptionsGetter for StorageFactory {
    fn get_rest_options(&self, resource: &GroupResource) -> StateResult<RestOptions> {
        if resource.resource.is_empty() {
            return Err(StateError::Options("resource name must not be empty".to_string()));
        }
        let prefix = self.prefix.trim_matches('/');
        let resource_prefix = if prefix.is_empty() {
            format!("/{}/{}", resource.group, resource.resource)
        } else {
            format!("/{prefix}/{}/{}", resource.group, resource.resource)
        };
        debug!(%resource, %resource_prefix, "rest options resolved");
        Ok(RestOptions {
            backend: self.backend.clone(),
            resource_prefix,
        })
    }
}
