//! Storage object interfaces consumed by the serving layer.
//!
//! A storage object implements [`Storage`] plus whichever verb traits it
//! supports, and advertises them through the `as_*` accessors. Objects cross
//! these interfaces in their internal version as JSON values.

use pager_core::meta::ListOptions;
use serde_json::Value;

use crate::error::StateResult;

/// Result of a list call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectList {
    pub items: Vec<Value>,
    /// Store resource version the list was read at.
    pub resource_version: String,
    /// Set when `limit` cut the list short; pass back as `continue`.
    pub continue_token: String,
}

pub trait Storage: Send + Sync {
    /// Kind of the objects served, e.g. `Alert`.
    fn kind(&self) -> &'static str;

    /// A zero-valued internal object.
    fn new_object(&self) -> Value;

    fn namespaced(&self) -> bool {
        true
    }

    fn as_getter(&self) -> Option<&dyn Getter> {
        None
    }

    fn as_lister(&self) -> Option<&dyn Lister> {
        None
    }

    fn as_creater(&self) -> Option<&dyn Creater> {
        None
    }

    fn as_updater(&self) -> Option<&dyn Updater> {
        None
    }

    fn as_deleter(&self) -> Option<&dyn Deleter> {
        None
    }
}

pub trait Getter {
    fn get(&self, namespace: &str, name: &str) -> StateResult<Value>;
}

pub trait Lister {
    /// `None` lists across all namespaces.
    fn list(&self, namespace: Option<&str>, options: &ListOptions) -> StateResult<ObjectList>;
}

pub trait Creater {
    fn create(&self, namespace: &str, object: Value) -> StateResult<Value>;
}

pub trait Updater {
    fn update(&self, namespace: &str, name: &str, object: Value) -> StateResult<Value>;
}

pub trait Deleter {
    fn delete(&self, namespace: &str, name: &str) -> StateResult<Value>;
}

/// Discovery verbs supported by `storage`.
pub fn verbs(storage: &dyn Storage) -> Vec<String> {
    let mut verbs = Vec::new();
    if storage.as_creater().is_some() {
        verbs.push("create");
    }
    if storage.as_deleter().is_some() {
        verbs.push("delete");
    }
    if storage.as_getter().is_some() {
        verbs.push("get");
    }
    if storage.as_lister().is_some() {
        verbs.push("list");
    }
    if storage.as_updater().is_some() {
        verbs.push("update");
    }
    verbs.into_iter().map(String::from).collect()
}
