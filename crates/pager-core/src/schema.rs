//! Group, version, kind and resource identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version name of the hub representation every versioned kind converts through.
pub const INTERNAL_VERSION: &str = "__internal";

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("empty group version")]
    Empty,
    #[error("invalid group version: {0}")]
    InvalidGroupVersion(String),
}

/// A wire-schema variant of an API group, e.g. `pager.k8s.co/v1alpha1`.
///
/// The legacy core group has an empty name and renders as the bare version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupVersion {
    pub group: String,
    pub version: String,
}

impl GroupVersion {
    pub fn new(group: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
        }
    }

    /// The internal (hub) version of a group.
    pub fn internal(group: impl Into<String>) -> Self {
        Self::new(group, INTERNAL_VERSION)
    }

    pub fn is_internal(&self) -> bool {
        self.version == INTERNAL_VERSION
    }

    /// Parse `version` or `group/version`.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseError::Empty);
        }
        match s.split_once('/') {
            None => Ok(Self::new("", s)),
            Some((group, version)) => {
                if group.is_empty() || version.is_empty() || version.contains('/') {
                    return Err(ParseError::InvalidGroupVersion(s.to_string()));
                }
                Ok(Self::new(group, version))
            }
        }
    }

    pub fn with_kind(&self, kind: impl Into<String>) -> GroupVersionKind {
        GroupVersionKind {
            group: self.group.clone(),
            version: self.version.clone(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for GroupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.version)
        } else {
            write!(f, "{}/{}", self.group, self.version)
        }
    }
}

/// Identifies a concrete kind within one group version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn group_version(&self) -> GroupVersion {
        GroupVersion::new(self.group.clone(), self.version.clone())
    }

    /// Same kind, different version of the same group.
    pub fn at_version(&self, version: &str) -> Self {
        Self {
            group: self.group.clone(),
            version: version.to_string(),
            kind: self.kind.clone(),
        }
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.group_version(), self.kind)
    }
}

/// A resource (plural, lower-case) within a group, independent of version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupResource {
    pub group: String,
    pub resource: String,
}

impl GroupResource {
    pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for GroupResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}.{}", self.resource, self.group)
        }
    }
}
