//! The `pager.k8s.co` API group.
//!
//! This module holds the internal (hub) representation. Storage only ever
//! sees these types; the versioned modules convert to and from them.

pub mod install;
pub mod v1alpha1;
pub mod v1beta1;

use serde::{Deserialize, Serialize};

use crate::meta::{ListMeta, ObjectMeta};
use crate::scheme::{Object, Scheme, SchemeResult};
use crate::schema::{GroupResource, GroupVersion};

pub const GROUP_NAME: &str = "pager.k8s.co";

/// Plural resource name for alerts.
pub const ALERTS: &str = "alerts";

pub fn scheme_group_version() -> GroupVersion {
    GroupVersion::internal(GROUP_NAME)
}

pub fn resource(name: &str) -> GroupResource {
    GroupResource::new(GROUP_NAME, name)
}

/// A page to be delivered to whoever is on call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: AlertSpec,
    #[serde(default)]
    pub status: AlertStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertSpec {
    #[serde(default)]
    pub message: String,
    /// Empty when the alert was written through a version without severity.
    #[serde(default)]
    pub severity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertStatus {
    #[serde(default)]
    pub sent: bool,
}

impl Object for Alert {
    const KIND: &'static str = "Alert";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertList {
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default)]
    pub items: Vec<Alert>,
}

impl Object for AlertList {
    const KIND: &'static str = "AlertList";
}

/// Register the internal kinds.
pub fn add_to_scheme(scheme: &mut Scheme) -> SchemeResult<()> {
    let gv = scheme_group_version();
    scheme.add_known_type::<Alert>(&gv)?;
    scheme.add_known_type::<AlertList>(&gv)?;
    Ok(())
}
