//! `pager.k8s.co/v1alpha1` — the preferred version.
//!
//! This version predates severity. Internal severity survives a round trip
//! through an annotation.

use serde::{Deserialize, Serialize};

use crate::apis::pager as internal;
use crate::meta::{self, ListMeta, ObjectMeta};
use crate::scheme::{Object, Scheme, SchemeResult};
use crate::schema::GroupVersion;

pub const VERSION: &str = "v1alpha1";

/// Annotation carrying severity for clients of this version.
pub const SEVERITY_ANNOTATION: &str = "pager.k8s.co/severity";

pub fn scheme_group_version() -> GroupVersion {
    GroupVersion::new(internal::GROUP_NAME, VERSION)
}

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

fn to_internal(alert: &Alert) -> internal::Alert {
    let mut metadata = alert.metadata.clone();
    let severity = metadata.annotations.remove(SEVERITY_ANNOTATION).unwrap_or_default();
    internal::Alert {
        metadata,
        spec: internal::AlertSpec {
            message: alert.spec.message.clone(),
            severity,
        },
        status: internal::AlertStatus {
            sent: alert.status.sent,
        },
    }
}

fn from_internal(alert: &internal::Alert) -> Alert {
    let mut metadata = alert.metadata.clone();
    if !alert.spec.severity.is_empty() {
        metadata
            .annotations
            .insert(SEVERITY_ANNOTATION.to_string(), alert.spec.severity.clone());
    }
    Alert {
        metadata,
        spec: AlertSpec {
            message: alert.spec.message.clone(),
        },
        status: AlertStatus {
            sent: alert.status.sent,
        },
    }
}

pub fn add_to_scheme(scheme: &mut Scheme) -> SchemeResult<()> {
    let gv = scheme_group_version();
    scheme.add_known_type::<Alert>(&gv)?;
    scheme.add_known_type::<AlertList>(&gv)?;
    meta::add_to_group_version(scheme, &gv)?;

    scheme.add_conversion::<Alert, internal::Alert, _>(to_internal)?;
    scheme.add_conversion::<internal::Alert, Alert, _>(from_internal)?;
    scheme.add_conversion::<AlertList, internal::AlertList, _>(|list| internal::AlertList {
        metadata: list.metadata.clone(),
        items: list.items.iter().map(to_internal).collect(),
    })?;
    scheme.add_conversion::<internal::AlertList, AlertList, _>(|list| AlertList {
        metadata: list.metadata.clone(),
        items: list.items.iter().map(from_internal).collect(),
    })?;
    Ok(())
}
