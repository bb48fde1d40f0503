//! `pager.k8s.co/v1beta1`.

use serde::{Deserialize, Serialize};

use crate::apis::pager as internal;
use crate::meta::{self, ListMeta, ObjectMeta};
use crate::scheme::{Object, Scheme, SchemeResult};
use crate::schema::GroupVersion;

pub const VERSION: &str = "v1beta1";

pub const DEFAULT_SEVERITY: &str = "warning";

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

pub fn set_defaults_alert(alert: &mut Alert) {
    if alert.spec.severity.is_empty() {
        alert.spec.severity = DEFAULT_SEVERITY.to_string();
    }
}

fn to_internal(alert: &Alert) -> internal::Alert {
    internal::Alert {
        metadata: alert.metadata.clone(),
        spec: internal::AlertSpec {
            message: alert.spec.message.clone(),
            severity: alert.spec.severity.clone(),
        },
        status: internal::AlertStatus {
            sent: alert.status.sent,
        },
    }
}

fn from_internal(alert: &internal::Alert) -> Alert {
    Alert {
        metadata: alert.metadata.clone(),
        spec: AlertSpec {
            message: alert.spec.message.clone(),
            severity: alert.spec.severity.clone(),
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

    scheme.add_defaulting::<Alert, _>(set_defaults_alert)?;
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
