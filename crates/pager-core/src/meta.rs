//! Version-independent metadata, discovery, and status types.
//!
//! These are the "unversioned" kinds the serving layer needs regardless of
//! which groups are installed. They serialize in camelCase to match the
//! conventional Kubernetes-style wire format.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scheme::{Object, Scheme, SchemeResult};
use crate::schema::GroupVersion;
use crate::selector::{FieldSelector, LabelSelector, SelectorError};

/// Version of the legacy core group the meta kinds live in.
pub const META_VERSION: &str = "v1";

/// The empty-group `v1` version used for unversioned and options kinds.
pub fn meta_group_version() -> GroupVersion {
    GroupVersion::new("", META_VERSION)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

/// Identity and bookkeeping shared by every stored object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    #[serde(default, rename = "continue", skip_serializing_if = "String::is_empty")]
    pub continue_token: String,
}

// ── Status ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    /// "Success" or "Failure".
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    pub code: u16,
}

impl Status {
    pub fn failure(code: u16, reason: &str, message: impl Into<String>) -> Self {
        Self {
            type_meta: TypeMeta {
                api_version: META_VERSION.to_string(),
                kind: Status::KIND.to_string(),
            },
            status: "Failure".to_string(),
            message: message.into(),
            reason: reason.to_string(),
            code,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            type_meta: TypeMeta {
                api_version: META_VERSION.to_string(),
                kind: Status::KIND.to_string(),
            },
            status: "Success".to_string(),
            message: message.into(),
            reason: String::new(),
            code: 200,
        }
    }
}

impl Object for Status {
    const KIND: &'static str = "Status";
}

// ── Discovery ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVersions {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub versions: Vec<String>,
}

impl Object for ApiVersions {
    const KIND: &'static str = "APIVersions";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionForDiscovery {
    pub group_version: String,
    pub version: String,
}

impl From<&GroupVersion> for GroupVersionForDiscovery {
    fn from(gv: &GroupVersion) -> Self {
        Self {
            group_version: gv.to_string(),
            version: gv.version.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGroup {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub name: String,
    pub versions: Vec<GroupVersionForDiscovery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_version: Option<GroupVersionForDiscovery>,
}

impl Object for ApiGroup {
    const KIND: &'static str = "APIGroup";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGroupList {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub groups: Vec<ApiGroup>,
}

impl Object for ApiGroupList {
    const KIND: &'static str = "APIGroupList";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResource {
    pub name: String,
    pub namespaced: bool,
    pub kind: String,
    pub verbs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResourceList {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub group_version: String,
    pub resources: Vec<ApiResource>,
}

impl Object for ApiResourceList {
    const KIND: &'static str = "APIResourceList";
}

// ── Options ────────────────────────────────────────────────────────

/// Query parameters accepted by list requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label_selector: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field_selector: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, rename = "continue", skip_serializing_if = "String::is_empty")]
    pub continue_token: String,
}

impl ListOptions {
    /// Parse both selectors. The list is served from the latest state, so
    /// `resource_version` is informational only.
    pub fn selectors(&self) -> Result<(LabelSelector, FieldSelector), SelectorError> {
        Ok((
            LabelSelector::parse(&self.label_selector)?,
            FieldSelector::parse(&self.field_selector)?,
        ))
    }
}

impl Object for ListOptions {
    const KIND: &'static str = "ListOptions";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period_seconds: Option<u64>,
}

impl Object for DeleteOptions {
    const KIND: &'static str = "DeleteOptions";
}

/// Build metadata reported on `/version`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub major: String,
    pub minor: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub git_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub platform: String,
}

/// Register the request-option kinds under `gv` so query parameters for any
/// group can be decoded through it.
pub fn add_to_group_version(scheme: &mut Scheme, gv: &GroupVersion) -> SchemeResult<()> {
    scheme.add_known_type::<ListOptions>(gv)?;
    scheme.add_known_type::<DeleteOptions>(gv)?;
    Ok(())
}

/// Kinds the serving layer resolves from any version.
pub fn add_unversioned_meta_types(scheme: &mut Scheme) -> SchemeResult<()> {
    let gv = meta_group_version();
    scheme.add_unversioned_type::<Status>(&gv)?;
    scheme.add_unversioned_type::<ApiVersions>(&gv)?;
    scheme.add_unversioned_type::<ApiGroupList>(&gv)?;
    scheme.add_unversioned_type::<ApiGroup>(&gv)?;
    scheme.add_unversioned_type::<ApiResourceList>(&gv)?;
    Ok(())
}
