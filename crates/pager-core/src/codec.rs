//! Wire codecs derived from a [`Scheme`].
//!
//! A `VersionedCodec` translates between JSON on the wire in one external
//! version and the internal representation held by storage. It is stateless
//! apart from its shared reference to the scheme.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::meta::{ListMeta, ListOptions};
use crate::scheme::{Scheme, SchemeError};
use crate::schema::{GroupVersion, GroupVersionKind, INTERNAL_VERSION, ParseError};
use crate::selector::SelectorError;

pub const JSON_MEDIA_TYPE: &str = "application/json";

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Scheme(#[from] SchemeError),

    #[error("object must be a JSON map")]
    NotAnObject,

    #[error("object has no kind")]
    MissingKind,

    #[error("invalid apiVersion: {0}")]
    InvalidApiVersion(#[from] ParseError),

    #[error("no kind {0} is registered")]
    Unrecognized(GroupVersionKind),

    #[error("apiVersion {actual} does not belong to group {expected}")]
    GroupMismatch { expected: String, actual: String },

    #[error("invalid value {value:?} for parameter {name}")]
    InvalidParameter { name: &'static str, value: String },

    #[error(transparent)]
    Selector(#[from] SelectorError),
}

/// An object decoded from the wire.
#[derive(Debug, Clone)]
pub struct Decoded {
    /// The GVK the client sent.
    pub gvk: GroupVersionKind,
    /// The object converted to the internal version, type fields stripped.
    pub object: Value,
}

/// Builds codecs for every version known to a scheme.
#[derive(Debug, Clone)]
pub struct CodecFactory {
    scheme: Arc<Scheme>,
}

impl CodecFactory {
    pub fn new(scheme: Arc<Scheme>) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> &Arc<Scheme> {
        &self.scheme
    }

    pub fn supported_media_types(&self) -> &'static [&'static str] {
        &[JSON_MEDIA_TYPE]
    }

    /// A codec that encodes into and decodes from `gv`.
    pub fn codec_for_version(&self, gv: &GroupVersion) -> VersionedCodec {
        VersionedCodec {
            scheme: Arc::clone(&self.scheme),
            version: gv.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VersionedCodec {
    scheme: Arc<Scheme>,
    version: GroupVersion,
}

impl VersionedCodec {
    pub fn version(&self) -> &GroupVersion {
        &self.version
    }

    /// Convert an internal object of `kind` to this codec's version, stamped
    /// with `apiVersion`/`kind`.
    pub fn to_versioned(&self, internal: Value, kind: &str) -> CodecResult<Value> {
        if self.scheme.is_unversioned(kind) {
            return Ok(internal);
        }
        let from = GroupVersionKind {
            group: self.version.group.clone(),
            version: INTERNAL_VERSION.to_string(),
            kind: kind.to_string(),
        };
        let versioned = self.scheme.convert(internal, &from, &self.version.version)?;
        Ok(self.stamp(versioned, kind))
    }

    pub fn encode(&self, internal: Value, kind: &str) -> CodecResult<Vec<u8>> {
        let versioned = self.to_versioned(internal, kind)?;
        Ok(serde_json::to_vec(&versioned)?)
    }

    /// Encode internal `items` as a `<kind>List` in this codec's version.
    pub fn encode_list(&self, items: Vec<Value>, kind: &str, meta: ListMeta) -> CodecResult<Vec<u8>> {
        let items = items
            .into_iter()
            .map(|item| self.to_versioned(item, kind))
            .collect::<CodecResult<Vec<_>>>()?;
        let mut list = Map::new();
        list.insert("metadata".to_string(), serde_json::to_value(meta)?);
        list.insert("items".to_string(), Value::Array(items));
        let list = self.stamp(Value::Object(list), &format!("{kind}List"));
        Ok(serde_json::to_vec(&list)?)
    }

    /// Decode a request body into the internal version.
    ///
    /// A body without `apiVersion` is read as this codec's version. Bodies in
    /// any other registered version of the same group are accepted and
    /// converted.
    pub fn decode(&self, bytes: &[u8]) -> CodecResult<Decoded> {
        let value: Value = serde_json::from_slice(bytes)?;
        let Value::Object(mut map) = value else {
            return Err(CodecError::NotAnObject);
        };

        let gv = match map.remove("apiVersion") {
            Some(Value::String(s)) => GroupVersion::parse(&s)?,
            _ => self.version.clone(),
        };
        let kind = match map.remove("kind") {
            Some(Value::String(s)) if !s.is_empty() => s,
            _ => return Err(CodecError::MissingKind),
        };
        if gv.group != self.version.group {
            return Err(CodecError::GroupMismatch {
                expected: self.version.group.clone(),
                actual: gv.to_string(),
            });
        }

        let gvk = gv.with_kind(kind);
        if !self.scheme.recognizes(&gvk) || gvk.version == INTERNAL_VERSION {
            return Err(CodecError::Unrecognized(gvk));
        }

        let defaulted = self.scheme.apply_defaults(&gvk, Value::Object(map))?;
        let object = self.scheme.convert(defaulted, &gvk, INTERNAL_VERSION)?;
        Ok(Decoded { gvk, object })
    }

    fn stamp(&self, value: Value, kind: &str) -> Value {
        match value {
            Value::Object(fields) => {
                let mut out = Map::with_capacity(fields.len() + 2);
                out.insert("apiVersion".to_string(), Value::String(self.version.to_string()));
                out.insert("kind".to_string(), Value::String(kind.to_string()));
                out.extend(fields);
                Value::Object(out)
            }
            other => other,
        }
    }
}

/// Decodes query parameters into option kinds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterCodec;

impl ParameterCodec {
    pub fn decode_list_options(&self, query: &HashMap<String, String>) -> CodecResult<ListOptions> {
        let limit = match query.get("limit").map(String::as_str) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| CodecError::InvalidParameter {
                name: "limit",
                value: raw.to_string(),
            })?),
        };
        let text = |name: &str| query.get(name).cloned().unwrap_or_default();
        let options = ListOptions {
            label_selector: text("labelSelector"),
            field_selector: text("fieldSelector"),
            resource_version: text("resourceVersion"),
            limit,
            continue_token: text("continue"),
        };
        options.selectors()?;
        Ok(options)
    }
}
