//! Scheme — the type registry for every known (group, version, kind).
//!
//! A `Scheme` is populated once during process initialization through
//! `&mut` access, then frozen behind an `Arc` and shared read-only. Objects
//! flow through it as `serde_json::Value`; registration is typed so every
//! conversion and defaulting function works on real Rust structs.
//!
//! Conversions are hub-and-spoke: each versioned kind registers a pair of
//! functions to and from the group's `__internal` version, and
//! [`Scheme::convert`] chains them when no direct path is registered.

use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::schema::{GroupVersion, GroupVersionKind, INTERNAL_VERSION};

/// A type that can be registered in the scheme.
pub trait Object: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    const KIND: &'static str;
}

pub type SchemeResult<T> = Result<T, SchemeError>;

#[derive(Debug, Error)]
pub enum SchemeError {
    #[error("{gvk} is already registered to {existing}, cannot register {attempted}")]
    Conflict {
        gvk: GroupVersionKind,
        existing: &'static str,
        attempted: &'static str,
    },

    #[error("type {0} is not registered")]
    NotRegistered(&'static str),

    #[error("type {0} is registered under more than one version")]
    Ambiguous(&'static str),

    #[error("no kind {0} is registered")]
    UnknownKind(GroupVersionKind),

    #[error("no conversion from {from} to version {to}")]
    NoConversion { from: GroupVersionKind, to: String },

    #[error("decoding {gvk}: {source}")]
    Decode {
        gvk: GroupVersionKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("encoding {gvk}: {source}")]
    Encode {
        gvk: GroupVersionKind,
        #[source]
        source: serde_json::Error,
    },
}

type ConvertFn = Box<dyn Fn(Value) -> SchemeResult<Value> + Send + Sync>;
type DefaultFn = Box<dyn Fn(Value) -> SchemeResult<Value> + Send + Sync>;

struct KnownType {
    type_id: TypeId,
    type_name: &'static str,
    new: fn() -> Value,
}

fn new_value<T: Object>() -> Value {
    serde_json::to_value(T::default()).unwrap_or(Value::Null)
}

/// Registry of kinds, conversions and defaulters.
#[derive(Default)]
pub struct Scheme {
    known: BTreeMap<GroupVersionKind, KnownType>,
    /// Unversioned kind name → the single GVK it was registered at.
    unversioned: BTreeMap<String, GroupVersionKind>,
    by_type: HashMap<TypeId, Vec<GroupVersionKind>>,
    conversions: HashMap<(GroupVersionKind, GroupVersionKind), ConvertFn>,
    defaulters: HashMap<GroupVersionKind, DefaultFn>,
}

impl Scheme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `gv`. Registering the same type twice is a no-op;
    /// a different type at an occupied GVK is a conflict.
    pub fn add_known_type<T: Object>(&mut self, gv: &GroupVersion) -> SchemeResult<()> {
        let gvk = gv.with_kind(T::KIND);
        let type_id = TypeId::of::<T>();
        let type_name = std::any::type_name::<T>();

        if let Some(existing) = self.known.get(&gvk) {
            if existing.type_id == type_id {
                return Ok(());
            }
            return Err(SchemeError::Conflict {
                gvk,
                existing: existing.type_name,
                attempted: type_name,
            });
        }

        debug!(%gvk, type_name, "registered kind");
        self.by_type.entry(type_id).or_default().push(gvk.clone());
        self.known.insert(
            gvk,
            KnownType {
                type_id,
                type_name,
                new: new_value::<T>,
            },
        );
        Ok(())
    }

    /// Register `T` under `gv` and make it resolvable from any version.
    pub fn add_unversioned_type<T: Object>(&mut self, gv: &GroupVersion) -> SchemeResult<()> {
        let gvk = gv.with_kind(T::KIND);
        if let Some(existing) = self.unversioned.get(T::KIND) {
            if existing != &gvk {
                return Err(SchemeError::Conflict {
                    gvk,
                    existing: self.known[existing].type_name,
                    attempted: std::any::type_name::<T>(),
                });
            }
        }
        self.add_known_type::<T>(gv)?;
        self.unversioned.insert(T::KIND.to_string(), gvk);
        Ok(())
    }

    /// The single GVK `T` is registered at.
    pub fn gvk_for<T: Object>(&self) -> SchemeResult<GroupVersionKind> {
        let name = std::any::type_name::<T>();
        match self.by_type.get(&TypeId::of::<T>()).map(Vec::as_slice) {
            None | Some([]) => Err(SchemeError::NotRegistered(name)),
            Some([gvk]) => Ok(gvk.clone()),
            Some(_) => Err(SchemeError::Ambiguous(name)),
        }
    }

    /// Register a typed conversion from `A`'s version to `B`'s version.
    pub fn add_conversion<A, B, F>(&mut self, convert: F) -> SchemeResult<()>
    where
        A: Object,
        B: Object,
        F: Fn(&A) -> B + Send + Sync + 'static,
    {
        let from = self.gvk_for::<A>()?;
        let to = self.gvk_for::<B>()?;
        let (decode_gvk, encode_gvk) = (from.clone(), to.clone());
        let f: ConvertFn = Box::new(move |value| {
            let input: A = serde_json::from_value(value).map_err(|source| SchemeError::Decode {
                gvk: decode_gvk.clone(),
                source,
            })?;
            serde_json::to_value(convert(&input)).map_err(|source| SchemeError::Encode {
                gvk: encode_gvk.clone(),
                source,
            })
        });
        self.conversions.insert((from, to), f);
        Ok(())
    }

    /// Register a function that fills unset fields of `T`.
    pub fn add_defaulting<T, F>(&mut self, default: F) -> SchemeResult<()>
    where
        T: Object,
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        let gvk = self.gvk_for::<T>()?;
        let encode_gvk = gvk.clone();
        let f: DefaultFn = Box::new(move |value| {
            let mut obj: T = serde_json::from_value(value).map_err(|source| SchemeError::Decode {
                gvk: encode_gvk.clone(),
                source,
            })?;
            default(&mut obj);
            serde_json::to_value(obj).map_err(|source| SchemeError::Encode {
                gvk: encode_gvk.clone(),
                source,
            })
        });
        self.defaulters.insert(gvk, f);
        Ok(())
    }

    pub fn recognizes(&self, gvk: &GroupVersionKind) -> bool {
        self.known.contains_key(gvk) || self.is_unversioned(&gvk.kind)
    }

    pub fn is_unversioned(&self, kind: &str) -> bool {
        self.unversioned.contains_key(kind)
    }

    /// External versions registered for `group`, sorted, internal excluded.
    pub fn versions_for_group(&self, group: &str) -> Vec<String> {
        self.known
            .keys()
            .filter(|gvk| gvk.group == group && gvk.version != INTERNAL_VERSION)
            .map(|gvk| gvk.version.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Kinds registered at exactly `gv`.
    pub fn kinds_for_group_version(&self, gv: &GroupVersion) -> Vec<String> {
        self.known
            .keys()
            .filter(|gvk| gvk.group == gv.group && gvk.version == gv.version)
            .map(|gvk| gvk.kind.clone())
            .collect()
    }

    pub fn all_known_types(&self) -> impl Iterator<Item = &GroupVersionKind> {
        self.known.keys()
    }

    /// A zero-valued instance of `gvk`.
    pub fn new_object(&self, gvk: &GroupVersionKind) -> SchemeResult<Value> {
        self.known
            .get(gvk)
            .map(|t| (t.new)())
            .ok_or_else(|| SchemeError::UnknownKind(gvk.clone()))
    }

    /// Apply the registered defaulter for `gvk`, if any.
    pub fn apply_defaults(&self, gvk: &GroupVersionKind, value: Value) -> SchemeResult<Value> {
        match self.defaulters.get(gvk) {
            Some(f) => f(value),
            None => Ok(value),
        }
    }

    /// Convert `value` of kind `from` into `to_version` of the same group.
    ///
    /// Uses a direct conversion when registered, otherwise goes through the
    /// internal version.
    pub fn convert(&self, value: Value, from: &GroupVersionKind, to_version: &str) -> SchemeResult<Value> {
        if from.version == to_version || self.is_unversioned(&from.kind) {
            return Ok(value);
        }
        if !self.known.contains_key(from) {
            return Err(SchemeError::UnknownKind(from.clone()));
        }

        let target = from.at_version(to_version);
        if let Some(f) = self.conversions.get(&(from.clone(), target.clone())) {
            return f(value);
        }

        let no_path = || SchemeError::NoConversion {
            from: from.clone(),
            to: to_version.to_string(),
        };

        let hub = from.at_version(INTERNAL_VERSION);
        let internal = if from.version == INTERNAL_VERSION {
            value
        } else {
            let f = self.conversions.get(&(from.clone(), hub.clone())).ok_or_else(no_path)?;
            f(value)?
        };
        if to_version == INTERNAL_VERSION {
            return Ok(internal);
        }
        let f = self.conversions.get(&(hub, target)).ok_or_else(no_path)?;
        f(internal)
    }
}

impl std::fmt::Debug for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheme")
            .field("known", &self.known.keys().collect::<Vec<_>>())
            .field("unversioned", &self.unversioned.keys().collect::<Vec<_>>())
            .field("conversions", &self.conversions.len())
            .field("defaulters", &self.defaulters.len())
            .finish()
    }
}
