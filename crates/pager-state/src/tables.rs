//! redb table definitions for the pager state store.
//!
//! Objects are JSON-serialized into `&[u8]` values under
//! `{resource_prefix}/{namespace}/{name}` keys, so a namespace or a whole
//! resource can be listed with a prefix range scan.

use redb::TableDefinition;

/// Stored objects keyed by `{resource_prefix}/{namespace}/{name}`.
pub const OBJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("objects");

/// Store-wide counters.
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Key in [`META`] holding the last issued resource version.
pub const RESOURCE_VERSION_KEY: &str = "resource_version";
