//! pager-state — storage for the pager API server.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! object storage plus the storage objects the API server installs.
//!
//! # Architecture
//!
//! ```text
//! RestOptionsGetter (StorageFactory)
//!   └── RestOptions → StateStore (redb, JSON values, resourceVersion counter)
//!
//! registry::alert::new_rest
//!   ├── AlertStorage        alerts         get/list/create/update/delete
//!   └── AlertStatusStorage  alerts/status  get/update (status only)
//! ```
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and is shared by every storage object built from it.

pub mod error;
pub mod options;
pub mod registry;
pub mod rest;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use options::{RestOptions, RestOptionsGetter, StorageBackend, StorageFactory};
pub use rest::Storage;
pub use store::StateStore;
