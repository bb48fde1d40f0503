//! A minimal generic API server: configuration, group installation,
//! discovery, and resource handlers.

pub mod config;
pub mod group_info;
pub mod handlers;
pub mod server;

pub use config::{CompletedGenericConfig, ConfigError, RecommendedConfig};
pub use group_info::{ApiGroupInfo, ResourceStorageMap};
pub use server::{DelegationTarget, EmptyDelegate, GenericApiServer, ServerError, ServerResult};
