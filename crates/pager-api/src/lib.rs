//! pager-api — the pager API server.
//!
//! Serves the `pager.k8s.co` group over HTTP with axum. One storage instance
//! backs every served version; the scheme converts between them.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/healthz` | Liveness |
//! | GET | `/version` | Version stamp |
//! | GET | `/apis` | Group discovery |
//! | GET | `/apis/{group}` | Versions of a group |
//! | GET | `/apis/{group}/{version}` | Resources of a version |
//! | GET | `/apis/{group}/{version}/{resource}` | List across namespaces |
//! | GET, POST | `/apis/{group}/{version}/namespaces/{ns}/{resource}` | List, create |
//! | GET, PUT, DELETE | `.../{resource}/{name}` | Get, update, delete |
//! | GET, PUT | `.../{resource}/{name}/{subresource}` | Subresource get, update |
//!
//! # Assembly
//!
//! [`ApiRegistry::initialize`] → [`Config::new`] → [`Config::complete`] →
//! [`CompletedConfig::new`] → [`PagerServer`].

pub mod apiserver;
pub mod generic;
pub mod informers;

pub use apiserver::{
    ApiRegistry, CompletedConfig, Config, PagerServer, PagerServerError, SERVER_NAME,
};
pub use generic::RecommendedConfig;
pub use informers::SharedInformerFactory;
