//! The pager API server: registry initialization, configuration completion,
//! and server assembly.
//!
//! Each stage can only be reached from the one before it:
//!
//! ```text
//! ApiRegistry::initialize ──► Config::new ──► Config::complete ──► CompletedConfig::new
//!   scheme + group registry     generic config    version stamp         PagerServer
//!                                              └► Config::skip_complete ┘
//! ```
//!
//! A [`CompletedConfig`] has no public constructor, so a server cannot be
//! built from a configuration that skipped completion:
//!
//! ```compile_fail
//! use pager_api::apiserver::{CompletedConfig, Config};
//!
//! fn build(config: Config) {
//!     let _ = CompletedConfig {
//!         generic_config: config.generic_config,
//!         shared_informer_factory: None,
//!     };
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::Router;
use pager_core::apis::{
    self,
    pager::{ALERTS, GROUP_NAME, v1alpha1, v1beta1},
};
use pager_core::meta::VersionInfo;
use pager_core::registry::RegistryResult;
use pager_core::{
    ApiRegistrationManager, CodecFactory, GroupFactoryRegistry, ParameterCodec, Scheme,
};
use pager_state::registry::alert;
use pager_state::{StateError, Storage};
use thiserror::Error;
use tracing::{debug, info};

use crate::generic::{
    ApiGroupInfo, CompletedGenericConfig, ConfigError, EmptyDelegate, GenericApiServer,
    RecommendedConfig, ResourceStorageMap, ServerError, ServerResult,
};
use crate::informers::SharedInformerFactory;

/// Name the generic server is created under.
pub const SERVER_NAME: &str = "pager";

/// Version stamp set by [`Config::complete`].
pub fn pager_version() -> VersionInfo {
    VersionInfo {
        major: "1".to_string(),
        minor: "0".to_string(),
        ..Default::default()
    }
}

/// Failure while assembling the server, tagged by the step that failed.
#[derive(Debug, Error)]
pub enum PagerServerError {
    #[error("creating generic server: {0}")]
    GenericServer(#[source] ServerError),

    #[error("building api group info: {0}")]
    GroupInfo(#[source] ServerError),

    #[error("creating storage: {0}")]
    Storage(#[from] StateError),

    #[error("installing api group {group}: {source}")]
    InstallGroup {
        group: String,
        #[source]
        source: ServerError,
    },
}

// ── Registry ───────────────────────────────────────────────────────

/// The scheme and group registry, populated once by the process entry point
/// and read-only afterwards.
#[derive(Clone)]
pub struct ApiRegistry {
    scheme: Arc<Scheme>,
    codecs: CodecFactory,
    manager: Arc<ApiRegistrationManager>,
    parameter_codec: ParameterCodec,
}

impl ApiRegistry {
    /// Register every served group, restricted to `enabled_versions`
    /// (comma-separated `group/version` list, empty for all).
    pub fn initialize(enabled_versions: &str) -> RegistryResult<Self> {
        let mut announced = GroupFactoryRegistry::new();
        let mut manager = ApiRegistrationManager::new(enabled_versions)?;
        let mut scheme = Scheme::new();
        apis::install_all(&mut announced, &mut manager, &mut scheme)?;

        let enabled = manager.prioritized_versions_all_groups();
        info!(
            versions = ?enabled.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "api registry initialized"
        );

        let scheme = Arc::new(scheme);
        Ok(Self {
            codecs: CodecFactory::new(Arc::clone(&scheme)),
            scheme,
            manager: Arc::new(manager),
            parameter_codec: ParameterCodec,
        })
    }

    pub fn scheme(&self) -> &Arc<Scheme> {
        &self.scheme
    }

    pub fn codecs(&self) -> &CodecFactory {
        &self.codecs
    }

    pub fn manager(&self) -> &Arc<ApiRegistrationManager> {
        &self.manager
    }

    pub fn parameter_codec(&self) -> ParameterCodec {
        self.parameter_codec
    }
}

impl fmt::Debug for ApiRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRegistry")
            .field("scheme", &self.scheme)
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

// ── Configuration ──────────────────────────────────────────────────

/// Server configuration before completion.
pub struct Config {
    pub generic_config: RecommendedConfig,
    pub shared_informer_factory: Option<SharedInformerFactory>,
    registry: ApiRegistry,
}

impl Config {
    pub fn new(registry: &ApiRegistry, generic_config: RecommendedConfig) -> Self {
        Self {
            generic_config,
            shared_informer_factory: None,
            registry: registry.clone(),
        }
    }

    pub fn with_shared_informer_factory(mut self, factory: SharedInformerFactory) -> Self {
        self.shared_informer_factory = Some(factory);
        self
    }

    /// Complete the generic configuration and stamp the pager version.
    pub fn complete(self) -> Result<CompletedConfig, ConfigError> {
        let generic_config = self.generic_config.complete()?.with_version(pager_version());
        Ok(CompletedConfig {
            generic_config,
            shared_informer_factory: self.shared_informer_factory,
            registry: self.registry,
        })
    }

    /// Complete the generic configuration, leaving version info as supplied.
    pub fn skip_complete(self) -> Result<CompletedConfig, ConfigError> {
        Ok(CompletedConfig {
            generic_config: self.generic_config.complete()?,
            shared_informer_factory: self.shared_informer_factory,
            registry: self.registry,
        })
    }
}

/// A configuration ready to build a server.
pub struct CompletedConfig {
    generic_config: CompletedGenericConfig,
    shared_informer_factory: Option<SharedInformerFactory>,
    registry: ApiRegistry,
}

impl CompletedConfig {
    pub fn generic_config(&self) -> &CompletedGenericConfig {
        &self.generic_config
    }

    pub fn shared_informer_factory(&self) -> Option<&SharedInformerFactory> {
        self.shared_informer_factory.as_ref()
    }

    pub fn registry(&self) -> &ApiRegistry {
        &self.registry
    }

    /// Assemble the server.
    ///
    /// Storage is constructed once and the same primary and status storage
    /// objects are installed under every enabled version. Any failure is
    /// returned before the group is installed.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(self) -> Result<PagerServer, PagerServerError> {
        let mut generic = self
            .generic_config
            .new(SERVER_NAME, EmptyDelegate)
            .map_err(PagerServerError::GenericServer)?;

        let registry = &self.registry;
        let mut info = ApiGroupInfo::new_default(
            GROUP_NAME,
            Arc::clone(&registry.manager),
            Arc::clone(&registry.scheme),
            registry.parameter_codec,
            registry.codecs.clone(),
        )
        .map_err(PagerServerError::GroupInfo)?;

        let preferred = v1alpha1::scheme_group_version();
        if registry.manager.is_enabled_version(&preferred) {
            info.set_preferred_version(&preferred)
                .map_err(PagerServerError::GroupInfo)?;
        }

        let (alerts, status) = alert::new_rest(
            Arc::clone(&registry.scheme),
            self.generic_config.rest_options_getter().as_ref(),
        )?;
        let alerts: Arc<dyn Storage> = alerts;
        let status: Arc<dyn Storage> = status;

        for gv in [v1alpha1::scheme_group_version(), v1beta1::scheme_group_version()] {
            if !registry.manager.is_enabled_version(&gv) {
                debug!(group_version = %gv, "version disabled, not served");
                continue;
            }
            let mut table = ResourceStorageMap::new();
            table.insert(ALERTS.to_string(), Arc::clone(&alerts));
            table.insert(format!("{ALERTS}/status"), Arc::clone(&status));
            info.versioned_resources_storage_map.insert(gv.version, table);
        }

        generic
            .install_api_group(&info)
            .map_err(|source| PagerServerError::InstallGroup {
                group: GROUP_NAME.to_string(),
                source,
            })?;

        info!(
            group = GROUP_NAME,
            preferred = %info.group_meta.group_version,
            "pager server assembled"
        );
        Ok(PagerServer {
            generic_api_server: generic,
        })
    }
}

// ── Server ─────────────────────────────────────────────────────────

pub struct PagerServer {
    generic_api_server: GenericApiServer,
}

impl PagerServer {
    pub fn generic_api_server(&self) -> &GenericApiServer {
        &self.generic_api_server
    }

    pub fn router(&self) -> Router {
        self.generic_api_server.router()
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.generic_api_server.run(shutdown).await
    }
}
