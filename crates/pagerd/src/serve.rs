//! `pagerd serve`: settings resolution and the staged server startup.
//!
//! Settings come from an optional TOML file; explicit flags win.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Args;
use pager_api::{ApiRegistry, Config, PagerServer, RecommendedConfig, SharedInformerFactory};
use pager_core::ServerConfigFile;
use pager_state::{RestOptionsGetter, StorageBackend, StorageFactory};
use tracing::{info, warn};

pub const DEFAULT_DATA_DIR: &str = "/var/lib/pager";

#[derive(Debug, Default, Args)]
pub struct ServeArgs {
    /// TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long)]
    pub bind: Option<String>,

    /// Directory for the redb database files.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Keep objects in memory only.
    #[arg(long, conflicts_with = "data_dir")]
    pub in_memory: bool,

    /// `group/version` entries to serve. Empty serves everything.
    #[arg(long, value_delimiter = ',')]
    pub enabled_versions: Vec<String>,

    /// Complete the configuration without stamping the version.
    #[arg(long)]
    pub skip_complete: bool,
}

/// Fully resolved settings for one server run.
#[derive(Debug, Clone, PartialEq)]
pub struct ServeSettings {
    pub bind_address: Option<String>,
    pub external_address: Option<String>,
    pub request_timeout: Option<Duration>,
    pub max_request_body_bytes: Option<usize>,
    pub backend: StorageBackend,
    pub resource_prefix: Option<String>,
    pub enabled_versions: String,
    pub resync_period: Option<Duration>,
    pub skip_complete: bool,
}

impl ServeSettings {
    /// Read the configuration file named by `args`, if any, and merge.
    pub fn load(args: &ServeArgs) -> anyhow::Result<Self> {
        let file = match &args.config {
            Some(path) => ServerConfigFile::from_file(path)
                .with_context(|| format!("reading config file {}", path.display()))?,
            None => ServerConfigFile::default(),
        };
        Self::resolve(file, args)
    }

    pub fn resolve(file: ServerConfigFile, args: &ServeArgs) -> anyhow::Result<Self> {
        let backend = if args.in_memory {
            StorageBackend::InMemory
        } else {
            match file.storage.backend.as_deref() {
                Some("memory") => StorageBackend::InMemory,
                Some("redb") | None => StorageBackend::Redb {
                    data_dir: args
                        .data_dir
                        .clone()
                        .or(file.storage.data_dir.clone())
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
                },
                Some(other) => bail!("unknown storage backend {other:?}"),
            }
        };

        let enabled_versions = if args.enabled_versions.is_empty() {
            file.enabled_versions_list()
        } else {
            args.enabled_versions.join(",")
        };

        Ok(Self {
            bind_address: args.bind.clone().or(file.server.bind_address),
            external_address: file.server.external_address,
            request_timeout: file.server.request_timeout_secs.map(Duration::from_secs),
            max_request_body_bytes: file.server.max_request_body_bytes,
            backend,
            resource_prefix: file.storage.resource_prefix,
            enabled_versions,
            resync_period: file
                .informers
                .map(|i| Duration::from_secs(i.resync_period_secs)),
            skip_complete: args.skip_complete,
        })
    }

    fn storage_factory(&self) -> StorageFactory {
        let factory = StorageFactory::new(self.backend.clone());
        match &self.resource_prefix {
            Some(prefix) => factory.with_prefix(prefix.clone()),
            None => factory,
        }
    }

    fn generic_config(&self) -> RecommendedConfig {
        let getter: Arc<dyn RestOptionsGetter> = Arc::new(self.storage_factory());
        let mut generic = RecommendedConfig::new(getter);
        if let Some(bind) = &self.bind_address {
            generic.bind_address = bind.clone();
        }
        generic.external_address = self.external_address.clone();
        generic.request_timeout = self.request_timeout;
        generic.max_request_body_bytes = self.max_request_body_bytes;
        generic
    }
}

/// Build the server from an initialized registry.
pub fn build_server(registry: &ApiRegistry, settings: &ServeSettings) -> anyhow::Result<PagerServer> {
    let mut config = Config::new(registry, settings.generic_config());
    if let Some(period) = settings.resync_period {
        config = config.with_shared_informer_factory(SharedInformerFactory::new(period));
    }

    let completed = if settings.skip_complete {
        config.skip_complete()
    } else {
        config.complete()
    }
    .context("completing server configuration")?;

    completed.new().context("assembling pager server")
}

pub async fn run(settings: ServeSettings) -> anyhow::Result<()> {
    info!(backend = ?settings.backend, "pager API server starting");

    let registry = ApiRegistry::initialize(&settings.enabled_versions)
        .context("initializing api registry")?;
    let server = build_server(&registry, &settings)?;

    server
        .run(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutdown signal received"),
                Err(err) => {
                    warn!(error = %err, "cannot listen for Ctrl-C, serving until killed");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await?;

    info!("pager API server stopped");
    Ok(())
}
