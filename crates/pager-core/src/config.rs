//! pager.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub informers: Option<InformersSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    pub bind_address: Option<String>,
    pub external_address: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub max_request_body_bytes: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSection {
    /// "redb" or "memory".
    pub backend: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub resource_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiSection {
    /// `group/version` entries to serve. Empty serves everything.
    #[serde(default)]
    pub enabled_versions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InformersSection {
    pub resync_period_secs: u64,
}

impl ServerConfigFile {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The enabled versions in the comma-separated form the registration
    /// manager accepts.
    pub fn enabled_versions_list(&self) -> String {
        self.api.enabled_versions.join(",")
    }
}
