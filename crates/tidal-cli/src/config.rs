use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tidal_sync::SyncConfig;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub sync: SyncConfig,
    /// Namespace the demo writes its posts into.
    pub default_namespace: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            default_namespace: "blog".into(),
        }
    }
}

impl CliConfig {
    /// Read a config file, or return the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}
