use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use anyhow::{Context, Result};
use shared::protocol::MATCH_ALL;
use shared::types::ServiceName;
use crate::scanner::filter::{ContentFilter, MatchScope, ServiceFilter};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub mdns: MdnsConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// Service types to query and accept; empty means any
    #[serde(default)]
    pub services: Vec<String>,
    /// Substring an attribute must contain, or "*" for everything. Defaults
    /// to "*"; deployments tracking one vendor's devices set it to a
    /// vendor key such as "victron".
    #[serde(default = "default_content_filter")]
    pub content_filter: String,
    #[serde(default)]
    pub content_scope: MatchScope,
    #[serde(default = "default_rescan_period")]
    pub rescan_period_secs: u64,
    /// How often silent devices are looked for
    #[serde(default = "default_sweep_period")]
    pub sweep_period_secs: u64,
    /// Silence after which a device is considered gone
    #[serde(default = "default_staleness")]
    pub staleness_secs: u64,
    #[serde(default = "default_autostart")]
    pub autostart: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MdnsConfig {
    /// Restrict the engine to one interface; all interfaces when unset
    pub interface: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_content_filter() -> String {
    MATCH_ALL.to_string()
}

fn default_rescan_period() -> u64 {
    4
}

fn default_sweep_period() -> u64 {
    1
}

fn default_staleness() -> u64 {
    10
}

fn default_autostart() -> bool {
    true
}

fn default_listen() -> String {
    "[::]:8054".to_string()
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            services: Vec::new(),
            content_filter: default_content_filter(),
            content_scope: MatchScope::default(),
            rescan_period_secs: default_rescan_period(),
            sweep_period_secs: default_sweep_period(),
            staleness_secs: default_staleness(),
            autostart: default_autostart(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl ScannerConfig {
    pub fn service_filter(&self) -> ServiceFilter {
        ServiceFilter::new(self.services.iter().map(|s| ServiceName::new(s.as_str())))
    }

    pub fn content_filter(&self) -> ContentFilter {
        ContentFilter::new(&self.content_filter, self.content_scope)
    }

    pub fn rescan_period(&self) -> Duration {
        Duration::from_secs(self.rescan_period_secs)
    }

    pub fn sweep_period(&self) -> Duration {
        Duration::from_secs(self.sweep_period_secs)
    }

    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }
}
