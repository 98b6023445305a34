//! Configuration file handling.
//!
//! This module handles loading, merging and validating configuration from
//! `.dealboard.toml` files. The CRM credential is never read from the file;
//! it comes from the environment or the command line.

use crate::crm::FailurePolicy;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".dealboard.toml";

/// Largest page size the CRM collection endpoints accept.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream CRM settings.
    #[serde(default)]
    pub crm: CrmConfig,

    /// Aggregation rules.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Upstream CRM API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    /// API root URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Records requested per page.
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_limit: default_page_limit(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.hubapi.com".to_string()
}

fn default_page_limit() -> u32 {
    MAX_PAGE_LIMIT
}

fn default_timeout() -> u64 {
    30
}

/// Deal filtering and owner bucketing rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Deal stage code counted as closed-won.
    #[serde(default = "default_closed_won_stage")]
    pub closed_won_stage: String,

    /// What to keep when an owners page fails.
    #[serde(default = "default_owner_failure")]
    pub owner_fetch_failure: FailurePolicy,

    /// What to keep when a deals page fails.
    #[serde(default = "default_deal_failure")]
    pub deal_fetch_failure: FailurePolicy,

    /// Full owner display name -> short dashboard key.
    #[serde(default = "default_allowed_owners")]
    pub allowed_owners: BTreeMap<String, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            closed_won_stage: default_closed_won_stage(),
            owner_fetch_failure: default_owner_failure(),
            deal_fetch_failure: default_deal_failure(),
            allowed_owners: default_allowed_owners(),
        }
    }
}

fn default_closed_won_stage() -> String {
    "2055465198".to_string()
}

fn default_owner_failure() -> FailurePolicy {
    FailurePolicy::KeepPartial
}

fn default_deal_failure() -> FailurePolicy {
    FailurePolicy::Abort
}

fn default_allowed_owners() -> BTreeMap<String, String> {
    [
        ("سهيلة اشرف", "sohaila"),
        ("Noha Reda", "noha"),
        ("Bela saleh", "bela"),
        ("RADWA EL BIOMEY", "radwa"),
    ]
    .into_iter()
    .map(|(name, key)| (name.to_string(), key.to_string()))
    .collect()
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Answer 502 instead of an empty list when the deal fetch fails.
    #[serde(default)]
    pub surface_upstream_errors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            surface_upstream_errors: false,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, and only
    /// when they were actually provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref base_url) = args.base_url {
            self.crm.base_url = base_url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.crm.timeout_seconds = timeout;
        }
        if let Some(ref host) = args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if args.strict {
            self.server.surface_upstream_errors = true;
        }
    }

    /// Check values that would otherwise fail at request time.
    pub fn validate(&self) -> Result<()> {
        let base_url = &self.crm.base_url;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            bail!("crm.base_url must start with 'http://' or 'https://'");
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&self.crm.page_limit) {
            bail!("crm.page_limit must be between 1 and {}", MAX_PAGE_LIMIT);
        }
        if self.crm.timeout_seconds == 0 {
            bail!("crm.timeout_seconds must be at least 1");
        }
        if self.pipeline.closed_won_stage.trim().is_empty() {
            bail!("pipeline.closed_won_stage must not be empty");
        }
        if self.pipeline.allowed_owners.is_empty() {
            bail!("pipeline.allowed_owners must name at least one owner");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
