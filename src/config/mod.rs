//! Configuration management using the prefer crate for discovery.

pub mod browser;
mod collector;
mod loader;
mod settings;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::collector::{KeySource, ScrollStrategy};
use crate::extract::{SiteId, SiteProfile};

pub use browser::{BrowserEngineConfig, BrowserEngineType};
pub use collector::CollectorConfig;
pub use loader::{load_settings_with_options, LoadOptions};
pub use settings::{Settings, DEFAULT_WORKERS};

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "kirana.db";

/// Per-site replacements for the shipped selectors and limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_selector: Option<String>,
    /// Search URL template containing `{query}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_records: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<ScrollStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_source: Option<KeySource>,
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename, joined with data_dir when relative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Output directory for JSON artifacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// Browser workers per site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Store merged artifacts after each scrape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_results: Option<bool>,
    #[serde(default, skip_serializing_if = "CollectorConfig::is_default")]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sites: BTreeMap<SiteId, SiteOverrides>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers kirana config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("kirana").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("{}", e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            Err(_) => Self::default_with_env(),
        }
    }

    /// Default config with environment overrides applied.
    pub fn default_with_env() -> Self {
        let mut config = Self::default();
        config.browser = config.browser.with_env_overrides();
        config
    }

    /// Load configuration from a specific file path.
    /// JSON, TOML and YAML are chosen by file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;

        config.source_path = Some(path.to_path_buf());
        config.browser = config.browser.with_env_overrides();
        Ok(config)
    }

    fn parse(contents: &str, ext: &str) -> Result<Self, String> {
        match ext {
            "toml" => toml::from_str(contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e)),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// `~` is expanded; relative paths are joined onto `base_dir`.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.set_data_dir(self.resolve_path(data_dir, base_dir));
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref output_dir) = self.output_dir {
            settings.output_dir = self.resolve_path(output_dir, base_dir);
        }
        if let Some(workers) = self.workers {
            settings.workers = workers.max(1);
        }
        if let Some(store) = self.store_results {
            settings.store_results = store;
        }
    }

    /// Effective profile for a site: shipped defaults, then the collector
    /// section, then the site's own overrides.
    pub fn site_profile(&self, id: SiteId) -> SiteProfile {
        let mut profile = SiteProfile::defaults(id);
        if let Some(max) = self.collector.max_records {
            profile.max_records = max;
        }
        if let Some(scroll) = self.collector.scroll {
            profile.scroll = scroll;
        }
        match self.sites.get(&id) {
            Some(overrides) => profile.with_overrides(overrides),
            None => profile,
        }
    }
}
