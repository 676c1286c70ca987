//! Browser engine configuration types.
//!
//! These types live here (always compiled) rather than behind
//! `#[cfg(feature = "browser")]` so that config parsing and serialization
//! work without the browser feature.

use serde::{Deserialize, Serialize};

/// Browser engine types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BrowserEngineType {
    /// chromiumoxide with stealth patches (default).
    #[default]
    Stealth,

    /// No stealth patches (for debugging).
    Standard,
}

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserEngineConfig {
    /// Browser engine type.
    #[serde(default)]
    pub engine: BrowserEngineType,

    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Navigation timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Skip image downloads. Image URLs are still read from the DOM.
    #[serde(default)]
    pub block_images: bool,

    /// User agent override.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    /// Can also be set via BROWSER_URL environment variable.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Multiple remote browser URLs. Workers are spread across them.
    #[serde(default, alias = "remote_urls")]
    pub urls: Vec<String>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            engine: BrowserEngineType::default(),
            headless: default_headless(),
            proxy: None,
            timeout: default_timeout(),
            block_images: false,
            user_agent: None,
            chrome_args: Vec::new(),
            remote_url: None,
            urls: Vec::new(),
        }
    }
}

impl BrowserEngineConfig {
    /// Apply environment variable overrides.
    ///
    /// - `BROWSER_URL` - Remote Chrome DevTools URL(s), comma-separated for multiple
    /// - `SOCKS_PROXY` - SOCKS proxy for browser traffic (e.g., "socks5://127.0.0.1:9050")
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("BROWSER_URL") {
            self.apply_browser_url(&val);
        }

        if self.proxy.is_none() {
            if let Some(proxy) = std::env::var("SOCKS_PROXY").ok().filter(|s| !s.is_empty()) {
                self.proxy = Some(proxy);
            }
        }

        self
    }

    fn apply_browser_url(&mut self, val: &str) {
        if val.is_empty() {
            return;
        }
        if val.contains(',') {
            self.urls = split_urls(val);
            self.remote_url = None;
        } else {
            self.remote_url = Some(val.to_string());
        }
    }

    /// Get all remote browser URLs.
    /// Returns an empty Vec when browsers should be launched locally.
    pub fn all_urls(&self) -> Vec<String> {
        if !self.urls.is_empty() {
            return self.urls.clone();
        }
        match self.remote_url {
            Some(ref url) if url.contains(',') => split_urls(url),
            Some(ref url) => vec![url.clone()],
            None => Vec::new(),
        }
    }

    /// Remote URL assigned to a worker, round-robin over the configured URLs.
    pub fn remote_for_worker(&self, worker: usize) -> Option<String> {
        let urls = self.all_urls();
        if urls.is_empty() {
            None
        } else {
            Some(urls[worker % urls.len()].clone())
        }
    }
}

fn split_urls(val: &str) -> Vec<String> {
    val.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn default_headless() -> bool {
    true
}

pub fn default_timeout() -> u64 {
    30
}
