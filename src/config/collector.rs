//! Scroll collection defaults shared by every site.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::{ScrollBudget, ScrollStrategy};
use crate::extract::SiteProfile;

/// Collector pacing and retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Record cap per URL for every site (site overrides still win).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_records: Option<usize>,

    /// Scroll attempts per URL.
    #[serde(default = "default_max_scroll_attempts")]
    pub max_scroll_attempts: u32,

    /// Wait after each scroll, in milliseconds.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Consecutive unchanged height readings that end the loop.
    #[serde(default = "default_stable_threshold")]
    pub stable_threshold: u32,

    /// How long to wait for the first card before reporting no results.
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,

    /// Extra attempts for a URL whose browser session died.
    #[serde(default = "default_url_retries")]
    pub url_retries: u32,

    /// Scroll strategy for every site (site overrides still win).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<ScrollStrategy>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_records: None,
            max_scroll_attempts: default_max_scroll_attempts(),
            settle_delay_ms: default_settle_delay_ms(),
            stable_threshold: default_stable_threshold(),
            wait_timeout_secs: default_wait_timeout_secs(),
            url_retries: default_url_retries(),
            scroll: None,
        }
    }
}

impl CollectorConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    /// Scroll budget for a resolved site profile.
    pub fn budget_for(&self, profile: &SiteProfile) -> ScrollBudget {
        ScrollBudget::new(profile.max_records)
            .with_max_scroll_attempts(self.max_scroll_attempts)
            .with_settle_delay(Duration::from_millis(self.settle_delay_ms))
            .with_stable_threshold(self.stable_threshold)
            .with_strategy(profile.scroll)
    }
}

fn default_max_scroll_attempts() -> u32 {
    ScrollBudget::DEFAULT_MAX_SCROLL_ATTEMPTS
}

fn default_settle_delay_ms() -> u64 {
    ScrollBudget::DEFAULT_SETTLE_DELAY.as_millis() as u64
}

fn default_stable_threshold() -> u32 {
    ScrollBudget::DEFAULT_STABLE_THRESHOLD
}

fn default_wait_timeout_secs() -> u64 {
    15
}

fn default_url_retries() -> u32 {
    1
}
