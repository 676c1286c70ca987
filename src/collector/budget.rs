//! Bounds and pacing for one collection run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the collector asks the page for more content between passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollStrategy {
    /// Jump to the bottom of the document.
    #[default]
    ToBottom,
    /// Scroll the last matching card into view.
    LastCardIntoView,
    /// Scroll down by a fixed number of pixels.
    Step(i64),
}

/// Limits and pacing for one URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollBudget {
    pub max_records: usize,
    pub max_scroll_attempts: u32,
    pub settle_delay: Duration,
    pub stable_threshold: u32,
    pub strategy: ScrollStrategy,
}

impl ScrollBudget {
    pub const DEFAULT_MAX_SCROLL_ATTEMPTS: u32 = 30;
    pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);
    pub const DEFAULT_STABLE_THRESHOLD: u32 = 1;

    /// Budget with default pacing and the given record cap.
    pub fn new(max_records: usize) -> Self {
        Self {
            max_records,
            max_scroll_attempts: Self::DEFAULT_MAX_SCROLL_ATTEMPTS,
            settle_delay: Self::DEFAULT_SETTLE_DELAY,
            stable_threshold: Self::DEFAULT_STABLE_THRESHOLD,
            strategy: ScrollStrategy::default(),
        }
    }

    pub fn with_max_scroll_attempts(mut self, attempts: u32) -> Self {
        self.max_scroll_attempts = attempts;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_stable_threshold(mut self, threshold: u32) -> Self {
        self.stable_threshold = threshold;
        self
    }

    pub fn with_strategy(mut self, strategy: ScrollStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Reject budgets the loop cannot honour.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_records == 0 {
            return Err("max_records must be greater than zero".to_string());
        }
        if self.max_scroll_attempts == 0 {
            return Err("max_scroll_attempts must be greater than zero".to_string());
        }
        if self.stable_threshold == 0 {
            return Err("stable_threshold must be greater than zero".to_string());
        }
        Ok(())
    }
}
