//! Page driver abstraction over one rendered browser tab.
//!
//! The scroll collector only ever talks to a [`PageDriver`]. The Chromium
//! implementation (behind the `browser` feature) speaks CDP through
//! chromiumoxide; [`scripted::ScriptedDriver`] replays a fixed feed in memory.

#[cfg(feature = "browser")]
mod chromium;
mod scripts;
pub mod scripted;
#[cfg(feature = "browser")]
mod stealth;

#[cfg(feature = "browser")]
pub use chromium::{ChromiumDriver, ChromiumFactory};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Fatal page driver failures.
///
/// Every variant means the session can no longer be trusted for the current
/// URL; callers restart the driver rather than retrying individual calls.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Browser launch failed: {0}")]
    Launch(String),
    #[error("Navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },
    #[error("Script evaluation failed: {0}")]
    Script(String),
    #[error("Browser session lost: {0}")]
    SessionLost(String),
    #[error("Browser support not compiled. Rebuild with: cargo build --features browser")]
    Unsupported,
}

/// Result of waiting for a selector to appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Present,
    TimedOut,
}

/// Snapshot of one rendered product card for the current scroll step.
///
/// Handles are produced fresh by every [`PageDriver::find_all`] call and are
/// deliberately not `Clone`: virtualized feeds recycle DOM nodes between
/// steps, so a handle must not outlive the pass that enumerated it.
#[derive(Debug)]
pub struct CardHandle {
    position: usize,
    html: String,
    link: Option<String>,
    image: Option<String>,
}

impl CardHandle {
    pub fn new(
        position: usize,
        html: impl Into<String>,
        link: Option<String>,
        image: Option<String>,
    ) -> Self {
        Self {
            position,
            html: html.into(),
            link: link.filter(|s| !s.is_empty()),
            image: image.filter(|s| !s.is_empty()),
        }
    }

    /// Position of the card within the enumeration that produced it.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Outer HTML of the card element.
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Resolved hyperlink target of the card (own href, descendant or ancestor anchor).
    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    /// Resolved source of the first image inside the card.
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }
}

/// One browser tab rendering a product feed.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate the tab to `url`.
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    /// Poll until `selector` matches at least one element or `timeout` elapses.
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome, DriverError>;

    /// Snapshot every element currently matching `selector`, in document order.
    async fn find_all(&mut self, selector: &str) -> Result<Vec<CardHandle>, DriverError>;

    /// Scroll the window to the bottom of the document.
    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError>;

    /// Scroll the window by a fixed number of pixels.
    async fn scroll_by(&mut self, pixels: i64) -> Result<(), DriverError> {
        let _ = pixels;
        self.scroll_to_bottom().await
    }

    /// Scroll the last element matching `selector` into view.
    async fn scroll_last_into_view(&mut self, selector: &str) -> Result<(), DriverError> {
        let _ = selector;
        self.scroll_to_bottom().await
    }

    /// Current scrollable height of the document.
    async fn current_content_height(&mut self) -> Result<u64, DriverError>;

    /// Release the underlying session.
    async fn close(&mut self) {}
}

/// Opens page driver sessions for workers.
///
/// Each worker owns the driver it was given; a worker whose driver failed
/// fatally asks for a new one before moving on to the next URL.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    type Driver: PageDriver + 'static;

    async fn launch(&self, worker: usize) -> Result<Self::Driver, DriverError>;
}
