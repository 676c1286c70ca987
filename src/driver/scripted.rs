//! In-memory page driver that replays scripted feeds.
//!
//! Each feed is a list of steps; a step is what the page renders between two
//! scrolls (the cards present and the document height). Scrolling advances to
//! the next step and stays on the last one once the script runs out. Used to
//! exercise the collector and runner without a browser.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{CardHandle, DriverError, DriverFactory, PageDriver, WaitOutcome};

/// A card as rendered at one step.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedCard {
    pub html: String,
    pub link: Option<String>,
    pub image: Option<String>,
}

impl ScriptedCard {
    pub fn linked(link: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            link: Some(link.into()),
            image: None,
        }
    }

    pub fn unlinked(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            link: None,
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// What the page shows between two scrolls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptedStep {
    pub cards: Vec<ScriptedCard>,
    pub height: u64,
}

impl ScriptedStep {
    pub fn new(height: u64, cards: Vec<ScriptedCard>) -> Self {
        Self { cards, height }
    }
}

/// A scroll request as the page received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedScroll {
    ToBottom,
    By(i64),
    LastIntoView(String),
}

/// Replays scripted feeds keyed by URL.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    default_feed: Option<Vec<ScriptedStep>>,
    feeds: HashMap<String, Vec<ScriptedStep>>,
    failing_urls: Vec<String>,
    fail_after_scrolls: Option<u32>,
    current: Vec<ScriptedStep>,
    cursor: usize,
    scrolls: u32,
    scroll_log: Vec<ScriptedScroll>,
    height_reads: u32,
    navigations: Vec<String>,
    closed: bool,
}

impl ScriptedDriver {
    /// A driver that renders `steps` for every URL, and before any navigation.
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            default_feed: Some(steps.clone()),
            current: steps,
            ..Default::default()
        }
    }

    /// A driver that only renders the feeds registered with [`Self::with_feed`].
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, url: impl Into<String>, steps: Vec<ScriptedStep>) -> Self {
        self.feeds.insert(url.into(), steps);
        self
    }

    /// Navigation to `url` fails as if the browser had crashed.
    pub fn failing_on(mut self, url: impl Into<String>) -> Self {
        self.failing_urls.push(url.into());
        self
    }

    /// Card enumeration fails once this many scrolls have been issued.
    pub fn failing_after_scrolls(mut self, scrolls: u32) -> Self {
        self.fail_after_scrolls = Some(scrolls);
        self
    }

    pub fn scrolls(&self) -> u32 {
        self.scrolls
    }

    /// Every scroll issued since construction, across navigations.
    pub fn scroll_log(&self) -> &[ScriptedScroll] {
        &self.scroll_log
    }

    pub fn height_reads(&self) -> u32 {
        self.height_reads
    }

    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn step(&self) -> Option<&ScriptedStep> {
        if self.current.is_empty() {
            None
        } else {
            self.current.get(self.cursor.min(self.current.len() - 1))
        }
    }

    fn advance(&mut self, scroll: ScriptedScroll) {
        self.scroll_log.push(scroll);
        self.scrolls += 1;
        if self.cursor + 1 < self.current.len() {
            self.cursor += 1;
        }
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.navigations.push(url.to_string());
        if self.failing_urls.iter().any(|u| u == url) {
            return Err(DriverError::SessionLost(format!("scripted crash on {}", url)));
        }
        self.current = self
            .feeds
            .get(url)
            .or(self.default_feed.as_ref())
            .cloned()
            .unwrap_or_default();
        self.cursor = 0;
        self.scrolls = 0;
        Ok(())
    }

    async fn wait_for_selector(
        &mut self,
        _selector: &str,
        _timeout: Duration,
    ) -> Result<WaitOutcome, DriverError> {
        match self.step() {
            Some(step) if !step.cards.is_empty() => Ok(WaitOutcome::Present),
            _ => Ok(WaitOutcome::TimedOut),
        }
    }

    async fn find_all(&mut self, _selector: &str) -> Result<Vec<CardHandle>, DriverError> {
        if let Some(limit) = self.fail_after_scrolls {
            if self.scrolls >= limit {
                return Err(DriverError::SessionLost("scripted crash".to_string()));
            }
        }
        Ok(self
            .step()
            .map(|step| {
                step.cards
                    .iter()
                    .enumerate()
                    .map(|(position, card)| {
                        CardHandle::new(
                            position,
                            card.html.clone(),
                            card.link.clone(),
                            card.image.clone(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError> {
        self.advance(ScriptedScroll::ToBottom);
        Ok(())
    }

    async fn scroll_by(&mut self, pixels: i64) -> Result<(), DriverError> {
        self.advance(ScriptedScroll::By(pixels));
        Ok(())
    }

    async fn scroll_last_into_view(&mut self, selector: &str) -> Result<(), DriverError> {
        self.advance(ScriptedScroll::LastIntoView(selector.to_string()));
        Ok(())
    }

    async fn current_content_height(&mut self) -> Result<u64, DriverError> {
        self.height_reads += 1;
        Ok(self.step().map(|s| s.height).unwrap_or(0))
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// Hands out clones of a template [`ScriptedDriver`].
#[derive(Debug, Clone)]
pub struct ScriptedFactory {
    template: ScriptedDriver,
    launches: Arc<AtomicUsize>,
    refuse_after: Option<usize>,
}

impl ScriptedFactory {
    pub fn new(template: ScriptedDriver) -> Self {
        Self {
            template,
            launches: Arc::new(AtomicUsize::new(0)),
            refuse_after: None,
        }
    }

    /// Launches beyond `count` fail.
    pub fn refusing_after(mut self, count: usize) -> Self {
        self.refuse_after = Some(count);
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DriverFactory for ScriptedFactory {
    type Driver = ScriptedDriver;

    async fn launch(&self, worker: usize) -> Result<ScriptedDriver, DriverError> {
        let launched = self.launches.fetch_add(1, Ordering::SeqCst);
        if self.refuse_after.is_some_and(|limit| launched >= limit) {
            return Err(DriverError::Launch(format!(
                "scripted launch refused for worker {}",
                worker
            )));
        }
        Ok(self.template.clone())
    }
}
