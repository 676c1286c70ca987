//! Incremental infinite-scroll collection.
//!
//! [`ScrollCollector`] repeatedly enumerates the cards on a page, extracts
//! the ones it has not processed yet, and scrolls for more until the record
//! budget is met, the scroll budget runs out, or the page height stops
//! changing.

mod budget;
mod state;

pub use budget::{ScrollBudget, ScrollStrategy};
pub use state::{CardKey, CollectionState, KeySource};

use std::fmt;

use thiserror::Error;
use tracing::{debug, trace};

use crate::driver::{DriverError, PageDriver};
use crate::extract::{FieldExtractor, RawProductRecord};

/// Why a collection loop ended. All three are normal completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    BudgetMet,
    AttemptsExhausted,
    HeightStable,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BudgetMet => write!(f, "record budget met"),
            Self::AttemptsExhausted => write!(f, "scroll attempts exhausted"),
            Self::HeightStable => write!(f, "page height stable"),
        }
    }
}

/// Result of one collection loop.
#[derive(Debug)]
pub struct CollectOutcome {
    pub records: Vec<RawProductRecord>,
    pub stop: StopReason,
    /// Scrolls performed.
    pub attempts: u32,
    /// Extraction failures, counted once per failed attempt.
    pub skipped_extractions: usize,
    /// Cards present on the last enumeration.
    pub cards_seen: usize,
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("invalid scroll budget: {0}")]
    InvalidBudget(String),
}

/// Drives one page through the scroll loop.
#[derive(Debug, Clone)]
pub struct ScrollCollector {
    budget: ScrollBudget,
    card_selector: String,
    key_source: KeySource,
}

impl ScrollCollector {
    pub fn new(budget: ScrollBudget, card_selector: impl Into<String>) -> Self {
        Self {
            budget,
            card_selector: card_selector.into(),
            key_source: KeySource::default(),
        }
    }

    pub fn with_key_source(mut self, key_source: KeySource) -> Self {
        self.key_source = key_source;
        self
    }

    pub fn budget(&self) -> &ScrollBudget {
        &self.budget
    }

    /// Collect up to `max_records` records from the page the driver is on.
    ///
    /// The caller must already have navigated and confirmed that at least one
    /// card is present. Extraction failures are skipped and retried on later
    /// passes; any driver failure aborts the loop.
    pub async fn collect<D, E>(
        &self,
        driver: &mut D,
        extractor: &E,
    ) -> Result<CollectOutcome, CollectError>
    where
        D: PageDriver + ?Sized,
        E: FieldExtractor + ?Sized,
    {
        self.budget.validate().map_err(CollectError::InvalidBudget)?;

        let budget = &self.budget;
        let mut state = CollectionState::new();

        let stop = loop {
            if state.records.len() >= budget.max_records {
                break StopReason::BudgetMet;
            }
            if state.attempts >= budget.max_scroll_attempts {
                break StopReason::AttemptsExhausted;
            }

            let cards = driver.find_all(&self.card_selector).await?;
            state.seen_card_count = cards.len();
            trace!(
                cards = cards.len(),
                attempt = state.attempts,
                "Enumerated cards"
            );

            for card in cards {
                let key = CardKey::of(&card, self.key_source);
                if state.is_processed(&key) {
                    continue;
                }
                match extractor.extract(&card) {
                    Ok(record) => {
                        state.accept(key, record);
                        if state.records.len() >= budget.max_records {
                            break;
                        }
                    }
                    Err(e) => {
                        state.skipped_extractions += 1;
                        debug!(position = card.position(), "Skipping card: {}", e);
                    }
                }
            }

            if state.records.len() >= budget.max_records {
                break StopReason::BudgetMet;
            }

            self.scroll(driver).await?;
            if !budget.settle_delay.is_zero() {
                tokio::time::sleep(budget.settle_delay).await;
            }

            let height = driver.current_content_height().await?;
            state.attempts += 1;
            if state.observe_height(height)
                && state.consecutive_stable_scrolls >= budget.stable_threshold
            {
                break StopReason::HeightStable;
            }
        };

        debug!(
            records = state.records.len(),
            attempts = state.attempts,
            skipped = state.skipped_extractions,
            "Collection stopped: {}",
            stop
        );

        Ok(CollectOutcome {
            records: state.records,
            stop,
            attempts: state.attempts,
            skipped_extractions: state.skipped_extractions,
            cards_seen: state.seen_card_count,
        })
    }

    async fn scroll<D: PageDriver + ?Sized>(&self, driver: &mut D) -> Result<(), DriverError> {
        match self.budget.strategy {
            ScrollStrategy::ToBottom => driver.scroll_to_bottom().await,
            ScrollStrategy::LastCardIntoView => {
                driver.scroll_last_into_view(&self.card_selector).await
            }
            ScrollStrategy::Step(pixels) => driver.scroll_by(pixels).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::scripted::{ScriptedCard, ScriptedDriver, ScriptedScroll, ScriptedStep};
    use crate::driver::CardHandle;
    use crate::extract::{ExtractError, FieldError};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Uses the card HTML as the product name.
    struct NameExtractor;

    impl FieldExtractor for NameExtractor {
        fn extract(&self, card: &CardHandle) -> Result<RawProductRecord, ExtractError> {
            Ok(RawProductRecord::new().with("name", card.html()))
        }
    }

    /// Fails the first attempt for every card whose HTML starts with `flaky`.
    #[derive(Default)]
    struct FlakyExtractor {
        failed: Mutex<HashSet<String>>,
    }

    impl FieldExtractor for FlakyExtractor {
        fn extract(&self, card: &CardHandle) -> Result<RawProductRecord, ExtractError> {
            let html = card.html().to_string();
            if html.starts_with("flaky") && self.failed.lock().unwrap().insert(html.clone()) {
                return Err(ExtractError::Required {
                    field: "name",
                    source: FieldError::Empty("h3".into()),
                });
            }
            Ok(RawProductRecord::new().with("name", html))
        }
    }

    fn budget(max_records: usize) -> ScrollBudget {
        ScrollBudget::new(max_records).with_settle_delay(Duration::ZERO)
    }

    fn card(n: usize) -> ScriptedCard {
        ScriptedCard::linked(format!("/p/{}", n), format!("product-{}", n))
    }

    /// Step `i` shows cards `0..3*(i+1)` at height `1000*(i+1)`.
    fn growing_feed(steps: usize) -> Vec<ScriptedStep> {
        (0..steps)
            .map(|i| {
                ScriptedStep::new(
                    1000 * (i as u64 + 1),
                    (0..3 * (i + 1)).map(card).collect(),
                )
            })
            .collect()
    }

    fn names(outcome: &CollectOutcome) -> Vec<String> {
        outcome
            .records
            .iter()
            .filter_map(|r| r.text("name").map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn three_cards_per_step_meets_budget_of_seven() {
        let mut driver = ScriptedDriver::new(growing_feed(5));
        let collector = ScrollCollector::new(budget(7), ".card");
        let outcome = collector.collect(&mut driver, &NameExtractor).await.unwrap();

        assert_eq!(outcome.stop, StopReason::BudgetMet);
        assert_eq!(outcome.records.len(), 7);
        assert_eq!(
            names(&outcome),
            (0..7).map(|n| format!("product-{}", n)).collect::<Vec<_>>()
        );
        assert_eq!(driver.scrolls(), 2);
    }

    #[tokio::test]
    async fn budget_met_in_first_pass_never_scrolls() {
        let mut driver = ScriptedDriver::new(growing_feed(3));
        let collector = ScrollCollector::new(budget(2), ".card");
        let outcome = collector.collect(&mut driver, &NameExtractor).await.unwrap();

        assert_eq!(outcome.stop, StopReason::BudgetMet);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.attempts, 0);
        assert_eq!(driver.scrolls(), 0);
        assert_eq!(driver.height_reads(), 0);
    }

    #[tokio::test]
    async fn stable_height_ends_within_two_attempts() {
        let feed = vec![ScriptedStep::new(800, vec![card(0), card(1)])];
        let mut driver = ScriptedDriver::new(feed);
        let collector = ScrollCollector::new(budget(50), ".card");
        let outcome = collector.collect(&mut driver, &NameExtractor).await.unwrap();

        assert_eq!(outcome.stop, StopReason::HeightStable);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.records.len(), 2);
    }

    #[tokio::test]
    async fn attempts_never_exceed_limit() {
        let mut driver = ScriptedDriver::new(growing_feed(40));
        let collector =
            ScrollCollector::new(budget(1000).with_max_scroll_attempts(4), ".card");
        let outcome = collector.collect(&mut driver, &NameExtractor).await.unwrap();

        assert_eq!(outcome.stop, StopReason::AttemptsExhausted);
        assert_eq!(outcome.attempts, 4);
        assert_eq!(driver.scrolls(), 4);
        // Fourth enumeration happened before the fourth scroll.
        assert_eq!(outcome.records.len(), 12);
    }

    #[tokio::test]
    async fn failed_extraction_is_retried_on_next_pass() {
        let feed = vec![
            ScriptedStep::new(
                100,
                vec![
                    ScriptedCard::linked("/a", "a"),
                    ScriptedCard::linked("/b", "flaky-b"),
                ],
            ),
            ScriptedStep::new(
                200,
                vec![
                    ScriptedCard::linked("/a", "a"),
                    ScriptedCard::linked("/b", "flaky-b"),
                    ScriptedCard::linked("/c", "c"),
                ],
            ),
        ];
        let mut driver = ScriptedDriver::new(feed);
        let collector = ScrollCollector::new(budget(10), ".card");
        let outcome = collector
            .collect(&mut driver, &FlakyExtractor::default())
            .await
            .unwrap();

        assert_eq!(names(&outcome), vec!["a", "flaky-b", "c"]);
        assert_eq!(outcome.skipped_extractions, 1);
    }

    #[tokio::test]
    async fn unlinked_cards_collapse_to_one_record() {
        let feed = vec![ScriptedStep::new(
            100,
            vec![
                ScriptedCard::unlinked("x"),
                ScriptedCard::unlinked("y"),
                ScriptedCard::linked("/z", "z"),
            ],
        )];
        let mut driver = ScriptedDriver::new(feed);
        let collector = ScrollCollector::new(budget(10), ".card");
        let outcome = collector.collect(&mut driver, &NameExtractor).await.unwrap();
        assert_eq!(names(&outcome), vec!["x", "z"]);
    }

    #[tokio::test]
    async fn image_keys_separate_unlinked_cards() {
        let feed = vec![ScriptedStep::new(
            100,
            vec![
                ScriptedCard::unlinked("x").with_image("/x.png"),
                ScriptedCard::unlinked("y").with_image("/y.png"),
            ],
        )];
        let mut driver = ScriptedDriver::new(feed);
        let collector =
            ScrollCollector::new(budget(10), ".card").with_key_source(KeySource::Image);
        let outcome = collector.collect(&mut driver, &NameExtractor).await.unwrap();
        assert_eq!(names(&outcome), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn driver_failure_propagates() {
        let mut driver = ScriptedDriver::new(growing_feed(5)).failing_after_scrolls(1);
        let collector = ScrollCollector::new(budget(100), ".card");
        let err = collector
            .collect(&mut driver, &NameExtractor)
            .await
            .unwrap_err();
        assert!(matches!(err, CollectError::Driver(DriverError::SessionLost(_))));
    }

    #[tokio::test]
    async fn zero_budget_is_rejected() {
        let mut driver = ScriptedDriver::new(growing_feed(1));
        let collector = ScrollCollector::new(budget(0), ".card");
        let err = collector
            .collect(&mut driver, &NameExtractor)
            .await
            .unwrap_err();
        assert!(matches!(err, CollectError::InvalidBudget(_)));
    }

    #[tokio::test]
    async fn higher_threshold_needs_more_stable_reads() {
        let feed = vec![ScriptedStep::new(800, vec![card(0)])];
        let mut driver = ScriptedDriver::new(feed);
        let collector =
            ScrollCollector::new(budget(50).with_stable_threshold(3), ".card");
        let outcome = collector.collect(&mut driver, &NameExtractor).await.unwrap();
        assert_eq!(outcome.stop, StopReason::HeightStable);
        assert_eq!(outcome.attempts, 4);
    }

    #[tokio::test]
    async fn strategy_selects_the_scroll_call() {
        let cases = [
            (ScrollStrategy::ToBottom, ScriptedScroll::ToBottom),
            (ScrollStrategy::Step(600), ScriptedScroll::By(600)),
            (
                ScrollStrategy::LastCardIntoView,
                ScriptedScroll::LastIntoView(".card".to_string()),
            ),
        ];
        for (strategy, expected) in cases {
            let mut driver = ScriptedDriver::new(growing_feed(10));
            let collector = ScrollCollector::new(
                budget(1000)
                    .with_max_scroll_attempts(2)
                    .with_strategy(strategy),
                ".card",
            );
            collector.collect(&mut driver, &NameExtractor).await.unwrap();
            assert_eq!(driver.scroll_log(), &[expected.clone(), expected][..]);
        }
    }
}
