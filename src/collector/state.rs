//! Per-URL collection state and card identity.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::driver::CardHandle;
use crate::extract::RawProductRecord;

/// Which card attribute identifies a product across scroll steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// The card's resolved hyperlink.
    #[default]
    Link,
    /// The card's first image source, for feeds whose cards carry no link.
    Image,
}

/// Identity of a card for deduplication.
///
/// Cards lacking the keyed attribute all share [`CardKey::Unlinked`], so at
/// most one of them is ever collected per URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CardKey {
    Link(String),
    Image(String),
    Unlinked,
}

impl CardKey {
    pub fn of(card: &CardHandle, source: KeySource) -> Self {
        match source {
            KeySource::Link => card
                .link()
                .map(|l| Self::Link(l.to_string()))
                .unwrap_or(Self::Unlinked),
            KeySource::Image => card
                .image()
                .map(|i| Self::Image(i.to_string()))
                .unwrap_or(Self::Unlinked),
        }
    }
}

/// Mutable state of one collection loop.
#[derive(Debug, Default)]
pub struct CollectionState {
    pub seen_card_count: usize,
    pub records: Vec<RawProductRecord>,
    pub last_page_height: u64,
    pub consecutive_stable_scrolls: u32,
    pub attempts: u32,
    pub skipped_extractions: usize,
    processed: HashSet<CardKey>,
}

impl CollectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processed(&self, key: &CardKey) -> bool {
        self.processed.contains(key)
    }

    /// Append a record and mark its card processed.
    pub fn accept(&mut self, key: CardKey, record: RawProductRecord) {
        self.processed.insert(key);
        self.records.push(record);
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Record a height reading; returns true when the height did not change.
    pub fn observe_height(&mut self, height: u64) -> bool {
        if height == self.last_page_height {
            self.consecutive_stable_scrolls += 1;
            true
        } else {
            self.consecutive_stable_scrolls = 0;
            self.last_page_height = height;
            false
        }
    }
}
