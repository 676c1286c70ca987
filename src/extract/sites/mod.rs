//! Per-site profiles and extractors.
//!
//! Selectors and URL templates here are the shipped defaults for each
//! storefront's current markup. They go stale as the sites redeploy, so
//! every profile can be patched from the `sites` section of the config.

mod bigbasket;
mod blinkit;
mod swiggy;
mod zepto;

pub use bigbasket::BigBasketExtractor;
pub use blinkit::BlinkitExtractor;
pub use swiggy::SwiggyExtractor;
pub use zepto::ZeptoExtractor;

use std::fmt;

use serde::{Deserialize, Serialize};

use super::FieldExtractor;
use crate::collector::{KeySource, ScrollStrategy};
use crate::config::SiteOverrides;
use crate::targets::Target;

/// Supported storefronts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SiteId {
    /// BigBasket category listings
    Bigbasket,
    /// Blinkit search results
    Blinkit,
    /// Zepto search results
    Zepto,
    /// Swiggy Instamart search results
    Swiggy,
}

impl SiteId {
    pub const ALL: [SiteId; 4] = [Self::Bigbasket, Self::Blinkit, Self::Zepto, Self::Swiggy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bigbasket => "bigbasket",
            Self::Blinkit => "blinkit",
            Self::Zepto => "zepto",
            Self::Swiggy => "swiggy",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Bigbasket => "BigBasket",
            Self::Blinkit => "Blinkit",
            Self::Zepto => "Zepto",
            Self::Swiggy => "Swiggy Instamart",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == s)
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the runner needs to scrape one storefront.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteProfile {
    pub id: SiteId,
    /// Matches one product card.
    pub card_selector: String,
    /// Presence wait target before collection starts.
    pub ready_selector: String,
    /// Search URL with a `{query}` placeholder.
    pub search_url: String,
    pub max_records: usize,
    pub scroll: ScrollStrategy,
    pub key_source: KeySource,
}

impl SiteProfile {
    /// Shipped defaults for `id`.
    pub fn defaults(id: SiteId) -> Self {
        match id {
            SiteId::Bigbasket => Self {
                id,
                card_selector: ".SKUDeck___StyledDiv-sc-1e5d9gk-0".to_string(),
                ready_selector: ".SKUDeck___StyledDiv-sc-1e5d9gk-0".to_string(),
                search_url: "https://www.bigbasket.com/ps/?q={query}".to_string(),
                max_records: 100,
                scroll: ScrollStrategy::LastCardIntoView,
                key_source: KeySource::Link,
            },
            SiteId::Blinkit => Self {
                id,
                card_selector: "a[data-test-id='plp-product']".to_string(),
                ready_selector: ".Product__UpdatedDetailContainer-sc-11dk8zk-5".to_string(),
                search_url: "https://blinkit.com/s/?q={query}".to_string(),
                max_records: 100,
                scroll: ScrollStrategy::Step(600),
                key_source: KeySource::Link,
            },
            SiteId::Zepto => Self {
                id,
                card_selector: "[data-testid='product-card']".to_string(),
                ready_selector: "[data-testid='product-card']".to_string(),
                search_url: "https://www.zeptonow.com/search?query={query}".to_string(),
                max_records: 60,
                scroll: ScrollStrategy::LastCardIntoView,
                key_source: KeySource::Link,
            },
            SiteId::Swiggy => Self {
                id,
                card_selector: "div[data-testid=\"default_container_ux4\"]".to_string(),
                ready_selector: "div[data-testid=\"default_container_ux4\"]".to_string(),
                search_url:
                    "https://www.swiggy.com/instamart/search?location=chennai&custom_back=true&query={query}"
                        .to_string(),
                max_records: 100,
                scroll: ScrollStrategy::Step(600),
                key_source: KeySource::Image,
            },
        }
    }

    /// Apply config overrides on top of this profile.
    pub fn with_overrides(mut self, overrides: &SiteOverrides) -> Self {
        if let Some(ref s) = overrides.card_selector {
            self.card_selector = s.clone();
        }
        if let Some(ref s) = overrides.ready_selector {
            self.ready_selector = s.clone();
        }
        if let Some(ref s) = overrides.search_url {
            self.search_url = s.clone();
        }
        if let Some(n) = overrides.max_records {
            self.max_records = n;
        }
        if let Some(scroll) = overrides.scroll {
            self.scroll = scroll;
        }
        if let Some(key) = overrides.key_source {
            self.key_source = key;
        }
        self
    }

    /// Search URL for a free-text query.
    pub fn search_url_for(&self, query: &str) -> String {
        self.search_url
            .replace("{query}", &urlencoding::encode(query.trim()))
    }

    /// Page to open for `target`: its URL when it has one, else a search.
    pub fn target_url(&self, target: &Target) -> String {
        match target.url() {
            Some(url) => url.to_string(),
            None => self.search_url_for(target.query()),
        }
    }

    /// Category stamped on records collected for `target`.
    pub fn category_for(&self, target: &Target) -> String {
        if self.id == SiteId::Bigbasket {
            if let Some(category) = target.url().and_then(bigbasket_category) {
                return category;
            }
        }
        if let Some(name) = target.name() {
            return name.to_string();
        }
        match target.url() {
            Some(_) => "Unknown".to_string(),
            None => target.query().to_string(),
        }
    }
}

/// `/cl/<category>/` path segment of a BigBasket listing URL.
fn bigbasket_category(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let mut segments = parsed.path_segments()?;
    segments.find(|s| *s == "cl")?;
    segments
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Extractor for `profile`'s site.
pub fn extractor_for(profile: &SiteProfile) -> Box<dyn FieldExtractor> {
    match profile.id {
        SiteId::Bigbasket => Box::new(BigBasketExtractor),
        SiteId::Blinkit => Box::new(BlinkitExtractor),
        SiteId::Zepto => Box::new(ZeptoExtractor::new(profile.search_url.clone())),
        SiteId::Swiggy => Box::new(SwiggyExtractor),
    }
}
