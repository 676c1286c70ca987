//! Runs the scroll collector over target lists.
//!
//! A worker owns one page driver and walks its share of the targets one URL
//! at a time: navigate, wait for the first card, collect, hand the records
//! to the sink. A dead browser session costs the current URL a retry on a
//! fresh driver; every other failure is reported and the worker moves on.

mod batch;
pub mod schedule;

pub use batch::{partition, run_site, SiteReport};

use std::fmt;

use chrono::NaiveDate;
use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use crate::collector::{CollectError, ScrollCollector, StopReason};
use crate::config::CollectorConfig;
use crate::driver::{DriverFactory, PageDriver, WaitOutcome};
use crate::extract::{extractor_for, FieldExtractor, FieldValue, RawProductRecord, SiteProfile};
use crate::sink::{Destination, Sink};
use crate::targets::Target;

/// Everything a worker needs to know about the site it is scraping.
#[derive(Debug, Clone)]
pub struct SiteRun {
    pub profile: SiteProfile,
    pub collector: CollectorConfig,
    pub scraped_date: NaiveDate,
}

impl SiteRun {
    pub fn new(profile: SiteProfile, collector: CollectorConfig, scraped_date: NaiveDate) -> Self {
        Self {
            profile,
            collector,
            scraped_date,
        }
    }

    fn scroll_collector(&self) -> ScrollCollector {
        ScrollCollector::new(
            self.collector.budget_for(&self.profile),
            self.profile.card_selector.clone(),
        )
        .with_key_source(self.profile.key_source)
    }
}

/// What happened to one URL.
#[derive(Debug, Clone, PartialEq)]
pub enum UrlOutcome {
    /// The first card never appeared within the wait timeout.
    NoResults,
    Collected {
        count: usize,
        stop: StopReason,
    },
    Failed(String),
}

impl fmt::Display for UrlOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResults => write!(f, "no results"),
            Self::Collected { count, stop } => write!(f, "{} records ({})", count, stop),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UrlReport {
    pub target: Target,
    pub url: String,
    pub outcome: UrlOutcome,
    /// Browser sessions used, including restarts.
    pub attempts: u32,
}

#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    pub worker: usize,
    pub urls: Vec<UrlReport>,
    /// Sessions relaunched to retry a URL after the browser was lost.
    pub driver_restarts: u32,
}

impl WorkerReport {
    pub fn records(&self) -> usize {
        self.urls
            .iter()
            .map(|u| match u.outcome {
                UrlOutcome::Collected { count, .. } => count,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> usize {
        self.urls
            .iter()
            .filter(|u| matches!(u.outcome, UrlOutcome::Failed(_)))
            .count()
    }

    pub fn empty_urls(&self) -> usize {
        self.urls
            .iter()
            .filter(|u| u.outcome == UrlOutcome::NoResults)
            .count()
    }
}

enum Scraped {
    NoResults,
    Collected {
        records: Vec<RawProductRecord>,
        stop: StopReason,
    },
}

/// Navigate to `url`, wait for the first card and run the collector.
async fn scrape_url<D: PageDriver + ?Sized>(
    driver: &mut D,
    run: &SiteRun,
    collector: &ScrollCollector,
    extractor: &dyn FieldExtractor,
    url: &str,
) -> Result<Scraped, CollectError> {
    driver.navigate(url).await?;

    let wait = run.collector.wait_timeout();
    match driver
        .wait_for_selector(&run.profile.ready_selector, wait)
        .await?
    {
        WaitOutcome::TimedOut => return Ok(Scraped::NoResults),
        WaitOutcome::Present => {}
    }

    let outcome = collector.collect(driver, extractor).await?;
    if outcome.skipped_extractions > 0 {
        debug!(
            "{}: skipped {} card extractions",
            url, outcome.skipped_extractions
        );
    }

    let mut records = outcome.records;
    // Feeds without product links point back at the listing page.
    for record in &mut records {
        if record.get("product_url").map_or(true, FieldValue::is_null) {
            record.insert("product_url", url);
        }
    }

    Ok(Scraped::Collected {
        records,
        stop: outcome.stop,
    })
}

/// Scrape `targets` in order with one driver at a time.
pub async fn run_worker<F>(
    worker: usize,
    factory: &F,
    run: &SiteRun,
    targets: &[Target],
    sink: &dyn Sink,
    progress: &ProgressBar,
) -> WorkerReport
where
    F: DriverFactory + ?Sized,
{
    let site = run.profile.id;
    let collector = run.scroll_collector();
    let extractor = extractor_for(&run.profile);
    let retries = run.collector.url_retries;

    let mut report = WorkerReport {
        worker,
        ..Default::default()
    };
    let mut driver: Option<F::Driver> = None;

    for target in targets {
        let url = run.profile.target_url(target);
        let category = run.profile.category_for(target);
        progress.set_message(format!("{} {}", site, target.label()));
        info!("[{} #{}] Scraping: {}", site, worker, url);

        let mut attempts = 0;
        let outcome = loop {
            attempts += 1;

            if driver.is_none() {
                match factory.launch(worker).await {
                    Ok(d) => driver = Some(d),
                    Err(e) => {
                        warn!("[{} #{}] Browser launch failed: {}", site, worker, e);
                        break UrlOutcome::Failed(e.to_string());
                    }
                }
            }
            let Some(active) = driver.as_mut() else {
                break UrlOutcome::Failed("no browser session".to_string());
            };

            match scrape_url(active, run, &collector, extractor.as_ref(), &url).await {
                Ok(Scraped::NoResults) => {
                    info!("[{} #{}] No results found for {}", site, worker, target.label());
                    break UrlOutcome::NoResults;
                }
                Ok(Scraped::Collected { records, stop }) => {
                    let destination = Destination::new(
                        site.as_str(),
                        category.clone(),
                        run.scraped_date,
                    );
                    break match sink.write(&records, &destination).await {
                        Ok(count) => UrlOutcome::Collected { count, stop },
                        Err(e) => {
                            warn!("[{} #{}] Failed to write records: {}", site, worker, e);
                            UrlOutcome::Failed(e.to_string())
                        }
                    };
                }
                Err(CollectError::Driver(e)) => {
                    warn!("[{} #{}] Browser error on {}: {}", site, worker, url, e);
                    if let Some(mut dead) = driver.take() {
                        dead.close().await;
                    }
                    if attempts > retries {
                        break UrlOutcome::Failed(e.to_string());
                    }
                    report.driver_restarts += 1;
                }
                Err(e) => break UrlOutcome::Failed(e.to_string()),
            }
        };

        debug!("[{} #{}] {}: {}", site, worker, target.label(), outcome);
        report.urls.push(UrlReport {
            target: target.clone(),
            url,
            outcome,
            attempts,
        });
        progress.inc(1);
    }

    if let Some(mut d) = driver.take() {
        d.close().await;
    }

    report
}
