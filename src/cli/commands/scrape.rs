//! Scrape, daemon and merge commands.

#![cfg_attr(not(feature = "browser"), allow(dead_code, unused_imports))]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{Local, NaiveDate, Utc};
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::icons;
use kirana::config::{Config, Settings};
use kirana::driver::DriverFactory;
use kirana::extract::SiteId;
use kirana::runner::schedule::{parse_time_of_day, Schedule};
use kirana::runner::{run_site, SiteReport, SiteRun};
use kirana::sink::{recover_partials, SqliteSink};
use kirana::targets::{batch_range, load_targets, Target};

/// Default period between daemon cycles.
const DEFAULT_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Options shared by one-shot and daemon scrapes.
pub struct ScrapeArgs {
    pub sites: Vec<SiteId>,
    pub targets: Option<PathBuf>,
    pub queries: Vec<String>,
    pub start: usize,
    pub end: Option<usize>,
    pub limit: Option<usize>,
    pub workers: Option<usize>,
    pub store: bool,
}

impl ScrapeArgs {
    fn sites(&self) -> Vec<SiteId> {
        if self.sites.is_empty() {
            SiteId::ALL.to_vec()
        } else {
            self.sites.clone()
        }
    }

    /// Targets from the file and `--query` flags, narrowed to the batch range.
    fn load_targets(&self) -> anyhow::Result<Vec<Target>> {
        let mut targets = match self.targets {
            Some(ref path) => load_targets(path)?,
            None => Vec::new(),
        };
        targets.extend(self.queries.iter().map(|q| Target::from_query(q)));
        if targets.is_empty() {
            anyhow::bail!("No targets given. Pass --targets <file> or --query <term>");
        }

        let range = batch_range(targets.len(), self.start, self.end);
        Ok(targets[range].to_vec())
    }
}

/// Resolve the daemon schedule from `--at` / `--interval`.
pub fn schedule_from(at: Option<&str>, interval: Option<u64>) -> anyhow::Result<Schedule> {
    match (at, interval) {
        (Some(at), _) => Ok(Schedule::Daily(
            parse_time_of_day(at).map_err(anyhow::Error::msg)?,
        )),
        (None, Some(secs)) => Ok(Schedule::Every(Duration::from_secs(secs.max(1)))),
        (None, None) => Ok(Schedule::Every(Duration::from_secs(DEFAULT_INTERVAL_SECS))),
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Scrape every selected site once.
pub async fn cmd_scrape(settings: &Settings, config: &Config, args: &ScrapeArgs) -> anyhow::Result<()> {
    let targets = args.load_targets()?;
    settings.ensure_directories()?;

    #[cfg(feature = "browser")]
    {
        let factory = Arc::new(kirana::driver::ChromiumFactory::new(config.browser.clone()));
        run_cycle(factory, settings, config, args, &targets).await
    }

    #[cfg(not(feature = "browser"))]
    {
        let _ = (config, targets);
        Err(kirana::driver::DriverError::Unsupported.into())
    }
}

/// Scrape on a schedule until interrupted.
pub async fn cmd_scrape_daemon(
    settings: &Settings,
    config: &Config,
    args: &ScrapeArgs,
    schedule: Schedule,
) -> anyhow::Result<()> {
    let mut first = true;
    loop {
        // Daily schedules wait for their first slot; periodic ones start now.
        if !first || matches!(schedule, Schedule::Daily(_)) {
            let delay = schedule.delay_from(&Local::now());
            println!(
                "{} Next scrape in {}",
                icons::dim_arrow(),
                format_delay(delay)
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = tokio::signal::ctrl_c() => {
                    println!("{} Interrupted, exiting", icons::warn());
                    return Ok(());
                }
            }
        }
        first = false;

        if let Err(e) = cmd_scrape(settings, config, args).await {
            // A failed cycle must not stop the daemon.
            println!("{} Scrape cycle failed: {:#}", icons::error(), e);
            tracing::error!("Scrape cycle failed: {:#}", e);
        }
    }
}

fn format_delay(delay: Duration) -> String {
    let secs = delay.as_secs();
    format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

async fn run_cycle<F>(
    factory: Arc<F>,
    settings: &Settings,
    config: &Config,
    args: &ScrapeArgs,
    targets: &[Target],
) -> anyhow::Result<()>
where
    F: DriverFactory + 'static,
{
    let workers = args.workers.unwrap_or(settings.workers).max(1);
    let scraped_date = Utc::now().date_naive();
    let store = args.store || settings.store_results;

    for site in args.sites() {
        let mut profile = config.site_profile(site);
        if let Some(limit) = args.limit {
            profile.max_records = limit;
        }

        println!(
            "{} Scraping {} ({} targets, {} workers)",
            icons::info(),
            site.display_name(),
            targets.len(),
            workers.min(targets.len())
        );

        let pb = progress_bar(targets.len() as u64);
        let run = SiteRun::new(profile, config.collector.clone(), scraped_date);
        let artifact = settings.artifact_path(site.as_str());
        let report = run_site(
            factory.clone(),
            run,
            targets,
            workers,
            &settings.output_dir,
            &artifact,
            &pb,
        )
        .await;
        pb.finish_and_clear();

        let report = match report {
            Ok(report) => report,
            Err(e) => {
                println!("{} {} failed: {:#}", icons::error(), site.display_name(), e);
                continue;
            }
        };
        print_report(&report);

        if store {
            store_site(settings, &report, scraped_date).await;
        }
    }

    Ok(())
}

fn print_report(report: &SiteReport) {
    println!(
        "{} {}: {} records from {} URLs saved to {}",
        icons::success(),
        report.site.display_name(),
        report.merged,
        report.urls(),
        report.artifact.display()
    );
    if report.empty_urls() > 0 {
        println!(
            "  {} {} URLs had no results",
            icons::dim_arrow(),
            report.empty_urls()
        );
    }
    for worker in &report.workers {
        for url in &worker.urls {
            if let kirana::runner::UrlOutcome::Failed(ref reason) = url.outcome {
                println!("  {} {}: {}", icons::error(), url.target.label(), reason);
            }
        }
    }
}

/// Store one site's artifact; a failure is reported and the cycle goes on.
async fn store_site(settings: &Settings, report: &SiteReport, scraped_date: NaiveDate) -> bool {
    match store_artifact(settings, report, scraped_date).await {
        Ok(()) => true,
        Err(e) => {
            println!(
                "{} Storing {} failed: {:#}",
                icons::error(),
                report.site.display_name(),
                e
            );
            tracing::error!("Storing {} failed: {:#}", report.site, e);
            false
        }
    }
}

/// Import the merged artifact under the date its records were stamped with.
async fn store_artifact(
    settings: &Settings,
    report: &SiteReport,
    scraped_date: NaiveDate,
) -> anyhow::Result<()> {
    if report.merged == 0 {
        return Ok(());
    }
    let sink = SqliteSink::new(&settings.database_path())
        .with_context(|| format!("Failed to open {}", settings.database_path().display()))?;
    let stored = sink
        .import_file(&report.artifact, report.site.as_str(), scraped_date)
        .await?;
    println!(
        "{} Stored {} {} records in {}",
        icons::success(),
        stored,
        report.site,
        sink.path().display()
    );
    Ok(())
}

/// Merge partials left behind by an interrupted run.
pub async fn cmd_merge(settings: &Settings, sites: &[SiteId]) -> anyhow::Result<()> {
    let sites = if sites.is_empty() {
        SiteId::ALL.to_vec()
    } else {
        sites.to_vec()
    };
    if !settings.output_dir.exists() {
        println!(
            "{} No output directory at {}",
            icons::warn(),
            settings.output_dir.display()
        );
        return Ok(());
    }

    for site in sites {
        let artifact = settings.artifact_path(site.as_str());
        let count = recover_partials(&settings.output_dir, site.as_str(), &artifact)
            .await
            .with_context(|| format!("Failed to merge {} partials", site))?;
        println!(
            "{} {}: {} records recovered into {}",
            icons::success(),
            site.display_name(),
            count,
            artifact.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_resolution() {
        assert_eq!(
            schedule_from(None, None).unwrap(),
            Schedule::Every(Duration::from_secs(DEFAULT_INTERVAL_SECS))
        );
        assert_eq!(
            schedule_from(None, Some(0)).unwrap(),
            Schedule::Every(Duration::from_secs(1))
        );
        assert!(matches!(
            schedule_from(Some("07:45"), None).unwrap(),
            Schedule::Daily(_)
        ));
        assert!(schedule_from(Some("7pm"), None).is_err());
    }

    #[test]
    fn delay_formatting() {
        assert_eq!(format_delay(Duration::from_secs(3725)), "1h 02m 05s");
    }

    #[test]
    fn queries_append_after_file_targets_and_batch_applies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        std::fs::write(&path, r#"["rice", "dal", "oil"]"#).unwrap();

        let args = ScrapeArgs {
            sites: Vec::new(),
            targets: Some(path),
            queries: vec!["salt".to_string()],
            start: 1,
            end: Some(3),
            limit: None,
            workers: None,
            store: false,
        };
        let targets = args.load_targets().unwrap();
        let names: Vec<&str> = targets.iter().map(Target::query).collect();
        assert_eq!(names, vec!["dal", "oil"]);
        assert_eq!(args.sites(), SiteId::ALL.to_vec());
    }

    #[test]
    fn no_targets_is_an_error() {
        let args = ScrapeArgs {
            sites: vec![SiteId::Zepto],
            targets: None,
            queries: Vec::new(),
            start: 0,
            end: None,
            limit: None,
            workers: None,
            store: false,
        };
        assert!(args.load_targets().is_err());
    }

    fn report(site: SiteId, artifact: PathBuf) -> SiteReport {
        SiteReport {
            site,
            workers: Vec::new(),
            artifact,
            merged: 1,
        }
    }

    #[tokio::test]
    async fn stored_rows_keep_the_cycle_date() {
        use kirana::extract::RawProductRecord;
        use kirana::sink::{Destination, JsonFileSink, Sink};

        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_data_dir(dir.path().to_path_buf());
        settings.ensure_directories().unwrap();
        let cycle = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();

        let artifact = settings.artifact_path("zepto");
        JsonFileSink::new(&artifact)
            .write(
                &[RawProductRecord::new().with("name", "Ghee").with("new_price", 550.0)],
                &Destination::new("zepto", "ghee", cycle),
            )
            .await
            .unwrap();

        // A broken artifact for one site does not stop the next one.
        let broken = settings.artifact_path("blinkit");
        std::fs::write(&broken, "[1]").unwrap();
        assert!(!store_site(&settings, &report(SiteId::Blinkit, broken), cycle).await);
        assert!(store_site(&settings, &report(SiteId::Zepto, artifact), cycle).await);

        let dates = SqliteSink::new(&settings.database_path())
            .unwrap()
            .scraped_dates()
            .unwrap();
        assert_eq!(dates["zepto"], vec!["2025-03-09"]);
    }
}
