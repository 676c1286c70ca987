//! Fan a site's target list out over parallel workers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use indicatif::ProgressBar;

use super::{run_worker, SiteRun, WorkerReport};
use crate::driver::DriverFactory;
use crate::extract::SiteId;
use crate::sink::{merge_partials, JsonFileSink};
use crate::targets::Target;

/// Outcome of one site across all of its workers.
#[derive(Debug, Clone)]
pub struct SiteReport {
    pub site: SiteId,
    pub workers: Vec<WorkerReport>,
    /// Merged artifact.
    pub artifact: PathBuf,
    /// Records in the merged artifact.
    pub merged: usize,
}

impl SiteReport {
    pub fn urls(&self) -> usize {
        self.workers.iter().map(|w| w.urls.len()).sum()
    }

    pub fn failures(&self) -> usize {
        self.workers.iter().map(WorkerReport::failures).sum()
    }

    pub fn empty_urls(&self) -> usize {
        self.workers.iter().map(WorkerReport::empty_urls).sum()
    }
}

/// Split `targets` into at most `workers` contiguous chunks of equal size
/// (the last one may be shorter).
pub fn partition(targets: &[Target], workers: usize) -> Vec<Vec<Target>> {
    if targets.is_empty() {
        return Vec::new();
    }
    let workers = workers.max(1);
    let chunk = targets.len().div_ceil(workers);
    targets.chunks(chunk).map(<[Target]>::to_vec).collect()
}

/// Scrape `targets` for one site with up to `workers` parallel browser
/// sessions, then merge the per-worker partials into `artifact`.
pub async fn run_site<F>(
    factory: Arc<F>,
    run: SiteRun,
    targets: &[Target],
    workers: usize,
    output_dir: &Path,
    artifact: &Path,
    pb: &ProgressBar,
) -> anyhow::Result<SiteReport>
where
    F: DriverFactory + 'static,
{
    let site = run.profile.id;
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let run = Arc::new(run);
    let mut handles = Vec::new();

    for (worker, chunk) in partition(targets, workers).into_iter().enumerate() {
        let factory = factory.clone();
        let run = run.clone();
        let pb = pb.clone();
        let sink = JsonFileSink::partial(output_dir, site.as_str(), worker);

        let handle = tokio::spawn(async move {
            tracing::debug!(
                "[{} #{}] {} targets -> {}",
                run.profile.id,
                worker,
                chunk.len(),
                sink.path().display()
            );
            run_worker(worker, factory.as_ref(), &run, &chunk, &sink, &pb).await
        });
        handles.push(handle);
    }

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(report) => reports.push(report),
            Err(e) => tracing::error!("[{}] Worker task failed: {}", site, e),
        }
    }

    let merged = merge_partials(output_dir, site.as_str(), artifact)
        .await
        .with_context(|| format!("Failed to merge {} partials", site))?;

    Ok(SiteReport {
        site,
        workers: reports,
        artifact: artifact.to_path_buf(),
        merged,
    })
}
