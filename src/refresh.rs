//! Parallel refresh of tracked resources
//!
//! Each identifier is read on its own rayon task. Reads of distinct
//! identifiers never touch each other's records, so one failure does not
//! stop the rest.

use anyhow::{Context, Result};
use lifecycle::{ReadOutcome, Reconciler, Resource, ResourceId};
use rayon::prelude::*;

/// What a refresh found
#[derive(Debug, Default)]
pub struct RefreshSummary {
    /// Still present; state updated
    pub present: Vec<ResourceId>,
    /// Gone remotely; removed from state
    pub gone: Vec<ResourceId>,
    /// Read failed; state left as it was
    pub failed: Vec<(ResourceId, lifecycle::Error)>,
}

impl RefreshSummary {
    pub fn total(&self) -> usize {
        self.present.len() + self.gone.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Read every identifier in `ids` on a pool of `parallelism` threads
///
/// `None` sizes the pool to the CPU count. Results are sorted by identifier.
pub fn refresh_all<R: Resource>(
    reconciler: &Reconciler<'_, R>,
    ids: &[ResourceId],
    parallelism: Option<usize>,
) -> Result<RefreshSummary> {
    let jobs = parallelism.unwrap_or(0).min(ids.len().max(1));
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("Failed to create refresh thread pool")?;

    log::info!("Refreshing {} resources", ids.len());

    let outcomes: Vec<(ResourceId, lifecycle::Result<ReadOutcome>)> = pool.install(|| {
        ids.par_iter()
            .map(|id| (id.clone(), reconciler.read(id)))
            .collect()
    });

    let mut summary = RefreshSummary::default();
    for (id, outcome) in outcomes {
        match outcome {
            Ok(ReadOutcome::Present(_)) => summary.present.push(id),
            Ok(ReadOutcome::Gone) => summary.gone.push(id),
            Err(e) => summary.failed.push((id, e)),
        }
    }
    summary.present.sort();
    summary.gone.sort();
    summary.failed.sort_by(|a, b| a.0.cmp(&b.0));

    log::info!(
        "Refreshed {} resources: {} present, {} gone, {} failed",
        summary.total(),
        summary.present.len(),
        summary.gone.len(),
        summary.failed.len()
    );
    Ok(summary)
}
