use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;

use super::config::ScenarioConfig;
use super::error::{Error, Result};

pub const DEFAULT_SETUP_FAILURE_LOG_LIMIT: usize = 5;

/// Outcome of provisioning one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioned<T> {
    Accepted(T),
    Rejected(String),
}

/// Produces one shared-data entry per call; used by [`run_setup`].
pub trait Provisioner: Send + Sync + 'static {
    type Item: Send + 'static;

    /// `index` is 0-based within the whole setup run.
    fn provision(&self, index: u64) -> impl Future<Output = Provisioned<Self::Item>> + Send;
}

#[derive(Debug, Clone)]
pub struct SetupOptions {
    pub count: u64,
    /// Upper bound on concurrently dispatched provisioning calls.
    pub batch_size: u64,
    pub timeout: Duration,
    /// Only the first N rejections are logged.
    pub failure_log_limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupReport {
    pub requested: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub failures_logged: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct SetupOutcome<T> {
    /// Accepted entries in index order.
    pub items: Vec<T>,
    pub report: SetupReport,
}

/// Runs the provisioner `count` times in batches of at most `batch_size`.
///
/// Rejected entries are dropped without aborting the batch. The whole phase is bounded
/// by `timeout`.
pub async fn run_setup<P: Provisioner>(
    provisioner: Arc<P>,
    opts: SetupOptions,
) -> Result<SetupOutcome<P::Item>> {
    if opts.batch_size == 0 {
        return Err(Error::InvalidBatchSize);
    }

    let timeout = opts.timeout;
    match tokio::time::timeout(timeout, run_batches(provisioner, opts)).await {
        Ok(outcome) => Ok(outcome),
        Err(_) => Err(Error::SetupTimeout(timeout)),
    }
}

async fn run_batches<P: Provisioner>(
    provisioner: Arc<P>,
    opts: SetupOptions,
) -> SetupOutcome<P::Item> {
    let started = Instant::now();
    let mut items: Vec<P::Item> = Vec::with_capacity(opts.count.min(1 << 16) as usize);
    let mut report = SetupReport {
        requested: opts.count,
        ..Default::default()
    };

    let mut next: u64 = 0;
    while next < opts.count {
        let end = next.saturating_add(opts.batch_size).min(opts.count);

        let mut set = JoinSet::new();
        for index in next..end {
            let provisioner = provisioner.clone();
            set.spawn(async move { (index, provisioner.provision(index).await) });
        }

        let mut batch: Vec<(u64, Provisioned<P::Item>)> =
            Vec::with_capacity((end - next) as usize);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => batch.push(result),
                Err(err) => batch.push((u64::MAX, Provisioned::Rejected(err.to_string()))),
            }
        }
        batch.sort_by_key(|(index, _)| *index);

        let mut batch_accepted = 0u64;
        for (index, outcome) in batch {
            match outcome {
                Provisioned::Accepted(item) => {
                    items.push(item);
                    batch_accepted += 1;
                }
                Provisioned::Rejected(reason) => {
                    report.rejected += 1;
                    if (report.failures_logged as usize) < opts.failure_log_limit {
                        report.failures_logged += 1;
                        tracing::warn!(index, reason = %reason, "setup entry rejected");
                    }
                }
            }
        }
        report.accepted += batch_accepted;

        tracing::debug!(
            from = next,
            to = end,
            accepted = batch_accepted,
            total_accepted = report.accepted,
            "setup batch done"
        );
        next = end;
    }

    report.elapsed = started.elapsed();
    SetupOutcome { items, report }
}

/// Fails when setup produced nothing but a scenario cannot run without it.
pub fn ensure_setup_requirements(scenarios: &[ScenarioConfig], available: usize) -> Result<()> {
    if available > 0 {
        return Ok(());
    }

    match scenarios.iter().find(|s| s.requires_setup_data) {
        Some(s) => Err(Error::EmptySetupData {
            scenario: s.name().to_string(),
        }),
        None => Ok(()),
    }
}
