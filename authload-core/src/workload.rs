use std::future::Future;
use std::sync::Arc;

use super::metrics_context::MetricsContext;

/// Identity of one reusable worker slot.
#[derive(Debug, Clone)]
pub struct WorkerInfo {
    /// Unique across the run (1-based).
    pub vu_id: u64,
    /// Unique within the scenario (1-based, `1..=max_vus`).
    pub scenario_vu: u64,
    /// Size of the scenario's worker pool.
    pub max_vus: u64,
    pub exec: Arc<str>,
    pub metrics_ctx: MetricsContext,
}

/// Per-iteration view handed to [`Workload::iterate`].
#[derive(Debug)]
pub struct IterationContext<S> {
    pub worker: Arc<WorkerInfo>,
    /// Iterations this worker has started before this one.
    pub iteration: u64,
    /// Setup output, read-only for the whole run.
    pub shared: Arc<S>,
}

impl<S> IterationContext<S> {
    pub fn scenario(&self) -> &str {
        self.worker.metrics_ctx.scenario()
    }

    pub fn exec(&self) -> &str {
        &self.worker.exec
    }
}

/// The code a scenario runs once per arrival.
///
/// A worker calls [`Workload::init_state`] lazily before its first iteration and then
/// threads the same state through every iteration it runs. Iterations never fail: outcomes
/// are recorded as metrics by the workload itself.
pub trait Workload: Send + Sync + 'static {
    type Shared: Send + Sync + 'static;
    type State: Send + 'static;

    fn init_state(&self, worker: &WorkerInfo, shared: &Self::Shared) -> Self::State;

    fn iterate(
        &self,
        ctx: &IterationContext<Self::Shared>,
        state: &mut Self::State,
    ) -> impl Future<Output = ()> + Send;
}
