use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use authload_metrics::{MetricHandle, Registry};
use tokio::sync::Notify;
use tokio::time::Instant;

use super::error::Result;
use super::iteration_metrics::IterationSample;
use super::pacer::ArrivalPacer;
use super::run::RunContext;
use super::workload::{IterationContext, WorkerInfo, Workload};

#[derive(Debug)]
pub struct StartSignal {
    started: AtomicBool,
    notify: Notify,
}

impl StartSignal {
    pub fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub fn start(&self) {
        self.started.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.started.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}

impl Default for StartSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the `vus` gauge up while an iteration runs.
pub struct ActiveVuGuard {
    vus: Option<MetricHandle>,
}

impl ActiveVuGuard {
    pub fn enter(run_ctx: &RunContext, scenario: &str) -> Self {
        let metrics: &Registry = &run_ctx.metrics;
        let ids = run_ctx.iteration_metrics;
        let tags = metrics.resolve_tags(&[("scenario", scenario)]);

        let vus = metrics.get_handle(ids.vus, tags.clone());
        if let Some(MetricHandle::Gauge(g)) = &vus {
            let now_active = g.fetch_add(1, Ordering::Relaxed).saturating_add(1);
            // Track the peak so the summary does not report `vus = 0` after the run.
            if let Some(peak) = metrics.get_handle(ids.vus_max, tags) {
                peak.max_gauge(now_active);
            }
        }

        Self { vus }
    }
}

impl Drop for ActiveVuGuard {
    fn drop(&mut self) {
        if let Some(vus) = &self.vus {
            vus.decrement_gauge(1);
        }
    }
}

pub(crate) struct WorkerTask<W: Workload> {
    pub(crate) info: Arc<WorkerInfo>,
    pub(crate) workload: Arc<W>,
    pub(crate) shared: Arc<W::Shared>,
    pub(crate) pacer: Arc<ArrivalPacer>,
    pub(crate) run_ctx: Arc<RunContext>,
    pub(crate) start_signal: Arc<StartSignal>,
    pub(crate) run_started: Arc<OnceLock<Instant>>,
    /// Offset from run start after which in-flight iterations are abandoned.
    pub(crate) hard_stop: Duration,
    pub(crate) pacing: Duration,
}

/// Pulls arrivals until the pacer is done, running one iteration per arrival.
pub(crate) async fn run_worker<W: Workload>(task: WorkerTask<W>) -> Result<()> {
    let WorkerTask {
        info,
        workload,
        shared,
        pacer,
        run_ctx,
        start_signal,
        run_started,
        hard_stop,
        pacing,
    } = task;

    start_signal.wait().await;
    let Some(started) = run_started.get().copied() else {
        return Ok(());
    };
    let deadline = started + hard_stop;

    let scenario = info.metrics_ctx.scenario();
    let extra_tags = info.metrics_ctx.scenario_tag_refs(&["scenario"]);

    let mut state: Option<W::State> = None;
    let mut iteration: u64 = 0;

    loop {
        if pacer.is_done() {
            break;
        }

        // Workers above the active threshold stay parked until demand grows.
        if info.scenario_vu > pacer.active_vus() {
            pacer.wait_until_active(info.scenario_vu).await;
            continue;
        }

        let Some(_slot) = pacer.claim_next().await else {
            break;
        };

        let state = state.get_or_insert_with(|| workload.init_state(&info, &shared));
        let ctx = IterationContext {
            worker: info.clone(),
            iteration,
            shared: shared.clone(),
        };
        iteration = iteration.saturating_add(1);

        let _active = ActiveVuGuard::enter(&run_ctx, scenario);
        let iteration_started = Instant::now();

        let run = workload.iterate(&ctx, state);
        if tokio::time::timeout_at(deadline, run).await.is_err() {
            run_ctx
                .iteration_metrics
                .record_timeout(&run_ctx.metrics, scenario, &extra_tags);
            tracing::debug!(
                scenario,
                vu = info.scenario_vu,
                "iteration abandoned at the graceful-stop deadline"
            );
            break;
        }

        run_ctx.iteration_metrics.record_iteration(
            &run_ctx.metrics,
            IterationSample {
                scenario,
                duration: iteration_started.elapsed(),
            },
            &extra_tags,
        );

        // Pacing never outlives the deadline and never turns a finished iteration into a timeout.
        if !pacing.is_zero() {
            let until = (Instant::now() + pacing).min(deadline);
            tokio::time::sleep_until(until).await;
        }
    }

    Ok(())
}
