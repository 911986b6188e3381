use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use authload_metrics::Registry;
use tokio::time::{Instant, MissedTickBehavior};

use super::config::ScenarioConfig;
use super::error::Result;
use super::iteration_metrics::IterationMetricIds;
use super::metrics_context::MetricsContext;
use super::pacer::ArrivalPacer;
use super::progress::{LiveMetrics, ProgressFn, ProgressUpdate, ScenarioProgress, StageProgress};
use super::request_metrics::RequestMetricIds;
use super::schedule::{ArrivalClock, RampingSchedule};
use super::summary::{RunSummary, build_run_summary};
use super::vu::{StartSignal, WorkerTask, run_worker};
use super::workload::{WorkerInfo, Workload};

const PACER_TICK: Duration = Duration::from_millis(10);
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Shared state for one run: the metrics registry and the ids of the built-in series.
#[derive(Debug)]
pub struct RunContext {
    pub metrics: Arc<Registry>,
    pub request_metrics: RequestMetricIds,
    pub iteration_metrics: IterationMetricIds,
}

impl RunContext {
    pub fn new(metrics: Arc<Registry>) -> Self {
        let request_metrics = RequestMetricIds::register(&metrics);
        let iteration_metrics = IterationMetricIds::register(&metrics);
        Self {
            metrics,
            request_metrics,
            iteration_metrics,
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(Arc::new(Registry::default()))
    }
}

#[derive(Clone)]
struct ScenarioRuntime {
    metrics_ctx: MetricsContext,
    exec: String,
    schedule: Arc<RampingSchedule>,
    time_unit: Duration,
    graceful_stop: Duration,
    pacer: Arc<ArrivalPacer>,
}

/// Runs every scenario concurrently until each has finished its stages and graceful stop.
pub async fn run_scenarios<W: Workload>(
    scenarios: Vec<ScenarioConfig>,
    run_ctx: Arc<RunContext>,
    workload: Arc<W>,
    shared: Arc<W::Shared>,
    progress: Option<ProgressFn>,
) -> Result<RunSummary> {
    let start_signal = Arc::new(StartSignal::new());
    let run_started: Arc<OnceLock<Instant>> = Arc::new(OnceLock::new());

    let total_vus: u64 = scenarios.iter().map(|s| s.executor.max_vus()).sum();
    let mut handles = Vec::with_capacity(usize::try_from(total_vus).unwrap_or(0));
    let mut runtimes: Vec<ScenarioRuntime> = Vec::with_capacity(scenarios.len());
    let mut next_vu_id: u64 = 1;

    for scenario in scenarios {
        let schedule = Arc::new(scenario.executor.schedule());
        let max_vus = scenario.executor.max_vus();
        let pacer = Arc::new(ArrivalPacer::new(
            scenario.executor.pre_allocated_vus(),
            max_vus,
        ));
        let hard_stop = schedule
            .total_duration()
            .saturating_add(scenario.graceful_stop);
        let exec: Arc<str> = Arc::from(scenario.exec.as_str());

        for scenario_vu in 1..=max_vus {
            let info = Arc::new(WorkerInfo {
                vu_id: next_vu_id,
                scenario_vu,
                max_vus,
                exec: exec.clone(),
                metrics_ctx: scenario.metrics_ctx.clone(),
            });
            next_vu_id = next_vu_id.saturating_add(1);

            let task = WorkerTask {
                info,
                workload: workload.clone(),
                shared: shared.clone(),
                pacer: pacer.clone(),
                run_ctx: run_ctx.clone(),
                start_signal: start_signal.clone(),
                run_started: run_started.clone(),
                hard_stop,
                pacing: scenario.pacing,
            };
            handles.push(tokio::spawn(run_worker(task)));
        }

        tracing::info!(
            scenario = scenario.name(),
            executor = %scenario.executor.kind(),
            duration = ?schedule.total_duration(),
            graceful_stop = ?scenario.graceful_stop,
            pre_allocated_vus = scenario.executor.pre_allocated_vus(),
            max_vus,
            "scenario scheduled"
        );

        runtimes.push(ScenarioRuntime {
            metrics_ctx: scenario.metrics_ctx.clone(),
            exec: scenario.exec.clone(),
            schedule,
            time_unit: scenario.executor.time_unit(),
            graceful_stop: scenario.graceful_stop,
            pacer,
        });
    }

    let started = Instant::now();
    let _ = run_started.set(started);
    start_signal.start();

    let progress_handle = progress.map(|progress| {
        tokio::spawn(progress_loop(
            progress,
            runtimes.clone(),
            run_ctx.clone(),
            started,
        ))
    });

    // Pacers start after the workers so no backlog builds up while they wait to start.
    let mut pacer_handles = Vec::with_capacity(runtimes.len());
    for rt in &runtimes {
        pacer_handles.push(tokio::spawn(pacer_loop(rt.clone(), run_ctx.clone(), started)));
    }

    for h in pacer_handles {
        h.await??;
    }
    for h in handles {
        h.await??;
    }

    if let Some(h) = progress_handle {
        h.abort();
        let _ = h.await;
    }

    let run_duration = started.elapsed();
    let names: Vec<String> = runtimes
        .iter()
        .map(|rt| rt.metrics_ctx.scenario().to_string())
        .collect();
    let summary = build_run_summary(
        &run_ctx.metrics,
        run_ctx.request_metrics,
        run_ctx.iteration_metrics,
        &names,
        run_duration,
    );

    for (s, rt) in summary.scenarios.iter().zip(&runtimes) {
        if s.iteration_timeouts_total > 0 {
            tracing::warn!(
                scenario = %s.scenario,
                interrupted = s.iteration_timeouts_total,
                graceful_stop = ?rt.graceful_stop,
                "iterations were still running at the graceful-stop deadline"
            );
        }
        tracing::info!(
            scenario = %s.scenario,
            iterations = s.iterations_total,
            dropped = s.dropped_iterations_total,
            requests = s.requests_total,
            "scenario finished"
        );
    }

    Ok(summary)
}

/// Feeds due arrivals into the scenario's pacer until its stages end.
async fn pacer_loop(rt: ScenarioRuntime, run_ctx: Arc<RunContext>, started: Instant) -> Result<()> {
    let scenario = rt.metrics_ctx.scenario();
    let extra_tags = rt.metrics_ctx.scenario_tag_refs(&["scenario"]);
    let total_duration = rt.schedule.total_duration();
    let mut clock = ArrivalClock::new(rt.schedule.as_ref().clone(), rt.time_unit);

    let mut interval = tokio::time::interval(PACER_TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut warned = false;
    loop {
        interval.tick().await;

        // The last pass settles the clock at the end of the stages so no arrival is skipped.
        let elapsed = started.elapsed();
        let finished = elapsed >= total_duration;

        let due = clock.due_at(elapsed.min(total_duration));
        let dropped = rt.pacer.update_due(due);
        if dropped != 0 {
            run_ctx
                .iteration_metrics
                .record_dropped(&run_ctx.metrics, scenario, dropped, &extra_tags);
            if !warned {
                warned = true;
                tracing::warn!(
                    scenario,
                    max_vus = rt.pacer.max_vus(),
                    "worker pool exhausted; dropping iterations"
                );
            }
        }

        if finished {
            break;
        }
    }

    let leftover = rt.pacer.mark_done();
    run_ctx
        .iteration_metrics
        .record_dropped(&run_ctx.metrics, scenario, leftover, &extra_tags);

    tracing::debug!(
        scenario,
        scheduled = rt.pacer.scheduled_total(),
        dropped = rt.pacer.dropped_total(),
        in_flight = rt.pacer.in_flight(),
        "scenario stages complete; waiting for in-flight iterations"
    );
    Ok(())
}

#[derive(Default)]
struct LiveState {
    iterations_total: u64,
    requests_total: u64,
}

async fn progress_loop(
    progress: ProgressFn,
    runtimes: Vec<ScenarioRuntime>,
    run_ctx: Arc<RunContext>,
    started: Instant,
) {
    let mut interval = tokio::time::interval(PROGRESS_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick is immediate; skip it so the first emission covers a full interval.
    interval.tick().await;

    let metrics = &run_ctx.metrics;
    let req = run_ctx.request_metrics;
    let it = run_ctx.iteration_metrics;

    let mut tick_id: u64 = 0;
    let mut last_at = Instant::now();
    let mut prev: HashMap<String, LiveState> = HashMap::new();

    loop {
        interval.tick().await;

        tick_id = tick_id.saturating_add(1);
        let now = Instant::now();
        let dt = now.duration_since(last_at);
        last_at = now;
        let dt_secs = dt.as_secs_f64().max(1e-9);
        let elapsed = started.elapsed();

        for rt in &runtimes {
            let scenario = rt.metrics_ctx.scenario();

            let iterations_total = metrics
                .query(it.iterations)
                .where_tag("scenario", scenario)
                .sum_counter_total();
            let (requests_total, failed_requests_total) = metrics
                .query(req.http_req_failed)
                .where_tag("scenario", scenario)
                .sum_rate_total();

            let st = prev.entry(scenario.to_string()).or_default();
            let live = LiveMetrics {
                iterations_total,
                iterations_per_sec_now: iterations_total.saturating_sub(st.iterations_total) as f64
                    / dt_secs,
                requests_total,
                requests_per_sec_now: requests_total.saturating_sub(st.requests_total) as f64
                    / dt_secs,
                failed_requests_total,
                dropped_iterations_total: rt.pacer.dropped_total(),
            };
            st.iterations_total = iterations_total;
            st.requests_total = requests_total;

            let stage = rt.schedule.stage_snapshot_at(elapsed).map(|s| StageProgress {
                stage: s.index + 1,
                stages: s.count,
                stage_elapsed: s.stage_elapsed,
                stage_remaining: s.stage_remaining,
                start_target: s.start_target,
                end_target: s.end_target,
                current_target: s.current_target,
            });

            (progress)(ProgressUpdate {
                tick: tick_id,
                interval: dt,
                elapsed,
                scenario: scenario.to_string(),
                exec: rt.exec.clone(),
                metrics: live,
                progress: ScenarioProgress {
                    time_unit: rt.time_unit,
                    total_duration: rt.schedule.total_duration(),
                    graceful_stop: rt.graceful_stop,
                    stage,
                    active_vus: rt.pacer.active_vus(),
                    in_flight: rt.pacer.in_flight(),
                    max_vus: rt.pacer.max_vus(),
                },
            });
        }
    }
}
