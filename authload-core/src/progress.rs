use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct LiveMetrics {
    pub iterations_total: u64,
    /// Iterations/sec completed during the last progress interval.
    pub iterations_per_sec_now: f64,
    pub requests_total: u64,
    /// Requests/sec observed during the last progress interval.
    pub requests_per_sec_now: f64,
    pub failed_requests_total: u64,
    pub dropped_iterations_total: u64,
}

#[derive(Debug, Clone)]
pub struct StageProgress {
    /// 1-based stage index.
    pub stage: usize,
    pub stages: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
}

#[derive(Debug, Clone)]
pub struct ScenarioProgress {
    pub time_unit: Duration,
    pub total_duration: Duration,
    pub graceful_stop: Duration,
    pub stage: Option<StageProgress>,
    pub active_vus: u64,
    pub in_flight: u64,
    pub max_vus: u64,
}

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Monotonic tick counter (1-based) for progress emissions.
    pub tick: u64,
    pub interval: Duration,
    pub elapsed: Duration,
    pub scenario: String,
    pub exec: String,
    pub metrics: LiveMetrics,
    pub progress: ScenarioProgress,
}

pub type ProgressFn = std::sync::Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
