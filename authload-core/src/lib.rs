//! Load-generation engine: arrival-rate scheduling, worker pools, setup phase and
//! threshold evaluation. Protocol-agnostic; the workload plugs in through [`Workload`].

mod config;
mod error;
mod iteration_metrics;
mod metrics_context;
mod pacer;
mod progress;
mod request_metrics;
mod run;
mod schedule;
mod setup;
mod summary;
mod thresholds;
mod thresholds_eval;
mod vu;
mod workload;

pub use config::{
    DEFAULT_GRACEFUL_STOP, DEFAULT_TIME_UNIT, ScenarioConfig, ScenarioExecutor,
    ScenarioExecutorKind, ScenarioOptions, Stage, scenarios_from_options,
};
pub use error::{Error, Result};
pub use iteration_metrics::{IterationMetricIds, IterationSample};
pub use metrics_context::MetricsContext;
pub use pacer::{ArrivalPacer, InFlight};
pub use progress::{LiveMetrics, ProgressFn, ProgressUpdate, ScenarioProgress, StageProgress};
pub use request_metrics::{RequestMetricIds, RequestSample};
pub use run::{RunContext, run_scenarios};
pub use schedule::{ArrivalClock, RampingSchedule, StageSnapshot};
pub use setup::{
    DEFAULT_SETUP_FAILURE_LOG_LIMIT, Provisioned, Provisioner, SetupOptions, SetupOutcome,
    SetupReport, ensure_setup_requirements, run_setup,
};
pub use summary::{RunSummary, ScenarioSummary};
pub use thresholds::{
    ThresholdAgg, ThresholdExpr, ThresholdOp, ThresholdOutcome, ThresholdSet,
    parse_threshold_expr,
};
pub use thresholds_eval::{all_passed, evaluate_thresholds, validate_thresholds};
pub use vu::{ActiveVuGuard, StartSignal};
pub use workload::{IterationContext, WorkerInfo, Workload};
