use std::sync::Arc;
use std::time::Duration;

use super::error::{Error, Result};
use super::metrics_context::MetricsContext;
use super::schedule::RampingSchedule;

pub const DEFAULT_TIME_UNIT: Duration = Duration::from_secs(1);
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

impl Stage {
    pub fn new(duration: Duration, target: u64) -> Self {
        Self { duration, target }
    }
}

#[derive(Debug, Clone)]
pub enum ScenarioExecutor {
    /// Open-model arrival rate (iterations started per `time_unit`), with ramping stages.
    RampingArrivalRate {
        start_rate: u64,
        time_unit: Duration,
        pre_allocated_vus: u64,
        max_vus: u64,
        stages: Vec<Stage>,
    },

    /// Fixed arrival rate held for `duration`.
    ConstantArrivalRate {
        rate: u64,
        time_unit: Duration,
        duration: Duration,
        pre_allocated_vus: u64,
        max_vus: u64,
    },
}

impl ScenarioExecutor {
    pub fn time_unit(&self) -> Duration {
        match self {
            Self::RampingArrivalRate { time_unit, .. }
            | Self::ConstantArrivalRate { time_unit, .. } => *time_unit,
        }
    }

    pub fn pre_allocated_vus(&self) -> u64 {
        match self {
            Self::RampingArrivalRate {
                pre_allocated_vus, ..
            }
            | Self::ConstantArrivalRate {
                pre_allocated_vus, ..
            } => *pre_allocated_vus,
        }
    }

    pub fn max_vus(&self) -> u64 {
        match self {
            Self::RampingArrivalRate { max_vus, .. } | Self::ConstantArrivalRate { max_vus, .. } => {
                *max_vus
            }
        }
    }

    /// Rate profile as a piecewise-linear schedule; a constant rate is a single flat stage.
    pub fn schedule(&self) -> RampingSchedule {
        match self {
            Self::RampingArrivalRate {
                start_rate, stages, ..
            } => RampingSchedule::new(*start_rate, stages.clone()),
            Self::ConstantArrivalRate { rate, duration, .. } => {
                RampingSchedule::new(*rate, vec![Stage::new(*duration, *rate)])
            }
        }
    }

    pub fn kind(&self) -> ScenarioExecutorKind {
        match self {
            Self::RampingArrivalRate { .. } => ScenarioExecutorKind::RampingArrivalRate,
            Self::ConstantArrivalRate { .. } => ScenarioExecutorKind::ConstantArrivalRate,
        }
    }
}

/// Scenario executor kind (the string form used by config files).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::Display)]
pub enum ScenarioExecutorKind {
    #[strum(serialize = "ramping-arrival-rate", serialize = "ramping-rps")]
    RampingArrivalRate,

    #[strum(serialize = "constant-arrival-rate", serialize = "constant-rps")]
    ConstantArrivalRate,
}

#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub exec: String,
    pub metrics_ctx: MetricsContext,
    pub executor: ScenarioExecutor,
    /// Window after the last stage during which in-flight iterations may finish.
    pub graceful_stop: Duration,
    /// Run fails before scheduling when setup produced no data.
    pub requires_setup_data: bool,
    /// Delay at the end of every iteration, already clamped to the minimum arrival interval.
    pub pacing: Duration,
}

impl ScenarioConfig {
    pub fn name(&self) -> &str {
        self.metrics_ctx.scenario()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioOptions {
    pub name: String,
    pub exec: Option<String>,

    /// Scenario-level metric tags.
    pub tags: Vec<(String, String)>,

    /// Defaults to `ramping-arrival-rate`.
    pub executor: Option<String>,

    // Constant arrival rate
    pub rate: Option<u64>,
    pub duration: Option<Duration>,

    // Ramping arrival rate
    pub start_rate: Option<u64>,
    pub stages: Vec<Stage>,

    pub time_unit: Option<Duration>,
    pub pre_allocated_vus: Option<u64>,
    pub max_vus: Option<u64>,

    pub graceful_stop: Option<Duration>,
    pub requires_setup_data: bool,
    pub pacing: Option<Duration>,
}

pub fn scenarios_from_options(scenarios: Vec<ScenarioOptions>) -> Result<Vec<ScenarioConfig>> {
    let mut out: Vec<ScenarioConfig> = Vec::with_capacity(scenarios.len());

    for s in scenarios {
        if out.iter().any(|c| c.name() == s.name) {
            return Err(Error::DuplicateScenario(s.name));
        }

        let executor_name = s.executor.as_deref().unwrap_or("ramping-arrival-rate");
        let executor_kind: ScenarioExecutorKind =
            executor_name.parse().map_err(|_| Error::InvalidExecutor)?;

        let time_unit = s.time_unit.unwrap_or(DEFAULT_TIME_UNIT);
        if time_unit.is_zero() {
            return Err(Error::InvalidTimeUnit);
        }

        let pre_allocated_vus = s.pre_allocated_vus.unwrap_or(1);
        if pre_allocated_vus == 0 {
            return Err(Error::InvalidPreAllocatedVus);
        }

        let max_vus = s.max_vus.unwrap_or(pre_allocated_vus);
        if max_vus < pre_allocated_vus {
            return Err(Error::InvalidMaxVus);
        }

        let executor = match executor_kind {
            ScenarioExecutorKind::RampingArrivalRate => {
                let total_duration = s
                    .stages
                    .iter()
                    .fold(Duration::ZERO, |acc, st| acc.saturating_add(st.duration));
                if s.stages.is_empty() || total_duration.is_zero() {
                    return Err(Error::InvalidStages);
                }

                ScenarioExecutor::RampingArrivalRate {
                    start_rate: s.start_rate.unwrap_or(0),
                    time_unit,
                    pre_allocated_vus,
                    max_vus,
                    stages: s.stages,
                }
            }
            ScenarioExecutorKind::ConstantArrivalRate => {
                let rate = s.rate.unwrap_or(0);
                if rate == 0 {
                    return Err(Error::InvalidRate);
                }
                let duration = s.duration.unwrap_or(Duration::ZERO);
                if duration.is_zero() {
                    return Err(Error::InvalidDuration);
                }

                ScenarioExecutor::ConstantArrivalRate {
                    rate,
                    time_unit,
                    duration,
                    pre_allocated_vus,
                    max_vus,
                }
            }
        };

        let pacing = clamp_pacing(
            &s.name,
            s.pacing.unwrap_or(Duration::ZERO),
            time_unit,
            executor.schedule().max_target(),
        );

        let exec = s.exec.unwrap_or_else(|| s.name.clone());
        out.push(ScenarioConfig {
            exec,
            metrics_ctx: MetricsContext::new(Arc::from(s.name), Arc::from(s.tags)),
            executor,
            graceful_stop: s.graceful_stop.unwrap_or(DEFAULT_GRACEFUL_STOP),
            requires_setup_data: s.requires_setup_data,
            pacing,
        });
    }

    Ok(out)
}

/// Pacing may not exceed the shortest interval between arrivals (`time_unit / max_rate`).
fn clamp_pacing(scenario: &str, pacing: Duration, time_unit: Duration, max_rate: u64) -> Duration {
    if max_rate == 0 || pacing.is_zero() {
        return pacing;
    }

    let min_interval = time_unit / u32::try_from(max_rate).unwrap_or(u32::MAX);
    if pacing <= min_interval {
        return pacing;
    }

    tracing::warn!(
        scenario,
        pacing = ?pacing,
        min_interval = ?min_interval,
        "pacing exceeds the minimum arrival interval; clamping"
    );
    min_interval
}
