use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("invalid `executor` (expected `ramping-arrival-rate` or `constant-arrival-rate`)")]
    InvalidExecutor,

    #[error("scenario `{0}` is defined more than once")]
    DuplicateScenario(String),

    #[error("`stages` must be a non-empty array of {{ duration, target }} with a non-zero total")]
    InvalidStages,

    #[error("`rate` must be a positive integer")]
    InvalidRate,

    #[error("`duration` must be a positive duration")]
    InvalidDuration,

    #[error("`time_unit` must be a positive duration")]
    InvalidTimeUnit,

    #[error("`pre_allocated_vus` must be a positive integer")]
    InvalidPreAllocatedVus,

    #[error("`max_vus` must be >= `pre_allocated_vus`")]
    InvalidMaxVus,

    #[error("`batch_size` must be a positive integer")]
    InvalidBatchSize,

    #[error("setup did not finish within {0:?}")]
    SetupTimeout(Duration),

    #[error("setup produced no usable entries but scenario `{scenario}` requires setup data")]
    EmptySetupData { scenario: String },

    #[error("invalid threshold for `{selector}`: {error}")]
    InvalidThreshold { selector: String, error: String },
}
