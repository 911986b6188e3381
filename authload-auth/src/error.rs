pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`baseUrl` must be an absolute http:// or https:// URL: {0}")]
    InvalidBaseUrl(String),

    #[error("`signupRatio` must be within [0, 1], got {0}")]
    InvalidSignupRatio(f64),

    #[error("`setupBatch` must be a positive integer")]
    InvalidSetupBatch,

    #[error("`chain.path` must start with `/`: {0}")]
    InvalidChainPath(String),

    #[error("no scenario is enabled (both signup and login are disabled or have a zero rate)")]
    NoScenarios,
}
