//! The authentication workload: request building, response classification, token
//! extraction, signup/login/chain iterations and the user-provisioning setup step.

mod api;
mod classify;
mod config;
mod error;
mod metrics;
mod payload;
mod request;
mod setup;
mod token;
mod workload;

pub use api::{AuthApi, CallOutcome};
pub use classify::{ResponseClassifier, result_code};
pub use config::{
    AuthConfig, ChainConfig, ChainMethod, EXEC_LOGIN, EXEC_SIGNUP, LOGIN_SCENARIO,
    SETUP_SCENARIO, SIGNUP_SCENARIO, ScenarioOverride, TokenConfig,
};
pub use error::{Error, Result};
pub use metrics::AuthMetricIds;
pub use payload::{Credentials, SignupPayload, random_password};
pub use request::{EndpointKind, PATH_DB_POKE, PATH_LOGIN, PATH_SIGNUP, RequestBuilder};
pub use setup::SignupProvisioner;
pub use token::TokenExtractor;
pub use workload::{AuthState, AuthWorkload, initial_login_index};
