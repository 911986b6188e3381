use std::time::Duration;

use authload_core::{DEFAULT_SETUP_FAILURE_LOG_LIMIT, ScenarioOptions, SetupOptions, Stage};

use crate::error::{Error, Result};

pub const SIGNUP_SCENARIO: &str = "signup_scn";
pub const LOGIN_SCENARIO: &str = "login_scn";

/// Exec names the workload dispatches on.
pub const EXEC_SIGNUP: &str = "signup";
pub const EXEC_LOGIN: &str = "login";

/// Scenario name tagged on calls made while provisioning users.
pub const SETUP_SCENARIO: &str = "setup";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive, serialize_all = "UPPERCASE")]
pub enum ChainMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl ChainMethod {
    pub fn as_http(self) -> http::Method {
        match self {
            Self::Get => http::Method::GET,
            Self::Post => http::Method::POST,
            Self::Put => http::Method::PUT,
            Self::Delete => http::Method::DELETE,
        }
    }

    pub fn sends_body(self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }
}

/// Follow-up calls made with the token of a successful login.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    pub method: ChainMethod,
    pub path: String,
    pub body: String,
    /// Calls per successful login; `0` behaves as `1`.
    pub repeats: u32,
    /// Call `/diag/db-poke?ms={diag_ms}` instead of `path`.
    pub use_diag: bool,
    pub diag_ms: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            method: ChainMethod::Get,
            path: "/api/user/profile".to_string(),
            body: String::new(),
            repeats: 3,
            use_diag: false,
            diag_ms: 50,
        }
    }
}

impl ChainConfig {
    pub fn effective_repeats(&self) -> u32 {
        self.repeats.max(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenConfig {
    pub scheme: String,
    /// Dotted JSON paths tried in order when the token is not in a header.
    pub json_field_candidates: Vec<String>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            scheme: "Bearer".to_string(),
            json_field_candidates: [
                "accessToken",
                "data.accessToken",
                "token",
                "jwt",
                "result.accessToken",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}

/// Replaces parts of a derived scenario.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioOverride {
    pub start_rate: Option<u64>,
    pub time_unit: Option<Duration>,
    pub pre_allocated_vus: Option<u64>,
    pub max_vus: Option<u64>,
    pub stages: Option<Vec<Stage>>,
    pub graceful_stop: Option<Duration>,
}

/// Fully resolved run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthConfig {
    pub base_url: String,
    pub target_rps: u64,
    pub signup_ratio: f64,
    pub test_duration: Duration,
    pub ramp_up: Duration,
    pub ramp_down: Duration,
    pub graceful_stop: Duration,

    pub pregen_users: u64,
    pub setup_batch: u64,
    pub setup_timeout: Duration,
    pub setup_failure_log_limit: usize,
    pub request_timeout: Duration,

    pub expect_signup_code: String,
    pub expect_login_code: String,
    /// Reject 2xx responses whose result code differs from the expected one.
    pub strict_result_code: bool,

    pub do_chain: bool,
    pub chain: ChainConfig,
    pub token: TokenConfig,

    pub debug: bool,
    pub disable_login: bool,
    pub disable_signup: bool,
    pub signup_pacing: Duration,
    pub login_pacing: Duration,

    pub signup: Option<ScenarioOverride>,
    pub login: Option<ScenarioOverride>,

    /// `None` selects [`AuthConfig::default_thresholds`].
    pub thresholds: Option<Vec<(String, Vec<String>)>>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            target_rps: 40,
            signup_ratio: 0.2,
            test_duration: Duration::from_secs(60),
            ramp_up: Duration::from_secs(30),
            ramp_down: Duration::from_secs(30),
            graceful_stop: Duration::from_secs(30),
            pregen_users: 100,
            setup_batch: 50,
            setup_timeout: Duration::from_secs(600),
            setup_failure_log_limit: DEFAULT_SETUP_FAILURE_LOG_LIMIT,
            request_timeout: Duration::from_secs(30),
            expect_signup_code: "USER_201".to_string(),
            expect_login_code: String::new(),
            strict_result_code: false,
            do_chain: true,
            chain: ChainConfig::default(),
            token: TokenConfig::default(),
            debug: false,
            disable_login: false,
            disable_signup: false,
            signup_pacing: Duration::from_millis(100),
            login_pacing: Duration::from_millis(50),
            signup: None,
            login: None,
            thresholds: None,
        }
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<()> {
        let base = self.base_url.as_str();
        let scheme_ok = base.starts_with("http://") || base.starts_with("https://");
        if !scheme_ok || base.split_once("://").is_some_and(|(_, rest)| rest.is_empty()) {
            return Err(Error::InvalidBaseUrl(self.base_url.clone()));
        }
        if !(0.0..=1.0).contains(&self.signup_ratio) {
            return Err(Error::InvalidSignupRatio(self.signup_ratio));
        }
        if self.setup_batch == 0 {
            return Err(Error::InvalidSetupBatch);
        }
        if !self.chain.use_diag && !self.chain.path.starts_with('/') {
            return Err(Error::InvalidChainPath(self.chain.path.clone()));
        }
        Ok(())
    }

    pub fn signup_rps(&self) -> u64 {
        ((self.target_rps as f64) * self.signup_ratio).floor().max(0.0) as u64
    }

    pub fn login_rps(&self) -> u64 {
        self.target_rps.saturating_sub(self.signup_rps())
    }

    pub fn signup_enabled(&self) -> bool {
        !self.disable_signup && self.signup_rps() > 0
    }

    pub fn login_enabled(&self) -> bool {
        !self.disable_login && self.login_rps() > 0
    }

    /// One ramping-arrival-rate scenario per enabled endpoint.
    pub fn scenario_options(&self) -> Result<Vec<ScenarioOptions>> {
        let mut out = Vec::with_capacity(2);
        if self.signup_enabled() {
            out.push(self.ramping(
                SIGNUP_SCENARIO,
                EXEC_SIGNUP,
                self.signup_rps(),
                10,
                self.signup_pacing,
                self.signup.as_ref(),
            ));
        }
        if self.login_enabled() {
            let mut login = self.ramping(
                LOGIN_SCENARIO,
                EXEC_LOGIN,
                self.login_rps(),
                20,
                self.login_pacing,
                self.login.as_ref(),
            );
            login.requires_setup_data = true;
            out.push(login);
        }

        if out.is_empty() {
            return Err(Error::NoScenarios);
        }
        Ok(out)
    }

    fn ramping(
        &self,
        name: &str,
        exec: &str,
        rate: u64,
        min_pre_allocated: u64,
        pacing: Duration,
        over: Option<&ScenarioOverride>,
    ) -> ScenarioOptions {
        let stages: Vec<Stage> = [
            Stage::new(self.ramp_up, rate),
            Stage::new(self.test_duration, rate),
            Stage::new(self.ramp_down, 0),
        ]
        .into_iter()
        .filter(|s| !s.duration.is_zero())
        .collect();

        let mut opts = ScenarioOptions {
            name: name.to_string(),
            exec: Some(exec.to_string()),
            executor: Some("ramping-arrival-rate".to_string()),
            start_rate: Some((rate / 5).max(1)),
            stages,
            time_unit: Some(Duration::from_secs(1)),
            pre_allocated_vus: Some(min_pre_allocated.max(rate.saturating_mul(2))),
            max_vus: Some(200u64.max(rate.saturating_mul(5))),
            graceful_stop: Some(self.graceful_stop),
            pacing: Some(pacing),
            ..Default::default()
        };

        if let Some(over) = over {
            if over.start_rate.is_some() {
                opts.start_rate = over.start_rate;
            }
            if over.time_unit.is_some() {
                opts.time_unit = over.time_unit;
            }
            if over.pre_allocated_vus.is_some() {
                opts.pre_allocated_vus = over.pre_allocated_vus;
            }
            if over.max_vus.is_some() {
                opts.max_vus = over.max_vus;
            }
            if let Some(stages) = &over.stages {
                opts.stages = stages.clone();
            }
            if over.graceful_stop.is_some() {
                opts.graceful_stop = over.graceful_stop;
            }
        }

        opts
    }

    /// Defaults for the enabled scenarios; series no enabled scenario writes are left out.
    pub fn default_thresholds(&self) -> Vec<(String, Vec<String>)> {
        let mut out = vec![("http_req_failed".to_string(), vec!["rate<0.02".to_string()])];
        let mut push = |selector: &str, expr: &str| {
            out.push((selector.to_string(), vec![expr.to_string()]));
        };

        if self.login_enabled() {
            push("login_duration{endpoint:login}", "p(95)<500");
        }
        if self.signup_enabled() {
            push("signup_duration{endpoint:signup}", "p(95)<800");
        }
        if self.chain_enabled() {
            push("chain_duration{endpoint:chain}", "p(95)<500");
        }
        if self.signup_enabled() {
            push("signup_fail_rate", "rate<0.05");
        }
        if self.login_enabled() {
            push("login_fail_rate", "rate<0.02");
        }
        if self.chain_enabled() {
            push("chain_fail_rate", "rate<0.02");
        }
        out
    }

    pub fn thresholds(&self) -> Vec<(String, Vec<String>)> {
        self.thresholds
            .clone()
            .unwrap_or_else(|| self.default_thresholds())
    }

    pub fn chain_enabled(&self) -> bool {
        self.login_enabled() && self.do_chain
    }

    /// Users are only provisioned when the login scenario will run.
    pub fn setup_options(&self) -> SetupOptions {
        SetupOptions {
            count: if self.login_enabled() {
                self.pregen_users
            } else {
                0
            },
            batch_size: self.setup_batch,
            timeout: self.setup_timeout,
            failure_log_limit: self.setup_failure_log_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_rates_from_target_and_ratio() {
        let cfg = AuthConfig::default();
        assert_eq!(cfg.signup_rps(), 8);
        assert_eq!(cfg.login_rps(), 32);

        let cfg = AuthConfig {
            target_rps: 7,
            signup_ratio: 0.1,
            ..Default::default()
        };
        assert_eq!(cfg.signup_rps(), 0);
        assert_eq!(cfg.login_rps(), 7);
        assert!(!cfg.signup_enabled());
    }

    #[test]
    fn default_scenarios_match_ramp_profile() {
        let cfg = AuthConfig::default();
        let scenarios = cfg.scenario_options().unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(scenarios.len(), 2);

        let signup = &scenarios[0];
        assert_eq!(signup.name, SIGNUP_SCENARIO);
        assert_eq!(signup.start_rate, Some(1));
        assert_eq!(signup.pre_allocated_vus, Some(16));
        assert_eq!(signup.max_vus, Some(200));
        assert!(!signup.requires_setup_data);
        assert_eq!(
            signup.stages,
            vec![
                Stage::new(Duration::from_secs(30), 8),
                Stage::new(Duration::from_secs(60), 8),
                Stage::new(Duration::from_secs(30), 0),
            ]
        );

        let login = &scenarios[1];
        assert_eq!(login.name, LOGIN_SCENARIO);
        assert_eq!(login.exec.as_deref(), Some(EXEC_LOGIN));
        assert_eq!(login.start_rate, Some(6));
        assert_eq!(login.pre_allocated_vus, Some(64));
        assert_eq!(login.max_vus, Some(200));
        assert!(login.requires_setup_data);
        assert_eq!(login.pacing, Some(Duration::from_millis(50)));
    }

    #[test]
    fn overrides_replace_derived_fields() {
        let cfg = AuthConfig {
            disable_signup: true,
            ramp_up: Duration::ZERO,
            login: Some(ScenarioOverride {
                max_vus: Some(500),
                ..Default::default()
            }),
            ..Default::default()
        };
        let scenarios = cfg.scenario_options().unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].max_vus, Some(500));
        // Zero-length ramp-up is skipped.
        assert_eq!(scenarios[0].stages.len(), 2);
    }

    #[test]
    fn no_enabled_scenarios_is_an_error() {
        let cfg = AuthConfig {
            disable_login: true,
            disable_signup: true,
            ..Default::default()
        };
        assert!(matches!(cfg.scenario_options(), Err(Error::NoScenarios)));
    }

    #[test]
    fn default_thresholds_follow_enabled_scenarios() {
        let all = AuthConfig::default().default_thresholds();
        assert_eq!(all.len(), 7);
        assert_eq!(all[0].0, "http_req_failed");

        let login_only = AuthConfig {
            disable_signup: true,
            do_chain: false,
            ..Default::default()
        }
        .default_thresholds();
        let selectors: Vec<&str> = login_only.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(
            selectors,
            vec![
                "http_req_failed",
                "login_duration{endpoint:login}",
                "login_fail_rate"
            ]
        );
    }

    #[test]
    fn setup_is_skipped_without_login() {
        let cfg = AuthConfig {
            disable_login: true,
            ..Default::default()
        };
        assert_eq!(cfg.setup_options().count, 0);
        assert_eq!(AuthConfig::default().setup_options().count, 100);
    }

    #[test]
    fn validate_rejects_bad_input() {
        let bad_url = AuthConfig {
            base_url: "localhost:8080".to_string(),
            ..Default::default()
        };
        assert!(matches!(bad_url.validate(), Err(Error::InvalidBaseUrl(_))));

        let bad_ratio = AuthConfig {
            signup_ratio: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            bad_ratio.validate(),
            Err(Error::InvalidSignupRatio(_))
        ));

        assert!(AuthConfig::default().validate().is_ok());
    }

    #[test]
    fn chain_method_parses_case_insensitively() {
        assert_eq!("post".parse::<ChainMethod>().ok(), Some(ChainMethod::Post));
        assert_eq!(ChainMethod::Delete.to_string(), "DELETE");
        assert!(ChainMethod::Put.sends_body());
        assert!(!ChainMethod::Get.sends_body());
    }
}
