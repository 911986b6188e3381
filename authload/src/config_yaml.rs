use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use authload_auth::{AuthConfig, ChainConfig, ChainMethod, ScenarioOverride, TokenConfig};
use authload_core::Stage;
use serde::{Deserialize, Serialize};

/// On-disk config. Every key is optional; missing keys keep the built-in default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ConfigYaml {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_rps: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signup_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_duration: Option<YamlDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ramp_up: Option<YamlDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ramp_down: Option<YamlDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graceful_stop: Option<YamlDuration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pregen_users: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_batch: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_timeout: Option<YamlDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_failure_log_limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<YamlDuration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expect_signup_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expect_login_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict_result_code: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_chain: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainYaml>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenYaml>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_login: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_signup: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signup_pacing: Option<YamlDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_pacing: Option<YamlDuration>,

    /// Per-scenario overrides of the derived ramp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signup: Option<ScenarioOverrideYaml>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<ScenarioOverrideYaml>,

    /// Replaces the default threshold set entirely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<BTreeMap<String, ThresholdExprYaml>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ChainYaml {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeats: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_diag: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diag_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct TokenYaml {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_field_candidates: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ScenarioOverrideYaml {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_rate: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub time_unit: Option<YamlDuration>,

    #[serde(rename = "preAllocatedVUs")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_allocated_vus: Option<u64>,

    #[serde(rename = "maxVUs")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_vus: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stages: Option<Vec<StageYaml>>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub graceful_stop: Option<YamlDuration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StageYaml {
    pub target: u64,

    #[serde(default)]
    pub duration: YamlDuration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum ThresholdExprYaml {
    One(String),
    Many(Vec<String>),
}

impl ThresholdExprYaml {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    fn into_inner(self) -> Duration {
        self.0
    }
}

impl From<Duration> for YamlDuration {
    fn from(value: Duration) -> Self {
        Self(value)
    }
}

impl Serialize for YamlDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(self.0).to_string())
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let secs = u64::try_from(v).map_err(|_| E::custom("duration cannot be negative"))?;
                Ok(YamlDuration(Duration::from_secs(secs)))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("duration must be a non-negative, finite number"));
                }
                Ok(YamlDuration(Duration::from_secs_f64(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v.trim()).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }
        }

        deserializer.deserialize_any(V)
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

fn set_duration(slot: &mut Duration, value: Option<YamlDuration>) {
    set(slot, value.map(YamlDuration::into_inner));
}

impl ConfigYaml {
    pub(crate) fn parse(src: &str) -> anyhow::Result<Self> {
        if src.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(src).context("invalid config YAML")
    }

    /// Overlays this document on the built-in defaults.
    pub(crate) fn into_config(self) -> anyhow::Result<AuthConfig> {
        let mut cfg = AuthConfig::default();

        set(&mut cfg.base_url, self.base_url);
        set(&mut cfg.target_rps, self.target_rps);
        set(&mut cfg.signup_ratio, self.signup_ratio);
        set_duration(&mut cfg.test_duration, self.test_duration);
        set_duration(&mut cfg.ramp_up, self.ramp_up);
        set_duration(&mut cfg.ramp_down, self.ramp_down);
        set_duration(&mut cfg.graceful_stop, self.graceful_stop);

        set(&mut cfg.pregen_users, self.pregen_users);
        set(&mut cfg.setup_batch, self.setup_batch);
        set_duration(&mut cfg.setup_timeout, self.setup_timeout);
        set(&mut cfg.setup_failure_log_limit, self.setup_failure_log_limit);
        set_duration(&mut cfg.request_timeout, self.request_timeout);

        set(&mut cfg.expect_signup_code, self.expect_signup_code);
        set(&mut cfg.expect_login_code, self.expect_login_code);
        set(&mut cfg.strict_result_code, self.strict_result_code);

        set(&mut cfg.do_chain, self.do_chain);
        if let Some(chain) = self.chain {
            apply_chain(&mut cfg.chain, chain)?;
        }
        if let Some(token) = self.token {
            set(&mut cfg.token.scheme, token.scheme);
            set(&mut cfg.token.json_field_candidates, token.json_field_candidates);
        }

        set(&mut cfg.debug, self.debug);
        set(&mut cfg.disable_login, self.disable_login);
        set(&mut cfg.disable_signup, self.disable_signup);
        set_duration(&mut cfg.signup_pacing, self.signup_pacing);
        set_duration(&mut cfg.login_pacing, self.login_pacing);

        cfg.signup = self.signup.map(ScenarioOverrideYaml::into_override);
        cfg.login = self.login.map(ScenarioOverrideYaml::into_override);

        cfg.thresholds = self.thresholds.map(|map| {
            map.into_iter()
                .map(|(selector, exprs)| (selector, exprs.into_vec()))
                .collect()
        });

        Ok(cfg)
    }

    /// The fully resolved document, including the threshold set in effect.
    pub(crate) fn resolved(cfg: &AuthConfig) -> Self {
        let thresholds = cfg
            .thresholds()
            .into_iter()
            .map(|(selector, exprs)| (selector, ThresholdExprYaml::Many(exprs)))
            .collect();

        Self {
            base_url: Some(cfg.base_url.clone()),
            target_rps: Some(cfg.target_rps),
            signup_ratio: Some(cfg.signup_ratio),
            test_duration: Some(cfg.test_duration.into()),
            ramp_up: Some(cfg.ramp_up.into()),
            ramp_down: Some(cfg.ramp_down.into()),
            graceful_stop: Some(cfg.graceful_stop.into()),
            pregen_users: Some(cfg.pregen_users),
            setup_batch: Some(cfg.setup_batch),
            setup_timeout: Some(cfg.setup_timeout.into()),
            setup_failure_log_limit: Some(cfg.setup_failure_log_limit),
            request_timeout: Some(cfg.request_timeout.into()),
            expect_signup_code: Some(cfg.expect_signup_code.clone()),
            expect_login_code: Some(cfg.expect_login_code.clone()),
            strict_result_code: Some(cfg.strict_result_code),
            do_chain: Some(cfg.do_chain),
            chain: Some(ChainYaml::from(&cfg.chain)),
            token: Some(TokenYaml::from(&cfg.token)),
            debug: Some(cfg.debug),
            disable_login: Some(cfg.disable_login),
            disable_signup: Some(cfg.disable_signup),
            signup_pacing: Some(cfg.signup_pacing.into()),
            login_pacing: Some(cfg.login_pacing.into()),
            signup: cfg.signup.as_ref().map(ScenarioOverrideYaml::from),
            login: cfg.login.as_ref().map(ScenarioOverrideYaml::from),
            thresholds: Some(thresholds),
        }
    }
}

fn apply_chain(chain: &mut ChainConfig, yaml: ChainYaml) -> anyhow::Result<()> {
    if let Some(method) = yaml.method {
        chain.method = method
            .parse::<ChainMethod>()
            .map_err(|_| anyhow::anyhow!("invalid chain.method '{method}' (expected GET, POST, PUT or DELETE)"))?;
    }
    set(&mut chain.path, yaml.path);
    set(&mut chain.body, yaml.body);
    set(&mut chain.repeats, yaml.repeats);
    set(&mut chain.use_diag, yaml.use_diag);
    set(&mut chain.diag_ms, yaml.diag_ms);
    Ok(())
}

impl From<&ChainConfig> for ChainYaml {
    fn from(c: &ChainConfig) -> Self {
        Self {
            method: Some(c.method.to_string()),
            path: Some(c.path.clone()),
            body: Some(c.body.clone()),
            repeats: Some(c.repeats),
            use_diag: Some(c.use_diag),
            diag_ms: Some(c.diag_ms),
        }
    }
}

impl From<&TokenConfig> for TokenYaml {
    fn from(t: &TokenConfig) -> Self {
        Self {
            scheme: Some(t.scheme.clone()),
            json_field_candidates: Some(t.json_field_candidates.clone()),
        }
    }
}

impl ScenarioOverrideYaml {
    fn into_override(self) -> ScenarioOverride {
        ScenarioOverride {
            start_rate: self.start_rate,
            time_unit: self.time_unit.map(YamlDuration::into_inner),
            pre_allocated_vus: self.pre_allocated_vus,
            max_vus: self.max_vus,
            stages: self.stages.map(|stages| {
                stages
                    .into_iter()
                    .map(|s| Stage::new(s.duration.into_inner(), s.target))
                    .collect()
            }),
            graceful_stop: self.graceful_stop.map(YamlDuration::into_inner),
        }
    }
}

impl From<&ScenarioOverride> for ScenarioOverrideYaml {
    fn from(o: &ScenarioOverride) -> Self {
        Self {
            start_rate: o.start_rate,
            time_unit: o.time_unit.map(Into::into),
            pre_allocated_vus: o.pre_allocated_vus,
            max_vus: o.max_vus,
            stages: o.stages.as_ref().map(|stages| {
                stages
                    .iter()
                    .map(|s| StageYaml {
                        target: s.target,
                        duration: s.duration.into(),
                    })
                    .collect()
            }),
            graceful_stop: o.graceful_stop.map(Into::into),
        }
    }
}

/// Reads `path` (or nothing) and overlays it on the defaults.
pub(crate) async fn load(path: Option<&Path>) -> anyhow::Result<AuthConfig> {
    let doc = match path {
        Some(path) => {
            let src = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            ConfigYaml::parse(&src)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        }
        None => ConfigYaml::default(),
    };
    doc.into_config()
}

pub(crate) fn to_yaml(cfg: &AuthConfig) -> anyhow::Result<String> {
    serde_yaml::to_string(&ConfigYaml::resolved(cfg)).context("failed to render config YAML")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> AuthConfig {
        ConfigYaml::parse(src)
            .and_then(ConfigYaml::into_config)
            .unwrap_or_else(|e| panic!("{e:#}"))
    }

    #[test]
    fn empty_document_keeps_defaults() {
        assert_eq!(parse(""), AuthConfig::default());
        assert_eq!(parse("{}"), AuthConfig::default());
    }

    #[test]
    fn overlays_keys_on_defaults() {
        let cfg = parse(
            r#"
baseUrl: http://127.0.0.1:9000
targetRps: 100
signupRatio: 0.5
testDuration: 2m
rampUp: 0
pregenUsers: 10
requestTimeout: 1.5
chain:
  method: post
  repeats: 5
  body: '{"x":1}'
token:
  jsonFieldCandidates: [jwt]
login:
  maxVUs: 50
  stages:
    - { target: 10, duration: 5s }
"#,
        );

        assert_eq!(cfg.base_url, "http://127.0.0.1:9000");
        assert_eq!(cfg.target_rps, 100);
        assert!((cfg.signup_ratio - 0.5).abs() < f64::EPSILON);
        assert_eq!(cfg.test_duration, Duration::from_secs(120));
        assert_eq!(cfg.ramp_up, Duration::ZERO);
        assert_eq!(cfg.ramp_down, Duration::from_secs(30));
        assert_eq!(cfg.pregen_users, 10);
        assert_eq!(cfg.request_timeout, Duration::from_millis(1500));
        assert_eq!(cfg.chain.method, ChainMethod::Post);
        assert_eq!(cfg.chain.repeats, 5);
        assert_eq!(cfg.chain.path, "/api/user/profile");
        assert_eq!(cfg.token.scheme, "Bearer");
        assert_eq!(cfg.token.json_field_candidates, vec!["jwt".to_string()]);

        let login = cfg.login.unwrap_or_else(|| panic!("login override missing"));
        assert_eq!(login.max_vus, Some(50));
        assert_eq!(
            login.stages,
            Some(vec![Stage::new(Duration::from_secs(5), 10)])
        );
        assert!(cfg.signup.is_none());
    }

    #[test]
    fn thresholds_accept_one_or_many() {
        let cfg = parse(
            r#"
thresholds:
  http_req_failed: "rate<0.01"
  "login_duration{endpoint:login}": ["p(95)<500", "p(99)<900"]
"#,
        );
        let thresholds = cfg.thresholds.unwrap_or_else(|| panic!("thresholds missing"));
        assert_eq!(
            thresholds,
            vec![
                ("http_req_failed".to_string(), vec!["rate<0.01".to_string()]),
                (
                    "login_duration{endpoint:login}".to_string(),
                    vec!["p(95)<500".to_string(), "p(99)<900".to_string()]
                ),
            ]
        );
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        assert!(ConfigYaml::parse("targetRPS: 10").is_err());
        assert!(ConfigYaml::parse("testDuration: soon").is_err());
        assert!(ConfigYaml::parse("rampUp: -1").is_err());

        let bad_method = ConfigYaml::parse("chain: { method: PATCH }")
            .and_then(ConfigYaml::into_config);
        assert!(bad_method.is_err());
    }

    #[test]
    fn resolved_document_parses_back_to_same_config() {
        let cfg = parse("targetRps: 12\nlogin: { startRate: 3 }\ndisableSignup: true");
        let yaml = to_yaml(&cfg).unwrap_or_else(|e| panic!("{e:#}"));
        assert!(yaml.contains("targetRps: 12"));
        assert!(yaml.contains("login_fail_rate"));

        let back = parse(&yaml);
        assert_eq!(back.target_rps, cfg.target_rps);
        assert_eq!(back.login, cfg.login);
        let mut expected = cfg.thresholds();
        expected.sort();
        assert_eq!(back.thresholds(), expected);
        assert_eq!(back.chain, cfg.chain);
    }
}
