use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use authload_auth::{AuthApi, AuthConfig, AuthWorkload, SignupProvisioner};
use authload_core::{RunContext, ThresholdSet};
use authload_http::HttpClient;
use authload_metrics::Registry;

use crate::cli::{PrintConfigArgs, RunArgs};
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::{RunError, classify_core_error};
use crate::{config_yaml, logging};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let cfg = resolve_config(&args).await.map_err(RunError::InvalidInput)?;
    logging::init(args.log_level, cfg.debug);

    let scenarios = cfg
        .scenario_options()
        .context("invalid scenario config")
        .map_err(RunError::InvalidInput)?;
    let scenarios = authload_core::scenarios_from_options(scenarios).map_err(classify_core_error)?;
    let thresholds = parse_thresholds(&cfg)?;

    let out = output::formatter(args.output);
    out.print_header(&cfg.base_url, &scenarios);

    let run_ctx = Arc::new(RunContext::new(Arc::new(Registry::default())));
    let client = HttpClient::new(Some(CONNECT_TIMEOUT), Some(cfg.request_timeout));
    let api = AuthApi::new(&cfg, client, run_ctx.clone());

    let provisioner = Arc::new(SignupProvisioner::new(&cfg, api.clone()));
    let setup = authload_core::run_setup(provisioner, cfg.setup_options())
        .await
        .map_err(classify_core_error)?;
    out.print_setup(&setup.report);

    authload_core::ensure_setup_requirements(&scenarios, setup.items.len())
        .map_err(classify_core_error)?;

    tracing::info!(
        scenarios = scenarios.len(),
        users = setup.items.len(),
        "starting load"
    );

    let workload = Arc::new(AuthWorkload::new(&cfg, api));
    let summary = authload_core::run_scenarios(
        scenarios,
        run_ctx.clone(),
        workload,
        Arc::new(setup.items),
        out.progress(),
    )
    .await
    .context("run failed")
    .map_err(RunError::RuntimeError)?;

    let outcomes = authload_core::evaluate_thresholds(&run_ctx.metrics, &thresholds)
        .map_err(classify_core_error)?;

    out.print_summary(&summary, &setup.report, &outcomes)
        .map_err(RunError::RuntimeError)?;

    let passed = authload_core::all_passed(&outcomes);
    if !passed {
        let failed = outcomes.iter().filter(|o| !o.passed).count();
        tracing::warn!(failed, "thresholds failed");
    }
    Ok(ExitCode::from_thresholds(passed))
}

pub async fn print_config(args: PrintConfigArgs) -> Result<(), RunError> {
    let cfg = config_yaml::load(args.config.as_deref())
        .await
        .and_then(|cfg| {
            cfg.validate()?;
            Ok(cfg)
        })
        .map_err(RunError::InvalidInput)?;

    let yaml = config_yaml::to_yaml(&cfg).map_err(RunError::RuntimeError)?;
    print!("{yaml}");
    Ok(())
}

/// File, then CLI overrides, then validation.
async fn resolve_config(args: &RunArgs) -> anyhow::Result<AuthConfig> {
    let mut cfg = config_yaml::load(args.config.as_deref()).await?;

    if let Some(base_url) = &args.base_url {
        cfg.base_url = base_url.clone();
    }
    if let Some(rps) = args.target_rps {
        cfg.target_rps = rps;
    }
    if let Some(duration) = args.duration {
        cfg.test_duration = duration;
    }
    if let Some(users) = args.pregen_users {
        cfg.pregen_users = users;
    }

    cfg.validate().context("invalid config")?;
    Ok(cfg)
}

fn parse_thresholds(cfg: &AuthConfig) -> Result<Vec<ThresholdSet>, RunError> {
    let sets = cfg
        .thresholds()
        .into_iter()
        .map(|(selector, exprs)| {
            ThresholdSet::from_selector(&selector, exprs)
                .map_err(|error| anyhow::anyhow!("invalid threshold selector `{selector}`: {error}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()
        .map_err(RunError::InvalidInput)?;

    authload_core::validate_thresholds(&sets).map_err(classify_core_error)?;
    Ok(sets)
}
