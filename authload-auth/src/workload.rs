use authload_core::{IterationContext, WorkerInfo, Workload};

use crate::api::AuthApi;
use crate::config::{AuthConfig, EXEC_LOGIN, EXEC_SIGNUP};
use crate::metrics::AuthMetricIds;
use crate::payload::{Credentials, SignupPayload};
use crate::request::EndpointKind;
use crate::token::TokenExtractor;

const AUTH_LOG_BODY_LIMIT: usize = 800;
const CHAIN_LOG_BODY_LIMIT: usize = 400;

/// Per-worker state: the worker's position in the shared user list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthState {
    pub login_index: usize,
}

/// Index of the first user a worker logs in as; spreads workers evenly over the pool.
pub fn initial_login_index(scenario_vu: u64, max_vus: u64, users: usize) -> usize {
    if users == 0 {
        return 0;
    }
    let slot = u128::from(scenario_vu.saturating_sub(1));
    let users_u = users as u128;
    let idx = slot * users_u / u128::from(max_vus.max(1));
    usize::try_from(idx % users_u).unwrap_or(0)
}

/// Signup and login (+ chain) iterations against the auth API.
#[derive(Debug)]
pub struct AuthWorkload {
    api: AuthApi,
    ids: AuthMetricIds,
    tokens: TokenExtractor,
    expect_signup_code: String,
    expect_login_code: String,
    do_chain: bool,
    chain_repeats: u32,
    debug: bool,
}

impl AuthWorkload {
    pub fn new(cfg: &AuthConfig, api: AuthApi) -> Self {
        let ids = AuthMetricIds::register(&api.run_ctx().metrics);
        Self {
            ids,
            tokens: TokenExtractor::new(&cfg.token.json_field_candidates),
            expect_signup_code: cfg.expect_signup_code.clone(),
            expect_login_code: cfg.expect_login_code.clone(),
            do_chain: cfg.do_chain,
            chain_repeats: cfg.chain.effective_repeats(),
            debug: cfg.debug,
            api,
        }
    }

    pub fn metric_ids(&self) -> AuthMetricIds {
        self.ids
    }

    fn record(
        &self,
        scenario: &str,
        endpoint: EndpointKind,
        duration: std::time::Duration,
        ok: bool,
    ) {
        self.ids.record_call(
            &self.api.run_ctx().metrics,
            scenario,
            endpoint,
            duration,
            !ok,
        );
    }

    async fn sign_up(&self, scenario: &str) {
        let payload = SignupPayload::random(&mut rand::thread_rng());
        let req = self.api.requests.signup(&payload);

        let outcome = self.api.call(scenario, EndpointKind::Signup, req).await;
        let ok = self.api.accepts(&outcome, &self.expect_signup_code);
        self.record(scenario, EndpointKind::Signup, outcome.duration, ok);

        if self.debug && !ok {
            tracing::debug!(
                scenario,
                outcome = %outcome.describe(AUTH_LOG_BODY_LIMIT),
                "signup failed"
            );
        }
    }

    async fn log_in(&self, scenario: &str, users: &[Credentials], state: &mut AuthState) {
        if users.is_empty() {
            return;
        }
        let user = &users[state.login_index % users.len()];
        state.login_index = (state.login_index + 1) % users.len();

        let req = self.api.requests.login(user);
        let outcome = self.api.call(scenario, EndpointKind::Login, req).await;
        let ok = self.api.accepts(&outcome, &self.expect_login_code);
        self.record(scenario, EndpointKind::Login, outcome.duration, ok);

        if !ok {
            if self.debug {
                tracing::debug!(
                    scenario,
                    outcome = %outcome.describe(AUTH_LOG_BODY_LIMIT),
                    "login failed"
                );
            }
            return;
        }
        if !self.do_chain {
            return;
        }

        let token = outcome
            .response
            .as_ref()
            .ok()
            .and_then(|res| self.tokens.extract(res));
        if token.is_none() && self.debug {
            tracing::debug!(scenario, "no token in login response; chaining without authorization");
        }

        for _ in 0..self.chain_repeats {
            let req = self.api.requests.chain(token.as_deref());
            let chained = self.api.call(scenario, EndpointKind::Chain, req).await;
            let ok = chained.response.as_ref().is_ok_and(|res| res.is_success());
            self.record(scenario, EndpointKind::Chain, chained.duration, ok);

            if self.debug && !ok {
                tracing::debug!(
                    scenario,
                    outcome = %chained.describe(CHAIN_LOG_BODY_LIMIT),
                    "chain call failed"
                );
            }
        }
    }
}

impl Workload for AuthWorkload {
    type Shared = Vec<Credentials>;
    type State = AuthState;

    fn init_state(&self, worker: &WorkerInfo, shared: &Vec<Credentials>) -> AuthState {
        AuthState {
            login_index: initial_login_index(worker.scenario_vu, worker.max_vus, shared.len()),
        }
    }

    async fn iterate(&self, ctx: &IterationContext<Vec<Credentials>>, state: &mut AuthState) {
        let scenario = ctx.scenario();
        match ctx.exec() {
            EXEC_SIGNUP => self.sign_up(scenario).await,
            EXEC_LOGIN => self.log_in(scenario, &ctx.shared, state).await,
            other => {
                tracing::debug!(scenario, exec = other, "unknown exec; iteration skipped");
            }
        }
    }
}
