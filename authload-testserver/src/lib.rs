//! In-process mock of the authentication API the load generator targets.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tokio::time::{Duration, sleep};

pub const PATH_SIGNUP: &str = "/api/auth/sign-up";
pub const PATH_LOGIN: &str = "/api/auth/login";
pub const PATH_PROFILE: &str = "/api/user/profile";
pub const PATH_DB_POKE: &str = "/diag/db-poke";

pub const SIGNUP_OK_CODE: &str = "USER_201";
pub const SIGNUP_CONFLICT_CODE: &str = "USER_409";
pub const LOGIN_OK_CODE: &str = "AUTH_200";

const MAX_POKE_MS: u64 = 1_000;

/// Where a successful login puts the access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenPlacement {
    /// `Authorization: Bearer <token>` response header.
    Header,
    /// `{"data": {"accessToken": "<token>"}}`.
    #[default]
    NestedBody,
    /// `{"accessToken": "<token>"}`.
    TopLevelBody,
    /// Successful login without any token.
    Omitted,
}

#[derive(Debug, Clone, Default)]
pub struct TestServerBehavior {
    /// Signups beyond this many are rejected with 409.
    pub signup_accept_limit: Option<u64>,
    /// Every login is rejected with 401.
    pub fail_logins: bool,
    /// The profile endpoint answers 500 to authorized calls.
    pub fail_chain: bool,
    pub token_placement: TokenPlacement,
    /// Extra latency added to every login.
    pub login_delay: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    signup_requests: Arc<AtomicU64>,
    signup_accepted: Arc<AtomicU64>,
    login_requests: Arc<AtomicU64>,
    login_succeeded: Arc<AtomicU64>,
    chain_requests: Arc<AtomicU64>,
    chain_authorized: Arc<AtomicU64>,
    saw_json_content_type: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn track_content_type(&self, headers: &HeaderMap) {
        if headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_ascii_lowercase().starts_with("application/json"))
        {
            Self::inc(&self.saw_json_content_type);
        }
    }

    pub fn signup_requests(&self) -> u64 {
        self.signup_requests.load(Ordering::Relaxed)
    }

    pub fn signup_accepted(&self) -> u64 {
        self.signup_accepted.load(Ordering::Relaxed)
    }

    pub fn login_requests(&self) -> u64 {
        self.login_requests.load(Ordering::Relaxed)
    }

    pub fn login_succeeded(&self) -> u64 {
        self.login_succeeded.load(Ordering::Relaxed)
    }

    /// Profile and db-poke calls.
    pub fn chain_requests(&self) -> u64 {
        self.chain_requests.load(Ordering::Relaxed)
    }

    /// Chain calls that carried a token issued by this server.
    pub fn chain_authorized(&self) -> u64 {
        self.chain_authorized.load(Ordering::Relaxed)
    }

    pub fn saw_json_content_type(&self) -> u64 {
        self.saw_json_content_type.load(Ordering::Relaxed)
    }
}

#[derive(Clone)]
struct AppState {
    stats: TestServerStats,
    behavior: Arc<TestServerBehavior>,
    /// loginId -> password
    users: Arc<Mutex<HashMap<String, String>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupBody {
    login_id: String,
    password: String,
    confirm_password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody {
    login_id: String,
    password: String,
}

fn result(status: StatusCode, code: &str) -> Response {
    (status, Json(json!({ "resultCode": code }))).into_response()
}

fn token_for(login_id: &str) -> String {
    format!("tok-{login_id}")
}

fn bearer_login_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|t| t.strip_prefix("tok-"))
}

async fn handle_signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    TestServerStats::inc(&state.stats.signup_requests);
    state.stats.track_content_type(&headers);

    let Ok(req) = serde_json::from_slice::<SignupBody>(&body) else {
        return result(StatusCode::BAD_REQUEST, "USER_400");
    };
    if req
        .confirm_password
        .as_deref()
        .is_some_and(|c| c != req.password)
    {
        return result(StatusCode::BAD_REQUEST, "USER_400");
    }

    let mut users = state.users.lock().await;
    let over_limit = state
        .behavior
        .signup_accept_limit
        .is_some_and(|limit| users.len() as u64 >= limit);
    if over_limit || users.contains_key(&req.login_id) {
        return result(StatusCode::CONFLICT, SIGNUP_CONFLICT_CODE);
    }
    users.insert(req.login_id, req.password);
    drop(users);

    TestServerStats::inc(&state.stats.signup_accepted);
    result(StatusCode::CREATED, SIGNUP_OK_CODE)
}

async fn handle_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    TestServerStats::inc(&state.stats.login_requests);
    state.stats.track_content_type(&headers);

    if !state.behavior.login_delay.is_zero() {
        sleep(state.behavior.login_delay).await;
    }

    let Ok(req) = serde_json::from_slice::<LoginBody>(&body) else {
        return result(StatusCode::BAD_REQUEST, "AUTH_400");
    };

    let known = state
        .users
        .lock()
        .await
        .get(&req.login_id)
        .is_some_and(|p| *p == req.password);
    if state.behavior.fail_logins || !known {
        return result(StatusCode::UNAUTHORIZED, "AUTH_401");
    }

    TestServerStats::inc(&state.stats.login_succeeded);
    let token = token_for(&req.login_id);
    match state.behavior.token_placement {
        TokenPlacement::Header => {
            let mut res = result(StatusCode::OK, LOGIN_OK_CODE);
            if let Ok(v) = HeaderValue::from_str(&format!("Bearer {token}")) {
                res.headers_mut().insert("authorization", v);
            }
            res
        }
        TokenPlacement::NestedBody => Json(json!({
            "resultCode": LOGIN_OK_CODE,
            "data": { "accessToken": token },
        }))
        .into_response(),
        TokenPlacement::TopLevelBody => Json(json!({
            "resultCode": LOGIN_OK_CODE,
            "accessToken": token,
        }))
        .into_response(),
        TokenPlacement::Omitted => result(StatusCode::OK, LOGIN_OK_CODE),
    }
}

async fn handle_profile(State(state): State<AppState>, headers: HeaderMap) -> Response {
    TestServerStats::inc(&state.stats.chain_requests);

    let Some(login_id) = bearer_login_id(&headers) else {
        return result(StatusCode::UNAUTHORIZED, "AUTH_401");
    };
    if !state.users.lock().await.contains_key(login_id) {
        return result(StatusCode::UNAUTHORIZED, "AUTH_401");
    }
    TestServerStats::inc(&state.stats.chain_authorized);

    if state.behavior.fail_chain {
        return result(StatusCode::INTERNAL_SERVER_ERROR, "SERVER_500");
    }
    let profile: Value = json!({ "resultCode": "USER_200", "data": { "loginId": login_id } });
    Json(profile).into_response()
}

async fn handle_db_poke(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    TestServerStats::inc(&state.stats.chain_requests);
    if bearer_login_id(&headers).is_some() {
        TestServerStats::inc(&state.stats.chain_authorized);
    }

    let ms = query
        .get("ms")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
        .min(MAX_POKE_MS);
    sleep(Duration::from_millis(ms)).await;

    if state.behavior.fail_chain {
        return result(StatusCode::INTERNAL_SERVER_ERROR, "SERVER_500");
    }
    Json(json!({ "ok": true, "ms": ms })).into_response()
}

pub fn router(stats: TestServerStats, behavior: TestServerBehavior) -> Router {
    let state = AppState {
        stats,
        behavior: Arc::new(behavior),
        users: Arc::new(Mutex::new(HashMap::new())),
    };

    Router::new()
        .route(PATH_SIGNUP, post(handle_signup))
        .route(PATH_LOGIN, post(handle_login))
        .route(PATH_PROFILE, get(handle_profile).post(handle_profile))
        .route(PATH_DB_POKE, get(handle_db_poke))
        .with_state(state)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(TestServerBehavior::default()).await
    }

    pub async fn start_with(behavior: TestServerBehavior) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone(), behavior);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
