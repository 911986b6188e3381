use std::io::Write as _;
use std::process::{Command, Output};

use anyhow::Context as _;
use authload_testserver::TestServer;

fn status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn ensure_code(out: &Output, expected: i32) -> anyhow::Result<()> {
    anyhow::ensure!(
        status_code(out.status) == expected,
        "expected exit code {expected}, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

fn write_config(yaml: &str) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .context("create temp config")?;
    file.write_all(yaml.as_bytes()).context("write temp config")?;
    Ok(file)
}

/// A one-second flat run at 20 iterations/s split evenly between signup and login.
fn short_run_config(base_url: &str, thresholds: &str) -> String {
    format!(
        r#"baseUrl: {base_url}
targetRps: 20
signupRatio: 0.5
testDuration: 1s
rampUp: 0s
rampDown: 0s
gracefulStop: 2s
pregenUsers: 5
setupBatch: 5
setupTimeout: 10s
requestTimeout: 2s
signupPacing: 0s
loginPacing: 0s
thresholds:
{thresholds}
"#
    )
}

async fn run_authload(args: Vec<String>) -> anyhow::Result<Output> {
    let exe = env!("CARGO_BIN_EXE_authload");
    tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .args(&args)
            .env_remove("RUST_LOG")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run authload binary")
}

fn run_args(config: &tempfile::NamedTempFile, extra: &[&str]) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        config.path().display().to_string(),
        "--log-level".to_string(),
        "warn".to_string(),
    ];
    args.extend(extra.iter().map(|s| s.to_string()));
    args
}

#[test]
fn invalid_flags_exit_30() -> anyhow::Result<()> {
    let exe = env!("CARGO_BIN_EXE_authload");

    let out = Command::new(exe)
        .arg("run")
        .arg("--duration")
        .arg("10x")
        .output()
        .context("run authload binary")?;

    ensure_code(&out, 30)
}

#[tokio::test]
async fn unknown_config_key_exits_30() -> anyhow::Result<()> {
    let config = write_config("targetRPS: 10\n")?;
    let out = run_authload(run_args(&config, &[])).await?;

    ensure_code(&out, 30)?;
    anyhow::ensure!(
        String::from_utf8_lossy(&out.stderr).contains("targetRPS"),
        "stderr should name the bad key:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

#[tokio::test]
async fn invalid_threshold_exits_30() -> anyhow::Result<()> {
    let config = write_config("thresholds:\n  http_req_failed: \"rate~0.1\"\n")?;
    let out = run_authload(run_args(&config, &[])).await?;

    ensure_code(&out, 30)
}

#[tokio::test]
async fn empty_user_pool_exits_20() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let config = write_config(&short_run_config(
        server.base_url(),
        "  http_req_failed: \"rate<0.5\"",
    ))?;

    let out = run_authload(run_args(&config, &["--pregen-users", "0"])).await?;
    let login_requests = server.stats().login_requests();
    server.shutdown().await;

    ensure_code(&out, 20)?;
    anyhow::ensure!(
        login_requests == 0,
        "no iteration should run after a fatal setup, saw {login_requests} logins"
    );
    Ok(())
}

#[tokio::test]
async fn thresholds_failed_exit_11() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let config = write_config(&short_run_config(
        server.base_url(),
        "  http_req_duration: \"p(95)<0.001\"",
    ))?;

    let out = run_authload(run_args(&config, &[])).await?;
    server.shutdown().await;

    ensure_code(&out, 11)?;
    let stdout = String::from_utf8_lossy(&out.stdout);
    anyhow::ensure!(
        stdout.contains("✗ http_req_duration p(95)<0.001"),
        "summary should mark the failed threshold:\n{stdout}"
    );
    Ok(())
}

#[tokio::test]
async fn healthy_run_exits_0_with_json_summary() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let config = write_config(&short_run_config(
        server.base_url(),
        "  http_req_failed: \"rate<0.5\"\n  \"login_duration{endpoint:login}\": \"p(95)<2000\"",
    ))?;

    let out = run_authload(run_args(&config, &["--output", "json"])).await?;
    let signups = server.stats().signup_requests();
    let logins = server.stats().login_succeeded();
    let chained = server.stats().chain_authorized();
    server.shutdown().await;

    ensure_code(&out, 0)?;
    anyhow::ensure!(signups >= 5, "expected setup + signup traffic, saw {signups}");
    anyhow::ensure!(logins > 0, "expected successful logins");
    anyhow::ensure!(chained > 0, "expected chained calls with the login token");

    let stdout = String::from_utf8_lossy(&out.stdout);
    let summary = stdout
        .lines()
        .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
        .find(|v| v.get("kind").and_then(serde_json::Value::as_str) == Some("summary"))
        .context("missing summary line")?;

    anyhow::ensure!(
        summary.get("thresholds_passed").and_then(serde_json::Value::as_bool) == Some(true),
        "thresholds should pass:\n{summary}"
    );
    anyhow::ensure!(
        summary.pointer("/setup/accepted").and_then(serde_json::Value::as_u64) == Some(5),
        "setup should provision all users:\n{summary}"
    );
    Ok(())
}

#[tokio::test]
async fn print_config_renders_resolved_yaml() -> anyhow::Result<()> {
    let config = write_config("targetRps: 7\ndisableSignup: true\n")?;
    let out = run_authload(vec![
        "print-config".to_string(),
        config.path().display().to_string(),
    ])
    .await?;

    ensure_code(&out, 0)?;
    let stdout = String::from_utf8_lossy(&out.stdout);
    anyhow::ensure!(stdout.contains("targetRps: 7"), "stdout:\n{stdout}");
    anyhow::ensure!(stdout.contains("login_fail_rate"), "stdout:\n{stdout}");
    anyhow::ensure!(!stdout.contains("signup_fail_rate"), "stdout:\n{stdout}");
    Ok(())
}
