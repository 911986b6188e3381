use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Accepts humantime strings (`10s`, `1m30s`, `250ms`) or bare integer seconds.
fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s)
        .map_err(|err| format!("invalid duration '{s}' ({err}; expected e.g. 10s, 250ms, 1m)"))
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable progress and summary.
    HumanReadable,
    /// Emit JSON progress and summary lines (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "authload",
    author,
    version,
    about = "Arrival-rate load generator for signup/login authentication APIs",
    long_about = "authload drives signup and login (+ chained authenticated) traffic against an auth API at ramping arrival rates, records latency and failure metrics, and evaluates thresholds at the end of the run.\n\nA YAML config file provides every setting; CLI flags override the file. Without a config file the built-in defaults are used.",
    after_help = "Examples:\n  authload run\n  authload run load.yaml --target-rps 100 --duration 2m\n  authload run load.yaml --output json --log-level warn\n  authload print-config load.yaml"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Provision users, run the signup/login scenarios and evaluate thresholds
    Run(RunArgs),

    /// Print the resolved configuration (file + defaults) as YAML
    PrintConfig(PrintConfigArgs),
}

#[derive(Debug, Args)]
pub struct PrintConfigArgs {
    /// Path to the YAML config
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the YAML config
    pub config: Option<PathBuf>,

    /// Target API base URL (e.g. http://localhost:8080)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Combined target arrival rate (iterations/s) across signup and login
    #[arg(long)]
    pub target_rps: Option<u64>,

    /// Length of the steady stage (e.g. 30s, 2m)
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Accounts to provision before the login scenario starts
    #[arg(long)]
    pub pregen_users: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Log level when RUST_LOG is not set
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,
}
