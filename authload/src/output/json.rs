use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::sync::Arc;

use authload_metrics::{MetricValue, TrendSummary};

use super::OutputFormatter;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _base_url: &str, _scenarios: &[authload_core::ScenarioConfig]) {}

    fn print_setup(&self, report: &authload_core::SetupReport) {
        emit_json_line(&build_setup_line(report));
    }

    fn progress(&self) -> Option<authload_core::ProgressFn> {
        Some(Arc::new(move |u| {
            let line = build_progress_line(&u);
            emit_json_line(&line);
        }))
    }

    fn print_summary(
        &self,
        summary: &authload_core::RunSummary,
        setup: &authload_core::SetupReport,
        thresholds: &[authload_core::ThresholdOutcome],
    ) -> anyhow::Result<()> {
        let line = build_summary_line(summary, setup, thresholds);
        emit_json_line(&line);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub scenario: String,
    pub elapsed_secs: f64,
    pub interval_secs: f64,

    pub stage: Option<usize>,
    pub stages: Option<usize>,
    pub target_rate: Option<u64>,

    pub active_vus: u64,
    pub max_vus: u64,
    pub in_flight: u64,

    pub iterations_total: u64,
    pub iterations_per_sec: f64,
    pub requests_total: u64,
    pub requests_per_sec: f64,
    pub failed_requests_total: u64,
    pub dropped_iterations_total: u64,
}

fn build_progress_line(u: &authload_core::ProgressUpdate) -> JsonProgressLine {
    let stage = u.progress.stage.as_ref();

    JsonProgressLine {
        kind: "progress",
        scenario: u.scenario.clone(),
        elapsed_secs: u.elapsed.as_secs_f64(),
        interval_secs: u.interval.as_secs_f64(),

        stage: stage.map(|s| s.stage),
        stages: stage.map(|s| s.stages),
        target_rate: stage.map(|s| s.current_target),

        active_vus: u.progress.active_vus,
        max_vus: u.progress.max_vus,
        in_flight: u.progress.in_flight,

        iterations_total: u.metrics.iterations_total,
        iterations_per_sec: u.metrics.iterations_per_sec_now,
        requests_total: u.metrics.requests_total,
        requests_per_sec: u.metrics.requests_per_sec_now,
        failed_requests_total: u.metrics.failed_requests_total,
        dropped_iterations_total: u.metrics.dropped_iterations_total,
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSetupLine {
    pub kind: &'static str,
    pub requested: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub elapsed_secs: f64,
}

fn build_setup_line(report: &authload_core::SetupReport) -> JsonSetupLine {
    JsonSetupLine {
        kind: "setup",
        requested: report.requested,
        accepted: report.accepted,
        rejected: report.rejected,
        elapsed_secs: report.elapsed.as_secs_f64(),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub run_duration_secs: f64,
    pub setup: JsonSetupLine,
    pub scenarios: Vec<JsonScenarioSummary>,
    pub totals: JsonTotals,
    pub metrics: Vec<JsonMetricSeries>,
    pub thresholds: Vec<JsonThreshold>,
    pub thresholds_passed: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonScenarioSummary {
    pub scenario: String,
    pub iterations_total: u64,
    pub dropped_iterations_total: u64,
    pub iteration_timeouts_total: u64,
    pub vus_max: i64,
    pub requests_total: u64,
    pub failed_requests_total: u64,
    pub failures_by_status: BTreeMap<String, u64>,
    pub iteration_duration: Option<JsonTrend>,
}

#[derive(Debug, Serialize, Default)]
pub(crate) struct JsonTotals {
    pub iterations_total: u64,
    pub dropped_iterations_total: u64,
    pub requests_total: u64,
    pub failed_requests_total: u64,
}

/// Trend statistics in milliseconds.
#[derive(Debug, Serialize)]
pub(crate) struct JsonTrend {
    pub count: u64,
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub med: Option<f64>,
    pub max: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

impl From<&TrendSummary> for JsonTrend {
    fn from(t: &TrendSummary) -> Self {
        Self {
            count: t.count,
            avg: t.mean,
            min: t.min,
            med: t.p50,
            max: t.max,
            p90: t.p90,
            p95: t.p95,
            p99: t.p99,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonMetricSeries {
    pub name: String,
    pub kind: String,
    pub tags: BTreeMap<String, String>,
    #[serde(flatten)]
    pub value: JsonMetricValue,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum JsonMetricValue {
    Counter { value: u64 },
    Gauge { value: i64 },
    Rate { total: u64, hits: u64, rate: Option<f64> },
    Trend { trend: JsonTrend },
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonThreshold {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
    pub passed: bool,
}

fn build_summary_line(
    summary: &authload_core::RunSummary,
    setup: &authload_core::SetupReport,
    thresholds: &[authload_core::ThresholdOutcome],
) -> JsonSummaryLine {
    let mut totals = JsonTotals::default();
    let scenarios = summary
        .scenarios
        .iter()
        .map(|s| {
            totals.iterations_total = totals.iterations_total.saturating_add(s.iterations_total);
            totals.dropped_iterations_total = totals
                .dropped_iterations_total
                .saturating_add(s.dropped_iterations_total);
            totals.requests_total = totals.requests_total.saturating_add(s.requests_total);
            totals.failed_requests_total = totals
                .failed_requests_total
                .saturating_add(s.failed_requests_total);

            JsonScenarioSummary {
                scenario: s.scenario.clone(),
                iterations_total: s.iterations_total,
                dropped_iterations_total: s.dropped_iterations_total,
                iteration_timeouts_total: s.iteration_timeouts_total,
                vus_max: s.vus_max,
                requests_total: s.requests_total,
                failed_requests_total: s.failed_requests_total,
                failures_by_status: s.failures_by_status.clone(),
                iteration_duration: s.iteration_duration_ms.as_ref().map(JsonTrend::from),
            }
        })
        .collect();

    let metrics = summary
        .series
        .iter()
        .map(|s| JsonMetricSeries {
            name: s.name.clone(),
            kind: s.kind.to_string(),
            tags: s.tags.iter().cloned().collect(),
            value: match &s.values {
                MetricValue::Counter(v) => JsonMetricValue::Counter { value: *v },
                MetricValue::Gauge(v) => JsonMetricValue::Gauge { value: *v },
                MetricValue::Rate { total, hits, rate } => JsonMetricValue::Rate {
                    total: *total,
                    hits: *hits,
                    rate: *rate,
                },
                MetricValue::Trend(t) => JsonMetricValue::Trend { trend: t.into() },
            },
        })
        .collect();

    let thresholds_json = thresholds
        .iter()
        .map(|t| JsonThreshold {
            metric: t.metric.clone(),
            expression: t.expression.clone(),
            observed: t.observed,
            passed: t.passed,
        })
        .collect();

    JsonSummaryLine {
        kind: "summary",
        run_duration_secs: summary.run_duration.as_secs_f64(),
        setup: build_setup_line(setup),
        scenarios,
        totals,
        metrics,
        thresholds: thresholds_json,
        thresholds_passed: authload_core::all_passed(thresholds),
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}
