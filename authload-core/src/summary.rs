use std::collections::BTreeMap;
use std::time::Duration;

use authload_metrics::{MetricSeriesSummary, Registry, TrendSummary};

use super::iteration_metrics::IterationMetricIds;
use super::request_metrics::RequestMetricIds;

#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub run_duration: Duration,
    pub scenarios: Vec<ScenarioSummary>,
    /// Every recorded series, sorted by name then tags.
    pub series: Vec<MetricSeriesSummary>,
}

#[derive(Debug, Default, Clone)]
pub struct ScenarioSummary {
    pub scenario: String,

    pub iterations_total: u64,
    pub dropped_iterations_total: u64,
    pub iteration_timeouts_total: u64,
    pub vus_max: i64,

    pub requests_total: u64,
    pub failed_requests_total: u64,
    /// Failed requests keyed by status code (`"error"` for transport failures).
    pub failures_by_status: BTreeMap<String, u64>,

    pub iteration_duration_ms: Option<TrendSummary>,
}

pub(crate) fn build_run_summary(
    metrics: &Registry,
    request_ids: RequestMetricIds,
    iteration_ids: IterationMetricIds,
    scenario_names: &[String],
    run_duration: Duration,
) -> RunSummary {
    let scenarios = scenario_names
        .iter()
        .map(|name| scenario_summary(metrics, request_ids, iteration_ids, name))
        .collect();

    RunSummary {
        run_duration,
        scenarios,
        series: metrics.summarize(),
    }
}

fn scenario_summary(
    metrics: &Registry,
    request_ids: RequestMetricIds,
    iteration_ids: IterationMetricIds,
    scenario: &str,
) -> ScenarioSummary {
    let counter = |id| {
        metrics
            .query(id)
            .where_tag("scenario", scenario)
            .sum_counter_total()
    };

    let (requests_total, failed_requests_total) = metrics
        .query(request_ids.http_req_failed)
        .where_tag("scenario", scenario)
        .sum_rate_total();

    let mut failures_by_status = BTreeMap::new();
    let status_key = metrics.resolve_key("status");
    let grouped = metrics
        .query(request_ids.http_req_failed)
        .where_tag("scenario", scenario)
        .group_by([status_key])
        .sum_rate();
    for (tags, (_total, hits)) in grouped {
        if hits == 0 {
            continue;
        }
        let status = tags
            .get(status_key)
            .map_or_else(|| "error".to_string(), |v| metrics.key_str(v));
        *failures_by_status.entry(status).or_insert(0) += hits;
    }

    let iteration_duration = metrics
        .query(iteration_ids.iteration_duration)
        .where_tag("scenario", scenario)
        .merge_trend_total();

    ScenarioSummary {
        scenario: scenario.to_string(),
        iterations_total: counter(iteration_ids.iterations),
        dropped_iterations_total: counter(iteration_ids.dropped_iterations),
        iteration_timeouts_total: counter(iteration_ids.iteration_timeouts),
        vus_max: metrics
            .query(iteration_ids.vus_max)
            .where_tag("scenario", scenario)
            .max_gauge()
            .unwrap_or(0),
        requests_total,
        failed_requests_total,
        failures_by_status,
        iteration_duration_ms: (!iteration_duration.is_empty()).then(|| iteration_duration.summary()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request_metrics::RequestSample;

    #[test]
    fn summary_groups_failures_by_status() {
        let metrics = Registry::default();
        let req = RequestMetricIds::register(&metrics);
        let it = IterationMetricIds::register(&metrics);

        for status in [Some(200), Some(500), Some(500), None] {
            req.record_request(
                &metrics,
                RequestSample {
                    scenario: "login",
                    endpoint: "login",
                    status,
                    duration: Duration::from_millis(3),
                },
                &[],
            );
        }
        it.record_dropped(&metrics, "login", 2, &[]);

        let summary = build_run_summary(
            &metrics,
            req,
            it,
            &["login".to_string()],
            Duration::from_secs(1),
        );
        let s = &summary.scenarios[0];
        assert_eq!(s.requests_total, 4);
        assert_eq!(s.failed_requests_total, 3);
        assert_eq!(s.failures_by_status.get("500"), Some(&2));
        assert_eq!(s.failures_by_status.get("error"), Some(&1));
        assert_eq!(s.dropped_iterations_total, 2);
        assert!(s.iteration_duration_ms.is_none());
        assert!(!summary.series.is_empty());
    }
}
