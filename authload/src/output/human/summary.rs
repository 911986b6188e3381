use std::collections::BTreeMap;
use std::fmt::Write as _;

use authload_metrics::{MetricSeriesSummary, MetricValue, TrendSummary};

use super::format::*;

pub(crate) fn render(
    summary: &authload_core::RunSummary,
    setup: &authload_core::SetupReport,
    thresholds: &[authload_core::ThresholdOutcome],
) -> String {
    let mut out = String::new();
    let run_secs = summary.run_duration.as_secs_f64().max(1e-9);

    writeln!(
        &mut out,
        "summary (run {})",
        format_duration(summary.run_duration)
    )
    .ok();
    writeln!(
        &mut out,
        "setup: requested {} accepted {} rejected {} in {}",
        setup.requested,
        setup.accepted,
        setup.rejected,
        format_duration(setup.elapsed)
    )
    .ok();
    out.push('\n');

    for s in &summary.scenarios {
        writeln!(&mut out, "scenario: {}", s.scenario).ok();
        writeln!(
            &mut out,
            "  iterations: {} ({}/s) dropped {} timed out {}",
            s.iterations_total,
            format_rate((s.iterations_total as f64) / run_secs),
            s.dropped_iterations_total,
            s.iteration_timeouts_total
        )
        .ok();
        writeln!(&mut out, "  vus_max: {}", s.vus_max).ok();
        writeln!(
            &mut out,
            "  requests: {} (failed {})",
            s.requests_total, s.failed_requests_total
        )
        .ok();
        for (status, count) in &s.failures_by_status {
            writeln!(&mut out, "    failed status={status}: {count}").ok();
        }
        match &s.iteration_duration_ms {
            Some(t) => {
                writeln!(&mut out, "  iteration_duration: {}", format_trend(t)).ok();
            }
            None => out.push_str("  iteration_duration: n/a\n"),
        }
        out.push('\n');
    }

    render_metrics(&summary.series, run_secs, &mut out);
    render_thresholds(thresholds, &mut out);

    out
}

fn render_metrics(series: &[MetricSeriesSummary], run_secs: f64, out: &mut String) {
    let mut by_name: BTreeMap<&str, Vec<&MetricSeriesSummary>> = BTreeMap::new();
    for s in series {
        by_name.entry(s.name.as_str()).or_default().push(s);
    }
    if by_name.is_empty() {
        return;
    }

    out.push_str("metrics\n");
    for (name, rows) in by_name {
        if let Some(total) = metric_total(&rows, run_secs) {
            writeln!(out, "  {name}: {total}").ok();
        } else {
            writeln!(out, "  {name}:").ok();
        }

        let mut lines: Vec<(String, String)> = rows
            .iter()
            .map(|s| (format_tags_inline(&s.tags, &[]), format_value(&s.values, run_secs)))
            .collect();
        lines.sort();
        for (tags, value) in lines {
            let tags = if tags.is_empty() { "{}".to_string() } else { tags };
            writeln!(out, "    {tags} {value}").ok();
        }
    }
    out.push('\n');
}

/// Sum across series, for kinds where summing is meaningful.
fn metric_total(rows: &[&MetricSeriesSummary], run_secs: f64) -> Option<String> {
    let mut counter: Option<u64> = None;
    let mut rate: Option<(u64, u64)> = None;

    for s in rows {
        match &s.values {
            MetricValue::Counter(v) => {
                counter = Some(counter.unwrap_or(0).saturating_add(*v));
            }
            MetricValue::Rate { total, hits, .. } => {
                let (t, h) = rate.unwrap_or((0, 0));
                rate = Some((t.saturating_add(*total), h.saturating_add(*hits)));
            }
            MetricValue::Gauge(_) | MetricValue::Trend(_) => return None,
        }
    }

    if let Some(v) = counter {
        return Some(format_value(&MetricValue::Counter(v), run_secs));
    }
    rate.map(|(total, hits)| {
        let r = (total > 0).then(|| (hits as f64) / (total as f64));
        format_value(&MetricValue::Rate { total, hits, rate: r }, run_secs)
    })
}

fn format_value(value: &MetricValue, run_secs: f64) -> String {
    match value {
        MetricValue::Counter(v) => format!("{v} ({}/s)", format_rate((*v as f64) / run_secs)),
        MetricValue::Gauge(v) => format!("{v}"),
        MetricValue::Rate { total, hits, rate } => format!(
            "{} ({hits}/{total})",
            rate.map_or_else(|| "n/a".to_string(), format_percent)
        ),
        MetricValue::Trend(t) => format_trend(t),
    }
}

fn format_trend(t: &TrendSummary) -> String {
    format!(
        "avg={} min={} med={} max={} p(90)={} p(95)={} p(99)={} (n={})",
        format_ms_opt(t.mean),
        format_ms_opt(t.min),
        format_ms_opt(t.p50),
        format_ms_opt(t.max),
        format_ms_opt(t.p90),
        format_ms_opt(t.p95),
        format_ms_opt(t.p99),
        t.count
    )
}

fn render_thresholds(thresholds: &[authload_core::ThresholdOutcome], out: &mut String) {
    if thresholds.is_empty() {
        return;
    }

    out.push_str("thresholds\n");
    for t in thresholds {
        let mark = if t.passed { '✓' } else { '✗' };
        writeln!(
            out,
            "  {mark} {} {} (observed {})",
            t.metric,
            t.expression,
            format_observed(&t.expression, t.observed)
        )
        .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authload_metrics::MetricKind;
    use std::time::Duration;

    fn series(name: &str, kind: MetricKind, tags: &[(&str, &str)], values: MetricValue) -> MetricSeriesSummary {
        MetricSeriesSummary {
            name: name.to_string(),
            kind,
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            values,
        }
    }

    fn sample_summary() -> authload_core::RunSummary {
        authload_core::RunSummary {
            run_duration: Duration::from_secs(10),
            scenarios: vec![authload_core::ScenarioSummary {
                scenario: "login_scn".to_string(),
                iterations_total: 100,
                dropped_iterations_total: 3,
                iteration_timeouts_total: 0,
                vus_max: 20,
                requests_total: 400,
                failed_requests_total: 4,
                failures_by_status: [("500".to_string(), 4)].into_iter().collect(),
                iteration_duration_ms: None,
            }],
            series: vec![
                series(
                    "login_fail_rate",
                    MetricKind::Rate,
                    &[("endpoint", "login"), ("scenario", "login_scn")],
                    MetricValue::Rate {
                        total: 100,
                        hits: 2,
                        rate: Some(0.02),
                    },
                ),
                series(
                    "login_count",
                    MetricKind::Counter,
                    &[("endpoint", "login")],
                    MetricValue::Counter(100),
                ),
                series(
                    "login_duration",
                    MetricKind::Trend,
                    &[("endpoint", "login")],
                    MetricValue::Trend(TrendSummary {
                        count: 100,
                        min: Some(1.0),
                        max: Some(40.0),
                        mean: Some(12.5),
                        stdev: Some(3.0),
                        p50: Some(11.0),
                        p90: Some(20.0),
                        p95: Some(25.0),
                        p99: Some(39.0),
                    }),
                ),
            ],
        }
    }

    #[test]
    fn render_includes_scenarios_metrics_and_thresholds() {
        let setup = authload_core::SetupReport {
            requested: 10,
            accepted: 9,
            rejected: 1,
            failures_logged: 1,
            elapsed: Duration::from_millis(500),
        };
        let thresholds = vec![
            authload_core::ThresholdOutcome {
                metric: "login_fail_rate".to_string(),
                expression: "rate<0.05".to_string(),
                observed: Some(0.02),
                passed: true,
            },
            authload_core::ThresholdOutcome {
                metric: "chain_duration{endpoint:chain}".to_string(),
                expression: "p(95)<500".to_string(),
                observed: None,
                passed: false,
            },
        ];

        let text = render(&sample_summary(), &setup, &thresholds);

        assert!(text.contains("setup: requested 10 accepted 9 rejected 1"));
        assert!(text.contains("scenario: login_scn"));
        assert!(text.contains("iterations: 100 (10/s) dropped 3"));
        assert!(text.contains("failed status=500: 4"));
        assert!(text.contains("login_count: 100 (10/s)"));
        assert!(text.contains("login_fail_rate: 2.00% (2/100)"));
        assert!(text.contains("{endpoint=login scenario=login_scn} 2.00% (2/100)"));
        assert!(text.contains("{endpoint=login} avg=12.50ms"));
        assert!(text.contains("p(95)=25.00ms"));
        assert!(text.contains("✓ login_fail_rate rate<0.05 (observed 0.0200)"));
        assert!(text.contains("✗ chain_duration{endpoint:chain} p(95)<500 (observed n/a)"));
    }

    #[test]
    fn render_without_thresholds_omits_section() {
        let text = render(
            &sample_summary(),
            &authload_core::SetupReport::default(),
            &[],
        );
        assert!(!text.contains("thresholds"));
    }
}
