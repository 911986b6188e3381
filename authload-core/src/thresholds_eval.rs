use authload_metrics::{MetricId, MetricKind, Query, Registry};

use super::error::{Error, Result};
use super::thresholds::{
    ThresholdAgg, ThresholdOp, ThresholdOutcome, ThresholdSet, parse_threshold_expr,
};

/// Evaluates every expression of every set against the final metric values.
///
/// A metric that was never registered, or whose selected series saw no observations,
/// yields `observed = None` and fails.
pub fn evaluate_thresholds(
    metrics: &Registry,
    sets: &[ThresholdSet],
) -> Result<Vec<ThresholdOutcome>> {
    let mut out: Vec<ThresholdOutcome> = Vec::new();

    for set in sets {
        let selector = set.selector();
        let found = metrics.lookup_metric(&set.metric);

        for expr_raw in &set.expressions {
            let expr = parse_threshold_expr(expr_raw).map_err(|error| Error::InvalidThreshold {
                selector: selector.clone(),
                error,
            })?;

            let observed = found.and_then(|(metric_id, kind)| {
                observed_value(metrics, metric_id, kind, &set.tags, &expr.agg)
            });
            let passed = observed.is_some_and(|v| compare(v, expr.op, expr.value));

            out.push(ThresholdOutcome {
                metric: selector.clone(),
                expression: expr_raw.clone(),
                observed,
                passed,
            });
        }
    }

    Ok(out)
}

/// Checks expressions up front so a typo fails the run before any load is generated.
pub fn validate_thresholds(sets: &[ThresholdSet]) -> Result<()> {
    for set in sets {
        for expr in &set.expressions {
            parse_threshold_expr(expr).map_err(|error| Error::InvalidThreshold {
                selector: set.selector(),
                error,
            })?;
        }
    }
    Ok(())
}

pub fn all_passed(outcomes: &[ThresholdOutcome]) -> bool {
    outcomes.iter().all(|o| o.passed)
}

fn filtered<'a>(metrics: &'a Registry, metric_id: MetricId, tags: &[(String, String)]) -> Query<'a> {
    tags.iter()
        .fold(metrics.query(metric_id), |q, (k, v)| q.where_tag(k, v))
}

fn observed_value(
    metrics: &Registry,
    metric_id: MetricId,
    kind: MetricKind,
    tags: &[(String, String)],
    agg: &ThresholdAgg,
) -> Option<f64> {
    let query = filtered(metrics, metric_id, tags);

    match kind {
        MetricKind::Counter => {
            let sum = query.sum_counter();
            if sum.is_empty() {
                return None;
            }
            let total: u64 = sum.values().copied().sum();
            matches!(agg, ThresholdAgg::Count).then_some(total as f64)
        }

        MetricKind::Gauge => {
            let v = query.max_gauge()? as f64;
            matches!(agg, ThresholdAgg::Max | ThresholdAgg::Count).then_some(v)
        }

        MetricKind::Rate => {
            let (total, hits) = query.sum_rate_total();
            if total == 0 {
                return None;
            }
            match agg {
                ThresholdAgg::Rate => Some(hits as f64 / total as f64),
                ThresholdAgg::Count => Some(hits as f64),
                _ => None,
            }
        }

        MetricKind::Trend => {
            let trend = query.merge_trend_total();
            if trend.is_empty() {
                return None;
            }
            match agg {
                ThresholdAgg::Avg => trend.mean_ms(),
                ThresholdAgg::Min => trend.min_ms(),
                ThresholdAgg::Max => trend.max_ms(),
                ThresholdAgg::Med => trend.percentile_ms(50.0),
                ThresholdAgg::P(p) => trend.percentile_ms(*p),
                ThresholdAgg::Count => Some(trend.count() as f64),
                ThresholdAgg::Rate => None,
            }
        }
    }
}

fn compare(observed: f64, op: ThresholdOp, expected: f64) -> bool {
    match op {
        ThresholdOp::Lt => observed < expected,
        ThresholdOp::Lte => observed <= expected,
        ThresholdOp::Gt => observed > expected,
        ThresholdOp::Gte => observed >= expected,
        ThresholdOp::Eq => observed == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(selector: &str, exprs: &[&str]) -> ThresholdSet {
        ThresholdSet::from_selector(selector, exprs.iter().map(|e| e.to_string()).collect())
            .unwrap_or_else(|e| panic!("{e}"))
    }

    fn eval(metrics: &Registry, sets: &[ThresholdSet]) -> Vec<ThresholdOutcome> {
        evaluate_thresholds(metrics, sets).unwrap_or_else(|e| panic!("unexpected error: {e}"))
    }

    #[test]
    fn missing_metric_fails_threshold() {
        let metrics = Registry::default();
        let v = eval(&metrics, &[set("nope", &["count>0"])]);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].metric, "nope");
        assert!(v[0].observed.is_none());
        assert!(!v[0].passed);
        assert!(!all_passed(&v));
    }

    #[test]
    fn tail_latency_breaches_p95() {
        let metrics = Registry::default();
        let id = metrics.register("login_duration", MetricKind::Trend);
        for ms in [100.0, 100.0, 100.0, 100.0, 900.0] {
            if let Some(h) = metrics.handle(id, &[("endpoint", "login")]) {
                h.observe_ms(ms);
            }
        }

        let v = eval(
            &metrics,
            &[set("login_duration{endpoint:login}", &["p(95)<500"])],
        );
        assert_eq!(v.len(), 1);
        assert!(!v[0].passed);
        let observed = v[0].observed.unwrap_or_default();
        assert!(observed >= 820.0, "observed={observed}");
        assert_eq!(v[0].metric, "login_duration{endpoint:login}");
    }

    #[test]
    fn tag_filter_selects_matching_series_only() {
        let metrics = Registry::default();
        let id = metrics.register("http_req_duration", MetricKind::Trend);
        if let Some(h) = metrics.handle(id, &[("endpoint", "login")]) {
            h.observe_ms(50.0);
        }
        if let Some(h) = metrics.handle(id, &[("endpoint", "signup")]) {
            h.observe_ms(5_000.0);
        }

        let v = eval(
            &metrics,
            &[
                set("http_req_duration{endpoint:login}", &["max<100ms"]),
                set("http_req_duration", &["max<100ms"]),
                set("http_req_duration{endpoint:chain}", &["max<100ms"]),
            ],
        );
        assert!(v[0].passed);
        assert!(!v[1].passed);
        assert!(v[2].observed.is_none());
        assert!(!v[2].passed);
    }

    #[test]
    fn counter_count_uses_sum() {
        let metrics = Registry::default();
        let id = metrics.register("signup_count", MetricKind::Counter);
        if let Some(h) = metrics.handle(id, &[]) {
            h.increment(2);
        }

        let v = eval(&metrics, &[set("signup_count", &["count==2"])]);
        assert!(all_passed(&v));
    }

    #[test]
    fn rate_uses_hits_over_total() {
        let metrics = Registry::default();
        let id = metrics.register("http_req_failed", MetricKind::Rate);
        for i in 0..10 {
            if let Some(h) = metrics.handle(id, &[]) {
                h.add_rate(i == 0);
            }
        }

        let v = eval(
            &metrics,
            &[set("http_req_failed", &["rate<0.2", "rate<0.05"])],
        );
        assert!(v[0].passed);
        assert!(!v[1].passed);
        assert_eq!(v[1].observed, Some(0.1));
    }

    #[test]
    fn invalid_expression_is_an_error() {
        let metrics = Registry::default();
        let sets = [set("http_req_failed", &["rate<<"])];
        assert!(matches!(
            evaluate_thresholds(&metrics, &sets),
            Err(Error::InvalidThreshold { .. })
        ));
        assert!(validate_thresholds(&sets).is_err());
        assert!(validate_thresholds(&[set("x", &["rate<0.1"])]).is_ok());
    }
}
