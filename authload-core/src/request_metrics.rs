use std::time::Duration;

use authload_metrics::{MetricId, MetricKind, Registry};

/// Built-in series recorded for every HTTP call.
#[derive(Debug, Clone, Copy)]
pub struct RequestMetricIds {
    pub http_reqs: MetricId,
    /// Request latency, milliseconds.
    pub http_req_duration: MetricId,
    /// Transport error or status outside 2xx/3xx.
    pub http_req_failed: MetricId,
}

#[derive(Debug, Clone, Copy)]
pub struct RequestSample<'a> {
    pub scenario: &'a str,
    pub endpoint: &'a str,
    /// `None` when the request failed before a status line was read.
    pub status: Option<u16>,
    pub duration: Duration,
}

impl RequestSample<'_> {
    pub fn failed(&self) -> bool {
        !matches!(self.status, Some(200..=399))
    }
}

impl RequestMetricIds {
    pub fn register(metrics: &Registry) -> Self {
        Self {
            http_reqs: metrics.register("http_reqs", MetricKind::Counter),
            http_req_duration: metrics.register("http_req_duration", MetricKind::Trend),
            http_req_failed: metrics.register("http_req_failed", MetricKind::Rate),
        }
    }

    pub fn record_request(
        &self,
        metrics: &Registry,
        sample: RequestSample<'_>,
        extra_tags: &[(&str, &str)],
    ) {
        let status = sample.status.map(|s| s.to_string());

        let mut tags: Vec<(&str, &str)> = Vec::with_capacity(3 + extra_tags.len());
        tags.push(("scenario", sample.scenario));
        tags.push(("endpoint", sample.endpoint));
        if let Some(status) = status.as_deref() {
            tags.push(("status", status));
        }
        tags.extend(
            extra_tags
                .iter()
                .copied()
                .filter(|(k, _)| !matches!(*k, "scenario" | "endpoint" | "status")),
        );
        let tags = metrics.resolve_tags(&tags);

        if let Some(h) = metrics.get_handle(self.http_reqs, tags.clone()) {
            h.increment(1);
        }
        if let Some(h) = metrics.get_handle(self.http_req_duration, tags.clone()) {
            h.observe_duration(sample.duration);
        }
        if let Some(h) = metrics.get_handle(self.http_req_failed, tags) {
            h.add_rate(sample.failed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(status: Option<u16>) -> RequestSample<'static> {
        RequestSample {
            scenario: "signup",
            endpoint: "signup",
            status,
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn failure_is_transport_error_or_bad_status() {
        assert!(!sample(Some(201)).failed());
        assert!(!sample(Some(302)).failed());
        assert!(sample(Some(409)).failed());
        assert!(sample(Some(500)).failed());
        assert!(sample(None).failed());
    }

    #[test]
    fn record_request_tags_status_when_present() {
        let metrics = Registry::default();
        let ids = RequestMetricIds::register(&metrics);

        ids.record_request(&metrics, sample(Some(201)), &[]);
        ids.record_request(&metrics, sample(None), &[]);

        assert_eq!(metrics.query(ids.http_reqs).sum_counter_total(), 2);
        assert_eq!(
            metrics
                .query(ids.http_reqs)
                .where_tag("status", "201")
                .sum_counter_total(),
            1
        );
        assert_eq!(metrics.query(ids.http_req_failed).sum_rate_total(), (2, 1));
        assert_eq!(
            metrics
                .query(ids.http_req_duration)
                .where_tag("endpoint", "signup")
                .merge_trend_total()
                .count(),
            2
        );
    }
}
