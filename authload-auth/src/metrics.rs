use std::time::Duration;

use authload_metrics::{MetricId, MetricKind, Registry};

use crate::request::EndpointKind;

/// Per-endpoint series written by the auth workload.
#[derive(Debug, Clone, Copy)]
pub struct AuthMetricIds {
    pub signup_duration: MetricId,
    pub login_duration: MetricId,
    pub chain_duration: MetricId,
    pub signup_fail_rate: MetricId,
    pub login_fail_rate: MetricId,
    pub chain_fail_rate: MetricId,
    pub signup_count: MetricId,
    pub login_count: MetricId,
}

impl AuthMetricIds {
    pub fn register(metrics: &Registry) -> Self {
        Self {
            signup_duration: metrics.register("signup_duration", MetricKind::Trend),
            login_duration: metrics.register("login_duration", MetricKind::Trend),
            chain_duration: metrics.register("chain_duration", MetricKind::Trend),
            signup_fail_rate: metrics.register("signup_fail_rate", MetricKind::Rate),
            login_fail_rate: metrics.register("login_fail_rate", MetricKind::Rate),
            chain_fail_rate: metrics.register("chain_fail_rate", MetricKind::Rate),
            signup_count: metrics.register("signup_count", MetricKind::Counter),
            login_count: metrics.register("login_count", MetricKind::Counter),
        }
    }

    fn ids(&self, endpoint: EndpointKind) -> (MetricId, MetricId, Option<MetricId>) {
        match endpoint {
            EndpointKind::Signup => (
                self.signup_duration,
                self.signup_fail_rate,
                Some(self.signup_count),
            ),
            EndpointKind::Login => (
                self.login_duration,
                self.login_fail_rate,
                Some(self.login_count),
            ),
            EndpointKind::Chain => (self.chain_duration, self.chain_fail_rate, None),
        }
    }

    /// One latency and one fail observation for a single call.
    pub fn record_call(
        &self,
        metrics: &Registry,
        scenario: &str,
        endpoint: EndpointKind,
        duration: Duration,
        failed: bool,
    ) {
        let (duration_id, fail_id, count_id) = self.ids(endpoint);
        let tags = metrics.resolve_tags(&[("scenario", scenario), ("endpoint", endpoint.as_ref())]);

        if let Some(h) = metrics.get_handle(duration_id, tags.clone()) {
            h.observe_duration(duration);
        }
        if let Some(h) = metrics.get_handle(fail_id, tags.clone()) {
            h.add_rate(failed);
        }
        if let Some(id) = count_id
            && let Some(h) = metrics.get_handle(id, tags)
        {
            h.increment(1);
        }
    }
}
