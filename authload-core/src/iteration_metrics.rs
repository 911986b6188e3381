use std::time::Duration;

use authload_metrics::{MetricId, MetricKind, Registry};

/// Engine-level series, all tagged with `scenario`.
#[derive(Debug, Clone, Copy)]
pub struct IterationMetricIds {
    pub iterations: MetricId,
    pub iteration_duration: MetricId,
    /// Arrivals the pool could not absorb.
    pub dropped_iterations: MetricId,
    /// Iterations abandoned at the hard deadline.
    pub iteration_timeouts: MetricId,
    pub vus: MetricId,
    pub vus_max: MetricId,
}

#[derive(Debug, Clone, Copy)]
pub struct IterationSample<'a> {
    pub scenario: &'a str,
    pub duration: Duration,
}

impl IterationMetricIds {
    pub fn register(metrics: &Registry) -> Self {
        Self {
            iterations: metrics.register("iterations", MetricKind::Counter),
            iteration_duration: metrics.register("iteration_duration", MetricKind::Trend),
            dropped_iterations: metrics.register("dropped_iterations", MetricKind::Counter),
            iteration_timeouts: metrics.register("iteration_timeouts", MetricKind::Counter),
            vus: metrics.register("vus", MetricKind::Gauge),
            vus_max: metrics.register("vus_max", MetricKind::Gauge),
        }
    }

    fn scenario_tags<'a>(
        scenario: &'a str,
        extra_tags: &[(&'a str, &'a str)],
    ) -> Vec<(&'a str, &'a str)> {
        let mut tags = Vec::with_capacity(1 + extra_tags.len());
        tags.push(("scenario", scenario));
        tags.extend(extra_tags.iter().copied().filter(|(k, _)| *k != "scenario"));
        tags
    }

    pub fn record_iteration(
        &self,
        metrics: &Registry,
        sample: IterationSample<'_>,
        extra_tags: &[(&str, &str)],
    ) {
        let tags = metrics.resolve_tags(&Self::scenario_tags(sample.scenario, extra_tags));

        if let Some(h) = metrics.get_handle(self.iterations, tags.clone()) {
            h.increment(1);
        }
        if let Some(h) = metrics.get_handle(self.iteration_duration, tags) {
            h.observe_duration(sample.duration);
        }
    }

    pub fn record_dropped(
        &self,
        metrics: &Registry,
        scenario: &str,
        count: u64,
        extra_tags: &[(&str, &str)],
    ) {
        if count == 0 {
            return;
        }
        if let Some(h) = metrics.handle(
            self.dropped_iterations,
            &Self::scenario_tags(scenario, extra_tags),
        ) {
            h.increment(count);
        }
    }

    pub fn record_timeout(&self, metrics: &Registry, scenario: &str, extra_tags: &[(&str, &str)]) {
        if let Some(h) = metrics.handle(
            self.iteration_timeouts,
            &Self::scenario_tags(scenario, extra_tags),
        ) {
            h.increment(1);
        }
    }
}
