use std::sync::Arc;

/// Scenario identity attached to every series a scenario writes.
#[derive(Debug, Clone)]
pub struct MetricsContext {
    scenario: Arc<str>,
    scenario_tags: Arc<[(String, String)]>,
}

impl MetricsContext {
    #[must_use]
    pub fn new(scenario: Arc<str>, scenario_tags: Arc<[(String, String)]>) -> Self {
        Self {
            scenario,
            scenario_tags,
        }
    }

    #[must_use]
    pub fn scenario(&self) -> &str {
        self.scenario.as_ref()
    }

    #[must_use]
    pub fn scenario_arc(&self) -> Arc<str> {
        self.scenario.clone()
    }

    #[must_use]
    pub fn scenario_tags(&self) -> &[(String, String)] {
        self.scenario_tags.as_ref()
    }

    /// Scenario-level tags minus `reserved_keys`, ready to pass as extra tags to
    /// `*_metrics.record_*`.
    #[must_use]
    pub fn scenario_tag_refs(&self, reserved_keys: &[&str]) -> Vec<(&str, &str)> {
        self.scenario_tags
            .iter()
            .filter(|(k, _)| !reserved_keys.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_tag_refs_skips_reserved_keys() {
        let ctx = MetricsContext::new(
            Arc::from("login"),
            Arc::from(vec![
                ("scenario".to_string(), "spoofed".to_string()),
                ("team".to_string(), "auth".to_string()),
            ]),
        );
        assert_eq!(ctx.scenario(), "login");
        assert_eq!(ctx.scenario_tag_refs(&["scenario"]), vec![("team", "auth")]);
    }
}
