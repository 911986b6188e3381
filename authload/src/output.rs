use crate::cli::OutputFormat;

mod human;
mod json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, base_url: &str, scenarios: &[authload_core::ScenarioConfig]);
    fn print_setup(&self, report: &authload_core::SetupReport);
    fn progress(&self) -> Option<authload_core::ProgressFn>;
    fn print_summary(
        &self,
        summary: &authload_core::RunSummary,
        setup: &authload_core::SetupReport,
        thresholds: &[authload_core::ThresholdOutcome],
    ) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
