use std::sync::Arc;

mod format;
mod progress;
mod summary;

use format::{format_duration, format_rate};
use progress::HumanProgress;
use summary::render;

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, base_url: &str, scenarios: &[authload_core::ScenarioConfig]) {
        println!("target: {base_url}");
        for s in scenarios {
            let schedule = s.executor.schedule();
            println!(
                "scenario: {} exec={} executor={} peak_rate={}/{} stages={} duration={} vus={}..{}",
                s.name(),
                s.exec,
                s.executor.kind(),
                schedule.max_target(),
                format_duration(s.executor.time_unit()),
                schedule.stages().len(),
                format_duration(schedule.total_duration()),
                s.executor.pre_allocated_vus(),
                s.executor.max_vus(),
            );
        }
        if !scenarios.is_empty() {
            println!();
        }
    }

    fn print_setup(&self, report: &authload_core::SetupReport) {
        if report.requested == 0 {
            println!("setup: skipped (no users requested)");
        } else {
            println!(
                "setup: {}/{} users provisioned ({} rejected) in {}",
                report.accepted,
                report.requested,
                report.rejected,
                format_duration(report.elapsed)
            );
        }
        println!();
    }

    fn progress(&self) -> Option<authload_core::ProgressFn> {
        let progress = self.progress.clone();

        Some(Arc::new(move |u| {
            let p = &u.progress;
            let m = &u.metrics;

            let mut message = format!(
                "vus={}/{} dropped={} elapsed={} iters/s={} rps={} failed={}",
                p.active_vus,
                p.max_vus,
                m.dropped_iterations_total,
                format_duration(u.elapsed),
                format_rate(m.iterations_per_sec_now),
                format_rate(m.requests_per_sec_now),
                m.failed_requests_total,
            );
            if let Some(stage) = &p.stage {
                message.push_str(&format!(
                    " stage={}/{} target={}",
                    stage.stage, stage.stages, stage.current_target
                ));
            }

            progress.update(&u.scenario, p.total_duration, u.elapsed, message);
        }))
    }

    fn print_summary(
        &self,
        summary: &authload_core::RunSummary,
        setup: &authload_core::SetupReport,
        thresholds: &[authload_core::ThresholdOutcome],
    ) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", render(summary, setup, thresholds));
        Ok(())
    }
}
