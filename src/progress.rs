//! Terminal progress for apply and destroy

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use stackgraph::{ExecuteSummary, PlanStep, ProgressCallback, StepReport, StepStatus};

const TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}";

/// Progress bar fed by the executor
pub struct BarProgress {
    bar: ProgressBar,
    /// Node ids currently with the provider
    running: Vec<String>,
}

impl BarProgress {
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        if let Ok(style) = ProgressStyle::with_template(TEMPLATE) {
            bar.set_style(style.progress_chars("=>-"));
        }
        Self {
            bar,
            running: Vec::new(),
        }
    }

    fn show_running(&self) {
        self.bar.set_message(self.running.join(", "));
    }
}

impl ProgressCallback for BarProgress {
    fn on_start(&mut self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_step_start(&mut self, step: &PlanStep) {
        self.running.push(step.node_id.clone());
        self.show_running();
    }

    fn on_step_complete(&mut self, report: &StepReport) {
        self.running.retain(|id| id != &report.node_id);
        match &report.status {
            StepStatus::Failed(failure) => {
                self.bar.println(format!("  {} {failure}", "✗".red()));
            }
            StepStatus::Succeeded => {
                self.bar.println(format!(
                    "  {} {} {} {}",
                    "✓".green(),
                    report.action,
                    report.kind,
                    report.node_id
                ));
            }
            _ => {}
        }
        self.bar.inc(1);
        self.show_running();
    }

    fn on_finish(&mut self, _summary: &ExecuteSummary) {
        self.bar.finish_and_clear();
    }
}
