//! Progress reporting for execution
//!
//! Callbacks are always invoked on the coordinating thread, never from the
//! workers, so implementations can hold terminal handles freely.

use crate::executor::StepReport;
use crate::planner::PlanStep;
use crate::types::ExecuteSummary;

/// Progress callback for execution operations
pub trait ProgressCallback: Send {
    /// Called once before any step runs
    fn on_start(&mut self, total: usize);

    /// Called when a step is handed to the engine
    fn on_step_start(&mut self, step: &PlanStep);

    /// Called when a step reaches a terminal state (including blocked steps)
    fn on_step_complete(&mut self, report: &StepReport);

    /// Called once after the last step
    fn on_finish(&mut self, summary: &ExecuteSummary);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_start(&mut self, _total: usize) {}
    fn on_step_start(&mut self, _step: &PlanStep) {}
    fn on_step_complete(&mut self, _report: &StepReport) {}
    fn on_finish(&mut self, _summary: &ExecuteSummary) {}
}

/// Progress callback that logs each step
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_start(&mut self, total: usize) {
        log::info!("Executing {total} step(s)");
    }

    fn on_step_start(&mut self, step: &PlanStep) {
        log::info!("{} {} '{}'", step.action, step.kind, step.node_id);
    }

    fn on_step_complete(&mut self, report: &StepReport) {
        log::info!("{}: {}", report.node_id, report.status);
    }

    fn on_finish(&mut self, summary: &ExecuteSummary) {
        log::info!(
            "Finished: {} change(s), {} failed, {} blocked",
            summary.total_changes(),
            summary.failed,
            summary.blocked
        );
    }
}
