//! Execution engine - dispatches plan steps to an apply engine with bounded parallelism
//!
//! The coordinating thread owns every result slot. Workers on the rayon pool
//! only call the engine and send the outcome back over a channel, so the plan
//! and the previous state are never mutated while steps are in flight.

use crate::catalog::ResourceKind;
use crate::context::ProgressCallback;
use crate::engine::{ApplyEngine, ResolvedStep};
use crate::error::{ApplyError, Error, Result, StepFailure};
use crate::planner::{Action, Plan, PlanStep};
use crate::state::{DeployedState, ResourceRecord};
use crate::types::{Attributes, ExecuteOptions, ExecuteSummary, Outputs};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;

/// Terminal state of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    /// The engine call succeeded
    Succeeded,
    /// Nothing to do (`NoOp` step)
    Unchanged,
    /// The engine call failed
    Failed(StepFailure),
    /// Never dispatched because a step it waits on failed
    Blocked { by: String },
    /// Never dispatched
    Skipped { reason: String },
}

impl StepStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Unchanged)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::Unchanged => f.write_str("unchanged"),
            Self::Failed(failure) => write!(f, "failed: {}", failure.source),
            Self::Blocked { by } => write!(f, "blocked by '{by}'"),
            Self::Skipped { reason } => write!(f, "skipped ({reason})"),
        }
    }
}

/// Outcome of one plan step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub index: usize,
    pub node_id: String,
    pub kind: ResourceKind,
    pub action: Action,
    pub status: StepStatus,
    /// Live outputs of the node after the step (empty after a delete)
    #[serde(default, skip_serializing_if = "Outputs::is_empty")]
    pub outputs: Outputs,
}

impl StepReport {
    fn new(step: &PlanStep, status: StepStatus, outputs: Outputs) -> Self {
        Self {
            index: step.index,
            node_id: step.node_id.clone(),
            kind: step.kind,
            action: step.action,
            status,
            outputs,
        }
    }
}

/// Every step outcome of one execution, in plan order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub steps: Vec<StepReport>,
    pub summary: ExecuteSummary,
}

impl ExecutionReport {
    fn from_steps(steps: Vec<StepReport>) -> Self {
        let mut summary = ExecuteSummary::default();
        for report in &steps {
            match (&report.status, report.action) {
                (StepStatus::Succeeded, Action::Create) => summary.created += 1,
                (StepStatus::Succeeded, Action::Update) => summary.updated += 1,
                (StepStatus::Succeeded, Action::Delete) => summary.deleted += 1,
                (StepStatus::Succeeded | StepStatus::Unchanged, _) => summary.unchanged += 1,
                (StepStatus::Failed(_), _) => summary.failed += 1,
                (StepStatus::Blocked { .. }, _) => summary.blocked += 1,
                (StepStatus::Skipped { .. }, _) => summary.skipped += 1,
            }
        }
        Self { steps, summary }
    }

    /// Check if every step succeeded or had nothing to do
    pub fn is_success(&self) -> bool {
        self.summary.is_success()
    }

    /// Failed steps, in plan order
    pub fn failures(&self) -> impl Iterator<Item = &StepFailure> {
        self.steps.iter().filter_map(|r| match &r.status {
            StepStatus::Failed(failure) => Some(failure),
            _ => None,
        })
    }

    /// The state this execution left behind
    ///
    /// Successful creates and updates are recorded, successful deletes
    /// removed. Failed, blocked and skipped steps keep whatever was recorded.
    pub fn state_after(&self, plan: &Plan, previous: &DeployedState) -> DeployedState {
        let mut state = previous.clone();
        let mut touched: BTreeSet<String> = BTreeSet::new();

        for report in &self.steps {
            if report.status != StepStatus::Succeeded {
                continue;
            }
            let Some(step) = plan.steps.get(report.index) else { continue };
            match step.action {
                Action::Delete => {
                    state.remove(&step.node_id);
                    touched.remove(&step.node_id);
                }
                Action::Create | Action::Update => {
                    state.insert(
                        step.node_id.clone(),
                        ResourceRecord {
                            kind: step.kind,
                            depends_on: step.depends_on.clone(),
                            attributes: step.attributes.clone(),
                            resolved: Attributes::new(),
                            outputs: report.outputs.clone(),
                        },
                    );
                    touched.insert(step.node_id.clone());
                }
                Action::NoOp => {}
            }
        }

        // resolve once every output of the run is known
        for id in touched {
            let Some(attributes) = state.get(&id).map(|r| r.attributes.clone()) else { continue };
            let resolved = state.resolve(&attributes);
            if let Some(record) = state.resources.get_mut(&id) {
                record.resolved = resolved;
            }
        }

        state
    }
}

enum Readiness {
    Ready,
    Waiting,
    Blocked(String),
}

/// Execute a plan against an apply engine
///
/// # Arguments
/// * `plan` - The plan to run
/// * `previous` - State the plan was computed against (seeds live outputs)
/// * `engine` - Engine performing the provider calls
/// * `opts` - Execution options (dry_run, jobs)
/// * `progress` - Progress callback
///
/// # Returns
/// Outcome of every step. Engine failures are reported per step, never as `Err`.
pub fn execute<E, P>(
    plan: &Plan,
    previous: &DeployedState,
    engine: &E,
    opts: &ExecuteOptions,
    progress: &mut P,
) -> Result<ExecutionReport>
where
    E: ApplyEngine + ?Sized,
    P: ProgressCallback,
{
    progress.on_start(plan.len());

    if opts.dry_run {
        let steps: Vec<StepReport> = plan
            .steps
            .iter()
            .map(|step| {
                StepReport::new(
                    step,
                    StepStatus::Skipped {
                        reason: "dry run".into(),
                    },
                    Outputs::new(),
                )
            })
            .collect();
        for report in &steps {
            progress.on_step_complete(report);
        }
        let report = ExecutionReport::from_steps(steps);
        progress.on_finish(&report.summary);
        return Ok(report);
    }

    let jobs = opts.jobs.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| Error::ThreadPool(e.to_string()))?;

    let mut slots: Vec<Option<StepReport>> = vec![None; plan.len()];
    let mut dispatched = vec![false; plan.len()];
    let mut live: HashMap<String, Outputs> = previous
        .resources
        .iter()
        .map(|(id, record)| (id.clone(), record.outputs.clone()))
        .collect();
    let (tx, rx) = mpsc::channel::<(usize, std::result::Result<Outputs, ApplyError>)>();
    let mut in_flight = 0usize;

    pool.in_place_scope(|scope| {
        loop {
            // after-edges point backwards, so one pass in plan order settles
            // every cascade of blocked and unchanged steps
            for (position, step) in plan.steps.iter().enumerate() {
                if slots[position].is_some() || dispatched[position] {
                    continue;
                }
                match readiness(step, &slots) {
                    Readiness::Waiting => {}
                    Readiness::Blocked(by) => {
                        log::debug!("{}: blocked by '{by}'", step.node_id);
                        let report = StepReport::new(step, StepStatus::Blocked { by }, Outputs::new());
                        progress.on_step_complete(&report);
                        slots[position] = Some(report);
                    }
                    Readiness::Ready if step.action == Action::NoOp => {
                        let outputs = live.get(&step.node_id).cloned().unwrap_or_default();
                        let report = StepReport::new(step, StepStatus::Unchanged, outputs);
                        progress.on_step_complete(&report);
                        slots[position] = Some(report);
                    }
                    Readiness::Ready if in_flight < jobs => {
                        let current = live.get(&step.node_id).cloned().unwrap_or_default();
                        let resolved = ResolvedStep::resolve(step, current, |r| {
                            live.get(&r.target).and_then(|o| o.get(&r.output)).cloned()
                        });
                        log::debug!("Dispatching {} {} '{}'", step.action, step.kind, step.node_id);
                        progress.on_step_start(step);
                        dispatched[position] = true;
                        in_flight += 1;

                        let tx = tx.clone();
                        scope.spawn(move |_| {
                            let outcome = run_step(engine, &resolved);
                            // the receiver outlives the scope
                            let _ = tx.send((position, outcome));
                        });
                    }
                    Readiness::Ready => {}
                }
            }

            if in_flight == 0 {
                break;
            }
            let Ok((position, outcome)) = rx.recv() else { break };
            in_flight -= 1;

            let Some(step) = plan.steps.get(position) else { continue };
            let report = match outcome {
                Ok(outputs) => {
                    if step.action == Action::Delete {
                        live.remove(&step.node_id);
                    } else {
                        live.insert(step.node_id.clone(), outputs.clone());
                    }
                    StepReport::new(step, StepStatus::Succeeded, outputs)
                }
                Err(source) => {
                    let failure = StepFailure {
                        node_id: step.node_id.clone(),
                        kind: step.kind,
                        action: step.action,
                        source,
                    };
                    log::error!("{failure}");
                    StepReport::new(step, StepStatus::Failed(failure), Outputs::new())
                }
            };
            progress.on_step_complete(&report);
            slots[position] = Some(report);
        }
    });

    let steps: Vec<StepReport> = slots
        .into_iter()
        .zip(&plan.steps)
        .map(|(slot, step)| {
            slot.unwrap_or_else(|| {
                StepReport::new(
                    step,
                    StepStatus::Skipped {
                        reason: "not dispatched".into(),
                    },
                    Outputs::new(),
                )
            })
        })
        .collect();

    let report = ExecutionReport::from_steps(steps);
    log::info!(
        "Executed {} step(s): {} change(s), {} failed, {} blocked",
        report.steps.len(),
        report.summary.total_changes(),
        report.summary.failed,
        report.summary.blocked
    );
    progress.on_finish(&report.summary);
    Ok(report)
}

/// Decide whether a step can run given the outcomes recorded so far
///
/// A failed or blocked predecessor blocks the step even while others are
/// still in flight. `by` always names the step that actually failed.
fn readiness(step: &PlanStep, slots: &[Option<StepReport>]) -> Readiness {
    let mut waiting = false;
    for &before in &step.after {
        let Some(report) = slots.get(before).and_then(Option::as_ref) else {
            waiting = true;
            continue;
        };
        match &report.status {
            StepStatus::Failed(failure) => return Readiness::Blocked(failure.node_id.clone()),
            StepStatus::Blocked { by } => return Readiness::Blocked(by.clone()),
            StepStatus::Skipped { .. } => return Readiness::Blocked(report.node_id.clone()),
            StepStatus::Succeeded | StepStatus::Unchanged => {}
        }
    }
    if waiting { Readiness::Waiting } else { Readiness::Ready }
}

/// Run one step on a worker; an engine panic becomes a rejected step
fn run_step<E: ApplyEngine + ?Sized>(engine: &E, step: &ResolvedStep) -> std::result::Result<Outputs, ApplyError> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match step.action {
        Action::Create | Action::Update => engine.apply(step),
        Action::Delete => engine.teardown(step).map(|()| Outputs::new()),
        Action::NoOp => Ok(step.previous_outputs.clone()),
    }));

    outcome.unwrap_or_else(|_| {
        Err(ApplyError::ProviderRejected {
            message: format!("engine panicked while handling '{}'", step.node_id),
        })
    })
}
