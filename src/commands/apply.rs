use super::{Context, confirm_proceed};
use crate::cli::ApplyArgs;
use crate::progress::BarProgress;
use crate::state::StateFile;
use crate::{render, ui};
use anyhow::{Result, bail};
use colored::Colorize;
use stackgraph::{ExecuteOptions, Plan};

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let (stack, graph) = ctx.load_graph()?;
    let mut state = ctx.load_state()?;
    let plan = stackgraph::plan(&graph, &state.deployed);

    if !ctx.quiet {
        ui::header(&format!("Applying stack '{}'", stack.name));
    }
    execute_plan(ctx, &plan, &mut state, args, "applied")
}

/// Show, confirm and execute a plan, then record the outcome
///
/// State is saved after partial failures too, so a later run resumes
/// from what was actually provisioned.
pub(super) fn execute_plan(
    ctx: &Context,
    plan: &Plan,
    state: &mut StateFile,
    args: &ApplyArgs,
    verb: &str,
) -> Result<()> {
    render::display_plan(plan, &state.deployed);
    if plan.is_noop() {
        return Ok(());
    }

    if !args.yes && !args.dry_run && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    if args.dry_run {
        ui::warn("Dry run: the provider will not be called");
    }

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: ctx.jobs(args.jobs),
    };
    log::debug!("Executing {} step(s) with {} job(s)", plan.len(), opts.jobs);

    let mut progress = BarProgress::new(ctx.quiet);
    let report = stackgraph::execute(plan, &state.deployed, &ctx.engine(), &opts, &mut progress)?;

    if !args.dry_run {
        let after = report.state_after(plan, &state.deployed);
        state.record(after);
        state.save(&ctx.state_path)?;
        log::info!("Recorded {} resource(s) in {}", state.deployed.len(), ctx.state_path.display());
    }

    render::print_summary(&report, verb);

    if !report.is_success() {
        bail!(
            "{} step(s) failed, {} blocked",
            report.summary.failed,
            report.summary.blocked
        );
    }
    Ok(())
}
