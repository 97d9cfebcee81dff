use super::Context;
use super::apply::execute_plan;
use crate::cli::ApplyArgs;
use crate::ui;
use anyhow::Result;

/// Tear down everything recorded in state, whatever the stack file says now
pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let mut state = ctx.load_state()?;
    if state.deployed.is_empty() {
        ui::info("Nothing to destroy");
        return Ok(());
    }

    if !ctx.quiet {
        ui::header(&format!("Destroying {} resource(s)", state.deployed.len()));
    }
    let plan = stackgraph::teardown_state(&state.deployed);
    execute_plan(ctx, &plan, &mut state, args, "destroyed")
}
