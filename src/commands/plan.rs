use super::Context;
use crate::cli::PlanArgs;
use crate::{render, ui};
use anyhow::{Context as _, Result};
use std::fs;

pub fn run(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let (stack, graph) = ctx.load_graph()?;
    let state = ctx.load_state()?;
    let plan = stackgraph::plan(&graph, &state.deployed);

    if let Some(out) = &args.out {
        let json = plan.to_json()?;
        fs::write(out, json)
            .with_context(|| format!("Failed to write plan: {}", out.display()))?;
        if !ctx.quiet {
            ui::success(&format!("Plan written to {}", out.display()));
        }
    }

    if args.json {
        println!("{}", plan.to_json()?);
        return Ok(());
    }

    if !ctx.quiet {
        ui::header(&format!("Plan for stack '{}'", stack.name));
    }
    render::display_plan(&plan, &state.deployed);
    Ok(())
}
