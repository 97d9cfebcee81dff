use super::Context;
use crate::{render, ui};
use anyhow::Result;

pub fn run(ctx: &Context) -> Result<()> {
    let state = ctx.load_state()?;

    ui::header("Deployed resources");
    ui::kv("state file", &ctx.state_path.display().to_string());
    if state.deployed.is_empty() && state.last_applied.is_none() {
        println!();
        ui::info("Nothing has been applied yet");
        return Ok(());
    }
    print!("{}", render::state_text(&state));
    Ok(())
}
