use super::Context;
use crate::ui;
use anyhow::{Result, bail};
use stackgraph::Catalog;

pub fn run(ctx: &Context) -> Result<()> {
    let stack = ctx.load_stack()?;
    let graph = stack.graph()?;

    match stackgraph::validate(graph, &Catalog::standard()) {
        Ok(validated) => {
            if !ctx.quiet {
                ui::success(&format!(
                    "Stack '{}' is valid ({} resources)",
                    stack.name,
                    validated.len()
                ));
                ui::dim(&format!("create order: {}", validated.create_order().join(" → ")));
            }
            Ok(())
        }
        Err(errors) => {
            for err in &errors {
                ui::error(&err.to_string());
            }
            bail!("{} validation error(s) in stack '{}'", errors.len(), stack.name)
        }
    }
}
