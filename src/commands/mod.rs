pub mod apply;
pub mod catalog;
pub mod destroy;
pub mod plan;
pub mod show;
pub mod validate;

use crate::config::Settings;
use crate::provider::SimulatedProvider;
use crate::stack::Stack;
use crate::state::StateFile;
use anyhow::Result;
use stackgraph::{Catalog, RetryingEngine, ValidatedGraph};
use std::path::PathBuf;

/// Everything a command needs beyond its own arguments
pub struct Context {
    pub quiet: bool,
    pub settings: Settings,
    /// Stack file, or the built-in stack when unset
    pub stack: Option<PathBuf>,
    pub state_path: PathBuf,
}

impl Context {
    pub fn load_stack(&self) -> Result<Stack> {
        Stack::load_or_builtin(self.stack.as_deref())
    }

    /// Load and validate the stack against the standard catalog
    pub fn load_graph(&self) -> Result<(Stack, ValidatedGraph)> {
        let stack = self.load_stack()?;
        let graph = stack.validate(&Catalog::standard())?;
        Ok((stack, graph))
    }

    pub fn load_state(&self) -> Result<StateFile> {
        StateFile::load(&self.state_path)
    }

    /// Provider wrapped with the configured retry policy
    pub fn engine(&self) -> RetryingEngine<SimulatedProvider> {
        RetryingEngine::new(
            SimulatedProvider::new(&self.settings.provider),
            self.settings.retry.to_config(),
        )
    }

    pub fn jobs(&self, flag: Option<usize>) -> usize {
        flag.unwrap_or(self.settings.jobs)
    }
}

/// Confirm with user
pub fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}
