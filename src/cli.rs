use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "webtier")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declare, plan and provision a three-tier web deployment", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Stack file to use instead of the built-in web tier
    #[arg(long, global = true, env = "WEBTIER_STACK")]
    pub stack: Option<PathBuf>,

    /// State file (defaults to ~/.local/state/webtier/state.toml)
    #[arg(long, global = true, env = "WEBTIER_STATE")]
    pub state: Option<PathBuf>,

    /// Settings file (defaults to ~/.config/webtier/config.toml)
    #[arg(long, global = true, env = "WEBTIER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check the stack: attributes, reference kinds, cycles
    Validate,

    /// Show what apply would change (never calls the provider)
    Plan(PlanArgs),

    /// Plan and provision the stack
    Apply(ApplyArgs),

    /// Delete everything recorded in state, dependents first
    Destroy(ApplyArgs),

    /// Show recorded resources and their outputs
    Show,

    /// Show resource kinds and their attributes
    Catalog {
        /// Only show this kind (e.g. LaunchTemplate)
        kind: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct PlanArgs {
    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,

    /// Write the plan as JSON to a file
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Dry run - show what would be done
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of parallel provider calls (overrides settings)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}
