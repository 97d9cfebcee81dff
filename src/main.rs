mod cli;
mod commands;
mod config;
mod progress;
mod provider;
mod render;
mod stack;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use commands::Context;
use config::Settings;
use std::io;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match cli.command {
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "webtier", &mut io::stdout());
            Ok(())
        }
        Command::Catalog { kind } => commands::catalog::run(kind.as_deref()),
        command => {
            let settings = Settings::load(cli.config.as_deref())?;
            let state_path = settings.state_path(cli.state.as_deref())?;
            let ctx = Context {
                quiet: cli.quiet,
                settings,
                stack: cli.stack,
                state_path,
            };

            match command {
                Command::Validate => commands::validate::run(&ctx),
                Command::Plan(args) => commands::plan::run(&ctx, &args),
                Command::Apply(args) => commands::apply::run(&ctx, &args),
                Command::Destroy(args) => commands::destroy::run(&ctx, &args),
                Command::Show => commands::show::run(&ctx),
                Command::Completions { .. } | Command::Catalog { .. } => Ok(()),
            }
        }
    }
}
