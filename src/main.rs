//! Kolosal Pipeline - Main Entry Point
//!
//! Runs the Iris walkthrough by default.

use clap::Parser;
use kolosal_pipeline::cli::{cmd_demo, cmd_info, cmd_run, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_pipeline=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Demo { test_size, seed }) => {
            cmd_demo(test_size, seed)?;
        }
        Some(Commands::Run { config }) => {
            cmd_run(&config)?;
        }
        Some(Commands::Info { data, target }) => {
            cmd_info(data.as_deref(), target.as_deref())?;
        }
        None => {
            cmd_demo(0.2, 42)?;
        }
    }

    Ok(())
}
