//! CLI commands.

mod check;
mod run;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// e2ectl - run provider scenarios against a throwaway service instance.
#[derive(Debug, Parser)]
#[command(name = "e2ectl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Provision an environment and run the scenarios in a manifest.
    Run(run::RunCommand),

    /// Validate a manifest and compile its patterns without running anything.
    Check(check::CheckCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Run(cmd) => cmd.run().await,
            Commands::Check(cmd) => cmd.run(),
            Commands::Version => {
                println!("e2ectl {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}
