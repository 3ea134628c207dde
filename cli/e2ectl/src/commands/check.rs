//! Manifest validation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::manifest;

#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Scenario manifest (TOML).
    #[arg(long, short)]
    manifest: PathBuf,
}

impl CheckCommand {
    pub fn run(self) -> Result<()> {
        let cases = manifest::cases_from_path(&self.manifest)?;
        provider_e2e::scenario::ensure_unique_templates(&cases)?;

        for case in &cases {
            println!(
                "{} {} ({} fields)",
                "ok".green(),
                case.template,
                case.expected.len()
            );
        }
        println!("{} scenarios valid", cases.len());
        Ok(())
    }
}
