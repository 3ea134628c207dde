//! Scenario runs.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use provider_e2e::config::run_timeout_from_mins;
use provider_e2e::{HarnessConfig, RunReport};
use tracing::info;

use crate::manifest;

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Scenario manifest (TOML).
    #[arg(long, short)]
    manifest: PathBuf,

    /// Only run these templates (repeatable).
    #[arg(long)]
    only: Vec<String>,

    /// Service image, without tag.
    #[arg(long, env = "CODER_IMAGE")]
    image: Option<String>,

    /// Service image tag.
    #[arg(long = "image-version", env = "CODER_VERSION")]
    image_version: Option<String>,

    /// Run deadline in minutes.
    #[arg(long, env = "TIMEOUT_MINS")]
    timeout_mins: Option<u64>,

    /// Repository root holding the provider build and fixtures.
    #[arg(long, env = "E2E_SRC_DIR")]
    src_dir: Option<PathBuf>,
}

impl RunCommand {
    pub async fn run(self) -> Result<()> {
        let mut config = HarnessConfig::from_env()?;
        if let Some(image) = self.image {
            config.image = image;
        }
        if let Some(version) = self.image_version {
            config.version = version;
        }
        if let Some(mins) = self.timeout_mins {
            config.run_timeout = run_timeout_from_mins(mins)?;
        }
        if let Some(src_dir) = self.src_dir {
            config.src_dir = src_dir;
        }

        let mut cases = manifest::cases_from_path(&self.manifest)?;
        if !self.only.is_empty() {
            cases.retain(|case| self.only.contains(&case.template));
            if cases.is_empty() {
                anyhow::bail!("no scenarios match --only {}", self.only.join(", "));
            }
        }

        info!(
            image = %config.image_ref(),
            scenarios = cases.len(),
            timeout_secs = config.run_timeout.as_secs(),
            "Starting run"
        );

        let report = provider_e2e::run_against_docker(&config, &cases)
            .await
            .context("run aborted")?;

        print_report(&report);
        report.into_result()?;
        Ok(())
    }
}

fn print_report(report: &RunReport) {
    for case in &report.cases {
        let status = if case.passed() {
            case.status().green().bold()
        } else {
            case.status().red().bold()
        };
        println!("{status} {}", case.title());
        for line in case.details() {
            println!("    {line}");
        }
    }

    let summary = report.summary();
    if report.passed() {
        println!("\n{}", summary.green());
    } else {
        println!("\n{}", summary.red());
    }
}
