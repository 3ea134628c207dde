//! Error display for the CLI.

use colored::Colorize;
use provider_e2e::error::SetupError;
use provider_e2e::HarnessError;

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let Some(harness_err) = err.chain().find_map(|e| e.downcast_ref::<HarnessError>()) else {
        return;
    };

    let hint = match harness_err {
        HarnessError::Setup(SetupError::Provision(message)) if message.contains("build the provider") => {
            Some("Hint: Build the provider binary in the repository root first.")
        }
        HarnessError::Setup(SetupError::Provision(_)) => {
            Some("Hint: Is the Docker daemon running and reachable via DOCKER_HOST?")
        }
        HarnessError::Setup(SetupError::ReadinessTimeout { .. }) => {
            Some("Hint: Raise E2E_READY_TIMEOUT_SECS if the image is slow to start.")
        }
        HarnessError::DeadlineExceeded(_) => Some("Hint: Raise TIMEOUT_MINS for slower machines."),
        _ => None,
    };

    if let Some(hint) = hint {
        eprintln!("\n{}", hint.yellow());
    }
}
