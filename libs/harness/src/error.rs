//! Error types for the end-to-end harness.
//!
//! Errors are layered the same way the run is:
//! - [`SetupError`]: fatal to the whole run (no environment, no scenarios)
//! - [`ScenarioError`]: fatal to one scenario only
//! - [`HarnessError`]: what a run as a whole reports to its caller

use std::time::Duration;

use thiserror::Error;

/// Failure talking to the container control API.
///
/// A command that runs and exits nonzero is not an `ExecError`; that is
/// reported through [`crate::exec::ExecutionResult::exit_code`].
#[derive(Debug, Error)]
pub enum ExecError {
    /// create-exec, attach or inspect failed.
    #[error("exec in container {container_id} failed: {message}")]
    Connection {
        container_id: String,
        message: String,
    },
}

impl ExecError {
    pub fn connection(container_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            container_id: container_id.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while bringing up the environment.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The control API was unreachable or create/start failed.
    #[error("failed to provision environment: {0}")]
    Provision(String),

    /// The health check never succeeded inside the readiness window.
    #[error("environment {container_id} not ready after {timeout:?} ({attempts} health checks)")]
    ReadinessTimeout {
        container_id: String,
        timeout: Duration,
        attempts: u32,
    },

    /// First-run account creation exited nonzero.
    #[error("first-time setup failed with exit code {exit_code}: {output}")]
    Bootstrap { exit_code: i64, output: String },

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Errors that abort a single scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("template push for {template} exited with {exit_code}: {output}")]
    PushFailed {
        template: String,
        exit_code: i64,
        output: String,
    },

    #[error("creating workspace from {template} exited with {exit_code}: {output}")]
    InstantiateFailed {
        template: String,
        exit_code: i64,
        output: String,
    },

    #[error("fetching {path} exited with {exit_code}: {output}")]
    FetchFailed {
        path: String,
        exit_code: i64,
        output: String,
    },

    #[error("artifact {path} is not a flat string map: {message}")]
    DecodeFailed { path: String, message: String },
}

/// A malformed expectation, caught when the table is built.
#[derive(Debug, Error)]
pub enum ExpectationError {
    #[error("invalid pattern {pattern:?} for field {field}: {source}")]
    InvalidPattern {
        field: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("field {0} declared twice")]
    DuplicateField(String),
}

/// Top-level run errors.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("run deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("template {0} declared by more than one test case")]
    DuplicateTemplate(String),

    #[error("{failed} of {total} scenarios failed")]
    ScenariosFailed { failed: usize, total: usize },
}

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;
