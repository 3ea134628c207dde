//! Run orchestration.
//!
//! A run provisions one environment, waits for it, performs first-time
//! setup, runs every scenario against it and removes it. One deadline
//! covers all of it. The environment is released on every exit path once
//! it exists: success, setup failure, deadline expiry and panic.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::time::Instant;
use tracing::{error, info};

use crate::commands::CommandLayout;
use crate::config::{Credentials, HarnessConfig, ReadinessPolicy};
use crate::docker::DockerRuntime;
use crate::environment::{Environment, ProviderOverride, ProvisionConfig, Provisioner};
use crate::error::{HarnessError, Result};
use crate::report::RunReport;
use crate::runtime::ContainerRuntime;
use crate::scenario::{ensure_unique_templates, ScenarioRunner, TestCase};

/// Drives a run against one environment.
pub struct Harness {
    provisioner: Provisioner,
    layout: CommandLayout,
    readiness: ReadinessPolicy,
    credentials: Credentials,
    run_timeout: Duration,
}

impl Harness {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: &HarnessConfig) -> Self {
        Self {
            provisioner: Provisioner::new(runtime),
            layout: CommandLayout::default(),
            readiness: config.readiness,
            credentials: config.credentials.clone(),
            run_timeout: config.run_timeout,
        }
    }

    pub fn with_layout(mut self, layout: CommandLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn layout(&self) -> &CommandLayout {
        &self.layout
    }

    /// Run `cases` in a fresh environment.
    ///
    /// Setup failures and deadline expiry are errors; scenario failures are
    /// recorded in the returned report.
    pub async fn run(&self, provision: &ProvisionConfig, cases: &[TestCase]) -> Result<RunReport> {
        ensure_unique_templates(cases)?;

        let deadline = Instant::now().checked_add(self.run_timeout).ok_or_else(|| {
            HarnessError::Config(format!("run timeout too large: {:?}", self.run_timeout))
        })?;

        let mut env = tokio::time::timeout_at(deadline, self.provisioner.provision(provision))
            .await
            .map_err(|_| HarnessError::DeadlineExceeded(self.run_timeout))??;

        let outcome = AssertUnwindSafe(tokio::time::timeout_at(
            deadline,
            self.drive(&mut env, cases),
        ))
        .catch_unwind()
        .await;

        self.provisioner.release(&mut env).await;

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                error!(timeout_secs = self.run_timeout.as_secs(), "Run deadline exceeded");
                Err(HarnessError::DeadlineExceeded(self.run_timeout))
            }
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn drive(&self, env: &mut Environment, cases: &[TestCase]) -> Result<RunReport> {
        self.provisioner
            .await_ready(env, &self.layout.health_check(), self.readiness)
            .await?;
        self.provisioner
            .bootstrap(env, &self.layout, &self.credentials)
            .await?;

        let runner = ScenarioRunner::new(self.provisioner.executor().clone(), self.layout.clone());
        let report = RunReport::new(runner.run(env.handle(), cases).await);

        info!(
            total = report.cases.len(),
            failed = report.failed_count(),
            "Scenarios finished"
        );
        Ok(report)
    }
}

/// Run `cases` against the service image on the local Docker daemon, with the
/// locally built provider mounted in.
pub async fn run_against_docker(config: &HarnessConfig, cases: &[TestCase]) -> Result<RunReport> {
    info!(image = %config.image_ref(), src_dir = %config.src_dir.display(), "Using service image");

    let provider = ProviderOverride::prepare(&config.src_dir, &config.provider_binary)?;
    let harness = Harness::new(Arc::new(DockerRuntime::new()), config);
    let provision = ProvisionConfig::for_service(config, harness.layout(), provider.mounts());

    harness.run(&provision, cases).await
}
