//! Ephemeral service environments.
//!
//! An [`Environment`] is one container running the service under test. The
//! [`Provisioner`] drives it through its lifecycle:
//!
//! ```text
//! provision      await_ready    release
//! ─────────► Started ─────────► Ready ─────────► Removed
//! ```
//!
//! `release` is valid from any state and may be called more than once.
//!
//! The runtime creates and starts a container in one call, so `provision`
//! hands back an environment that is already `Started`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::commands::CommandLayout;
use crate::config::{Credentials, HarnessConfig, ReadinessPolicy};
use crate::error::SetupError;
use crate::exec::CommandExecutor;
use crate::runtime::{BindMount, ContainerRuntime, ContainerSpec};

/// Where the terraform CLI config lands inside the container.
pub const TFRC_CONTAINER_PATH: &str = "/tmp/integration.tfrc";

/// Where the repository is mounted inside the container.
pub const SRC_CONTAINER_PATH: &str = "/src";

/// Provider address redirected to the local build.
pub const PROVIDER_ADDRESS: &str = "coder/coder";

/// Upper bound on a single removal call.
pub const RELEASE_TIMEOUT: Duration = Duration::from_secs(30);

/// Opaque handle assigned by the container runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentHandle {
    id: String,
}

impl EnvironmentHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for EnvironmentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Lifecycle state of an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentState {
    /// Known to the runtime but not running. Not observed through
    /// [`Provisioner`], whose `provision` creates and starts in one step.
    Created,
    Started,
    Ready,
    Removed,
}

/// What to provision.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub image: String,
    pub version: String,
    pub env: Vec<(String, String)>,
    pub mounts: Vec<BindMount>,
}

impl ProvisionConfig {
    /// Service container with the settings an isolated test instance needs.
    pub fn for_service(config: &HarnessConfig, layout: &CommandLayout, mounts: Vec<BindMount>) -> Self {
        let env = vec![
            // Set explicitly so the service does not hand out tunnel URLs.
            ("CODER_ACCESS_URL".to_string(), layout.access_url.clone()),
            ("CODER_IN_MEMORY".to_string(), "true".to_string()),
            ("CODER_TELEMETRY_ENABLE".to_string(), "false".to_string()),
            ("TF_CLI_CONFIG_FILE".to_string(), TFRC_CONTAINER_PATH.to_string()),
        ];

        Self {
            image: config.image.clone(),
            version: config.version.clone(),
            env,
            mounts,
        }
    }
}

/// One running service instance.
#[derive(Debug)]
pub struct Environment {
    handle: EnvironmentHandle,
    state: EnvironmentState,
    image_ref: String,
    mounts: Vec<BindMount>,
    env: Vec<(String, String)>,
}

impl Environment {
    pub fn handle(&self) -> &EnvironmentHandle {
        &self.handle
    }

    pub fn state(&self) -> EnvironmentState {
        self.state
    }

    pub fn image_ref(&self) -> &str {
        &self.image_ref
    }

    pub fn mounts(&self) -> &[BindMount] {
        &self.mounts
    }

    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }
}

/// Terraform CLI config redirecting the provider to a local build.
///
/// The config file lives in a temporary directory that is deleted when this
/// value is dropped, so it must outlive the environment it is mounted into.
#[derive(Debug)]
pub struct ProviderOverride {
    _dir: TempDir,
    tfrc_path: PathBuf,
    src_dir: PathBuf,
}

impl ProviderOverride {
    /// Check the provider binary under `src_dir` and write the override config.
    pub fn prepare(src_dir: &Path, provider_binary: &str) -> Result<Self, SetupError> {
        let src_dir = std::fs::canonicalize(src_dir).map_err(|e| {
            SetupError::Provision(format!("source dir {}: {e}", src_dir.display()))
        })?;

        let binary = src_dir.join(provider_binary);
        if !binary.is_file() {
            return Err(SetupError::Provision(format!(
                "not found: {} - please build the provider first",
                binary.display()
            )));
        }

        let dir = tempfile::tempdir()
            .map_err(|e| SetupError::Provision(format!("create temp dir: {e}")))?;
        let tfrc_path = dir.path().join("integration.tfrc");
        std::fs::write(&tfrc_path, tfrc_contents(PROVIDER_ADDRESS, SRC_CONTAINER_PATH))
            .map_err(|e| SetupError::Provision(format!("write terraformrc: {e}")))?;

        debug!(src_dir = %src_dir.display(), tfrc = %tfrc_path.display(), "Provider override prepared");

        Ok(Self {
            _dir: dir,
            tfrc_path,
            src_dir,
        })
    }

    /// Bind mounts for the override config and the source tree.
    pub fn mounts(&self) -> Vec<BindMount> {
        vec![
            BindMount::new(&self.tfrc_path, TFRC_CONTAINER_PATH),
            BindMount::new(&self.src_dir, SRC_CONTAINER_PATH),
        ]
    }
}

fn tfrc_contents(provider_address: &str, provider_dir: &str) -> String {
    format!(
        r#"provider_installation {{
  dev_overrides {{
    "{provider_address}" = "{provider_dir}"
  }}
  direct {{}}
}}
"#
    )
}

/// Creates, readies, bootstraps and removes environments.
pub struct Provisioner {
    runtime: Arc<dyn ContainerRuntime>,
    executor: CommandExecutor,
}

impl Provisioner {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        let executor = CommandExecutor::new(Arc::clone(&runtime));
        Self { runtime, executor }
    }

    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    /// Create and start one instance.
    pub async fn provision(&self, config: &ProvisionConfig) -> Result<Environment, SetupError> {
        let image_ref = format!("{}:{}", config.image, config.version);
        info!(image = %image_ref, "Using service image");

        let spec = ContainerSpec {
            image: config.image.clone(),
            tag: config.version.clone(),
            env: config.env.clone(),
            mounts: config.mounts.clone(),
        };

        let id = self
            .runtime
            .launch(&spec)
            .await
            .map_err(|e| SetupError::Provision(e.to_string()))?;

        info!(container_id = %id, "Started container");

        Ok(Environment {
            handle: EnvironmentHandle::new(id),
            state: EnvironmentState::Started,
            image_ref,
            mounts: config.mounts.clone(),
            env: config.env.clone(),
        })
    }

    /// Poll `health_check` until it exits 0.
    ///
    /// Returns within `policy.timeout + policy.interval` even if a health
    /// check itself never completes.
    pub async fn await_ready(
        &self,
        env: &mut Environment,
        health_check: &str,
        policy: ReadinessPolicy,
    ) -> Result<(), SetupError> {
        if env.state == EnvironmentState::Ready {
            return Ok(());
        }

        let started = Instant::now();
        let mut attempts = 0u32;

        let poll = async {
            loop {
                attempts += 1;
                let result = self.executor.exec(&env.handle, health_check).await?;
                if result.success() {
                    return Ok::<bool, SetupError>(true);
                }

                if started.elapsed() >= policy.timeout {
                    return Ok(false);
                }
                info!(container_id = %env.handle, attempt = attempts, "Not ready yet...");
                tokio::time::sleep(policy.interval).await;
            }
        };

        let bound = policy.timeout.saturating_add(policy.interval);
        let ready = match tokio::time::timeout(bound, poll).await {
            Ok(outcome) => outcome?,
            Err(_) => false,
        };

        if !ready {
            return Err(SetupError::ReadinessTimeout {
                container_id: env.handle.id().to_string(),
                timeout: policy.timeout,
                attempts,
            });
        }

        env.state = EnvironmentState::Ready;
        info!(
            container_id = %env.handle,
            attempts,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Environment ready"
        );
        Ok(())
    }

    /// Run first-time setup; any nonzero exit is fatal.
    pub async fn bootstrap(
        &self,
        env: &Environment,
        layout: &CommandLayout,
        credentials: &Credentials,
    ) -> Result<(), SetupError> {
        let result = self
            .executor
            .exec(&env.handle, &layout.login(credentials))
            .await?;

        if !result.success() {
            return Err(SetupError::Bootstrap {
                exit_code: result.exit_code,
                output: result.output,
            });
        }

        info!(container_id = %env.handle, username = %credentials.username, "First-time setup complete");
        Ok(())
    }

    /// Force-remove the environment. Safe to call repeatedly.
    pub async fn release(&self, env: &mut Environment) {
        if env.state == EnvironmentState::Removed {
            debug!(container_id = %env.handle, "Environment already released");
            return;
        }

        info!(container_id = %env.handle, "Stopping container");
        match tokio::time::timeout(RELEASE_TIMEOUT, self.runtime.remove(env.handle.id())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(container_id = %env.handle, error = %e, "Container removal failed"),
            Err(_) => warn!(
                container_id = %env.handle,
                timeout_secs = RELEASE_TIMEOUT.as_secs(),
                "Container removal timed out"
            ),
        }
        env.state = EnvironmentState::Removed;
    }
}
