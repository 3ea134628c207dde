//! Running shell commands inside an environment.

use std::sync::Arc;

use tracing::info;

use crate::environment::EnvironmentHandle;
use crate::error::ExecError;
use crate::runtime::ContainerRuntime;

/// Shell used for every command.
pub const SHELL: &str = "/bin/sh";

/// Output and exit status of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Standard output and standard error, interleaved.
    pub output: String,
    pub exit_code: i64,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs commands through the shell inside a running environment.
#[derive(Clone)]
pub struct CommandExecutor {
    runtime: Arc<dyn ContainerRuntime>,
}

impl CommandExecutor {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Run `command` and wait for it to terminate.
    ///
    /// A nonzero exit is returned in [`ExecutionResult::exit_code`]; only
    /// control API failures are errors.
    pub async fn exec(
        &self,
        handle: &EnvironmentHandle,
        command: &str,
    ) -> Result<ExecutionResult, ExecError> {
        info!(container_id = %handle.id(), command, "Exec container cmd");

        let raw = self
            .runtime
            .exec(handle.id(), &shell_argv(command))
            .await
            .map_err(|e| ExecError::connection(handle.id(), e.to_string()))?;

        let exit_code = raw.exit_code.ok_or_else(|| {
            ExecError::connection(handle.id(), "exec inspect reported no exit code")
        })?;
        let output = String::from_utf8_lossy(&raw.output).into_owned();

        info!(
            container_id = %handle.id(),
            exit_code,
            "Exec container output:\n{output}"
        );

        Ok(ExecutionResult { output, exit_code })
    }
}

/// Wrap `command` so the shell merges stderr into stdout in emission order.
/// The newline keeps a trailing comment in `command` from eating the brace.
fn shell_argv(command: &str) -> Vec<String> {
    vec![
        SHELL.to_string(),
        "-c".to_string(),
        format!("{{ {command}\n}} 2>&1"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ContainerSpec, MockRuntime};

    async fn handle_for(runtime: &MockRuntime) -> EnvironmentHandle {
        let id = runtime.launch(&ContainerSpec::default()).await.unwrap();
        EnvironmentHandle::new(id)
    }

    #[test]
    fn test_shell_argv_merges_streams() {
        let argv = shell_argv("cat /tmp/x.json");
        assert_eq!(argv[0], "/bin/sh");
        assert_eq!(argv[1], "-c");
        assert_eq!(argv[2], "{ cat /tmp/x.json\n} 2>&1");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        let runtime = Arc::new(MockRuntime::new().respond("false", "boom", 1));
        let handle = handle_for(&runtime).await;
        let executor = CommandExecutor::new(runtime.clone());

        let result = executor.exec(&handle, "false").await.unwrap();
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.output, "boom");
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_connection_failure_is_exec_error() {
        let runtime = Arc::new(MockRuntime::new().disconnected());
        let handle = EnvironmentHandle::new("mock_gone");
        let executor = CommandExecutor::new(runtime);

        let err = executor.exec(&handle, "true").await.unwrap_err();
        assert!(matches!(err, ExecError::Connection { ref container_id, .. } if container_id == "mock_gone"));
    }
}
