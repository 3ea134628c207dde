//! Container runtime interface and mock implementation.
//!
//! The runtime interface abstracts the container control API the harness
//! consumes:
//! - Creating and starting a container from an image
//! - Running a command inside it and collecting output and exit status
//! - Force-removing it
//!
//! [`crate::docker::DockerRuntime`] talks to a real daemon. [`MockRuntime`]
//! scripts command responses for tests.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

/// Control API failure.
#[derive(Debug, Error)]
#[error("{operation} failed: {message}")]
pub struct RuntimeError {
    pub operation: &'static str,
    pub message: String,
}

impl RuntimeError {
    pub fn new(operation: &'static str, message: impl ToString) -> Self {
        Self {
            operation,
            message: message.to_string(),
        }
    }
}

/// A host path bind-mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub host_path: PathBuf,
    pub container_path: String,
}

impl BindMount {
    pub fn new(host_path: impl Into<PathBuf>, container_path: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
        }
    }
}

/// Everything needed to create one container.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    pub image: String,
    pub tag: String,
    pub env: Vec<(String, String)>,
    pub mounts: Vec<BindMount>,
}

/// Raw result of one exec, before the executor interprets it.
#[derive(Debug, Clone, Default)]
pub struct RawExec {
    /// Drained output of the exec stream.
    pub output: Vec<u8>,

    /// Exit status reported by exec-inspect; `None` if the runtime has none.
    pub exit_code: Option<i64>,
}

/// Container runtime interface.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create and start a container, returning its id.
    async fn launch(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    /// Run `argv` inside the container and wait for it to finish.
    async fn exec(&self, container_id: &str, argv: &[String]) -> Result<RawExec, RuntimeError>;

    /// Force-remove the container. Unknown ids are not an error.
    async fn remove(&self, container_id: &str) -> Result<(), RuntimeError>;
}

enum Reply {
    Output { output: String, exit_code: i64 },
    Hang,
    Panic,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Reply,
    Hang,
    Panic,
}

struct Rule {
    contains: String,
    replies: VecDeque<(String, i64)>,
    behavior: Behavior,
}

impl Rule {
    fn next_reply(&mut self) -> Reply {
        match self.behavior {
            Behavior::Hang => return Reply::Hang,
            Behavior::Panic => return Reply::Panic,
            Behavior::Reply => {}
        }
        let (output, exit_code) = if self.replies.len() > 1 {
            self.replies.pop_front().unwrap_or_default()
        } else {
            self.replies.front().cloned().unwrap_or_default()
        };
        Reply::Output { output, exit_code }
    }
}

#[derive(Default)]
struct MockState {
    rules: Vec<Rule>,
    commands: Vec<String>,
    launched: Vec<ContainerSpec>,
    live: HashSet<String>,
    remove_calls: u32,
    next_id: u64,
    fail_launch: bool,
    disconnected: bool,
    remove_hangs: bool,
    remove_fails: bool,
}

/// Mock runtime for tests.
///
/// Commands are answered by the first rule whose pattern is a substring of
/// the shell script; unmatched commands succeed with no output.
#[derive(Default)]
pub struct MockRuntime {
    state: Mutex<MockState>,
}

impl MockRuntime {
    /// Create a new mock runtime.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock runtime that fails every launch.
    pub fn failing() -> Self {
        let runtime = Self::new();
        runtime.lock().fail_launch = true;
        runtime
    }

    /// Make every exec fail at the control API level.
    pub fn disconnected(self) -> Self {
        self.lock().disconnected = true;
        self
    }

    /// Never complete `remove` calls.
    pub fn hang_on_remove(self) -> Self {
        self.lock().remove_hangs = true;
        self
    }

    /// Fail every `remove` call; the container stays live.
    pub fn fail_remove(self) -> Self {
        self.lock().remove_fails = true;
        self
    }

    /// Answer commands containing `contains` with a fixed reply.
    pub fn respond(self, contains: &str, output: &str, exit_code: i64) -> Self {
        self.respond_sequence(contains, vec![(output, exit_code)])
    }

    /// Answer commands containing `contains` with `replies` in order,
    /// repeating the last one once the rest are used up.
    pub fn respond_sequence(self, contains: &str, replies: Vec<(&str, i64)>) -> Self {
        self.lock().rules.push(Rule {
            contains: contains.to_string(),
            replies: replies
                .into_iter()
                .map(|(out, code)| (out.to_string(), code))
                .collect(),
            behavior: Behavior::Reply,
        });
        self
    }

    /// Never complete commands containing `contains`.
    pub fn hang_on(self, contains: &str) -> Self {
        self.push_rule(contains, Behavior::Hang)
    }

    /// Panic while running commands containing `contains`.
    pub fn panic_on(self, contains: &str) -> Self {
        self.push_rule(contains, Behavior::Panic)
    }

    fn push_rule(self, contains: &str, behavior: Behavior) -> Self {
        self.lock().rules.push(Rule {
            contains: contains.to_string(),
            replies: VecDeque::new(),
            behavior,
        });
        self
    }

    /// Shell scripts of every exec issued, in order.
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    /// Number of exec calls whose script contains `needle`.
    pub fn count_commands(&self, needle: &str) -> usize {
        self.lock()
            .commands
            .iter()
            .filter(|c| c.contains(needle))
            .count()
    }

    /// Specs passed to `launch`, in order.
    pub fn launched(&self) -> Vec<ContainerSpec> {
        self.lock().launched.clone()
    }

    /// Number of `remove` calls, including repeated ones.
    pub fn remove_calls(&self) -> u32 {
        self.lock().remove_calls
    }

    /// Containers launched and not yet removed.
    pub fn live_containers(&self) -> usize {
        self.lock().live.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn launch(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let mut state = self.lock();
        if state.fail_launch {
            return Err(RuntimeError::new("container create", "mock runtime configured to fail"));
        }

        state.next_id += 1;
        let id = format!("mock_{:012x}", state.next_id);
        state.launched.push(spec.clone());
        state.live.insert(id.clone());

        info!(container_id = %id, image = %spec.image, tag = %spec.tag, "[MOCK] Container started");
        Ok(id)
    }

    async fn exec(&self, container_id: &str, argv: &[String]) -> Result<RawExec, RuntimeError> {
        let reply = {
            let mut state = self.lock();
            if state.disconnected {
                return Err(RuntimeError::new("exec create", "mock runtime disconnected"));
            }
            if !state.live.contains(container_id) {
                return Err(RuntimeError::new(
                    "exec create",
                    format!("no such container: {container_id}"),
                ));
            }

            let script = argv.last().cloned().unwrap_or_default();
            state.commands.push(script.clone());
            debug!(container_id, script = %script, "[MOCK] Exec");

            state
                .rules
                .iter_mut()
                .find(|rule| script.contains(&rule.contains))
                .map(Rule::next_reply)
        };

        match reply {
            Some(Reply::Hang) => std::future::pending::<Result<RawExec, RuntimeError>>().await,
            Some(Reply::Panic) => panic!("[MOCK] exec panicked for {container_id}"),
            Some(Reply::Output { output, exit_code }) => Ok(RawExec {
                output: output.into_bytes(),
                exit_code: Some(exit_code),
            }),
            None => Ok(RawExec {
                output: Vec::new(),
                exit_code: Some(0),
            }),
        }
    }

    async fn remove(&self, container_id: &str) -> Result<(), RuntimeError> {
        let hangs = {
            let mut state = self.lock();
            state.remove_calls += 1;
            if state.remove_fails {
                return Err(RuntimeError::new("container remove", "mock runtime configured to fail"));
            }
            state.remove_hangs
        };

        if hangs {
            std::future::pending::<()>().await;
        }

        self.lock().live.remove(container_id);
        info!(container_id, "[MOCK] Container removed");
        Ok(())
    }
}
