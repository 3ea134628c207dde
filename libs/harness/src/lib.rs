//! End-to-end harness for testing a provider against a live service.
//!
//! A run stands up one throwaway service container, drives the service CLI
//! inside it to import fixture templates and create workspaces from them,
//! then checks the artifact each workspace writes against a table of
//! expected patterns.
//!
//! ## Architecture
//!
//! - **Provisioner** (`environment`): creates, readies, bootstraps and removes the container
//! - **Executor** (`exec`): runs shell commands inside it
//! - **Scenario runner** (`scenario`): push, create, fetch per test case
//! - **Validator** (`validate`): closed-world pattern comparison
//!
//! The container control API sits behind [`runtime::ContainerRuntime`];
//! [`docker::DockerRuntime`] is the real one and [`runtime::MockRuntime`]
//! scripts responses for tests.

pub mod commands;
pub mod config;
pub mod docker;
pub mod environment;
pub mod error;
pub mod exec;
pub mod expect;
pub mod harness;
pub mod report;
pub mod runtime;
pub mod scenario;
pub mod validate;

pub use config::{HarnessConfig, ReadinessPolicy};
pub use error::{HarnessError, Result};
pub use expect::Expectations;
pub use harness::{run_against_docker, Harness};
pub use report::{CaseOutcome, RunReport};
pub use scenario::TestCase;
pub use validate::{validate, Violation};
