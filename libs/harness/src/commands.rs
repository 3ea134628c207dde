//! Shell commands issued against the service CLI.

use crate::config::{Credentials, LOCAL_ACCESS_URL};

/// Where the CLI, fixtures and artifacts live inside the environment.
#[derive(Debug, Clone)]
pub struct CommandLayout {
    /// Service CLI binary.
    pub cli: String,

    /// URL the service answers on from inside the container.
    pub access_url: String,

    /// Directory holding one fixture directory per template.
    pub fixtures_root: String,

    /// Directory templates write their artifact into.
    pub artifact_dir: String,
}

impl Default for CommandLayout {
    fn default() -> Self {
        Self {
            cli: "coder".to_string(),
            access_url: LOCAL_ACCESS_URL.to_string(),
            fixtures_root: "/src/integration".to_string(),
            artifact_dir: "/tmp".to_string(),
        }
    }
}

impl CommandLayout {
    /// Exit status 0 once the API answers.
    pub fn health_check(&self) -> String {
        format!("curl -s --fail {}/api/v2/buildinfo", self.access_url)
    }

    /// First-run account creation.
    pub fn login(&self, credentials: &Credentials) -> String {
        format!(
            "{} login {} --first-user-email={} --first-user-password={} --first-user-trial=false --first-user-username={}",
            self.cli,
            self.access_url,
            shell_quote(&credentials.email),
            shell_quote(&credentials.password),
            shell_quote(&credentials.username),
        )
    }

    /// Import the fixture directory named `template`.
    pub fn push_template(&self, template: &str) -> String {
        format!(
            "{} templates push {template} --directory {}/{template} --var output_path={} --yes",
            self.cli,
            self.fixtures_root,
            self.artifact_path(template),
        )
    }

    /// Create a workspace named after `template` from it.
    pub fn create_workspace(&self, template: &str) -> String {
        format!("{} create {template} -t {template} --yes", self.cli)
    }

    /// Print the artifact written by `template`.
    pub fn fetch_artifact(&self, template: &str) -> String {
        format!("cat {}", self.artifact_path(template))
    }

    /// Artifact path, unique per template.
    pub fn artifact_path(&self, template: &str) -> String {
        format!("{}/{template}.json", self.artifact_dir.trim_end_matches('/'))
    }
}

/// Quote `value` as a single POSIX shell word.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
