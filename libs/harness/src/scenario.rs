//! Scenario execution: push a template, create a workspace from it, fetch
//! and check the artifact it writes.
//!
//! Cases run one at a time against the same environment. Templates,
//! workspaces and artifacts are named after the case's template, so two
//! cases with the same template would collide; [`ensure_unique_templates`]
//! rejects that before anything runs.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{error, info, info_span, Instrument};

use crate::commands::CommandLayout;
use crate::environment::EnvironmentHandle;
use crate::error::{HarnessError, ScenarioError};
use crate::exec::CommandExecutor;
use crate::expect::Expectations;
use crate::report::{CaseOutcome, CaseReport};
use crate::validate::{validate, ActualOutput};

/// One declared scenario.
#[derive(Debug, Clone)]
pub struct TestCase {
    /// Fixture directory name; also the template and workspace name.
    pub template: String,

    /// Expected artifact contents.
    pub expected: Expectations,
}

impl TestCase {
    pub fn new(template: impl Into<String>, expected: Expectations) -> Self {
        Self {
            template: template.into(),
            expected,
        }
    }
}

/// Reject case lists that reuse a template name.
pub fn ensure_unique_templates(cases: &[TestCase]) -> Result<(), HarnessError> {
    let mut seen = HashSet::new();
    for case in cases {
        if !seen.insert(case.template.as_str()) {
            return Err(HarnessError::DuplicateTemplate(case.template.clone()));
        }
    }
    Ok(())
}

/// Runs scenarios through the service CLI.
pub struct ScenarioRunner {
    executor: CommandExecutor,
    layout: CommandLayout,
}

impl ScenarioRunner {
    pub fn new(executor: CommandExecutor, layout: CommandLayout) -> Self {
        Self { executor, layout }
    }

    /// Run every case in order; one failing case does not stop the rest.
    pub async fn run(&self, handle: &EnvironmentHandle, cases: &[TestCase]) -> Vec<CaseReport> {
        let mut reports = Vec::with_capacity(cases.len());
        for case in cases {
            let span = info_span!("scenario", template = %case.template);
            reports.push(self.run_case(handle, case).instrument(span).await);
        }
        reports
    }

    /// Run one case and check its artifact.
    pub async fn run_case(&self, handle: &EnvironmentHandle, case: &TestCase) -> CaseReport {
        let started = Instant::now();

        let outcome = match self.fetch_output(handle, &case.template).await {
            Ok(actual) => {
                let violations = validate(&case.expected, &actual);
                if violations.is_empty() {
                    CaseOutcome::Passed
                } else {
                    CaseOutcome::Violations(violations)
                }
            }
            Err(e) => CaseOutcome::Failed(e),
        };

        match &outcome {
            CaseOutcome::Passed => info!("Scenario passed"),
            CaseOutcome::Failed(e) => error!(error = %e, "Scenario failed"),
            CaseOutcome::Violations(violations) => {
                for violation in violations {
                    error!(field = %violation.key(), "{violation}");
                }
                error!(count = violations.len(), "Scenario output did not match");
            }
        }

        CaseReport {
            template: case.template.clone(),
            outcome,
            duration: started.elapsed(),
        }
    }

    /// Push, instantiate, fetch and decode. Stops at the first failing step.
    pub async fn fetch_output(
        &self,
        handle: &EnvironmentHandle,
        template: &str,
    ) -> Result<ActualOutput, ScenarioError> {
        let push = self
            .executor
            .exec(handle, &self.layout.push_template(template))
            .await?;
        if !push.success() {
            return Err(ScenarioError::PushFailed {
                template: template.to_string(),
                exit_code: push.exit_code,
                output: push.output,
            });
        }

        let create = self
            .executor
            .exec(handle, &self.layout.create_workspace(template))
            .await?;
        if !create.success() {
            return Err(ScenarioError::InstantiateFailed {
                template: template.to_string(),
                exit_code: create.exit_code,
                output: create.output,
            });
        }

        let path = self.layout.artifact_path(template);
        let fetch = self
            .executor
            .exec(handle, &self.layout.fetch_artifact(template))
            .await?;
        if !fetch.success() {
            return Err(ScenarioError::FetchFailed {
                path,
                exit_code: fetch.exit_code,
                output: fetch.output,
            });
        }

        decode_artifact(&path, &fetch.output)
    }
}

/// Decode the first JSON value in `text` as a flat string map.
fn decode_artifact(path: &str, text: &str) -> Result<ActualOutput, ScenarioError> {
    let decode_failed = |message: String| ScenarioError::DecodeFailed {
        path: path.to_string(),
        message,
    };

    serde_json::Deserializer::from_str(text)
        .into_iter::<ActualOutput>()
        .next()
        .ok_or_else(|| decode_failed("artifact is empty".to_string()))?
        .map_err(|e| decode_failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_flat_map() {
        let actual = decode_artifact(
            "/tmp/t.json",
            r#"{"workspace.name":"test-data-source","workspace.start_count":"1"}"#,
        )
        .unwrap();
        assert_eq!(actual.len(), 2);
        assert_eq!(actual["workspace.start_count"], "1");
    }

    #[test]
    fn test_decode_ignores_trailing_text() {
        let actual = decode_artifact("/tmp/t.json", "{\"a\":\"1\"}\nwarning: something\n").unwrap();
        assert_eq!(actual["a"], "1");
    }

    #[test]
    fn test_decode_rejects_nested_values() {
        let err = decode_artifact("/tmp/t.json", r#"{"a":{"b":"c"}}"#).unwrap_err();
        assert!(matches!(err, ScenarioError::DecodeFailed { ref path, .. } if path == "/tmp/t.json"));
    }

    #[test]
    fn test_decode_rejects_empty() {
        let err = decode_artifact("/tmp/t.json", "").unwrap_err();
        assert!(err.to_string().contains("artifact is empty"));
    }

    #[test]
    fn test_duplicate_templates_rejected() {
        let cases = vec![
            TestCase::new("a", Expectations::new()),
            TestCase::new("b", Expectations::new()),
            TestCase::new("a", Expectations::new()),
        ];
        let err = ensure_unique_templates(&cases).unwrap_err();
        assert!(matches!(err, HarnessError::DuplicateTemplate(t) if t == "a"));
    }
}
