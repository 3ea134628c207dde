//! Per-scenario results and the run summary.

use std::fmt;
use std::time::Duration;

use crate::error::{HarnessError, ScenarioError};
use crate::validate::Violation;

/// How one scenario ended.
#[derive(Debug)]
pub enum CaseOutcome {
    Passed,
    /// A command or decode step failed before validation.
    Failed(ScenarioError),
    /// The artifact was fetched but did not match.
    Violations(Vec<Violation>),
}

/// Result of one scenario.
#[derive(Debug)]
pub struct CaseReport {
    pub template: String,
    pub outcome: CaseOutcome,
    pub duration: Duration,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        matches!(self.outcome, CaseOutcome::Passed)
    }

    /// `PASS` or `FAIL`.
    pub fn status(&self) -> &'static str {
        if self.passed() {
            "PASS"
        } else {
            "FAIL"
        }
    }

    /// Template name and elapsed time, e.g. `test-data-source (1.5s)`.
    pub fn title(&self) -> String {
        format!("{} ({:.1}s)", self.template, self.duration.as_secs_f64())
    }

    /// One line per failure reason.
    pub fn details(&self) -> Vec<String> {
        match &self.outcome {
            CaseOutcome::Passed => Vec::new(),
            CaseOutcome::Failed(e) => vec![e.to_string()],
            CaseOutcome::Violations(violations) => {
                violations.iter().map(ToString::to_string).collect()
            }
        }
    }
}

/// Results of a whole run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub cases: Vec<CaseReport>,
}

impl RunReport {
    pub fn new(cases: Vec<CaseReport>) -> Self {
        Self { cases }
    }

    pub fn passed(&self) -> bool {
        self.cases.iter().all(CaseReport::passed)
    }

    pub fn failed_count(&self) -> usize {
        self.cases.iter().filter(|c| !c.passed()).count()
    }

    pub fn case(&self, template: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|c| c.template == template)
    }

    /// `N passed, M failed`.
    pub fn summary(&self) -> String {
        let failed = self.failed_count();
        format!("{} passed, {} failed", self.cases.len() - failed, failed)
    }

    /// `Err` if any scenario failed.
    pub fn into_result(self) -> Result<Self, HarnessError> {
        let failed = self.failed_count();
        if failed > 0 {
            return Err(HarnessError::ScenariosFailed {
                failed,
                total: self.cases.len(),
            });
        }
        Ok(self)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for case in &self.cases {
            writeln!(f, "{} {}", case.status(), case.title())?;
            for line in case.details() {
                writeln!(f, "    {line}")?;
            }
        }
        f.write_str(&self.summary())
    }
}
