//! Scenario manifests.
//!
//! ```toml
//! [[case]]
//! template = "test-data-source"
//!
//! [case.expect]
//! "workspace.name" = "test-data-source"
//! "provisioner.arch" = "{{host_arch}}"
//! ```
//!
//! `{{host_arch}}` and `{{host_os}}` expand to the host platform.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use provider_e2e::expect::expand_host_placeholders;
use provider_e2e::{Expectations, TestCase};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(rename = "case", default)]
    cases: Vec<CaseEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CaseEntry {
    template: String,
    #[serde(default)]
    expect: BTreeMap<String, String>,
}

pub fn cases_from_toml_str(contents: &str) -> Result<Vec<TestCase>> {
    let manifest: Manifest = toml::from_str(contents).context("invalid manifest TOML")?;

    manifest
        .cases
        .into_iter()
        .map(|entry| -> Result<TestCase> {
            let expected = Expectations::from_pairs(
                entry
                    .expect
                    .iter()
                    .map(|(field, pattern)| (field.clone(), expand_host_placeholders(pattern))),
            )
            .with_context(|| format!("case {}", entry.template))?;
            Ok(TestCase::new(entry.template, expected))
        })
        .collect()
}

pub fn cases_from_path(path: &Path) -> Result<Vec<TestCase>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest: {}", path.display()))?;
    cases_from_toml_str(&contents)
        .with_context(|| format!("failed to load manifest: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cases_and_expectations() {
        let cases = cases_from_toml_str(
            r#"
[[case]]
template = "test-data-source"

[case.expect]
"workspace.name" = "test-data-source"
"workspace.start_count" = "1"

[[case]]
template = "empty"
"#,
        )
        .unwrap();

        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].template, "test-data-source");
        assert_eq!(cases[0].expected.len(), 2);
        assert!(cases[1].expected.is_empty());
    }

    #[test]
    fn expands_host_placeholders() {
        let cases = cases_from_toml_str(
            r#"
[[case]]
template = "t"
expect = { "provisioner.os" = "{{host_os}}" }
"#,
        )
        .unwrap();

        let pattern = cases[0].expected.get("provisioner.os").unwrap();
        assert_eq!(pattern.as_str(), provider_e2e::expect::host_os());
    }

    #[test]
    fn bad_pattern_names_the_case() {
        let err = cases_from_toml_str(
            r#"
[[case]]
template = "broken"
expect = { "workspace.id" = "[a-z" }
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("case broken"));
        assert!(format!("{err:#}").contains("workspace.id"));
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(cases_from_toml_str("[[case]]\ntemplate = \"t\"\nexpected = {}\n").is_err());
    }

    #[test]
    fn bundled_scenarios_load() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../test/integration/scenarios.toml");
        let cases = cases_from_path(&path).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].template, "test-data-source");
        assert_eq!(cases[0].expected.len(), 28);
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenarios.toml");
        std::fs::write(&path, "[[case]]\ntemplate = \"t\"\n").unwrap();
        assert_eq!(cases_from_path(&path).unwrap().len(), 1);
        assert!(cases_from_path(&dir.path().join("missing.toml")).is_err());
    }
}
