//! Expected artifact contents.

use std::collections::BTreeMap;

use regex::Regex;

use crate::error::ExpectationError;

/// Field names paired with the pattern each actual value must satisfy.
///
/// Patterns are searched, not anchored: `1` matches `"10"`. Anchor with
/// `^...$` for an exact match.
#[derive(Debug, Clone, Default)]
pub struct Expectations {
    fields: BTreeMap<String, Regex>,
}

impl Expectations {
    /// An empty table; only an empty artifact satisfies it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `(field, pattern)` pairs, rejecting bad patterns and repeated fields.
    pub fn from_pairs<I, K, P>(pairs: I) -> Result<Self, ExpectationError>
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: AsRef<str>,
    {
        pairs
            .into_iter()
            .try_fold(Self::new(), |table, (field, pattern)| table.with(field, pattern))
    }

    /// Add one field.
    pub fn with(
        mut self,
        field: impl Into<String>,
        pattern: impl AsRef<str>,
    ) -> Result<Self, ExpectationError> {
        let field = field.into();
        let pattern = pattern.as_ref();

        if self.fields.contains_key(&field) {
            return Err(ExpectationError::DuplicateField(field));
        }

        let regex = Regex::new(pattern).map_err(|source| ExpectationError::InvalidPattern {
            field: field.clone(),
            pattern: pattern.to_string(),
            source,
        })?;
        self.fields.insert(field, regex);
        Ok(self)
    }

    pub fn get(&self, field: &str) -> Option<&Regex> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Regex)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Host CPU architecture in the naming the provisioner reports (`amd64`, `arm64`, ...).
pub fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" => "ppc64",
        "s390x" => "s390x",
        other => other,
    }
}

/// Host operating system in the naming the provisioner reports (`linux`, `darwin`, ...).
pub fn host_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Replace `{{host_arch}}` and `{{host_os}}` in a pattern.
pub fn expand_host_placeholders(pattern: &str) -> String {
    pattern
        .replace("{{host_arch}}", &regex::escape(host_arch()))
        .replace("{{host_os}}", &regex::escape(host_os()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_placeholders() {
        let expanded = expand_host_placeholders("^{{host_os}}/{{host_arch}}$");
        assert_eq!(expanded, format!("^{}/{}$", host_os(), host_arch()));
        assert!(!expanded.contains("{{"));
        assert_eq!(expand_host_placeholders(r"\d+"), r"\d+");
    }

    #[test]
    fn test_compiles_all_pairs_in_name_order() {
        let table = Expectations::from_pairs([
            ("workspace.start_count", "1"),
            ("workspace.name", "test-data-source"),
        ])
        .unwrap();

        let fields: Vec<_> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(fields, vec!["workspace.name", "workspace.start_count"]);
    }

    #[test]
    fn test_malformed_pattern_fails_fast() {
        let err = Expectations::from_pairs([("workspace.id", "[a-z")]).unwrap_err();
        match err {
            ExpectationError::InvalidPattern { field, pattern, .. } => {
                assert_eq!(field, "workspace.id");
                assert_eq!(pattern, "[a-z");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = Expectations::new()
            .with("a", "1")
            .and_then(|t| t.with("a", "2"))
            .unwrap_err();
        assert!(matches!(err, ExpectationError::DuplicateField(f) if f == "a"));
    }
}
