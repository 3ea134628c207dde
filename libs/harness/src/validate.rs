//! Closed-world comparison of artifact contents against expectations.
//!
//! Every expected field must be present and match its pattern, and every
//! actual field must be expected. All discrepancies are reported at once.

use std::collections::BTreeMap;
use std::fmt;

use crate::expect::Expectations;

/// Decoded artifact: field name to literal value.
pub type ActualOutput = BTreeMap<String, String>;

/// One mismatch between expected and actual output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// The value (empty if the field is absent) does not match the pattern.
    PatternMismatch {
        key: String,
        pattern: String,
        /// `None` when the field was not in the artifact at all.
        actual: Option<String>,
    },

    /// The field is absent, though its pattern accepts the empty string.
    MissingField { key: String, pattern: String },

    /// The artifact has a field nobody expected.
    UnexpectedField { key: String, value: String },
}

impl Violation {
    pub fn key(&self) -> &str {
        match self {
            Violation::PatternMismatch { key, .. }
            | Violation::MissingField { key, .. }
            | Violation::UnexpectedField { key, .. } => key,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::PatternMismatch {
                key,
                pattern,
                actual: Some(actual),
            } => write!(f, "{key}: expected match for {pattern:?}, got {actual:?}"),
            Violation::PatternMismatch {
                key,
                pattern,
                actual: None,
            } => write!(f, "{key}: expected match for {pattern:?}, field missing"),
            Violation::MissingField { key, pattern } => {
                write!(f, "{key}: field missing (pattern {pattern:?} would accept empty)")
            }
            Violation::UnexpectedField { key, value } => {
                write!(f, "unexpected field in actual {key:?}={value:?}")
            }
        }
    }
}

/// Compare `actual` against `expected`.
pub fn validate(expected: &Expectations, actual: &ActualOutput) -> Vec<Violation> {
    let mut violations = Vec::new();

    for (key, pattern) in expected.iter() {
        match actual.get(key) {
            Some(value) if pattern.is_match(value) => {}
            Some(value) => violations.push(Violation::PatternMismatch {
                key: key.to_string(),
                pattern: pattern.as_str().to_string(),
                actual: Some(value.clone()),
            }),
            None if pattern.is_match("") => violations.push(Violation::MissingField {
                key: key.to_string(),
                pattern: pattern.as_str().to_string(),
            }),
            None => violations.push(Violation::PatternMismatch {
                key: key.to_string(),
                pattern: pattern.as_str().to_string(),
                actual: None,
            }),
        }
    }

    for (key, value) in actual {
        if !expected.contains(key) {
            violations.push(Violation::UnexpectedField {
                key: key.clone(),
                value: value.clone(),
            });
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn expected(pairs: &[(&str, &str)]) -> Expectations {
        Expectations::from_pairs(pairs.iter().copied()).unwrap()
    }

    fn actual(pairs: &[(&str, &str)]) -> ActualOutput {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_exact_match_has_no_violations() {
        let e = expected(&[
            ("workspace.name", "test-data-source"),
            ("workspace.start_count", "1"),
        ]);
        let a = actual(&[
            ("workspace.name", "test-data-source"),
            ("workspace.start_count", "1"),
        ]);
        assert!(validate(&e, &a).is_empty());
    }

    #[test]
    fn test_mismatch_and_unexpected_reported_together() {
        let e = expected(&[("a", "^1$")]);
        let a = actual(&[("a", "2"), ("b", "x")]);

        let violations = validate(&e, &a);
        assert_eq!(
            violations,
            vec![
                Violation::PatternMismatch {
                    key: "a".to_string(),
                    pattern: "^1$".to_string(),
                    actual: Some("2".to_string()),
                },
                Violation::UnexpectedField {
                    key: "b".to_string(),
                    value: "x".to_string(),
                },
            ]
        );
    }

    #[rstest]
    #[case::unanchored_search("1", "10", true)]
    #[case::anchored("^1$", "10", false)]
    #[case::digits(r"\d+", "3000", true)]
    #[case::url(r"https?://\D+:\d+", "http://localhost:3000", true)]
    #[case::empty_list(r"\[\]", "[]", true)]
    #[case::empty_only("^$", "", true)]
    #[case::empty_only_rejects("^$", "token", false)]
    #[case::non_empty(".+", "", false)]
    fn test_pattern_semantics(#[case] pattern: &str, #[case] value: &str, #[case] ok: bool) {
        let violations = validate(&expected(&[("f", pattern)]), &actual(&[("f", value)]));
        assert_eq!(violations.is_empty(), ok, "{pattern:?} vs {value:?}: {violations:?}");
    }

    #[test]
    fn test_missing_field_with_rejecting_pattern() {
        let violations = validate(&expected(&[("workspace.id", "[a-z]+")]), &ActualOutput::new());
        assert_eq!(
            violations,
            vec![Violation::PatternMismatch {
                key: "workspace.id".to_string(),
                pattern: "[a-z]+".to_string(),
                actual: None,
            }]
        );
    }

    #[test]
    fn test_missing_field_with_empty_pattern_is_still_reported() {
        let violations = validate(
            &expected(&[("workspace.owner_oidc_access_token", "^$")]),
            &ActualOutput::new(),
        );
        assert_eq!(violations.len(), 1);
        assert!(matches!(violations[0], Violation::MissingField { .. }));
    }

    #[test]
    fn test_present_but_empty_matches_empty_pattern() {
        let violations = validate(
            &expected(&[("workspace.owner_oidc_access_token", "^$")]),
            &actual(&[("workspace.owner_oidc_access_token", "")]),
        );
        assert!(violations.is_empty());
    }

    #[test]
    fn test_display_names_field_pattern_and_value() {
        let v = Violation::PatternMismatch {
            key: "a".to_string(),
            pattern: "^1$".to_string(),
            actual: Some("2".to_string()),
        };
        assert_eq!(v.to_string(), r#"a: expected match for "^1$", got "2""#);

        let v = Violation::UnexpectedField {
            key: "b".to_string(),
            value: "x".to_string(),
        };
        assert_eq!(v.to_string(), r#"unexpected field in actual "b"="x""#);
    }
}
