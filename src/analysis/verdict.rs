//! PASS/FAIL comparison of the OCR reading against the expected model number

use std::fmt;

/// Outcome of one inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// How empty strings are treated by [`Comparator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyTextPolicy {
    /// An empty value (after trimming) counts as absent
    #[default]
    TreatAsAbsent,
    /// An empty value is a value like any other, so "" matches ""
    Accept,
}

/// Case- and surrounding-whitespace-insensitive exact match
#[derive(Debug, Clone, Copy, Default)]
pub struct Comparator {
    empty_policy: EmptyTextPolicy,
}

impl Comparator {
    pub fn new(empty_policy: EmptyTextPolicy) -> Self {
        Self { empty_policy }
    }

    /// Comparator for the `accept_empty_match` setting
    pub fn from_accept_empty(accept_empty_match: bool) -> Self {
        Self::new(if accept_empty_match {
            EmptyTextPolicy::Accept
        } else {
            EmptyTextPolicy::TreatAsAbsent
        })
    }

    /// PASS iff both values are present and equal after trim + lowercase
    pub fn compare(&self, extracted: Option<&str>, expected: Option<&str>) -> Verdict {
        let (Some(extracted), Some(expected)) = (self.present(extracted), self.present(expected)) else {
            return Verdict::Fail;
        };

        if extracted.to_lowercase() == expected.to_lowercase() {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    fn present<'a>(&self, value: Option<&'a str>) -> Option<&'a str> {
        let value = value?.trim();
        match self.empty_policy {
            EmptyTextPolicy::TreatAsAbsent if value.is_empty() => None,
            _ => Some(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_trim_insensitive_match() {
        let cmp = Comparator::default();
        assert_eq!(cmp.compare(Some("model123"), Some("MODEL123")), Verdict::Pass);
        assert_eq!(cmp.compare(Some("  Model123\n"), Some(" MODEL123 ")), Verdict::Pass);
    }

    #[test]
    fn test_mismatch_fails() {
        let cmp = Comparator::default();
        assert_eq!(cmp.compare(Some("model124"), Some("MODEL123")), Verdict::Fail);
        // No partial matching
        assert_eq!(cmp.compare(Some("MODEL12"), Some("MODEL123")), Verdict::Fail);
    }

    #[test]
    fn test_absent_values_fail() {
        let cmp = Comparator::default();
        assert_eq!(cmp.compare(None, Some("MODEL123")), Verdict::Fail);
        assert_eq!(cmp.compare(Some("MODEL123"), None), Verdict::Fail);
        assert_eq!(cmp.compare(None, None), Verdict::Fail);
    }

    #[test]
    fn test_empty_match_fails_by_default() {
        let cmp = Comparator::default();
        assert_eq!(cmp.compare(Some(""), Some("")), Verdict::Fail);
        assert_eq!(cmp.compare(Some("  "), Some("")), Verdict::Fail);
    }

    #[test]
    fn test_empty_match_passes_when_accepted() {
        let cmp = Comparator::from_accept_empty(true);
        assert_eq!(cmp.compare(Some(""), Some("")), Verdict::Pass);
        assert_eq!(cmp.compare(Some(""), Some("MODEL123")), Verdict::Fail);
        assert_eq!(cmp.compare(None, Some("")), Verdict::Fail);
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::Pass.to_string(), "PASS");
        assert_eq!(Verdict::Fail.to_string(), "FAIL");
    }
}
