//! A comparator that accepts only byte-for-byte identical output.
//!
//! No normalization is applied: a missing or extra trailing newline, trailing whitespace, or a
//! different line ending is a mismatch.

use crate::traits::comparator::OutputComparator;
use crate::utilities::line_diff;

pub struct ExactComparator {
    expected: String,
}

impl ExactComparator {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl OutputComparator for ExactComparator {
    fn matches(&self, actual: &str) -> bool {
        self.expected == actual
    }

    fn diff(&self, actual: &str) -> String {
        line_diff::unified(&self.expected, actual, "expected", "actual")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let comparator = ExactComparator::new("line 1\nline 2\n");
        assert!(comparator.matches("line 1\nline 2\n"));
        assert!(comparator.diff("line 1\nline 2\n").is_empty());
    }

    #[test]
    fn test_single_character_differs() {
        let comparator = ExactComparator::new("hello world\n");
        assert!(!comparator.matches("hello World\n"));
    }

    #[test]
    fn test_trailing_newline_matters() {
        let comparator = ExactComparator::new("done\n");
        assert!(!comparator.matches("done"));
        assert!(!comparator.matches("done\n\n"));
        assert!(!comparator.matches("done \n"));
    }

    #[test]
    fn test_line_endings_are_not_normalized() {
        let comparator = ExactComparator::new("a\nb\n");
        assert!(!comparator.matches("a\r\nb\r\n"));
    }

    #[test]
    fn test_empty_inputs_match() {
        assert!(ExactComparator::new("").matches(""));
        assert!(!ExactComparator::new("").matches("extra line\n"));
    }
}
