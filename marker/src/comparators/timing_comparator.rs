//! A comparator for units whose output length depends on scheduling.
//!
//! Such a unit prints a few fixed leading lines and then counts upwards for a bounded time, so
//! the number of values it manages to print varies from run to run. Instead of exact content the
//! comparator checks the shape of the output:
//!
//! - the fixed leading lines are identical in the expected and the actual output,
//! - the number of counted lines is within the rule's tolerance band around the expected count,
//! - the counted lines are consecutive integers starting at the rule's base, and agree with the
//!   expected lines index by index up to the shorter of the two.
//!
//! Identical output always passes.

use util::execution_config::TimingRule;

use crate::traits::comparator::OutputComparator;
use crate::utilities::line_diff;

pub struct TimingComparator {
    expected: String,
    rule: TimingRule,
}

impl TimingComparator {
    pub fn new(expected: impl Into<String>, rule: TimingRule) -> Self {
        Self {
            expected: expected.into(),
            rule,
        }
    }

    fn shape_matches(&self, actual: &str) -> bool {
        let expected_lines: Vec<&str> = self.expected.trim().split('\n').collect();
        let actual_lines: Vec<&str> = actual.trim().split('\n').collect();
        let lead = self.rule.leading_lines.len();

        if expected_lines.len() < lead || actual_lines.len() < lead {
            return false;
        }
        for (i, fixed) in self.rule.leading_lines.iter().enumerate() {
            if expected_lines[i] != fixed || actual_lines[i] != fixed {
                return false;
            }
        }

        let expected_values = &expected_lines[lead..];
        let actual_values = &actual_lines[lead..];
        let min = expected_values.len().saturating_sub(self.rule.below);
        let max = expected_values.len() + self.rule.above;
        if actual_values.len() < min || actual_values.len() > max {
            return false;
        }

        let consecutive = actual_values.iter().enumerate().all(|(i, line)| {
            line.trim().parse::<i64>().ok() == Some(self.rule.base + i as i64)
        });
        if !consecutive {
            return false;
        }

        expected_values
            .iter()
            .zip(actual_values)
            .all(|(e, a)| e == a)
    }
}

impl OutputComparator for TimingComparator {
    fn matches(&self, actual: &str) -> bool {
        self.expected == actual || self.shape_matches(actual)
    }

    fn diff(&self, actual: &str) -> String {
        line_diff::unified(&self.expected, actual, "expected", "actual")
    }
}
