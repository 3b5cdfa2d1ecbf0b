//! # Types Module
//!
//! Core data structures shared by the grading pipeline: test units and their catalog, the
//! expected-output artifact of a unit, and the outcome a unit ends a phase with.

use code_runner::Invocation;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use util::mark_allocator::Category;

use crate::error::MarkerError;

/// Reference output for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedOutput {
    /// Compared byte for byte.
    Exact(String),
    /// Literal text with embedded pattern blocks, matched as a whole.
    Template(String),
}

impl ExpectedOutput {
    pub fn kind(&self) -> &'static str {
        match self {
            ExpectedOutput::Exact(_) => "exact",
            ExpectedOutput::Template(_) => "template",
        }
    }
}

/// Why a unit that ran to completion did not pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Output differs from the reference. `diff` is filled in verbose runs only.
    Mismatch { diff: Option<String> },
    /// A pattern block of the template does not compile.
    InvalidTemplate { message: String },
}

/// State of a unit within one phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Outcome {
    #[default]
    NotRun,
    Passed,
    Failed(FailureReason),
    TimedOut,
    /// The subject could not be launched.
    Errored(String),
}

impl Outcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    /// Short label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::NotRun => "SKIP",
            Outcome::Passed => "PASS",
            Outcome::Failed(_) => "FAIL",
            Outcome::TimedOut => "TIMEOUT",
            Outcome::Errored(_) => "ERROR",
        }
    }

    /// Human-readable reason, distinct for every kind of failure.
    pub fn reason(&self) -> String {
        match self {
            Outcome::NotRun => "not run".to_string(),
            Outcome::Passed => "passed".to_string(),
            Outcome::Failed(FailureReason::Mismatch { .. }) => "output mismatch".to_string(),
            Outcome::Failed(FailureReason::InvalidTemplate { message }) => {
                format!("invalid template: {message}")
            }
            Outcome::TimedOut => "timed out".to_string(),
            Outcome::Errored(message) => format!("launch error: {message}"),
        }
    }

    pub fn diff(&self) -> Option<&str> {
        match self {
            Outcome::Failed(FailureReason::Mismatch { diff }) => diff.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason())
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.reason())
    }
}

/// One independently scored test case.
#[derive(Debug, Clone)]
pub struct TestUnit {
    pub name: String,
    pub category: Category,
    pub invocation: Invocation,
    pub expected: ExpectedOutput,
    pub points: u32,
    pub outcome: Outcome,
}

impl TestUnit {
    pub fn new(
        name: impl Into<String>,
        category: Category,
        invocation: Invocation,
        expected: ExpectedOutput,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            invocation,
            expected,
            points: 0,
            outcome: Outcome::NotRun,
        }
    }
}

/// Units grouped by functional category, each group ordered by name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pools: BTreeMap<Category, BTreeMap<String, TestUnit>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit; a later unit with the same name in the same category replaces the earlier.
    pub fn insert(&mut self, unit: TestUnit) {
        self.pools
            .entry(unit.category)
            .or_default()
            .insert(unit.name.clone(), unit);
    }

    pub fn units(&self, category: Category) -> impl Iterator<Item = &TestUnit> {
        self.pools.get(&category).into_iter().flat_map(|p| p.values())
    }

    pub fn count(&self, category: Category) -> usize {
        self.pools.get(&category).map_or(0, BTreeMap::len)
    }

    pub fn len(&self) -> usize {
        self.pools.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unit with this name, searched in phase order.
    pub fn find(&self, name: &str) -> Option<&TestUnit> {
        Category::FUNCTIONAL
            .iter()
            .find_map(|c| self.pools.get(c).and_then(|p| p.get(name)))
    }

    pub(crate) fn take_pool(&mut self, category: Category) -> Vec<TestUnit> {
        self.pools
            .remove(&category)
            .map(|p| p.into_values().collect())
            .unwrap_or_default()
    }
}

/// Supplies the catalog a run grades.
pub trait CatalogProvider {
    fn load(&self) -> Result<Catalog, MarkerError>;

    /// Where the units come from, for error messages.
    fn describe(&self) -> String {
        "catalog".to_string()
    }
}

impl CatalogProvider for Catalog {
    fn load(&self) -> Result<Catalog, MarkerError> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn unit(name: &str, category: Category) -> TestUnit {
        TestUnit::new(
            name,
            category,
            Invocation::Script(PathBuf::from(format!("{name}.sh"))),
            ExpectedOutput::Exact(String::new()),
        )
    }

    #[test]
    fn test_catalog_orders_units_by_name() {
        let mut catalog = Catalog::new();
        catalog.insert(unit("010-b", Category::Basic));
        catalog.insert(unit("002-a", Category::Basic));
        catalog.insert(unit("150-x", Category::Advanced));

        let names: Vec<&str> = catalog
            .units(Category::Basic)
            .map(|u| u.name.as_str())
            .collect();
        assert_eq!(names, vec!["002-a", "010-b"]);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.count(Category::Scripted), 0);
        assert_eq!(catalog.find("150-x").map(|u| u.category), Some(Category::Advanced));
        assert!(catalog.find("nope").is_none());
    }

    #[test]
    fn test_outcome_reasons_are_distinct() {
        let outcomes = [
            Outcome::Passed,
            Outcome::Failed(FailureReason::Mismatch { diff: None }),
            Outcome::Failed(FailureReason::InvalidTemplate {
                message: "bad".into(),
            }),
            Outcome::TimedOut,
            Outcome::Errored("missing".into()),
        ];
        let reasons: std::collections::BTreeSet<String> =
            outcomes.iter().map(Outcome::reason).collect();
        assert_eq!(reasons.len(), outcomes.len());
        assert_eq!(Outcome::TimedOut.to_string(), "timed out");
        assert_eq!(Outcome::TimedOut.label(), "TIMEOUT");
    }
}
