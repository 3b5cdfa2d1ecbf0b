//! # Marker Library
//!
//! Grades a shell implementation against a catalog of test units.
//!
//! ## Key Concepts
//! - **GradingJob**: runs the phases `Basic → Advanced → Scripted → MemorySafety` strictly in
//!   sequence and returns the final [`ScoreSummary`].
//! - **Comparators**: one per unit, chosen from its expected-output kind (exact, template, or the
//!   timing-tolerant shape check).
//! - **ScoreLedger**: per-unit awards, per-category totals, and the proportional memory-safety
//!   credit.
//! - **ReportSink**: receives every result as soon as it is final.
//!
//! A unit that fails, times out, cannot be launched or has a broken template is recorded and the
//! run moves on. Only problems found before anything executes are errors: an empty catalog,
//! invalid scoring settings, or a selection that names nothing runnable.

pub mod comparators;
pub mod error;
pub mod file_loader;
pub mod report;
pub mod scorer;
pub mod traits;
pub mod types;
pub mod utilities;

use crate::error::MarkerError;
use crate::report::ReportSink;
use crate::scorer::{MemorySafetyScore, ScoreLedger, ScoreSummary};
use crate::types::{CatalogProvider, FailureReason, Outcome, TestUnit};

use code_runner::{ExecutionEngine, LaunchContext, RunOutput, RunStatus, Runner};
use tracing::{debug, info, warn};
use util::execution_config::ExecutionConfig;
use util::mark_allocator::{BudgetFocus, Category, MarkAllocator};
use util::valgrind_report::{LeakVerdict, ValgrindProcessor, ValgrindReport};

/// Which units a run executes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// Every functional category, sharing the functional budget.
    #[default]
    All,
    /// One functional category, which receives the whole functional budget.
    Category(Category),
    /// One unit, worth what it is worth in a full run.
    Unit(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunPlan {
    pub selection: Selection,
    /// Re-run every executed unit under the leak detector.
    pub memory_safety: bool,
    /// Attach line diffs to mismatches.
    pub verbose: bool,
}

/// A grading run over one catalog.
pub struct GradingJob {
    engine: ExecutionEngine,
    config: ExecutionConfig,
    plan: RunPlan,
}

/// Phases to execute, resolved before anything runs.
struct Schedule {
    phases: Vec<Category>,
    focus: BudgetFocus,
    only_unit: Option<String>,
}

/// Classification of one leak-checked run. A run that never finished cannot vouch for itself.
fn leak_verdict(output: &RunOutput) -> LeakVerdict {
    match output.status {
        RunStatus::Exited => ValgrindProcessor::classify(&output.combined),
        RunStatus::TimedOut(_) | RunStatus::LaunchFailed(_) => LeakVerdict::Unavailable,
    }
}

impl GradingJob {
    pub fn new(engine: ExecutionEngine, config: ExecutionConfig) -> Self {
        Self {
            engine,
            config,
            plan: RunPlan::default(),
        }
    }

    pub fn with_plan(mut self, plan: RunPlan) -> Self {
        self.plan = plan;
        self
    }

    fn schedule(&self, catalog: &types::Catalog) -> Result<Schedule, MarkerError> {
        match &self.plan.selection {
            Selection::All => Ok(Schedule {
                phases: Category::FUNCTIONAL
                    .into_iter()
                    .filter(|c| catalog.count(*c) > 0)
                    .collect(),
                focus: BudgetFocus::Shared,
                only_unit: None,
            }),
            Selection::Category(category) => {
                if !category.is_functional() {
                    return Err(MarkerError::InvalidSelection(format!(
                        "{category} is not a functional category"
                    )));
                }
                if catalog.count(*category) == 0 {
                    return Err(MarkerError::InvalidSelection(format!(
                        "no {category} units in the catalog"
                    )));
                }
                Ok(Schedule {
                    phases: vec![*category],
                    focus: BudgetFocus::Only(*category),
                    only_unit: None,
                })
            }
            Selection::Unit(name) => {
                let unit = catalog
                    .find(name)
                    .ok_or_else(|| MarkerError::UnknownUnit(name.clone()))?;
                Ok(Schedule {
                    phases: vec![unit.category],
                    focus: BudgetFocus::Shared,
                    only_unit: Some(name.clone()),
                })
            }
        }
    }

    /// Runs every scheduled phase and reports to `sink` as results become final.
    ///
    /// Returns an error only for problems detected before the first unit executes.
    pub async fn run(
        &self,
        provider: &dyn CatalogProvider,
        sink: &mut dyn ReportSink,
    ) -> Result<ScoreSummary, MarkerError> {
        self.config.validate().map_err(MarkerError::InvalidConfig)?;
        let allocator =
            MarkAllocator::new(self.config.scoring.clone()).map_err(MarkerError::InvalidConfig)?;

        let mut catalog = provider.load()?;
        if catalog.is_empty() {
            return Err(MarkerError::EmptyCatalog(provider.describe()));
        }
        let schedule = self.schedule(&catalog)?;

        let mut ledger = ScoreLedger::new();
        let mut executed: Vec<TestUnit> = Vec::new();

        for category in schedule.phases {
            let mut units = catalog.take_pool(category);
            let allocation = allocator.allocate(category, units.len(), schedule.focus);
            for (unit, points) in units.iter_mut().zip(&allocation.points) {
                unit.points = *points;
            }
            if let Some(name) = &schedule.only_unit {
                units.retain(|u| &u.name == name);
            }

            info!(
                phase = %category,
                units = units.len(),
                budget = allocation.budget,
                "starting phase"
            );

            for mut unit in units {
                unit.outcome = self.evaluate(&unit).await;
                info!(unit = %unit.name, outcome = %unit.outcome, points = unit.points, "unit finished");
                sink.unit_finished(ledger.record_unit(&unit));
                executed.push(unit);
            }

            if let Some(score) = ledger.category(category) {
                sink.category_finished(score);
            }
        }

        if self.plan.memory_safety {
            let budget = allocator
                .allocate(Category::MemorySafety, executed.len(), schedule.focus)
                .budget;
            let report = self.sweep_leaks(&executed).await;
            let score = ledger.record_memory_safety(MemorySafetyScore::from_report(budget, report));
            info!(
                clean = score.clean,
                checked = score.checked,
                earned = score.earned,
                "memory safety finished"
            );
            sink.memory_safety_finished(score);
        }

        let summary = ledger.summary();
        sink.run_finished(&summary);
        Ok(summary)
    }

    /// Functional outcome of one unit.
    async fn evaluate(&self, unit: &TestUnit) -> Outcome {
        let comparator = match comparators::for_unit(&unit.name, &unit.expected, &self.config) {
            Ok(comparator) => comparator,
            Err(message) => {
                warn!(unit = %unit.name, "invalid template: {message}");
                return Outcome::Failed(FailureReason::InvalidTemplate { message });
            }
        };

        let output = self
            .engine
            .run(&unit.invocation, &LaunchContext::new())
            .await;
        match output.status {
            RunStatus::TimedOut(_) => Outcome::TimedOut,
            RunStatus::LaunchFailed(message) => Outcome::Errored(message),
            RunStatus::Exited => {
                let captured = Runner::for_invocation(&unit.invocation).captured(&output);
                if comparator.matches(&captured) {
                    Outcome::Passed
                } else {
                    debug!(unit = %unit.name, exit_code = ?output.exit_code, stderr = %output.stderr, "output mismatch");
                    let diff = self.plan.verbose.then(|| comparator.diff(&captured));
                    Outcome::Failed(FailureReason::Mismatch { diff })
                }
            }
        }
    }

    /// Re-runs every unit under the leak detector; the aggregate is built only after all of
    /// them completed.
    async fn sweep_leaks(&self, units: &[TestUnit]) -> ValgrindReport {
        let mut report = ValgrindReport::new();
        for unit in units {
            let output = self
                .engine
                .run_leak_checked(&unit.invocation, &LaunchContext::new())
                .await;
            let verdict = leak_verdict(&output);
            if verdict == LeakVerdict::Unavailable {
                warn!(unit = %unit.name, status = ?output.status, "leak check unavailable; counted as leaking");
            }
            report.record(unit.name.clone(), verdict);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::CollectingSink;
    use crate::types::{Catalog, ExpectedOutput};
    use code_runner::Invocation;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    fn script_unit(dir: &Path, name: &str, body: &str, expected: &str) -> TestUnit {
        let script = dir.join(format!("{name}.sh"));
        fs::write(&script, body).unwrap();
        TestUnit::new(
            name,
            util::mark_allocator::Category::Basic,
            Invocation::Script(script),
            ExpectedOutput::Exact(expected.to_string()),
        )
    }

    fn job(config: ExecutionConfig, plan: RunPlan) -> GradingJob {
        GradingJob::new(ExecutionEngine::new("/bin/sh", &config), config).with_plan(plan)
    }

    #[test]
    fn test_unfinished_leak_runs_are_unavailable() {
        let output = RunOutput {
            status: RunStatus::TimedOut(Duration::from_secs(1)),
            stdout: String::new(),
            stderr: "==1== Memcheck, a memory error detector\n".to_string(),
            combined: "==1== Memcheck, a memory error detector\n".to_string(),
            exit_code: None,
            elapsed: Duration::from_secs(1),
        };
        assert_eq!(leak_verdict(&output), LeakVerdict::Unavailable);
    }

    #[tokio::test]
    async fn test_empty_catalog_is_fatal() {
        let mut sink = CollectingSink::default();
        let err = job(ExecutionConfig::default_config(), RunPlan::default())
            .run(&Catalog::new(), &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, MarkerError::EmptyCatalog(_)));
        assert!(sink.units.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_ratio_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::new();
        catalog.insert(script_unit(dir.path(), "001-a", "echo a\n", "a\n"));

        let mut config = ExecutionConfig::default_config();
        config.scoring.basic_ratio = 1.5;
        let mut sink = CollectingSink::default();
        let err = job(config, RunPlan::default())
            .run(&catalog, &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, MarkerError::InvalidConfig(_)));
        assert!(sink.units.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_unit_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::new();
        catalog.insert(script_unit(dir.path(), "001-a", "echo a\n", "a\n"));

        let plan = RunPlan {
            selection: Selection::Unit("999-missing".to_string()),
            ..RunPlan::default()
        };
        let err = job(ExecutionConfig::default_config(), plan)
            .run(&catalog, &mut CollectingSink::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MarkerError::UnknownUnit(name) if name == "999-missing"));
    }

    #[tokio::test]
    async fn test_memory_safety_selection_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::new();
        catalog.insert(script_unit(dir.path(), "001-a", "echo a\n", "a\n"));

        let plan = RunPlan {
            selection: Selection::Category(Category::MemorySafety),
            ..RunPlan::default()
        };
        let err = job(ExecutionConfig::default_config(), plan)
            .run(&catalog, &mut CollectingSink::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MarkerError::InvalidSelection(_)));
    }

    #[tokio::test]
    async fn test_invalid_template_fails_only_its_unit() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::new();
        catalog.insert(script_unit(dir.path(), "001-a", "echo a\n", "a\n"));
        let mut broken = script_unit(dir.path(), "002-b", "echo b\n", "");
        broken.expected = ExpectedOutput::Template("$re:(b$\n".to_string());
        catalog.insert(broken);

        let mut sink = CollectingSink::default();
        let summary = job(ExecutionConfig::default_config(), RunPlan::default())
            .run(&catalog, &mut sink)
            .await
            .unwrap();

        assert!(summary.units[0].passed());
        assert!(matches!(
            summary.units[1].outcome,
            Outcome::Failed(FailureReason::InvalidTemplate { .. })
        ));
        assert_eq!(summary.earned, 35);
        assert_eq!(summary.possible, 70);
        assert_eq!(sink.units.len(), 2);
    }

    #[tokio::test]
    async fn test_verbose_mismatch_carries_diff() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::new();
        catalog.insert(script_unit(dir.path(), "001-a", "echo actual\n", "expected\n"));

        let plan = RunPlan {
            verbose: true,
            ..RunPlan::default()
        };
        let summary = job(ExecutionConfig::default_config(), plan)
            .run(&catalog, &mut CollectingSink::default())
            .await
            .unwrap();
        let diff = summary.units[0].diff.as_deref().expect("diff in verbose mode");
        assert!(diff.contains("-expected"));
        assert!(diff.contains("+actual"));
    }
}
