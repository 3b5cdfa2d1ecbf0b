//! Wiring between the process configuration and a grading run.

use code_runner::ExecutionEngine;
use common::config::HarnessConfig;
use marker::error::MarkerError;
use marker::file_loader::DirectoryCatalog;
use marker::report::{self, ReportSink};
use marker::scorer::ScoreSummary;
use marker::{GradingJob, RunPlan, Selection};
use std::fs;
use tracing::info;
use util::execution_config::ExecutionConfig;
use util::mark_allocator::Category;

/// Every executed unit passed.
pub const EXIT_PASSED: u8 = 0;
/// At least one unit failed or leaked.
pub const EXIT_FAILED: u8 = 1;
/// The run never started.
pub const EXIT_FATAL: u8 = 2;

pub fn build_plan(config: &HarnessConfig) -> Result<RunPlan, MarkerError> {
    let selection = match (&config.only_category, &config.only_test) {
        (Some(_), Some(_)) => {
            return Err(MarkerError::InvalidSelection(
                "select either a category or a single test, not both".to_string(),
            ));
        }
        (Some(raw), None) => Selection::Category(Category::parse(raw).ok_or_else(|| {
            MarkerError::InvalidSelection(format!("unknown category '{raw}'"))
        })?),
        (None, Some(name)) => Selection::Unit(name.clone()),
        (None, None) => Selection::All,
    };
    Ok(RunPlan {
        selection,
        memory_safety: config.memory_safety,
        verbose: config.verbose,
    })
}

pub fn load_execution_config(config: &HarnessConfig) -> Result<ExecutionConfig, MarkerError> {
    match &config.config_path {
        Some(path) => ExecutionConfig::from_file(path).map_err(MarkerError::InvalidConfig),
        None => Ok(ExecutionConfig::default_config()),
    }
}

/// Runs a full grading pass as described by `config`, reporting to `sink`.
pub async fn grade(
    config: &HarnessConfig,
    sink: &mut dyn ReportSink,
) -> Result<ScoreSummary, MarkerError> {
    let plan = build_plan(config)?;
    let execution = load_execution_config(config)?;
    info!(
        subject = %config.subject.display(),
        tests = %config.tests_dir.display(),
        ?plan,
        "starting grading run"
    );

    let engine = ExecutionEngine::new(&config.subject, &execution);
    let catalog = DirectoryCatalog::new(&config.tests_dir);
    let summary = GradingJob::new(engine, execution)
        .with_plan(plan)
        .run(&catalog, sink)
        .await?;

    if let Some(path) = &config.json_report {
        let json = report::to_json(&summary).map_err(MarkerError::IoError)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
    }

    info!(earned = summary.earned, possible = summary.possible, "grading run finished");
    Ok(summary)
}

pub fn exit_status(result: &Result<ScoreSummary, MarkerError>) -> u8 {
    match result {
        Ok(summary) if summary.all_passed() => EXIT_PASSED,
        Ok(_) => EXIT_FAILED,
        Err(_) => EXIT_FATAL,
    }
}
