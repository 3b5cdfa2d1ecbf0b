//! # Report Module
//!
//! Sinks that receive structured results while a run progresses.
//!
//! A [`ReportSink`] is told about every unit as soon as its outcome is final, about each
//! category when its phase ends, about the memory-safety pool, and finally about the whole run.
//! Rendering is entirely the sink's business:
//!
//! - [`ConsoleSink`] prints colored progress lines and a closing score table.
//! - [`CollectingSink`] keeps everything in memory for tests and embedding callers.
//!
//! [`to_json`] serializes a [`ScoreSummary`] for machine consumers.

use colored::Colorize;
use std::io::{self, Write};

use crate::scorer::{CategoryScore, MemorySafetyScore, ScoreSummary, UnitScore};
use crate::types::Outcome;

pub trait ReportSink {
    fn unit_finished(&mut self, unit: &UnitScore);
    fn category_finished(&mut self, category: &CategoryScore);
    fn memory_safety_finished(&mut self, score: &MemorySafetyScore);
    fn run_finished(&mut self, summary: &ScoreSummary);
}

pub fn to_json(summary: &ScoreSummary) -> Result<String, String> {
    serde_json::to_string_pretty(summary)
        .map_err(|e| format!("Failed to serialize score summary: {e}"))
}

/// Prints to stdout, or to any writer given to [`ConsoleSink::with_writer`].
pub struct ConsoleSink<W: Write = io::Stdout> {
    out: W,
    verbose: bool,
}

impl ConsoleSink {
    pub fn new(verbose: bool) -> Self {
        Self::with_writer(io::stdout(), verbose)
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn with_writer(out: W, verbose: bool) -> Self {
        Self { out, verbose }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn status_label(outcome: &Outcome) -> colored::ColoredString {
        match outcome {
            Outcome::Passed => outcome.label().green().bold(),
            Outcome::TimedOut => outcome.label().yellow().bold(),
            Outcome::Errored(_) => outcome.label().magenta().bold(),
            Outcome::NotRun => outcome.label().dimmed(),
            Outcome::Failed(_) => outcome.label().red().bold(),
        }
    }

    // Console output is best effort; a closed stdout must not abort grading.
    fn emit(&mut self, line: String) {
        let _ = writeln!(self.out, "{line}");
    }
}

impl<W: Write> ReportSink for ConsoleSink<W> {
    fn unit_finished(&mut self, unit: &UnitScore) {
        let verdict = if unit.passed() {
            "EARNED".green()
        } else {
            "LOST".red()
        };
        let mut line = format!(
            "{} {} [{} pts - {}]",
            Self::status_label(&unit.outcome),
            unit.name,
            unit.possible,
            verdict
        );
        if !unit.passed() {
            line.push_str(&format!(" ({})", unit.outcome.reason()));
        }
        self.emit(line);

        if self.verbose {
            if let Some(diff) = &unit.diff {
                self.emit(diff.trim_end().to_string());
            }
        }
    }

    fn category_finished(&mut self, category: &CategoryScore) {
        self.emit(format!(
            "{}: {}/{} passed, {}/{} pts",
            category.category.label().bold(),
            category.passed,
            category.total,
            category.earned,
            category.possible
        ));
    }

    fn memory_safety_finished(&mut self, score: &MemorySafetyScore) {
        for task in &score.report.tasks {
            let label = if task.clean {
                "CLEAN".green().bold()
            } else {
                "LEAK".red().bold()
            };
            self.emit(format!("{label} {} ({})", task.name, task.verdict.describe()));
        }
        self.emit(format!(
            "{}: {}/{} clean, {}/{} pts",
            "Memory Safety".bold(),
            score.clean,
            score.checked,
            score.earned,
            score.budget
        ));
    }

    fn run_finished(&mut self, summary: &ScoreSummary) {
        self.emit(String::new());
        self.emit(format!("{}", "SCORING SUMMARY".bold()));
        for category in &summary.categories {
            self.emit(format!(
                "  {:<14} {:>4}/{:<4} ({:.1}%)",
                category.category.label(),
                category.earned,
                category.possible,
                category.percentage()
            ));
        }
        if let Some(memory) = summary.memory_safety.as_ref().filter(|m| m.counted()) {
            self.emit(format!(
                "  {:<14} {:>4}/{:<4} ({}/{} clean)",
                "Memory Safety", memory.earned, memory.budget, memory.clean, memory.checked
            ));
        }
        let total = format!(
            "  {:<14} {:>4}/{:<4} ({:.1}%)",
            "TOTAL",
            summary.earned,
            summary.possible,
            summary.percentage()
        );
        self.emit(format!("{}", total.bold()));
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub units: Vec<UnitScore>,
    pub categories: Vec<CategoryScore>,
    pub memory_safety: Option<MemorySafetyScore>,
    pub summary: Option<ScoreSummary>,
}

impl ReportSink for CollectingSink {
    fn unit_finished(&mut self, unit: &UnitScore) {
        self.units.push(unit.clone());
    }

    fn category_finished(&mut self, category: &CategoryScore) {
        self.categories.push(category.clone());
    }

    fn memory_safety_finished(&mut self, score: &MemorySafetyScore) {
        self.memory_safety = Some(score.clone());
    }

    fn run_finished(&mut self, summary: &ScoreSummary) {
        self.summary = Some(summary.clone());
    }
}
