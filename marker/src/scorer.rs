//! # Scorer Module
//!
//! The [`ScoreLedger`] collects the result of every unit in execution order and derives the
//! per-category and overall totals from them.
//!
//! Functional categories earn the sum of their units' discrete awards. The memory-safety pool is
//! the exception: it earns `floor(budget * clean / checked)` from a single leak ratio over all
//! checked units, and it only counts towards the totals when at least one unit was checked.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use util::mark_allocator::{Category, proportional_credit};
use util::valgrind_report::ValgrindReport;

use crate::types::{Outcome, TestUnit};

/// Result of one unit in one functional phase.
#[derive(Debug, Clone, Serialize)]
pub struct UnitScore {
    pub name: String,
    pub category: Category,
    pub outcome: Outcome,
    pub earned: u32,
    pub possible: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

impl UnitScore {
    pub fn passed(&self) -> bool {
        self.outcome.is_pass()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryScore {
    pub category: Category,
    pub earned: u32,
    pub possible: u32,
    pub passed: usize,
    pub total: usize,
}

impl CategoryScore {
    fn empty(category: Category) -> Self {
        Self {
            category,
            earned: 0,
            possible: 0,
            passed: 0,
            total: 0,
        }
    }

    pub fn percentage(&self) -> f64 {
        percentage(self.earned, self.possible)
    }
}

/// Proportional credit of the memory-safety pool.
#[derive(Debug, Clone, Serialize)]
pub struct MemorySafetyScore {
    pub budget: u32,
    pub earned: u32,
    pub clean: usize,
    pub checked: usize,
    pub report: ValgrindReport,
}

impl MemorySafetyScore {
    pub fn from_report(budget: u32, report: ValgrindReport) -> Self {
        let clean = report.clean_count();
        let checked = report.total_checked();
        Self {
            budget,
            earned: proportional_credit(budget, clean, checked),
            clean,
            checked,
            report,
        }
    }

    /// A pool that checked nothing contributes to neither earned nor possible totals.
    pub fn counted(&self) -> bool {
        self.checked > 0
    }
}

/// Final, serializable view of a run.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreSummary {
    pub generated_at: String,
    pub units: Vec<UnitScore>,
    pub categories: Vec<CategoryScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_safety: Option<MemorySafetyScore>,
    pub earned: u32,
    pub possible: u32,
}

impl ScoreSummary {
    pub fn percentage(&self) -> f64 {
        percentage(self.earned, self.possible)
    }

    pub fn category(&self, category: Category) -> Option<&CategoryScore> {
        self.categories.iter().find(|c| c.category == category)
    }

    /// Every executed unit passed, and a counted memory-safety pool was fully clean.
    pub fn all_passed(&self) -> bool {
        let functional = self.units.iter().all(UnitScore::passed);
        let memory = self
            .memory_safety
            .as_ref()
            .filter(|m| m.counted())
            .is_none_or(|m| m.clean == m.checked);
        functional && memory
    }
}

fn percentage(earned: u32, possible: u32) -> f64 {
    if possible == 0 {
        0.0
    } else {
        earned as f64 * 100.0 / possible as f64
    }
}

/// Per-run score accumulator. Created fresh for every run and never persisted.
#[derive(Debug, Default)]
pub struct ScoreLedger {
    units: Vec<UnitScore>,
    categories: BTreeMap<Category, CategoryScore>,
    memory_safety: Option<MemorySafetyScore>,
}

impl ScoreLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a unit whose outcome is final for this phase.
    pub fn record_unit(&mut self, unit: &TestUnit) -> &UnitScore {
        let earned = if unit.outcome.is_pass() { unit.points } else { 0 };
        let category = self
            .categories
            .entry(unit.category)
            .or_insert_with(|| CategoryScore::empty(unit.category));
        category.earned += earned;
        category.possible += unit.points;
        category.total += 1;
        if unit.outcome.is_pass() {
            category.passed += 1;
        }

        self.units.push(UnitScore {
            name: unit.name.clone(),
            category: unit.category,
            outcome: unit.outcome.clone(),
            earned,
            possible: unit.points,
            diff: unit.outcome.diff().map(str::to_string),
        });
        let last = self.units.len() - 1;
        &self.units[last]
    }

    pub fn category(&self, category: Category) -> Option<&CategoryScore> {
        self.categories.get(&category)
    }

    pub fn record_memory_safety(&mut self, score: MemorySafetyScore) -> &MemorySafetyScore {
        self.memory_safety.insert(score)
    }

    pub fn units(&self) -> &[UnitScore] {
        &self.units
    }

    pub fn earned(&self) -> u32 {
        let functional: u32 = self.categories.values().map(|c| c.earned).sum();
        functional + self.counted_memory().map_or(0, |m| m.earned)
    }

    pub fn possible(&self) -> u32 {
        let functional: u32 = self.categories.values().map(|c| c.possible).sum();
        functional + self.counted_memory().map_or(0, |m| m.budget)
    }

    fn counted_memory(&self) -> Option<&MemorySafetyScore> {
        self.memory_safety.as_ref().filter(|m| m.counted())
    }

    pub fn summary(&self) -> ScoreSummary {
        ScoreSummary {
            generated_at: Utc::now().to_rfc3339(),
            units: self.units.clone(),
            categories: self.categories.values().cloned().collect(),
            memory_safety: self.memory_safety.clone(),
            earned: self.earned(),
            possible: self.possible(),
        }
    }
}
