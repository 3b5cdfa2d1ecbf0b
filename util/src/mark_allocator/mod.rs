//! Point allocation across categories and across the units of one category.
//!
//! Every pool's awards add up to its budget exactly: the budget is split evenly and the
//! remainder goes, one point each, to the first units in iteration order.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::execution_config::ScoringOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Basic,
    Advanced,
    Scripted,
    MemorySafety,
}

impl Category {
    /// Functional categories in phase order.
    pub const FUNCTIONAL: [Category; 3] = [Category::Basic, Category::Advanced, Category::Scripted];

    pub fn is_functional(self) -> bool {
        !matches!(self, Category::MemorySafety)
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Basic => "Basic",
            Category::Advanced => "Advanced",
            Category::Scripted => "Scripted",
            Category::MemorySafety => "Memory Safety",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "basic" | "b" => Some(Category::Basic),
            "advanced" | "a" => Some(Category::Advanced),
            "scripted" | "python" => Some(Category::Scripted),
            "memorysafety" | "memory_safety" | "memory" => Some(Category::MemorySafety),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Points assigned to one category pool, in the pool's iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolAllocation {
    pub category: Category,
    pub budget: u32,
    pub points: Vec<u32>,
}

impl PoolAllocation {
    pub fn total(&self) -> u32 {
        self.points.iter().sum()
    }
}

/// Splits `budget` over `count` units: `budget / count` each, plus one point for the first
/// `budget % count` units. Zero units yield an empty allocation.
pub fn split_budget(budget: u32, count: usize) -> Vec<u32> {
    if count == 0 {
        return Vec::new();
    }
    let n = count as u32;
    let per = budget / n;
    let rem = budget % n;
    (0..n).map(|i| if i < rem { per + 1 } else { per }).collect()
}

/// `floor(budget * passed / checked)`, or zero when nothing was checked.
pub fn proportional_credit(budget: u32, passed: usize, checked: usize) -> u32 {
    if checked == 0 {
        return 0;
    }
    let passed = passed.min(checked) as u64;
    ((budget as u64 * passed) / checked as u64) as u32
}

/// Which functional pools take part in a run; decides how the functional budget is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetFocus {
    /// Basic and Advanced share the budget by `basic_ratio`.
    Shared,
    /// A single functional category receives the whole budget.
    Only(Category),
}

#[derive(Debug, Clone)]
pub struct MarkAllocator {
    scoring: ScoringOptions,
}

impl MarkAllocator {
    pub fn new(scoring: ScoringOptions) -> Result<Self, String> {
        if !(0.0..=1.0).contains(&scoring.basic_ratio) {
            return Err(format!(
                "basic_ratio must be between 0.0 and 1.0 (got {})",
                scoring.basic_ratio
            ));
        }
        Ok(Self { scoring })
    }

    pub fn scoring(&self) -> &ScoringOptions {
        &self.scoring
    }

    /// Budget of each functional pool before it is split across units.
    ///
    /// Basic takes `floor(total * ratio)` and Advanced the rest, so the two always add up to
    /// the functional total.
    pub fn category_budget(&self, category: Category, focus: BudgetFocus) -> u32 {
        let total = self.scoring.total_points;
        let ratio = match focus {
            BudgetFocus::Shared => self.scoring.basic_ratio,
            BudgetFocus::Only(Category::Basic) => 1.0,
            BudgetFocus::Only(Category::Advanced) => 0.0,
            BudgetFocus::Only(_) => self.scoring.basic_ratio,
        };
        // Guard against representation error such as 0.29 * 100 = 28.999...
        let basic = ((total as f64 * ratio) + 1e-9).floor() as u32;
        let basic = basic.min(total);
        match category {
            Category::Basic => basic,
            Category::Advanced => total - basic,
            Category::Scripted => 0,
            Category::MemorySafety => self.scoring.memory_safety_points,
        }
    }

    /// Assigns points to `count` units of `category`.
    ///
    /// Scripted units get a flat award each; the memory-safety pool is credited as a whole and
    /// therefore has no per-unit points.
    pub fn allocate(&self, category: Category, count: usize, focus: BudgetFocus) -> PoolAllocation {
        match category {
            Category::Scripted => {
                let per = self.scoring.scripted_points_per_unit;
                PoolAllocation {
                    category,
                    budget: per * count as u32,
                    points: vec![per; count],
                }
            }
            Category::MemorySafety => PoolAllocation {
                category,
                budget: self.scoring.memory_safety_points,
                points: Vec::new(),
            },
            Category::Basic | Category::Advanced => {
                if count == 0 {
                    return PoolAllocation {
                        category,
                        budget: 0,
                        points: Vec::new(),
                    };
                }
                let budget = self.category_budget(category, focus);
                PoolAllocation {
                    category,
                    budget,
                    points: split_budget(budget, count),
                }
            }
        }
    }
}
