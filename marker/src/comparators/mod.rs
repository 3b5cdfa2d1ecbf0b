//! # Comparators
//!
//! Strategies for judging a unit's captured output. All of them implement
//! [`OutputComparator`](crate::traits::comparator::OutputComparator), and one is chosen per unit
//! by [`for_unit`]:
//!
//! - [`exact_comparator`]: byte-for-byte equality.
//! - [`template_comparator`]: literal text with embedded pattern blocks, matched as a whole.
//! - [`timing_comparator`]: shape check for exact references of timing-sensitive units.

pub mod exact_comparator;
pub mod template_comparator;
pub mod timing_comparator;

use util::execution_config::ExecutionConfig;

use crate::traits::comparator::OutputComparator;
use crate::types::ExpectedOutput;
use exact_comparator::ExactComparator;
use template_comparator::TemplateComparator;
use timing_comparator::TimingComparator;

/// Builds the comparator for one unit.
///
/// Exact references of units named by a timing rule get the timing comparator. `Err` carries
/// the compile error of an invalid template.
pub fn for_unit(
    unit_name: &str,
    expected: &ExpectedOutput,
    config: &ExecutionConfig,
) -> Result<Box<dyn OutputComparator>, String> {
    match expected {
        ExpectedOutput::Exact(text) => match config.timing.rule_for(unit_name) {
            Some(rule) => Ok(Box::new(TimingComparator::new(text.clone(), rule.clone()))),
            None => Ok(Box::new(ExactComparator::new(text.clone()))),
        },
        ExpectedOutput::Template(text) => {
            Ok(Box::new(TemplateComparator::new(text, &config.template)?))
        }
    }
}
