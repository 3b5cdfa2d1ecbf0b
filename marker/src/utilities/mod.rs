//! # Utilities
//!
//! Helpers shared by the comparators.
//!
//! - [`line_diff`]: unified line diffs for verbose failure reports.

pub mod line_diff;
