//! Marker Error Types
//!
//! [`MarkerError`] covers the conditions that stop a grading run before any unit executes:
//! an unusable catalog, invalid scoring configuration, or a selection that names nothing.
//! Failures of individual units are never errors; they are recorded as an
//! [`Outcome`](crate::types::Outcome) and the run continues.
//!
//! # Example
//!
//! ```rust
//! use marker::error::MarkerError;
//!
//! fn require_units(count: usize) -> Result<(), MarkerError> {
//!     if count == 0 {
//!         return Err(MarkerError::EmptyCatalog("tests".to_string()));
//!     }
//!     Ok(())
//! }
//! assert!(require_units(0).is_err());
//! ```

use thiserror::Error;

/// Fatal configuration and catalog errors.
#[derive(Debug, Error)]
pub enum MarkerError {
    /// The catalog provider found no runnable units.
    #[error("no test units found in {0}")]
    EmptyCatalog(String),
    /// Scoring or execution settings are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A single-unit selection names a unit that no category contains.
    #[error("unknown test unit '{0}'")]
    UnknownUnit(String),
    /// A category selection cannot be run.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    /// Reading catalog artifacts failed.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for MarkerError {
    fn from(e: std::io::Error) -> Self {
        MarkerError::IoError(e.to_string())
    }
}
