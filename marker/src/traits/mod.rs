//!
//! Traits Module
//!
//! Core abstractions of the marker.
//!
//! - [`comparator`]: judging captured output against a unit's reference.
//!
//! The reporting sink lives next to its implementations in [`crate::report`].

pub mod comparator;
