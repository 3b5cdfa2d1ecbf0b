//! Shared building blocks for the grading harness: run configuration, point allocation and
//! leak-detector report classification.

pub mod execution_config;
pub mod mark_allocator;
pub mod valgrind_report;
