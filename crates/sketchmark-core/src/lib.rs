//! sketchmark-core — Per-assignment calculation engine for diagram assessment.
//!
//! This crate detects structurally equivalent elements across independently
//! drawn student diagrams, aggregates human grading feedback per equivalence
//! class, derives confidence-weighted automatic grades for ungraded
//! submissions, and picks which submission a human should grade next.
//!
//! Everything here is in-memory and rebuildable; the relational store owned
//! by the surrounding application remains the system of record.

pub mod assessment;
pub mod engine;
pub mod error;
pub mod grading;
pub mod index;
pub mod model;
pub mod parser;
pub mod selector;
pub mod similarity;
