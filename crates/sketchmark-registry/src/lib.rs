//! sketchmark-registry — Process-wide orchestration of assessment engines.
//!
//! Engines are expensive in-memory structures built lazily per assignment
//! from the backing submission store, kept behind per-engine locks, and
//! evicted again after a configurable idle period. This crate also owns the
//! provisional results that surface engine suggestions to graders, and the
//! grading-scale rounding applied on that boundary.

pub mod error;
pub mod registry;
pub mod result;
pub mod rounding;
pub mod store;

pub use error::RegistryError;
pub use registry::{EngineRegistry, RegistryConfig};
pub use result::{AssessmentType, ProvisionalResult};
pub use store::{AssignmentId, StoredFeedback, StoredSubmission, SubmissionStore};
