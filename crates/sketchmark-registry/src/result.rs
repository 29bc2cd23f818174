//! Provisional assessment results.
//!
//! A provisional result is the engine's current suggestion for one
//! submission, rounded to the grading scale and ready to show a grader. It
//! is replaced on every rescore and dropped once a human takes over.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use sketchmark_core::assessment::Feedback;
use sketchmark_core::model::SubmissionId;

/// Who produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssessmentType {
    /// Entirely engine-derived.
    Automatic,
    /// Engine suggestions reviewed and amended by a grader.
    SemiAutomatic,
    /// Entirely human.
    Manual,
}

/// An engine-suggested assessment for one submission.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionalResult {
    pub id: Uuid,
    pub submission_id: SubmissionId,
    /// Sum of the rounded per-element points.
    pub total_points: f64,
    pub coverage: f64,
    pub confidence: f64,
    pub assessment_type: AssessmentType,
    pub feedback: Vec<Feedback>,
    pub computed_at: DateTime<Utc>,
}
