//! Backing store abstraction.
//!
//! The registry never talks to a database directly; the surrounding
//! application implements [`SubmissionStore`] over whatever persistence it
//! owns. Engines are rebuilt from this store after eviction or restart, so
//! everything needed for a faithful replay must come through here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sketchmark_core::model::{DiagramKind, SubmissionId};

/// Database id of an assignment, assigned by the surrounding application.
pub type AssignmentId = i64;

/// One persisted unit of manual feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFeedback {
    pub element_id: String,
    pub points: f64,
    #[serde(default)]
    pub comment: String,
}

/// One persisted submission, with its manual assessment if one exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSubmission {
    pub submission_id: SubmissionId,
    /// The raw diagram document as the student's editor produced it.
    pub document: String,
    /// `Some` once a grader has finished assessing this submission.
    pub manual_feedback: Option<Vec<StoredFeedback>>,
}

/// Read access to persisted assignments and their submissions.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Diagram type configured for an assignment.
    async fn diagram_kind(&self, assignment_id: AssignmentId) -> anyhow::Result<DiagramKind>;

    /// All submissions of an assignment, in replay order.
    async fn submissions(
        &self,
        assignment_id: AssignmentId,
    ) -> anyhow::Result<Vec<StoredSubmission>>;
}
