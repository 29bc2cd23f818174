//! Engine error types.
//!
//! Closed enums so callers can match on failure classes — in particular a
//! stale element reference, which signals that the grading frontend and the
//! engine have desynchronized state and must never be dropped silently.

use thiserror::Error;

use crate::model::{DiagramKind, SubmissionId};

/// Errors raised while turning a submission document into a model.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document is not valid JSON or misses required fields.
    #[error("malformed submission document: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The document declares a diagram type this engine has never heard of.
    #[error("unknown diagram type: {0}")]
    UnknownDiagramType(String),

    /// The document declares a recognized but unanalyzable diagram type.
    #[error("unsupported diagram type: {0}")]
    UnsupportedDiagramType(DiagramKind),

    /// A relationship endpoint references an element the document does not
    /// contain.
    #[error("relationship {relationship_id} references element {element_id} that is not part of the model")]
    DanglingEndpoint {
        relationship_id: String,
        element_id: String,
    },
}

/// Errors raised by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The submission was never registered with this engine.
    #[error("submission {0} is not registered with this engine")]
    UnknownSubmission(SubmissionId),

    /// Incoming feedback references an element id the claimed model does not
    /// carry. Indicates a caller bug (stale reference), not bad student data.
    #[error("feedback for submission {submission_id} references unknown element {element_id}")]
    StaleElementReference {
        submission_id: SubmissionId,
        element_id: String,
    },
}
