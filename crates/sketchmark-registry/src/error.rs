//! Registry error types.

use thiserror::Error;

use sketchmark_core::error::EngineError;
use sketchmark_core::model::DiagramKind;

use crate::store::AssignmentId;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The assignment's diagram type has no engine implementation.
    #[error("assignment {assignment_id} uses unsupported diagram type {kind}")]
    Unsupported {
        assignment_id: AssignmentId,
        kind: DiagramKind,
    },

    /// An engine operation failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The backing submission store failed.
    #[error("submission store error: {0}")]
    Store(#[from] anyhow::Error),
}
