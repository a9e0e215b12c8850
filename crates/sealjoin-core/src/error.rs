use thiserror::Error;

use crate::document::DocumentId;
use crate::seal::SealId;
use crate::store::StoreError;
use crate::workflow::Stage;

#[derive(Error, Debug)]
pub enum SealJoinError {
    #[error("Unresolved document reference: {0}")]
    UnresolvedReference(DocumentId),

    #[error("Page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("Unknown seal: {0}")]
    UnknownSeal(SealId),

    #[error("Seal {0} is inactive")]
    InactiveSeal(SealId),

    #[error("Cannot {operation} while session is {stage}")]
    InvalidTransition { stage: Stage, operation: String },

    #[error("Internal invariant violated: {0}")]
    InternalInvariantViolation(String),

    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Invalid seal catalog: {0}")]
    Catalog(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(StoreError),
}

impl SealJoinError {
    pub(crate) fn invalid_transition(stage: Stage, operation: impl Into<String>) -> Self {
        SealJoinError::InvalidTransition {
            stage,
            operation: operation.into(),
        }
    }

    /// True for errors that signal corrupted data rather than caller mistakes
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            SealJoinError::InternalInvariantViolation(_) | SealJoinError::OperationError(_)
        )
    }
}

impl From<StoreError> for SealJoinError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SealJoinError::UnresolvedReference(id),
            other => SealJoinError::Store(other),
        }
    }
}
