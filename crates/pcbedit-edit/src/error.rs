//! Edit error types.
//!
//! [`EditError`] is the single fault type raised by edit operations. A fault
//! raised inside a transaction always means the transaction was rolled back
//! and the document is unchanged.

use pcbedit_core::{CoreError, Point, TraceAnchor, TraceId};

/// Faults raised by splitting, removal, paste and transactions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    /// A trace endpoint could not be mapped to any junction, via or pad even
    /// after placeholder substitution was considered.
    #[error("unresolved anchor {anchor} of trace {trace}")]
    UnresolvedAnchor { trace: TraceId, anchor: TraceAnchor },

    /// A referenced layer does not exist on the target board.
    #[error("layer '{name}' does not exist on the board")]
    MissingLayer { name: String },

    /// A post-condition check failed. Indicates a logic defect.
    #[error("structural invariant violated: {reason}")]
    StructuralInvariantViolation { reason: String },

    /// A library element required by a pasted item is neither in the
    /// destination library nor in the clipboard bundle.
    #[error("missing library element: {what}")]
    MissingLibraryElement { what: String },

    /// Translating a pasted item by the paste offset leaves the coordinate
    /// range.
    #[error("offset {offset} moves {position} out of the coordinate range")]
    CoordinateOverflow { position: Point, offset: Point },

    /// An operation was attempted in a state that does not permit it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Any other document primitive failure.
    #[error(transparent)]
    Document(CoreError),
}

impl EditError {
    /// Returns `true` for bug-class faults, as opposed to user-facing ones.
    pub fn is_bug(&self) -> bool {
        matches!(
            self,
            EditError::StructuralInvariantViolation { .. } | EditError::InvalidState(_)
        )
    }
}

impl From<CoreError> for EditError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::LayerNotFound { name } => EditError::MissingLayer { name },
            CoreError::UnresolvedAnchor { trace, anchor } => {
                EditError::UnresolvedAnchor { trace, anchor }
            }
            CoreError::GraphInconsistency { reason } => {
                EditError::StructuralInvariantViolation { reason }
            }
            other => EditError::Document(other),
        }
    }
}
