//! In-memory edit history with linear undo/redo.
//!
//! Committed edits are pushed onto the undo stack; pushing a new edit
//! invalidates everything on the redo stack.

use tracing::debug;

use pcbedit_core::BoardDocument;

use crate::error::EditError;
use crate::transaction::{CommittedEdit, EditOutcome};

#[derive(Debug, Clone, Default)]
pub struct UndoStack {
    done: Vec<CommittedEdit>,
    undone: Vec<CommittedEdit>,
}

impl UndoStack {
    pub fn new() -> Self {
        UndoStack::default()
    }

    /// Records the result of an operation. No-op outcomes are ignored.
    pub fn push(&mut self, outcome: EditOutcome) {
        if let EditOutcome::Applied(edit) = outcome {
            self.undone.clear();
            self.done.push(edit);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    /// Undoes the most recent edit. Returns its description, or `None` if
    /// there is nothing to undo. On failure the edit stays on the stack.
    pub fn undo<D: BoardDocument + ?Sized>(
        &mut self,
        doc: &mut D,
    ) -> Result<Option<String>, EditError> {
        let Some(edit) = self.done.pop() else {
            return Ok(None);
        };
        if let Err(err) = edit.undo(doc) {
            self.done.push(edit);
            return Err(err);
        }
        let description = edit.description().to_string();
        debug!(%description, "undo");
        self.undone.push(edit);
        Ok(Some(description))
    }

    /// Redoes the most recently undone edit.
    pub fn redo<D: BoardDocument + ?Sized>(
        &mut self,
        doc: &mut D,
    ) -> Result<Option<String>, EditError> {
        let Some(edit) = self.undone.pop() else {
            return Ok(None);
        };
        if let Err(err) = edit.redo(doc) {
            self.undone.push(edit);
            return Err(err);
        }
        let description = edit.description().to_string();
        debug!(%description, "redo");
        self.done.push(edit);
        Ok(Some(description))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Mutation;
    use crate::transaction::Transaction;
    use pcbedit_core::{Board, NetClass, SequentialIds};

    fn add_class(board: &mut Board, ids: &mut SequentialIds, name: &str) -> EditOutcome {
        let mut tx = Transaction::begin(board, ids, format!("add {}", name));
        tx.apply(Mutation::InsertNetClass {
            class: NetClass { name: name.into() },
        })
        .unwrap();
        tx.commit().unwrap()
    }

    #[test]
    fn undo_redo_walks_history() {
        let mut board = Board::new("history");
        let mut ids = SequentialIds::default();
        let empty = board.clone();
        let mut history = UndoStack::new();

        history.push(add_class(&mut board, &mut ids, "power"));
        let with_power = board.clone();
        history.push(add_class(&mut board, &mut ids, "signal"));

        assert_eq!(history.undo(&mut board).unwrap().as_deref(), Some("add signal"));
        assert_eq!(board, with_power);
        assert_eq!(history.undo(&mut board).unwrap().as_deref(), Some("add power"));
        assert_eq!(board, empty);
        assert_eq!(history.undo(&mut board).unwrap(), None);

        assert_eq!(history.redo(&mut board).unwrap().as_deref(), Some("add power"));
        assert_eq!(board, with_power);
    }

    #[test]
    fn new_edit_clears_redo() {
        let mut board = Board::new("history");
        let mut ids = SequentialIds::default();
        let mut history = UndoStack::new();

        history.push(add_class(&mut board, &mut ids, "a"));
        history.undo(&mut board).unwrap();
        assert!(history.can_redo());

        history.push(add_class(&mut board, &mut ids, "b"));
        assert!(!history.can_redo());
        assert!(history.can_undo());
    }
}
