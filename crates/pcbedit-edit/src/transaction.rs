//! Transactional command groups.
//!
//! A [`Transaction`] applies mutations to a document one by one and keeps
//! the record of each. It ends in exactly one of three ways:
//! - [`Transaction::commit`] keeps the changes and returns them as one
//!   undoable [`CommittedEdit`] (or [`EditOutcome::NoOp`] if nothing was
//!   applied);
//! - [`Transaction::abort`], a failing [`Transaction::apply`], or simply
//!   dropping the transaction undoes every applied record in reverse order;
//! - [`Transaction::dismiss`] keeps the changes but discards the records.
//!
//! [`CommandGroup`] is the declarative counterpart: a list of mutations and
//! nested groups executed through a transaction, with an explicit state
//! machine.

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use pcbedit_core::{BoardDocument, IdGenerator};

use crate::command::{apply_command, apply_mutation, EditCommand, Mutation};
use crate::error::EditError;

// ---------------------------------------------------------------------------
// State and outcome
// ---------------------------------------------------------------------------

/// Lifecycle of a transaction or command group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    NotStarted,
    Running,
    Committed,
    RolledBack,
    /// Committed, and no compensation will ever be requested.
    Dismissed,
}

/// A committed, undoable edit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedEdit {
    command: EditCommand,
}

impl CommittedEdit {
    pub fn description(&self) -> &str {
        match &self.command {
            EditCommand::Group { description, .. } => description,
            _ => "edit",
        }
    }

    pub fn command(&self) -> &EditCommand {
        &self.command
    }

    /// Reverts the edit atomically.
    pub fn undo<D: BoardDocument + ?Sized>(&self, doc: &mut D) -> Result<(), EditError> {
        apply_command(doc, &self.command.inverse())?;
        Ok(())
    }

    /// Re-applies a previously undone edit atomically.
    pub fn redo<D: BoardDocument + ?Sized>(&self, doc: &mut D) -> Result<(), EditError> {
        apply_command(doc, &self.command)?;
        Ok(())
    }
}

/// Result of a committed compound operation.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Applied(CommittedEdit),
    /// The operation produced no sub-edits. Not an error.
    NoOp,
}

impl EditOutcome {
    pub fn is_noop(&self) -> bool {
        matches!(self, EditOutcome::NoOp)
    }

    pub fn into_edit(self) -> Option<CommittedEdit> {
        match self {
            EditOutcome::Applied(edit) => Some(edit),
            EditOutcome::NoOp => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// An all-or-nothing sequence of document edits.
///
/// Holds exclusive access to the document and the identity generator for
/// its whole lifetime.
pub struct Transaction<'a, D: BoardDocument + ?Sized, I: IdGenerator> {
    doc: &'a mut D,
    ids: &'a mut I,
    description: String,
    applied: Vec<EditCommand>,
    state: GroupState,
}

impl<'a, D: BoardDocument + ?Sized, I: IdGenerator> Transaction<'a, D, I> {
    /// Starts a transaction.
    pub fn begin(doc: &'a mut D, ids: &'a mut I, description: impl Into<String>) -> Self {
        let description = description.into();
        debug!(%description, "transaction started");
        Transaction {
            doc,
            ids,
            description,
            applied: Vec::new(),
            state: GroupState::Running,
        }
    }

    /// Read access to the document as modified so far.
    pub fn doc(&self) -> &D {
        &*self.doc
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    /// Number of records applied so far (nested groups count as one).
    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    /// A fresh identity from the injected generator.
    pub fn fresh<T: From<Uuid>>(&mut self) -> T {
        self.ids.fresh()
    }

    pub fn ids(&mut self) -> &mut I {
        &mut *self.ids
    }

    fn ensure_running(&self) -> Result<(), EditError> {
        match self.state {
            GroupState::Running => Ok(()),
            other => Err(EditError::InvalidState(format!(
                "transaction '{}' is {:?}",
                self.description, other
            ))),
        }
    }

    /// Applies one mutation. On failure, everything applied so far is rolled
    /// back before the error is returned.
    ///
    /// If the rollback itself cannot undo every record, the document is left
    /// partially modified and a [`EditError::StructuralInvariantViolation`]
    /// is returned instead of the original fault.
    pub fn apply(&mut self, mutation: Mutation) -> Result<(), EditError> {
        self.ensure_running()?;
        match apply_mutation(&mut *self.doc, mutation) {
            Ok(command) => {
                self.applied.push(command);
                Ok(())
            }
            Err(err) => {
                let err = EditError::from(err);
                warn!(description = %self.description, %err, "sub-edit failed, rolling back");
                let mut failures = self.rollback();
                match failures.pop() {
                    Some(failure) => Err(EditError::StructuralInvariantViolation {
                        reason: format!(
                            "rollback of '{}' after '{}' incomplete: {}",
                            self.description, err, failure
                        ),
                    }),
                    None => Err(err),
                }
            }
        }
    }

    /// Runs `f` as a nested child group. The records applied by `f` are
    /// wrapped into a single [`EditCommand::Group`], so undoing the parent
    /// undoes the child's records in LIFO order too.
    ///
    /// An error from `f` is propagated; the transaction then rolls back when
    /// it is aborted or dropped.
    pub fn group<R>(
        &mut self,
        description: impl Into<String>,
        f: impl FnOnce(&mut Self) -> Result<R, EditError>,
    ) -> Result<R, EditError> {
        self.ensure_running()?;
        let mark = self.applied.len();
        let result = f(self)?;
        if self.applied.len() > mark {
            let commands: Vec<EditCommand> = self.applied.drain(mark..).collect();
            self.applied.push(EditCommand::Group {
                description: description.into(),
                commands,
            });
        }
        Ok(result)
    }

    /// Undoes all applied records in reverse order. Compensation failures
    /// are logged; the remaining records are still undone.
    fn rollback(&mut self) -> Vec<EditError> {
        let mut failures = Vec::new();
        while let Some(command) = self.applied.pop() {
            if let Err(err) = apply_command(&mut *self.doc, &command.inverse()) {
                error!(description = %self.description, %err, "compensation failed");
                failures.push(EditError::from(err));
            }
        }
        self.state = GroupState::RolledBack;
        failures
    }

    /// Keeps all changes and returns them as one undoable edit.
    pub fn commit(mut self) -> Result<EditOutcome, EditError> {
        self.ensure_running()?;
        self.state = GroupState::Committed;
        let commands = std::mem::take(&mut self.applied);
        if commands.is_empty() {
            debug!(description = %self.description, "transaction committed without changes");
            return Ok(EditOutcome::NoOp);
        }
        let command = EditCommand::Group {
            description: self.description.clone(),
            commands,
        };
        info!(
            description = %self.description,
            edits = command.primitive_count(),
            "transaction committed"
        );
        Ok(EditOutcome::Applied(CommittedEdit { command }))
    }

    /// Undoes everything applied so far.
    pub fn abort(mut self) -> Result<(), EditError> {
        if self.state != GroupState::Running {
            return Ok(());
        }
        let mut failures = self.rollback();
        match failures.pop() {
            Some(err) => Err(EditError::StructuralInvariantViolation {
                reason: format!("rollback of '{}' incomplete: {}", self.description, err),
            }),
            None => Ok(()),
        }
    }

    /// Keeps all changes but gives up the ability to undo them.
    pub fn dismiss(mut self) {
        self.applied.clear();
        self.state = GroupState::Dismissed;
    }
}

impl<D: BoardDocument + ?Sized, I: IdGenerator> Drop for Transaction<'_, D, I> {
    fn drop(&mut self) {
        if self.state == GroupState::Running {
            if !self.applied.is_empty() {
                warn!(description = %self.description, "transaction dropped, rolling back");
            }
            let failures = self.rollback();
            if !failures.is_empty() {
                error!(
                    description = %self.description,
                    failures = failures.len(),
                    "rollback of dropped transaction incomplete, document left modified"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CommandGroup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum GroupItem {
    Mutation(Mutation),
    Group(CommandGroup),
}

/// A declarative, nestable list of mutations executed atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandGroup {
    description: String,
    items: Vec<GroupItem>,
    state: GroupState,
    committed: Option<CommittedEdit>,
}

impl CommandGroup {
    pub fn new(description: impl Into<String>) -> Self {
        CommandGroup {
            description: description.into(),
            items: Vec::new(),
            state: GroupState::NotStarted,
            committed: None,
        }
    }

    pub fn with(mut self, mutation: Mutation) -> Self {
        self.push(mutation);
        self
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.items.push(GroupItem::Mutation(mutation));
    }

    pub fn push_group(&mut self, child: CommandGroup) {
        self.items.push(GroupItem::Group(child));
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    pub fn committed(&self) -> Option<&CommittedEdit> {
        self.committed.as_ref()
    }

    /// Applies all items in order. If any fails, everything is undone in
    /// reverse order and the fault is returned.
    pub fn execute<D, I>(&mut self, doc: &mut D, ids: &mut I) -> Result<EditOutcome, EditError>
    where
        D: BoardDocument + ?Sized,
        I: IdGenerator,
    {
        if self.state != GroupState::NotStarted {
            return Err(EditError::InvalidState(format!(
                "group '{}' already executed ({:?})",
                self.description, self.state
            )));
        }
        self.state = GroupState::Running;
        let mut tx = Transaction::begin(doc, ids, self.description.clone());
        let result = apply_items(&mut tx, &self.items);
        match result {
            Ok(()) => {
                let outcome = tx.commit()?;
                self.state = GroupState::Committed;
                self.committed = match &outcome {
                    EditOutcome::Applied(edit) => Some(edit.clone()),
                    EditOutcome::NoOp => None,
                };
                Ok(outcome)
            }
            Err(err) => {
                tx.abort()?;
                self.state = GroupState::RolledBack;
                Err(err)
            }
        }
    }

    /// Undoes a committed group.
    pub fn undo<D: BoardDocument + ?Sized>(&mut self, doc: &mut D) -> Result<(), EditError> {
        if self.state != GroupState::Committed {
            return Err(EditError::InvalidState(format!(
                "cannot undo group '{}' in state {:?}",
                self.description, self.state
            )));
        }
        if let Some(edit) = self.committed.take() {
            edit.undo(doc)?;
        }
        self.state = GroupState::RolledBack;
        Ok(())
    }

    /// Declares that the committed group will never need compensation.
    pub fn dismiss(&mut self) -> Result<(), EditError> {
        if self.state != GroupState::Committed {
            return Err(EditError::InvalidState(format!(
                "cannot dismiss group '{}' in state {:?}",
                self.description, self.state
            )));
        }
        self.committed = None;
        self.state = GroupState::Dismissed;
        Ok(())
    }
}

fn apply_items<D, I>(tx: &mut Transaction<'_, D, I>, items: &[GroupItem]) -> Result<(), EditError>
where
    D: BoardDocument + ?Sized,
    I: IdGenerator,
{
    for item in items {
        match item {
            GroupItem::Mutation(mutation) => tx.apply(mutation.clone())?,
            GroupItem::Group(child) => {
                tx.group(child.description.clone(), |tx| apply_items(tx, &child.items))?
            }
        }
    }
    Ok(())
}
