//! Edit variables: soft targets that can be moved cheaply.
//!
//! Each edit variable is backed by a soft `variable == target` constraint.
//! `suggest_value` moves the target in place and repairs the tableau with
//! the dual simplex instead of removing and re-adding the constraint.

use super::{ConstraintHandle, Solver, Status};
use crate::error::SolverError;
use crate::expression::{Relational, Variable};
use crate::strength::Strength;

#[derive(Debug, Clone, Copy)]
pub(super) struct Edit {
    pub(super) handle: ConstraintHandle,
    /// Last suggested target.
    pub(super) value: f64,
}

impl Solver {
    /// Start editing `variable`, pinned at its current value (zero if it has
    /// none yet).
    pub fn add_edit_variable(&mut self, variable: Variable, strength: Strength) -> Result<(), SolverError> {
        let key = variable.index();
        if self.state.edits.contains_key(&key) {
            return Err(SolverError::DuplicateEditVariable(key));
        }
        if strength.is_required() {
            return Err(SolverError::RequiredEditStrength);
        }

        let current = self.get(variable);
        let value = if Status::of(current).is_ok() { current } else { 0.0 };
        let handle = self.set_constraint(variable.equal_to(value), strength)?;
        self.state.edits.insert(key, Edit { handle, value });
        Ok(())
    }

    pub fn remove_edit_variable(&mut self, variable: Variable) -> Result<(), SolverError> {
        let key = variable.index();
        let Some(edit) = self.state.edits.get(&key).copied() else {
            return Err(SolverError::UnknownEditVariable(key));
        };
        if !self.remove_constraint(edit.handle) {
            return Err(SolverError::Unsatisfiable);
        }
        self.state.edits.shift_remove(&key);
        Ok(())
    }

    pub fn has_edit_variable(&self, variable: Variable) -> bool {
        self.state.edits.contains_key(&variable.index())
    }

    /// Move an edit variable's target to `value`.
    pub fn suggest_value(&mut self, variable: Variable, value: f64) -> Result<(), SolverError> {
        let key = variable.index();
        let Some(edit) = self.state.edits.get(&key).copied() else {
            return Err(SolverError::UnknownEditVariable(key));
        };

        self.checkpoint();
        match self.state.tableau.suggest(edit.handle, value - edit.value) {
            Ok(()) => {
                self.state.tableau.commit();
                if let Some(edit) = self.state.edits.get_mut(&key) {
                    edit.value = value;
                }
                tracing::trace!("suggested {} = {}", variable, value);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("failed to suggest {} = {}: {}", variable, value, e);
                self.recover();
                Err(e)
            }
        }
    }
}
