//! Incremental constraint solver.
//!
//! `Solver` owns the simplex tableau plus the bookkeeping layout code needs
//! around it: which constraints are live, which variables they mention,
//! edit variables, batching and rollback.
//!
//! ```
//! use nexus_layout::{Relational, Solver, Strength, Variable};
//!
//! let mut solver = Solver::new();
//! let left = Variable::new(0);
//! let width = Variable::new(1);
//!
//! solver.add_constraint(left.equal_to(10.0)).unwrap();
//! solver.set_constraint(width.greater_or_equal(40.0), Strength::REQUIRED).unwrap();
//! solver.set_constraint(width.equal_to(120.0), Strength::WEAK).unwrap();
//!
//! assert_eq!(solver.get(left), 10.0);
//! assert_eq!(solver.get(width), 120.0);
//! ```

mod edit;
mod tableau;
mod value;

use std::fmt;

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::Serialize;

use crate::config::SolverConfig;
use crate::error::SolverError;
use crate::expression::{Expression, Variable};
use crate::strength::Strength;
use crate::symbol::VariableIndex;

use self::edit::Edit;
use self::tableau::Tableau;

pub use self::tableau::ConstraintHandle;
pub use self::value::{NOT_FOUND, Status, UNSOLVABLE};

/// Counters describing a solver's current state and history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SolverStats {
    /// Live constraints, edit constraints included.
    pub constraints: usize,
    pub rows: usize,
    pub edit_variables: usize,
    /// Pivots performed by the committed tableau.
    pub pivots: u64,
    pub insertions: u64,
    pub removals: u64,
    pub failures: u64,
}

#[derive(Debug, Clone)]
struct Record {
    strength: Strength,
    variables: Vec<VariableIndex>,
}

/// Everything a failed batch restores.
#[derive(Debug, Clone)]
struct State {
    tableau: Tableau,
    constraints: IndexMap<ConstraintHandle, Record>,
    edits: IndexMap<VariableIndex, Edit>,
    /// Live-constraint count per layout variable.
    references: IndexMap<VariableIndex, usize>,
}

impl State {
    fn new(config: &SolverConfig) -> Self {
        Self {
            tableau: Tableau::new(config.epsilon, config.max_iterations),
            constraints: IndexMap::new(),
            edits: IndexMap::new(),
            references: IndexMap::new(),
        }
    }

    fn clear(&mut self) {
        self.tableau.clear();
        self.constraints.clear();
        self.edits.clear();
        self.references.clear();
    }

    fn register(&mut self, handle: ConstraintHandle, strength: Strength, expression: &Expression) {
        let variables: Vec<VariableIndex> = expression.variables().collect();
        for &variable in &variables {
            *self.references.entry(variable).or_insert(0) += 1;
        }
        self.constraints.insert(handle, Record { strength, variables });
    }

    fn unregister(&mut self, handle: ConstraintHandle) {
        let Some(record) = self.constraints.shift_remove(&handle) else {
            return;
        };
        for variable in record.variables {
            if let Entry::Occupied(mut entry) = self.references.entry(variable) {
                *entry.get_mut() -= 1;
                if *entry.get() == 0 {
                    entry.shift_remove();
                }
            }
        }
        self.edits.retain(|_, edit| edit.handle != handle);
    }
}

/// An open batch. `snapshot` is the state at `start_batch`, kept when
/// rollback is enabled.
#[derive(Debug)]
struct Batch {
    snapshot: Option<Box<State>>,
}

/// Incremental Cassowary-style solver for layout constraints.
///
/// Every insertion either succeeds, leaving the tableau optimal and
/// feasible, or fails and (with `rollback_on_failure`) leaves the solver
/// exactly as it was.
#[derive(Debug)]
pub struct Solver {
    config: SolverConfig,
    state: State,
    batch: Option<Batch>,
    /// A failure happened with rollback disabled; values are meaningless
    /// until `clear()`.
    poisoned: bool,
    stats: SolverStats,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::with_config(SolverConfig::default())
    }

    pub fn with_config(config: SolverConfig) -> Self {
        Self {
            state: State::new(&config),
            config,
            batch: None,
            poisoned: false,
            stats: SolverStats::default(),
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Add a required constraint.
    pub fn add_constraint(&mut self, expression: Expression) -> Result<ConstraintHandle, SolverError> {
        self.set_constraint(expression, Strength::REQUIRED)
    }

    /// Add a constraint at the given strength.
    ///
    /// Fails with `Unsatisfiable` when a required constraint conflicts with
    /// the required constraints already present. Soft constraints never fail
    /// for conflicts; they are violated as little as their strength allows.
    pub fn set_constraint(
        &mut self,
        expression: Expression,
        strength: Strength,
    ) -> Result<ConstraintHandle, SolverError> {
        self.checkpoint();
        let defer = self.batch.is_some();
        match self.state.tableau.add_constraint(&expression, strength, defer) {
            Ok(handle) => {
                self.state.tableau.commit();
                self.state.register(handle, strength, &expression);
                self.stats.insertions += 1;
                tracing::debug!("constraint {} [{}] added as {}", expression, strength, handle.marker());
                Ok(handle)
            }
            Err(e) => {
                tracing::warn!("failed to add constraint {} [{}]: {}", expression, strength, e);
                self.recover();
                Err(e)
            }
        }
    }

    /// Remove a constraint. Returns false for handles this solver does not
    /// know (already removed, cleared, or rolled back) and for removals that
    /// fail internally.
    pub fn remove_constraint(&mut self, handle: ConstraintHandle) -> bool {
        let Some(strength) = self.state.constraints.get(&handle).map(|r| r.strength) else {
            return false;
        };
        self.checkpoint();
        let defer = self.batch.is_some();
        match self.state.tableau.remove_constraint(handle, strength, defer) {
            Ok(()) => {
                self.state.tableau.commit();
                self.state.unregister(handle);
                self.stats.removals += 1;
                tracing::debug!("constraint {} removed", handle.marker());
                true
            }
            Err(e) => {
                tracing::error!("failed to remove constraint {}: {}", handle.marker(), e);
                self.recover();
                false
            }
        }
    }

    pub fn has_constraint(&self, handle: ConstraintHandle) -> bool {
        self.state.constraints.contains_key(&handle)
    }

    pub fn constraint_count(&self) -> usize {
        self.state.constraints.len()
    }

    /// Number of basic rows in the tableau.
    pub fn row_count(&self) -> usize {
        self.state.tableau.len()
    }

    /// Current value of `variable`.
    ///
    /// Returns `UNSOLVABLE` after an unrecovered failure and `NOT_FOUND` for
    /// variables no live constraint mentions. Inside a batch the value may
    /// not be optimal yet.
    pub fn get(&self, variable: Variable) -> f64 {
        if self.poisoned {
            return UNSOLVABLE;
        }
        let key = variable.index();
        match self.state.tableau.row(key) {
            Some(row) => row.constant(),
            None if self.state.references.contains_key(&key) => 0.0,
            None => NOT_FOUND,
        }
    }

    pub fn status(&self, variable: Variable) -> Status {
        Status::of(self.get(variable))
    }

    /// Value of `variable`, or `fallback` after reporting a non-ok status to
    /// `on_error`.
    pub fn get_or(&self, variable: Variable, on_error: impl FnOnce(Status), fallback: f64) -> f64 {
        let value = self.get(variable);
        match Status::of(value) {
            Status::Ok => value,
            status => {
                on_error(status);
                fallback
            }
        }
    }

    /// Defer optimization until `end_batch`.
    ///
    /// A failed operation inside a batch is undone on its own and the batch
    /// stays open. If the deferred solve in `end_batch` fails, the state from
    /// `start_batch` is restored.
    pub fn start_batch(&mut self) -> Result<(), SolverError> {
        if self.batch.is_some() {
            return Err(SolverError::BatchInProgress);
        }
        let snapshot = self
            .config
            .rollback_on_failure
            .then(|| Box::new(self.state.clone()));
        self.batch = Some(Batch { snapshot });
        tracing::trace!("batch started");
        Ok(())
    }

    /// Close the batch and run the deferred optimization.
    pub fn end_batch(&mut self) -> Result<(), SolverError> {
        let Some(batch) = self.batch.take() else {
            return Err(SolverError::NoBatch);
        };
        if let Err(e) = self.state.tableau.solve() {
            tracing::warn!("batch failed: {}", e);
            self.restore(batch.snapshot);
            return Err(e);
        }
        tracing::trace!("batch ended");
        Ok(())
    }

    /// Run `f` inside a batch.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> Result<R, SolverError> {
        self.start_batch()?;
        let out = f(self);
        self.end_batch()?;
        Ok(out)
    }

    pub fn is_batching(&self) -> bool {
        self.batch.is_some()
    }

    /// Drop every constraint, edit variable and open batch.
    pub fn clear(&mut self) {
        self.state.clear();
        self.batch = None;
        self.poisoned = false;
        tracing::debug!("solver cleared");
    }

    pub fn stats(&self) -> SolverStats {
        SolverStats {
            constraints: self.state.constraints.len(),
            rows: self.state.tableau.len(),
            edit_variables: self.state.edits.len(),
            pivots: self.state.tableau.pivots(),
            ..self.stats
        }
    }

    /// Human-readable dump of the tableau.
    pub fn dump(&self) -> String {
        self.to_string()
    }

    /// Journal the tableau for one operation. Registries change only after
    /// the tableau succeeds, so they need no undo.
    fn checkpoint(&mut self) {
        if self.config.rollback_on_failure {
            self.state.tableau.begin();
        }
    }

    /// Undo the failed operation.
    fn recover(&mut self) {
        self.stats.failures += 1;
        if self.config.rollback_on_failure {
            self.state.tableau.rollback();
        } else {
            self.poison();
        }
    }

    /// Return to the `start_batch` state after the deferred solve failed.
    fn restore(&mut self, snapshot: Option<Box<State>>) {
        self.stats.failures += 1;
        match snapshot {
            Some(state) => self.state = *state,
            None => self.poison(),
        }
    }

    fn poison(&mut self) {
        tracing::warn!("solver poisoned; values unavailable until clear()");
        self.poisoned = true;
    }
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tableau = &self.state.tableau;
        writeln!(f, "objective: {}", tableau.objective())?;
        writeln!(f, "rows:")?;
        for (basic, row) in tableau.rows() {
            writeln!(f, "  {} = {}", basic, row)?;
        }
        let infeasible: Vec<String> = tableau.infeasible().iter().map(|k| k.to_string()).collect();
        writeln!(f, "infeasible: [{}]", infeasible.join(", "))?;
        if self.poisoned {
            writeln!(f, "poisoned")?;
        }
        Ok(())
    }
}
