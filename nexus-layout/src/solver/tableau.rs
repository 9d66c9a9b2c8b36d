//! Simplex tableau: basic rows, the objective, and the pivoting machinery.
//!
//! Invariants between public calls:
//! - no basic variable appears as a term in any row (objective included);
//! - every row keyed by a restricted variable has a non-negative constant,
//!   except those queued in `infeasible` awaiting dual-simplex repair;
//! - unrestricted variables (layout variables) only appear as terms in rows
//!   keyed by other unrestricted variables.

use indexmap::IndexMap;

use crate::error::SolverError;
use crate::expression::{Expression, Relation};
use crate::row::Row;
use crate::strength::Strength;
use crate::symbol::{Kind, Symbol, VariableIndex};

/// Identifies a constraint by the internal marker variables created for it.
///
/// `marker` is a slack (inequality), the plus error (soft equality) or a
/// dummy (required equality). `other` is the error of a soft inequality or
/// the minus error of a soft equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintHandle {
    marker: VariableIndex,
    other: Option<VariableIndex>,
}

impl ConstraintHandle {
    pub fn marker(&self) -> VariableIndex {
        self.marker
    }

    pub fn other(&self) -> Option<VariableIndex> {
        self.other
    }

    fn markers(&self) -> impl Iterator<Item = VariableIndex> {
        std::iter::once(self.marker).chain(self.other)
    }
}

/// Which objective `optimize` minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Objective,
    Artificial,
}

/// Undo log for one operation. Rows and the objective are saved the first
/// time the operation touches them; `order` is taken before the first change
/// to the set of basic variables.
#[derive(Debug, Clone)]
struct Journal {
    /// Prior content per touched key; `None` if the key was not basic.
    rows: IndexMap<VariableIndex, Option<Row>>,
    order: Option<Vec<VariableIndex>>,
    objective: Option<Row>,
    infeasible: Vec<VariableIndex>,
    next_id: u32,
    deferred: bool,
    pivots: u64,
}

/// Record `row` as the prior content of `key` unless already recorded.
fn save_row(journal: &mut Option<Journal>, key: VariableIndex, row: Option<&Row>) {
    if let Some(journal) = journal {
        journal.rows.entry(key).or_insert_with(|| row.cloned());
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Tableau {
    rows: IndexMap<VariableIndex, Row>,
    objective: Row,
    /// Phase-1 objective, present only while an artificial variable is basic.
    artificial: Option<Row>,
    /// Restricted basics whose constant may have gone negative.
    infeasible: Vec<VariableIndex>,
    next_id: u32,
    /// Set when optimization was skipped for a batched insertion.
    deferred: bool,
    pivots: u64,
    epsilon: f64,
    max_iterations: usize,
    journal: Option<Journal>,
}

impl Tableau {
    pub(crate) fn new(epsilon: f64, max_iterations: usize) -> Self {
        Self {
            rows: IndexMap::new(),
            objective: Row::default(),
            artificial: None,
            infeasible: Vec::new(),
            next_id: 0,
            deferred: false,
            pivots: 0,
            epsilon,
            max_iterations,
            journal: None,
        }
    }

    /// Drop every row and reset the internal id counter.
    pub(crate) fn clear(&mut self) {
        self.rows.clear();
        self.objective = Row::default();
        self.artificial = None;
        self.infeasible.clear();
        self.next_id = 0;
        self.deferred = false;
        self.pivots = 0;
        self.journal = None;
    }

    /// Start recording changes so the next operation can be undone.
    pub(crate) fn begin(&mut self) {
        self.journal = Some(Journal {
            rows: IndexMap::new(),
            order: None,
            objective: None,
            infeasible: self.infeasible.clone(),
            next_id: self.next_id,
            deferred: self.deferred,
            pivots: self.pivots,
        });
    }

    /// Keep the changes made since `begin`.
    pub(crate) fn commit(&mut self) {
        self.journal = None;
    }

    /// Restore the tableau as it was at `begin`, row order included.
    pub(crate) fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        let mut saved = journal.rows;
        match journal.order {
            Some(order) => {
                let mut current = std::mem::take(&mut self.rows);
                self.rows = order
                    .into_iter()
                    .filter_map(|key| {
                        let row = match saved.swap_remove(&key) {
                            Some(prior) => prior,
                            None => current.swap_remove(&key),
                        };
                        row.map(|row| (key, row))
                    })
                    .collect();
            }
            None => {
                for (key, prior) in saved {
                    if let (Some(prior), Some(row)) = (prior, self.rows.get_mut(&key)) {
                        *row = prior;
                    }
                }
            }
        }
        if let Some(objective) = journal.objective {
            self.objective = objective;
        }
        self.artificial = None;
        self.infeasible = journal.infeasible;
        self.next_id = journal.next_id;
        self.deferred = journal.deferred;
        self.pivots = journal.pivots;
    }

    fn save_order(&mut self) {
        if let Some(journal) = &mut self.journal {
            if journal.order.is_none() {
                journal.order = Some(self.rows.keys().copied().collect());
            }
        }
    }

    fn save_objective(&mut self) {
        if let Some(journal) = &mut self.journal {
            if journal.objective.is_none() {
                journal.objective = Some(self.objective.clone());
            }
        }
    }

    /// Remove a basic row, journaling it.
    fn take_row(&mut self, key: VariableIndex) -> Option<Row> {
        if !self.rows.contains_key(&key) {
            return None;
        }
        self.save_order();
        save_row(&mut self.journal, key, self.rows.get(&key));
        self.rows.shift_remove(&key)
    }

    /// Insert or replace a basic row, journaling the prior state.
    fn put_row(&mut self, key: VariableIndex, row: Row) {
        if !self.rows.contains_key(&key) {
            self.save_order();
        }
        save_row(&mut self.journal, key, self.rows.get(&key));
        self.rows.insert(key, row);
    }

    pub(crate) fn row(&self, key: VariableIndex) -> Option<&Row> {
        self.rows.get(&key)
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = (VariableIndex, &Row)> {
        self.rows.iter().map(|(&key, row)| (key, row))
    }

    pub(crate) fn objective(&self) -> &Row {
        &self.objective
    }

    pub(crate) fn infeasible(&self) -> &[VariableIndex] {
        &self.infeasible
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn pivots(&self) -> u64 {
        self.pivots
    }

    fn new_symbol(&mut self, kind: Kind) -> Result<VariableIndex, SolverError> {
        let id = VariableIndex::try_new(self.next_id, kind, false)?;
        self.next_id += 1;
        Ok(id)
    }

    /// Insert a constraint. With `defer`, optimization is postponed until the
    /// next `solve()`.
    pub(crate) fn add_constraint(
        &mut self,
        expression: &Expression,
        strength: Strength,
        defer: bool,
    ) -> Result<ConstraintHandle, SolverError> {
        let (row, handle) = self.create_row(expression, strength)?;
        self.insert_row(row, handle)?;
        self.finish(defer)?;
        Ok(handle)
    }

    /// Run primal optimization then dual repair.
    pub(crate) fn solve(&mut self) -> Result<(), SolverError> {
        self.optimize(Target::Objective)?;
        self.dual_optimize()?;
        self.deferred = false;
        Ok(())
    }

    /// Optimize now, or mark the work as deferred. A batched insertion that
    /// left an infeasible row is repaired immediately so its failure is
    /// reported by the insertion itself.
    fn finish(&mut self, defer: bool) -> Result<(), SolverError> {
        if defer && self.infeasible.is_empty() {
            self.deferred = true;
            Ok(())
        } else {
            self.solve()
        }
    }

    /// Build the row for a constraint: expression terms, marker variables,
    /// existing basics substituted away, constant made non-negative.
    fn create_row(
        &mut self,
        expression: &Expression,
        strength: Strength,
    ) -> Result<(Row, ConstraintHandle), SolverError> {
        let mut row = Row::from_expression(expression);
        let soft = !strength.is_required();

        let handle = match expression.relation() {
            Relation::LessOrEqual => {
                let slack = self.new_symbol(Kind::Slack)?;
                row.insert(Symbol::new(slack, 1.0));
                let other = if soft {
                    let error = self.new_symbol(Kind::Error)?;
                    row.insert(Symbol::new(error, -1.0));
                    self.set_error(error, strength);
                    Some(error)
                } else {
                    None
                };
                ConstraintHandle { marker: slack, other }
            }
            Relation::Equal if soft => {
                let plus = self.new_symbol(Kind::Error)?;
                let minus = self.new_symbol(Kind::Error)?;
                row.insert(Symbol::new(plus, 1.0));
                row.insert(Symbol::new(minus, -1.0));
                self.set_error(plus, strength);
                self.set_error(minus, strength);
                ConstraintHandle { marker: plus, other: Some(minus) }
            }
            Relation::Equal => {
                let dummy = self.new_symbol(Kind::Dummy)?;
                row.insert(Symbol::new(dummy, 1.0));
                ConstraintHandle { marker: dummy, other: None }
            }
        };

        self.substitute_basics(&mut row);
        row.normalize();
        Ok((row, handle))
    }

    /// Register a fresh error variable in the objective.
    fn set_error(&mut self, error: VariableIndex, strength: Strength) {
        self.save_objective();
        self.objective.insert(Symbol::new(error, strength.value()));
    }

    /// Replace every basic variable in `row` by its defining row.
    fn substitute_basics(&self, row: &mut Row) {
        let basics: Vec<VariableIndex> = row
            .keys()
            .filter(|key| self.rows.contains_key(key))
            .collect();
        for key in basics {
            if let Some(basic) = self.rows.get(&key) {
                row.substitute(Symbol::unit(key), basic);
            }
        }
    }

    fn insert_row(&mut self, mut row: Row, handle: ConstraintHandle) -> Result<(), SolverError> {
        let mut subject = self.find_subject(&row, &handle);

        // Infeasible subjects and the artificial phase both rely on an optimal
        // objective and a feasible tableau, which a deferred batch may lack.
        if self.deferred
            && (!self.infeasible.is_empty() || self.needs_repair(&row, subject))
        {
            self.solve()?;
            self.substitute_basics(&mut row);
            row.normalize();
            subject = self.find_subject(&row, &handle);
        }

        match subject {
            Some(subject) => {
                self.install(row, subject.key());
                Ok(())
            }
            None if row.all_dummies() => {
                if row.constant().abs() > self.epsilon {
                    return Err(SolverError::Unsatisfiable);
                }
                // Redundant: keep the row so the constraint can be removed later.
                tracing::debug!("redundant constraint {:?}", handle);
                self.install(row, handle.marker);
                Ok(())
            }
            None => self.add_with_artificial(row),
        }
    }

    /// Choose the variable a new row is solved for. The returned symbol
    /// carries the negated coefficient.
    ///
    /// Preference: an unrestricted term, then a pivotable marker of this
    /// constraint with negative coefficient (feasible result), then one with
    /// positive coefficient (infeasible result, repaired by dual simplex).
    fn find_subject(&self, row: &Row, handle: &ConstraintHandle) -> Option<Symbol> {
        if let Some(term) = row.terms().find(|t| t.key().is_unrestricted()) {
            return Some(-term);
        }

        let candidates = || {
            handle
                .markers()
                .filter(|key| key.is_pivotable())
                .map(|key| Symbol::new(key, row.coefficient_for(key)))
        };
        candidates()
            .find(|s| s.coefficient() < 0.0)
            .or_else(|| candidates().find(|s| s.coefficient() > 0.0))
            .map(|s| -s)
    }

    fn needs_repair(&self, row: &Row, subject: Option<Symbol>) -> bool {
        match subject {
            None => !row.all_dummies(),
            Some(s) => {
                !s.key().is_unrestricted() && s.coefficient() < 0.0 && row.constant() > self.epsilon
            }
        }
    }

    /// Solve `row` for `subject` and make it the subject's basic row.
    fn install(&mut self, mut row: Row, subject: VariableIndex) {
        let solved = row.solve_for(subject);
        debug_assert!(solved, "subject {subject} missing from row");
        self.substitute(subject, &row);
        if !subject.is_unrestricted() && row.constant() < -self.epsilon {
            self.infeasible.push(subject);
        }
        self.put_row(subject, row);
    }

    /// Eliminate `key` from every row using `row`, tracking rows that become
    /// infeasible.
    fn substitute(&mut self, key: VariableIndex, row: &Row) {
        let target = Symbol::unit(key);
        for (&basic, other) in self.rows.iter_mut() {
            if !other.contains(key) {
                continue;
            }
            save_row(&mut self.journal, basic, Some(&*other));
            other.substitute(target, row);
            if !basic.is_unrestricted() && other.constant() < -self.epsilon {
                self.infeasible.push(basic);
            }
        }
        if self.objective.contains(key) {
            self.save_objective();
            self.objective.substitute(target, row);
        }
        if let Some(artificial) = self.artificial.as_mut() {
            artificial.substitute(target, row);
        }
    }

    /// Primal simplex on the chosen objective.
    fn optimize(&mut self, target: Target) -> Result<(), SolverError> {
        let mut iterations = 0;
        loop {
            let objective = match target {
                Target::Objective => &self.objective,
                Target::Artificial => match &self.artificial {
                    Some(row) => row,
                    None => return Ok(()),
                },
            };
            let Some(entering) = self.find_entering(objective) else {
                return Ok(());
            };
            let Some(leaving) = self.find_leaving_row(entering) else {
                return Err(SolverError::Unbounded);
            };
            if iterations == self.max_iterations {
                return Err(SolverError::IterationLimit(self.max_iterations));
            }
            self.pivot(entering, leaving);
            iterations += 1;
        }
    }

    /// Most negative pivotable coefficient of the objective.
    fn find_entering(&self, objective: &Row) -> Option<VariableIndex> {
        let mut best: Option<Symbol> = None;
        for term in objective.terms() {
            if !term.key().is_pivotable() || term.coefficient() >= -self.epsilon {
                continue;
            }
            if best.is_none_or(|b| term.coefficient() < b.coefficient()) {
                best = Some(term);
            }
        }
        best.map(|s| s.key())
    }

    /// Ratio test: the restricted row that first hits zero as `entering`
    /// grows. First found wins ties.
    fn find_leaving_row(&self, entering: VariableIndex) -> Option<VariableIndex> {
        let mut ratio = f64::INFINITY;
        let mut found = None;
        for (&key, row) in &self.rows {
            if key.is_unrestricted() {
                continue;
            }
            let coefficient = row.coefficient_for(entering);
            if coefficient < 0.0 {
                let candidate = -row.constant() / coefficient;
                if candidate < ratio {
                    ratio = candidate;
                    found = Some(key);
                }
            }
        }
        found
    }

    /// Swap `entering` into the basis in place of `leaving`.
    fn pivot(&mut self, entering: VariableIndex, leaving: VariableIndex) {
        let Some(mut row) = self.take_row(leaving) else {
            return;
        };
        row.solve_for_pair(leaving, entering);
        self.substitute(entering, &row);
        if !entering.is_unrestricted() && row.constant() < -self.epsilon {
            self.infeasible.push(entering);
        }
        self.put_row(entering, row);
        self.pivots += 1;
        tracing::trace!("pivot: {} enters, {} leaves", entering, leaving);
    }

    /// Dual simplex: repair queued infeasible rows while keeping the
    /// objective optimal.
    pub(crate) fn dual_optimize(&mut self) -> Result<(), SolverError> {
        let mut iterations = 0;
        while let Some(leaving) = self.infeasible.pop() {
            let entering = match self.rows.get(&leaving) {
                Some(row) if row.constant() < -self.epsilon => {
                    self.find_dual_entering(row).ok_or(SolverError::Unsatisfiable)?
                }
                _ => continue,
            };
            if iterations == self.max_iterations {
                return Err(SolverError::IterationLimit(self.max_iterations));
            }
            self.pivot(entering, leaving);
            iterations += 1;
        }
        Ok(())
    }

    /// Among the row's positive pivotable terms, minimize
    /// `objective coefficient / row coefficient`. Equal ratios go to the
    /// smallest `VariableIndex`, which keeps the dual phase from cycling.
    pub(crate) fn find_dual_entering(&self, row: &Row) -> Option<VariableIndex> {
        let mut best: Option<(VariableIndex, f64)> = None;
        for term in row.terms() {
            let key = term.key();
            if term.coefficient() <= 0.0 || !key.is_pivotable() {
                continue;
            }
            let ratio = self.objective.coefficient_for(key) / term.coefficient();
            let better = match best {
                None => true,
                Some((best_key, best_ratio)) => {
                    ratio < best_ratio - self.epsilon
                        || (ratio <= best_ratio + self.epsilon && key < best_key)
                }
            };
            if better {
                best = Some((key, ratio));
            }
        }
        best.map(|(key, _)| key)
    }

    /// Phase 1: install `row` behind a fresh artificial variable and drive it
    /// to zero. Fails if the artificial variable cannot reach zero.
    fn add_with_artificial(&mut self, row: Row) -> Result<(), SolverError> {
        let art = self.new_symbol(Kind::Artificial)?;
        tracing::debug!("artificial phase for {}", art);
        self.put_row(art, row.clone());
        self.artificial = Some(row);

        let optimized = self.optimize(Target::Artificial);
        let residual = self.artificial.take().map_or(0.0, |r| r.constant());
        optimized?;
        if residual.abs() > self.epsilon {
            return Err(SolverError::Unsatisfiable);
        }

        // Rows keyed by dummies hold only dummies and never leave for a
        // pivotable entering variable, so a basic artificial row still has a
        // pivotable term here.
        if let Some(mut row) = self.take_row(art) {
            if !row.is_empty() {
                let entering = row.any_pivotable().ok_or(SolverError::Unsatisfiable)?;
                row.solve_for_pair(art, entering);
                self.substitute(entering, &row);
                self.put_row(entering, row);
            }
        }

        for (&basic, row) in self.rows.iter_mut() {
            if row.contains(art) {
                save_row(&mut self.journal, basic, Some(&*row));
                row.remove(art);
            }
        }
        if self.objective.contains(art) {
            self.save_objective();
            self.objective.remove(art);
        }
        Ok(())
    }

    /// Remove a constraint's rows and objective contributions.
    pub(crate) fn remove_constraint(
        &mut self,
        handle: ConstraintHandle,
        strength: Strength,
        defer: bool,
    ) -> Result<(), SolverError> {
        for key in handle.markers() {
            if key.kind() == Kind::Error {
                self.remove_error_effect(key, strength);
            }
        }

        let marker = handle.marker;
        if self.take_row(marker).is_none() {
            if let Some(leaving) = self.marker_leaving_row(marker) {
                self.pivot(marker, leaving);
                self.take_row(marker);
            }
        }

        self.finish(defer)
    }

    fn remove_error_effect(&mut self, error: VariableIndex, strength: Strength) {
        let weight = -strength.value();
        self.save_objective();
        match self.rows.get(&error) {
            Some(row) => self.objective.insert_row(row, weight),
            None => self.objective.insert(Symbol::new(error, weight)),
        }
    }

    /// Row to pivot a non-basic marker into the basis for removal.
    ///
    /// Prefers restricted rows with a negative coefficient (minimum ratio),
    /// then restricted rows with a positive coefficient, then any
    /// unrestricted row, so the remaining rows stay feasible.
    fn marker_leaving_row(&self, marker: VariableIndex) -> Option<VariableIndex> {
        let mut negative = (f64::INFINITY, None);
        let mut positive = (f64::INFINITY, None);
        let mut unrestricted = None;
        for (&key, row) in &self.rows {
            let coefficient = row.coefficient_for(marker);
            if coefficient == 0.0 {
                continue;
            }
            if key.is_unrestricted() {
                unrestricted = Some(key);
            } else if coefficient < 0.0 {
                let ratio = -row.constant() / coefficient;
                if ratio < negative.0 {
                    negative = (ratio, Some(key));
                }
            } else {
                let ratio = row.constant() / coefficient;
                if ratio < positive.0 {
                    positive = (ratio, Some(key));
                }
            }
        }
        negative.1.or(positive.1).or(unrestricted)
    }

    /// Shift the target of a soft equality by `delta` and repair.
    ///
    /// The constraint row was `expr + plus - minus = 0` with the target folded
    /// into `expr`'s constant, so moving the target is equivalent to shifting
    /// `plus` by `-delta` wherever it appears.
    pub(crate) fn suggest(&mut self, handle: ConstraintHandle, delta: f64) -> Result<(), SolverError> {
        if self.deferred {
            self.solve()?;
        }
        let plus = handle.marker;
        let Some(minus) = handle.other else {
            return Ok(());
        };

        if let Some(row) = self.rows.get_mut(&plus) {
            save_row(&mut self.journal, plus, Some(&*row));
            row.add_constant(delta);
            if row.constant() < -self.epsilon {
                self.infeasible.push(plus);
            }
        } else if let Some(row) = self.rows.get_mut(&minus) {
            save_row(&mut self.journal, minus, Some(&*row));
            row.add_constant(-delta);
            if row.constant() < -self.epsilon {
                self.infeasible.push(minus);
            }
        } else {
            for (&key, row) in self.rows.iter_mut() {
                let coefficient = row.coefficient_for(plus);
                if coefficient == 0.0 {
                    continue;
                }
                save_row(&mut self.journal, key, Some(&*row));
                row.add_constant(-coefficient * delta);
                if !key.is_unrestricted() && row.constant() < -self.epsilon {
                    self.infeasible.push(key);
                }
            }
        }

        self.dual_optimize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{Relational, Variable};

    fn tableau() -> Tableau {
        Tableau::new(1e-8, 1_000)
    }

    fn slack(i: u32) -> VariableIndex {
        VariableIndex::new(i, Kind::Slack, false)
    }

    fn error(i: u32) -> VariableIndex {
        VariableIndex::new(i, Kind::Error, false)
    }

    #[test]
    fn required_equality_uses_dummy_marker() {
        let mut t = tableau();
        let x = Variable::new(0);
        let handle = t.add_constraint(&x.equal_to(10.0), Strength::REQUIRED, false).unwrap();
        assert_eq!(handle.marker().kind(), Kind::Dummy);
        assert_eq!(handle.other(), None);
        assert_eq!(t.row(x.index()).map(Row::constant), Some(10.0));
        assert!(t.objective().is_empty());
    }

    #[test]
    fn soft_inequality_registers_error_in_objective() {
        let mut t = tableau();
        let x = Variable::new(0);
        let handle = t
            .add_constraint(&x.less_or_equal(5.0), Strength::MEDIUM, false)
            .unwrap();
        assert_eq!(handle.marker().kind(), Kind::Slack);
        let other = handle.other().unwrap();
        assert_eq!(other.kind(), Kind::Error);
        assert_eq!(t.objective().coefficient_for(other), Strength::MEDIUM.value());
    }

    #[test]
    fn soft_equality_registers_error_pair() {
        let mut t = tableau();
        let x = Variable::new(0);
        let handle = t.add_constraint(&x.equal_to(5.0), Strength::WEAK, false).unwrap();
        let minus = handle.other().unwrap();
        assert_eq!(handle.marker().kind(), Kind::Error);
        assert_eq!(minus.kind(), Kind::Error);
        assert_eq!(t.objective().coefficient_for(handle.marker()), 1.0);
        assert_eq!(t.objective().coefficient_for(minus), 1.0);
    }

    #[test]
    fn subject_prefers_unrestricted_term() {
        let mut t = tableau();
        let x = Variable::new(0);
        let (row, handle) = t.create_row(&x.less_or_equal(3.0), Strength::REQUIRED).unwrap();
        let subject = t.find_subject(&row, &handle).unwrap();
        assert_eq!(subject.key(), x.index());
        assert_eq!(subject.coefficient(), -row.coefficient_for(x.index()));
    }

    #[test]
    fn subject_falls_back_to_negative_marker() {
        let t = tableau();
        // 4 - s0 = 0 => s0 = 4
        let mut row = Row::new(4.0);
        row.insert(Symbol::new(slack(0), -1.0));
        let handle = ConstraintHandle { marker: slack(0), other: None };
        let subject = t.find_subject(&row, &handle).unwrap();
        assert_eq!(subject.key(), slack(0));
        assert_eq!(subject.coefficient(), 1.0);
    }

    #[test]
    fn subject_ignores_foreign_pivotables() {
        let t = tableau();
        let mut row = Row::new(2.0);
        row.insert(Symbol::new(slack(7), -1.0));
        row.insert(Symbol::new(VariableIndex::new(0, Kind::Dummy, false), 1.0));
        let handle = ConstraintHandle {
            marker: VariableIndex::new(0, Kind::Dummy, false),
            other: None,
        };
        assert!(t.find_subject(&row, &handle).is_none());
        assert!(t.needs_repair(&row, None));
    }

    #[test]
    fn dual_entering_breaks_ties_by_smallest_index() {
        let mut t = tableau();
        // Insert the higher index first so first-found would pick it.
        t.objective.insert(Symbol::new(slack(9), 2.0));
        t.objective.insert(Symbol::new(slack(3), 1.0));

        let mut row = Row::new(-5.0);
        row.insert(Symbol::new(slack(9), 2.0));
        row.insert(Symbol::new(slack(3), 1.0));
        assert_eq!(t.find_dual_entering(&row), Some(slack(3)));

        // Same tie with the order reversed.
        let mut row = Row::new(-5.0);
        row.insert(Symbol::new(slack(3), 1.0));
        row.insert(Symbol::new(slack(9), 2.0));
        assert_eq!(t.find_dual_entering(&row), Some(slack(3)));
    }

    #[test]
    fn dual_entering_prefers_smaller_ratio() {
        let mut t = tableau();
        t.objective.insert(Symbol::new(error(1), 10.0));
        t.objective.insert(Symbol::new(slack(2), 1.0));

        let mut row = Row::new(-1.0);
        row.insert(Symbol::new(error(1), 1.0));
        row.insert(Symbol::new(slack(2), 1.0));
        assert_eq!(t.find_dual_entering(&row), Some(slack(2)));
    }

    #[test]
    fn dual_entering_skips_dummies_and_negative_terms() {
        let t = tableau();
        let mut row = Row::new(-1.0);
        row.insert(Symbol::new(VariableIndex::new(0, Kind::Dummy, false), 1.0));
        row.insert(Symbol::new(slack(1), -1.0));
        assert_eq!(t.find_dual_entering(&row), None);
    }

    #[test]
    fn leaving_row_minimizes_ratio_over_restricted_rows() {
        let mut t = tableau();
        let entering = error(0);
        let mut a = Row::new(10.0);
        a.insert(Symbol::new(entering, -1.0));
        let mut b = Row::new(4.0);
        b.insert(Symbol::new(entering, -2.0));
        let mut free = Row::new(0.0);
        free.insert(Symbol::new(entering, -1.0));
        t.rows.insert(slack(1), a);
        t.rows.insert(slack(2), b);
        t.rows.insert(Variable::new(0).index(), free);
        assert_eq!(t.find_leaving_row(entering), Some(slack(2)));
    }

    #[test]
    fn entering_is_most_negative_pivotable() {
        let t = tableau();
        let mut objective = Row::new(0.0);
        objective.insert(Symbol::new(error(0), -1.0));
        objective.insert(Symbol::new(error(1), -3.0));
        objective.insert(Symbol::new(VariableIndex::new(2, Kind::Dummy, false), -9.0));
        assert_eq!(t.find_entering(&objective), Some(error(1)));
    }

    #[test]
    fn basics_never_appear_in_other_rows() {
        let mut t = tableau();
        let x = Variable::new(0);
        let y = Variable::new(1);
        let z = Variable::new(2);
        t.add_constraint(&(x + y).equal_to(10.0), Strength::REQUIRED, false).unwrap();
        t.add_constraint(&x.greater_or_equal(6.0), Strength::REQUIRED, false).unwrap();
        t.add_constraint(&(z - x).equal_to(y), Strength::STRONG, false).unwrap();
        t.add_constraint(&z.less_or_equal(50.0), Strength::WEAK, false).unwrap();

        let basics: Vec<VariableIndex> = t.rows().map(|(key, _)| key).collect();
        for (_, row) in t.rows() {
            for key in &basics {
                assert!(!row.contains(*key), "basic {key} found in a row");
            }
        }
        for key in &basics {
            assert!(!t.objective().contains(*key));
        }
    }

    fn render(t: &Tableau) -> String {
        let mut out = format!("objective: {}\n", t.objective());
        for (key, row) in t.rows() {
            out.push_str(&format!("{key} = {row}\n"));
        }
        out
    }

    fn bounded(t: &mut Tableau, x: Variable) {
        t.add_constraint(&x.greater_or_equal(0.0), Strength::REQUIRED, false).unwrap();
        t.add_constraint(&x.less_or_equal(10.0), Strength::REQUIRED, false).unwrap();
    }

    #[test]
    fn artificial_phase_installs_row_without_subject() {
        let mut t = tableau();
        let x = Variable::new(0);
        bounded(&mut t, x);
        t.add_constraint(&x.equal_to(5.0), Strength::REQUIRED, false).unwrap();

        let row = t.row(x.index()).unwrap();
        assert!((row.constant() - 5.0).abs() < 1e-9, "{}", render(&t));
        for (key, row) in t.rows() {
            assert_ne!(key.kind(), Kind::Artificial);
            assert!(row.keys().all(|k| k.kind() != Kind::Artificial), "{}", render(&t));
        }
        assert!(t.artificial.is_none());
    }

    #[test]
    fn artificial_phase_rejects_unreachable_row() {
        let mut t = tableau();
        let x = Variable::new(0);
        bounded(&mut t, x);
        assert_eq!(
            t.add_constraint(&x.equal_to(12.0), Strength::REQUIRED, false),
            Err(SolverError::Unsatisfiable)
        );
    }

    #[test]
    fn rollback_restores_rows_after_failed_artificial_phase() {
        let mut t = tableau();
        let x = Variable::new(0);
        bounded(&mut t, x);
        let before = render(&t);
        let next_id = t.next_id;
        let pivots = t.pivots();

        t.begin();
        assert!(t.add_constraint(&x.equal_to(12.0), Strength::REQUIRED, false).is_err());
        t.rollback();

        assert_eq!(render(&t), before);
        assert_eq!(t.next_id, next_id);
        assert_eq!(t.pivots(), pivots);
        assert!(t.infeasible().is_empty());
        assert!(t.artificial.is_none());
    }

    #[test]
    fn rollback_undoes_successful_soft_insertion() {
        let mut t = tableau();
        let x = Variable::new(0);
        let y = Variable::new(1);
        t.add_constraint(&x.equal_to(5.0), Strength::WEAK, false).unwrap();
        t.add_constraint(&(y - x).equal_to(2.0), Strength::REQUIRED, false).unwrap();
        let before = render(&t);

        t.begin();
        t.add_constraint(&y.less_or_equal(3.0), Strength::MEDIUM, false).unwrap();
        assert_ne!(render(&t), before);
        t.rollback();
        assert_eq!(render(&t), before);

        // Committed work stays.
        t.begin();
        t.add_constraint(&y.less_or_equal(3.0), Strength::MEDIUM, false).unwrap();
        t.commit();
        t.rollback();
        assert_ne!(render(&t), before);
    }

    #[test]
    fn dual_optimize_allows_exactly_max_iterations() {
        let x = Variable::new(0);

        let mut t = Tableau::new(1e-8, 1);
        t.add_constraint(&x.equal_to(5.0), Strength::WEAK, false).unwrap();
        t.add_constraint(&x.less_or_equal(3.0), Strength::REQUIRED, false).unwrap();
        assert_eq!(t.pivots(), 1);
        assert!((t.row(x.index()).unwrap().constant() - 3.0).abs() < 1e-9);

        let mut t = Tableau::new(1e-8, 0);
        t.add_constraint(&x.equal_to(5.0), Strength::WEAK, false).unwrap();
        assert_eq!(
            t.add_constraint(&x.less_or_equal(3.0), Strength::REQUIRED, false),
            Err(SolverError::IterationLimit(0))
        );
        assert_eq!(t.pivots(), 0);
    }

    #[test]
    fn clear_resets_id_counter() {
        let mut t = tableau();
        let x = Variable::new(0);
        t.add_constraint(&x.equal_to(1.0), Strength::REQUIRED, false).unwrap();
        t.clear();
        assert_eq!(t.len(), 0);
        let handle = t.add_constraint(&x.equal_to(1.0), Strength::REQUIRED, false).unwrap();
        assert_eq!(handle.marker().index(), 0);
    }
}
