//! Sparse tableau row.
//!
//! A row keyed by basic variable `b` in the tableau represents
//!
//! ```text
//! b = constant + Σ coefficient_i * symbol_i
//! ```
//!
//! Coefficients are stored pre-divided by a lazy `scale`, so multiplying the
//! whole row (sign flips, solving for a symbol) only touches two fields. Every
//! read goes through the scale.

use std::fmt;

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::expression::Expression;
use crate::symbol::{Symbol, VariableIndex};

/// Coefficients within this distance of zero are treated as absent.
pub const EPSILON: f64 = 1e-8;

// Fold the lazy scale back into the cells once it drifts this far from 1.
const SCALE_FOLD_LOW: f64 = 1e-6;
const SCALE_FOLD_HIGH: f64 = 1e6;

#[inline]
pub(crate) fn near_zero(value: f64) -> bool {
    value.abs() < EPSILON
}

/// A linear combination of symbols plus a constant.
#[derive(Debug, Clone)]
pub struct Row {
    /// Stored coefficients; effective value is `stored * scale`.
    cells: IndexMap<VariableIndex, f64>,
    scale: f64,
    constant: f64,
}

impl Row {
    pub fn new(constant: f64) -> Self {
        Self {
            cells: IndexMap::new(),
            scale: 1.0,
            constant,
        }
    }

    /// Row holding an expression's terms and constant.
    pub fn from_expression(expression: &Expression) -> Self {
        let mut row = Self::new(expression.constant());
        for &term in expression.terms() {
            row.insert(term);
        }
        row
    }

    #[inline]
    pub fn constant(&self) -> f64 {
        self.constant
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Add `delta` to the constant.
    pub fn add_constant(&mut self, delta: f64) {
        self.constant += delta;
    }

    /// Add a term, merging with an existing slot for the same key. A merged
    /// coefficient that cancels to zero removes the slot.
    pub fn insert(&mut self, symbol: Symbol) {
        let stored = symbol.coefficient() / self.scale;
        match self.cells.entry(symbol.key()) {
            Entry::Occupied(mut slot) => {
                let merged = *slot.get() + stored;
                if near_zero(merged * self.scale) {
                    slot.shift_remove();
                } else {
                    *slot.get_mut() = merged;
                }
            }
            Entry::Vacant(slot) => {
                if !near_zero(symbol.coefficient()) {
                    slot.insert(stored);
                }
            }
        }
    }

    /// Add `other * factor` to this row, constant included.
    pub fn insert_row(&mut self, other: &Row, factor: f64) {
        self.constant += other.constant * factor;
        for term in other.terms() {
            self.insert(term.scaled(factor));
        }
    }

    /// Remove a key, returning its effective coefficient.
    pub fn remove(&mut self, key: VariableIndex) -> Option<f64> {
        self.cells.shift_remove(&key).map(|c| c * self.scale)
    }

    /// Eliminate `target` using `replacement`, where
    /// `target.coefficient() * target.key() = replacement`.
    ///
    /// Returns false if the key was not present.
    pub fn substitute(&mut self, target: Symbol, replacement: &Row) -> bool {
        match self.remove(target.key()) {
            Some(coefficient) => {
                self.insert_row(replacement, coefficient / target.coefficient());
                true
            }
            None => false,
        }
    }

    /// Make the constant non-negative by flipping the sign of the whole row.
    /// Returns whether the row was flipped.
    pub fn normalize(&mut self) -> bool {
        if self.constant < 0.0 {
            self.reverse_sign();
            true
        } else {
            false
        }
    }

    pub fn reverse_sign(&mut self) {
        self.scale = -self.scale;
        self.constant = -self.constant;
    }

    /// Rewrite `0 = row` as `key = row'`, removing `key` from the cells.
    ///
    /// Returns false (leaving the row unchanged) if the key is absent.
    pub fn solve_for(&mut self, key: VariableIndex) -> bool {
        let Some(coefficient) = self.remove(key) else {
            return false;
        };
        let factor = -1.0 / coefficient;
        self.scale *= factor;
        self.constant *= factor;
        self.fold_scale();
        true
    }

    /// Rewrite `lhs = row` as `rhs = row'`, where `rhs` appears in this row.
    pub fn solve_for_pair(&mut self, lhs: VariableIndex, rhs: VariableIndex) -> bool {
        if !self.contains(rhs) {
            return false;
        }
        self.insert(Symbol::new(lhs, -1.0));
        self.solve_for(rhs)
    }

    /// Fold the lazy scale into the stored cells once it drifts far from 1.
    pub fn fold_scale(&mut self) {
        let magnitude = self.scale.abs();
        if (SCALE_FOLD_LOW..=SCALE_FOLD_HIGH).contains(&magnitude) {
            return;
        }
        let scale = self.scale;
        for value in self.cells.values_mut() {
            *value *= scale;
        }
        self.scale = 1.0;
    }

    #[inline]
    pub fn coefficient_for(&self, key: VariableIndex) -> f64 {
        self.cells.get(&key).map_or(0.0, |c| c * self.scale)
    }

    #[inline]
    pub fn find(&self, key: VariableIndex) -> Option<Symbol> {
        self.cells
            .get(&key)
            .map(|c| Symbol::new(key, c * self.scale))
    }

    #[inline]
    pub fn contains(&self, key: VariableIndex) -> bool {
        self.cells.contains_key(&key)
    }

    /// Terms with effective coefficients, in insertion order.
    pub fn terms(&self) -> impl Iterator<Item = Symbol> + '_ {
        let scale = self.scale;
        self.cells.iter().map(move |(&key, &c)| Symbol::new(key, c * scale))
    }

    pub fn keys(&self) -> impl Iterator<Item = VariableIndex> + '_ {
        self.cells.keys().copied()
    }

    /// Whether every term is a dummy (vacuously true for an empty row).
    pub fn all_dummies(&self) -> bool {
        self.cells.keys().all(|key| key.is_dummy())
    }

    /// First pivotable key, if any.
    pub fn any_pivotable(&self) -> Option<VariableIndex> {
        self.cells.keys().copied().find(|key| key.is_pivotable())
    }

    /// `constant + Σ coefficient * value(key)`.
    pub fn evaluate(&self, value: impl Fn(VariableIndex) -> f64) -> f64 {
        self.terms()
            .fold(self.constant, |acc, s| acc + s.coefficient() * value(s.key()))
    }
}

impl Default for Row {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for term in self.terms() {
            let c = term.coefficient();
            if first {
                write!(f, "{}*{}", c, term.key())?;
                first = false;
            } else if c < 0.0 {
                write!(f, " - {}*{}", -c, term.key())?;
            } else {
                write!(f, " + {}*{}", c, term.key())?;
            }
        }
        match (first, self.constant < 0.0) {
            (true, _) => write!(f, "{}", self.constant),
            (false, true) => write!(f, " - {}", -self.constant),
            (false, false) => write!(f, " + {}", self.constant),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Kind;

    fn var(i: u32) -> VariableIndex {
        VariableIndex::new(i, Kind::Variable, false)
    }

    fn slack(i: u32) -> VariableIndex {
        VariableIndex::new(i, Kind::Slack, false)
    }

    #[test]
    fn insert_merges_by_key() {
        let mut row = Row::new(1.0);
        row.insert(Symbol::new(var(0), 2.0));
        row.insert(Symbol::new(var(0), 3.0));
        assert_eq!(row.len(), 1);
        assert_eq!(row.coefficient_for(var(0)), 5.0);
    }

    #[test]
    fn opposite_insert_deletes_slot() {
        let mut row = Row::new(0.0);
        row.insert(Symbol::new(var(0), 2.0));
        row.insert(Symbol::new(var(0), -2.0));
        assert!(row.is_empty());
        assert!(!row.contains(var(0)));
        assert!(row.find(var(0)).is_none());
    }

    #[test]
    fn zero_insert_is_ignored() {
        let mut row = Row::new(0.0);
        row.insert(Symbol::new(var(0), 0.0));
        assert!(row.is_empty());
    }

    #[test]
    fn normalize_flips_lazily() {
        let mut row = Row::new(-4.0);
        row.insert(Symbol::new(var(0), 2.0));
        row.insert(Symbol::new(slack(0), -1.0));
        assert!(row.normalize());
        assert_eq!(row.constant(), 4.0);
        assert_eq!(row.coefficient_for(var(0)), -2.0);
        assert_eq!(row.coefficient_for(slack(0)), 1.0);

        // Inserting after a flip still lands at the requested effective value.
        row.insert(Symbol::new(var(1), 3.0));
        assert_eq!(row.coefficient_for(var(1)), 3.0);
        assert!(!row.normalize());
    }

    #[test]
    fn terms_yield_effective_coefficients() {
        let mut row = Row::new(0.0);
        row.insert(Symbol::new(var(0), 1.5));
        row.reverse_sign();
        let terms: Vec<Symbol> = row.terms().collect();
        assert_eq!(terms, vec![Symbol::new(var(0), -1.5)]);
    }

    #[test]
    fn solve_for_isolates_symbol() {
        // 0 = 6 + 2x - 3y  =>  x = -3 + 1.5y
        let mut row = Row::new(6.0);
        row.insert(Symbol::new(var(0), 2.0));
        row.insert(Symbol::new(var(1), -3.0));
        assert!(row.solve_for(var(0)));
        assert!(!row.contains(var(0)));
        assert_eq!(row.constant(), -3.0);
        assert_eq!(row.coefficient_for(var(1)), 1.5);
        assert!(!row.solve_for(var(0)));
    }

    #[test]
    fn solve_for_pair_swaps_basic() {
        // s = 4 - x  =>  x = 4 - s
        let mut row = Row::new(4.0);
        row.insert(Symbol::new(var(0), -1.0));
        assert!(row.solve_for_pair(slack(0), var(0)));
        assert_eq!(row.constant(), 4.0);
        assert_eq!(row.coefficient_for(slack(0)), -1.0);
        assert!(!row.contains(var(0)));
    }

    #[test]
    fn substitute_eliminates_and_preserves_equation() {
        // A = 3 + 2x + 4s, with s = 1 - y + 0.5x
        let mut a = Row::new(3.0);
        a.insert(Symbol::new(var(0), 2.0));
        a.insert(Symbol::new(slack(0), 4.0));
        let mut b = Row::new(1.0);
        b.insert(Symbol::new(var(1), -1.0));
        b.insert(Symbol::new(var(0), 0.5));

        let assignment = |x: f64, y: f64| {
            let s = b.evaluate(|k| if k == var(0) { x } else if k == var(1) { y } else { 0.0 });
            move |k: VariableIndex| match k {
                k if k == var(0) => x,
                k if k == var(1) => y,
                k if k == slack(0) => s,
                _ => 0.0,
            }
        };

        let before = [
            a.evaluate(assignment(2.0, 3.0)),
            a.evaluate(assignment(-1.0, 0.5)),
        ];
        assert!(a.substitute(Symbol::unit(slack(0)), &b));
        assert!(a.find(slack(0)).is_none());
        let after = [
            a.evaluate(assignment(2.0, 3.0)),
            a.evaluate(assignment(-1.0, 0.5)),
        ];
        for (x, y) in before.iter().zip(after.iter()) {
            assert!((x - y).abs() < 1e-9);
        }
        assert_eq!(a.coefficient_for(var(0)), 4.0);
        assert_eq!(a.coefficient_for(var(1)), -4.0);
        assert_eq!(a.constant(), 7.0);
    }

    #[test]
    fn substitute_drops_cancelled_terms() {
        // A = x + 2s, s = 1 - 0.5x  =>  A = 2
        let mut a = Row::new(0.0);
        a.insert(Symbol::new(var(0), 1.0));
        a.insert(Symbol::new(slack(0), 2.0));
        let mut b = Row::new(1.0);
        b.insert(Symbol::new(var(0), -0.5));
        assert!(a.substitute(Symbol::unit(slack(0)), &b));
        assert!(a.is_empty());
        assert_eq!(a.constant(), 2.0);
    }

    #[test]
    fn substitute_divides_by_target_coefficient() {
        // A = 3s, and 2s = 4 + x  =>  A = 6 + 1.5x
        let mut a = Row::new(0.0);
        a.insert(Symbol::new(slack(0), 3.0));
        let mut b = Row::new(4.0);
        b.insert(Symbol::new(var(0), 1.0));
        assert!(a.substitute(Symbol::new(slack(0), 2.0), &b));
        assert_eq!(a.constant(), 6.0);
        assert_eq!(a.coefficient_for(var(0)), 1.5);
    }

    #[test]
    fn substitute_missing_key_is_noop() {
        let mut a = Row::new(1.0);
        a.insert(Symbol::new(var(0), 1.0));
        let b = Row::new(5.0);
        assert!(!a.substitute(Symbol::unit(slack(3)), &b));
        assert_eq!(a.constant(), 1.0);
    }

    #[test]
    fn fold_scale_keeps_effective_values() {
        let mut row = Row::new(1.0);
        row.insert(Symbol::new(var(0), 1e-7));
        row.insert(Symbol::new(var(1), 1.0));
        // Solving for a tiny coefficient pushes the scale far from 1.
        assert!(row.solve_for(var(0)));
        assert_eq!(row.scale, 1.0);
        assert!((row.coefficient_for(var(1)) + 1e7).abs() < 1e-3);
        assert!((row.constant() + 1e7).abs() < 1e-3);
    }

    #[test]
    fn display_renders_terms_and_constant() {
        let mut row = Row::new(-3.0);
        row.insert(Symbol::new(var(0), 2.0));
        row.insert(Symbol::new(slack(1), -1.0));
        assert_eq!(row.to_string(), "2*v0 - 1*s1 - 3");
        assert_eq!(Row::new(5.0).to_string(), "5");
    }
}
