//! Expression builder.
//!
//! Layout code writes constraints with ordinary arithmetic:
//!
//! ```
//! use nexus_layout::{Relational, Variable};
//!
//! let width = Variable::new(0);
//! let parent = Variable::new(1);
//! let c = width.equal_to(parent * 0.5);
//! assert_eq!(c.terms().len(), 2);
//! ```
//!
//! Relation builders reduce both sides into one canonical `Expression` of the
//! form `terms + constant <= 0` or `terms + constant == 0`.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use indexmap::IndexMap;

use crate::symbol::{Kind, Symbol, VariableIndex};

/// Floor for the strict-inequality margin.
const STRICT_EPSILON_FLOOR: f64 = 1e-7;
/// Strict-inequality margin per unit of coefficient magnitude.
const STRICT_EPSILON_SCALE: f64 = 1e-8;
/// Terms whose merged coefficient falls below this are dropped.
const ZERO_TERM: f64 = 1e-12;

/// A solver variable as seen by layout code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(VariableIndex);

impl Variable {
    /// An external (user-visible) variable.
    pub fn new(index: u32) -> Self {
        Self(VariableIndex::new(index, Kind::Variable, false))
    }

    /// An element-scoped auxiliary variable.
    pub fn local(index: u32) -> Self {
        Self(VariableIndex::new(index, Kind::Local, false))
    }

    /// A cross-tree auxiliary variable.
    pub fn global(index: u32) -> Self {
        Self(VariableIndex::new(index, Kind::Global, false))
    }

    /// The same variable, marked as copied from a parent scope.
    pub fn derived(self) -> Self {
        let id = self.0;
        Self(VariableIndex::new(id.index(), id.kind(), true))
    }

    pub fn from_index(index: VariableIndex) -> Self {
        debug_assert!(
            index.is_unrestricted() || index.kind() == Kind::Constant,
            "{index} is not a layout variable"
        );
        Self(index)
    }

    #[inline]
    pub fn index(self) -> VariableIndex {
        self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A variable multiplied by a coefficient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Term {
    pub variable: Variable,
    pub coefficient: f64,
}

impl Term {
    pub fn new(variable: Variable, coefficient: f64) -> Self {
        Self { variable, coefficient }
    }
}

/// A linear combination of variables plus a constant. Not yet canonical.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub terms: Vec<Term>,
    pub constant: f64,
}

impl LinearExpr {
    pub fn new(terms: Vec<Term>, constant: f64) -> Self {
        Self { terms, constant }
    }

    pub fn constant(constant: f64) -> Self {
        Self { terms: Vec::new(), constant }
    }

    fn scale(mut self, factor: f64) -> Self {
        for term in &mut self.terms {
            term.coefficient *= factor;
        }
        self.constant *= factor;
        self
    }
}

impl From<f64> for LinearExpr {
    fn from(constant: f64) -> Self {
        Self::constant(constant)
    }
}

impl From<Variable> for LinearExpr {
    fn from(variable: Variable) -> Self {
        Self::new(vec![Term::new(variable, 1.0)], 0.0)
    }
}

impl From<Term> for LinearExpr {
    fn from(term: Term) -> Self {
        Self::new(vec![term], 0.0)
    }
}

// Arithmetic. Every operand converts into `LinearExpr`, so one generic impl
// per (left type, operator) covers all right-hand operand types.

impl<T: Into<LinearExpr>> Add<T> for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: T) -> LinearExpr {
        let rhs = rhs.into();
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
        self
    }
}

impl<T: Into<LinearExpr>> Sub<T> for LinearExpr {
    type Output = LinearExpr;

    fn sub(self, rhs: T) -> LinearExpr {
        self + rhs.into().scale(-1.0)
    }
}

impl Mul<f64> for LinearExpr {
    type Output = LinearExpr;

    fn mul(self, rhs: f64) -> LinearExpr {
        self.scale(rhs)
    }
}

impl Div<f64> for LinearExpr {
    type Output = LinearExpr;

    fn div(self, rhs: f64) -> LinearExpr {
        self.scale(1.0 / rhs)
    }
}

impl Neg for LinearExpr {
    type Output = LinearExpr;

    fn neg(self) -> LinearExpr {
        self.scale(-1.0)
    }
}

macro_rules! forward_ops {
    ($ty:ty) => {
        impl<T: Into<LinearExpr>> Add<T> for $ty {
            type Output = LinearExpr;

            fn add(self, rhs: T) -> LinearExpr {
                LinearExpr::from(self) + rhs
            }
        }

        impl<T: Into<LinearExpr>> Sub<T> for $ty {
            type Output = LinearExpr;

            fn sub(self, rhs: T) -> LinearExpr {
                LinearExpr::from(self) - rhs
            }
        }

        impl Mul<f64> for $ty {
            type Output = LinearExpr;

            fn mul(self, rhs: f64) -> LinearExpr {
                LinearExpr::from(self) * rhs
            }
        }

        impl Div<f64> for $ty {
            type Output = LinearExpr;

            fn div(self, rhs: f64) -> LinearExpr {
                LinearExpr::from(self) / rhs
            }
        }

        impl Neg for $ty {
            type Output = LinearExpr;

            fn neg(self) -> LinearExpr {
                -LinearExpr::from(self)
            }
        }

        impl Mul<$ty> for f64 {
            type Output = LinearExpr;

            fn mul(self, rhs: $ty) -> LinearExpr {
                LinearExpr::from(rhs) * self
            }
        }

        impl Add<$ty> for f64 {
            type Output = LinearExpr;

            fn add(self, rhs: $ty) -> LinearExpr {
                LinearExpr::from(rhs) + self
            }
        }

        impl Sub<$ty> for f64 {
            type Output = LinearExpr;

            fn sub(self, rhs: $ty) -> LinearExpr {
                -LinearExpr::from(rhs) + self
            }
        }
    };
}

forward_ops!(Variable);
forward_ops!(Term);

impl Mul<LinearExpr> for f64 {
    type Output = LinearExpr;

    fn mul(self, rhs: LinearExpr) -> LinearExpr {
        rhs * self
    }
}

impl Add<LinearExpr> for f64 {
    type Output = LinearExpr;

    fn add(self, rhs: LinearExpr) -> LinearExpr {
        rhs + self
    }
}

impl Sub<LinearExpr> for f64 {
    type Output = LinearExpr;

    fn sub(self, rhs: LinearExpr) -> LinearExpr {
        -rhs + self
    }
}

/// Relational operator as written by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
}

impl Operator {
    fn is_strict(self) -> bool {
        matches!(self, Operator::Less | Operator::Greater)
    }
}

/// Comparison against zero in a canonical expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `terms + constant <= 0`
    LessOrEqual,
    /// `terms + constant == 0`
    Equal,
}

/// Canonical linear constraint: `terms + constant (<= | ==) 0`.
///
/// Terms are ordered external variables first, then locals, then globals.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    terms: Vec<Symbol>,
    constant: f64,
    relation: Relation,
}

impl Expression {
    /// Reduce `lhs <op> rhs` into canonical form.
    pub fn reduce(lhs: LinearExpr, op: Operator, rhs: LinearExpr) -> Self {
        let mut buckets: [IndexMap<VariableIndex, f64>; 3] = Default::default();
        let mut constant = lhs.constant - rhs.constant;

        let signed = lhs
            .terms
            .iter()
            .map(|t| (t, 1.0))
            .chain(rhs.terms.iter().map(|t| (t, -1.0)));
        for (term, sign) in signed {
            let id = term.variable.index();
            let coefficient = term.coefficient * sign;
            let bucket = match id.kind() {
                Kind::Constant => {
                    constant += coefficient;
                    continue;
                }
                Kind::Local => 1,
                Kind::Global => 2,
                _ => 0,
            };
            *buckets[bucket].entry(id).or_insert(0.0) += coefficient;
        }

        let mut terms: Vec<Symbol> = buckets
            .into_iter()
            .flatten()
            .filter(|(_, c)| c.abs() > ZERO_TERM)
            .map(|(id, c)| Symbol::new(id, c))
            .collect();

        if op.is_strict() {
            let magnitude: f64 = terms.iter().map(|s| s.coefficient().abs()).sum();
            let epsilon = STRICT_EPSILON_FLOOR.max(STRICT_EPSILON_SCALE * magnitude.max(1.0));
            // Shrink the region so the bound itself is excluded:
            // `lhs - rhs + eps <= 0` for `<`, `lhs - rhs - eps >= 0` for `>`.
            match op {
                Operator::Less => constant += epsilon,
                _ => constant -= epsilon,
            }
        }

        let relation = match op {
            Operator::Equal => Relation::Equal,
            Operator::Less | Operator::LessOrEqual => Relation::LessOrEqual,
            Operator::Greater | Operator::GreaterOrEqual => {
                for term in &mut terms {
                    *term = -*term;
                }
                constant = -constant;
                Relation::LessOrEqual
            }
        };

        Self { terms, constant, relation }
    }

    pub fn terms(&self) -> &[Symbol] {
        &self.terms
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    /// Layout variables referenced by this expression.
    pub fn variables(&self) -> impl Iterator<Item = VariableIndex> + '_ {
        self.terms.iter().map(Symbol::key)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for term in &self.terms {
            write!(f, "{} + ", term)?;
        }
        let op = match self.relation {
            Relation::LessOrEqual => "<=",
            Relation::Equal => "==",
        };
        write!(f, "{} {} 0", self.constant, op)
    }
}

/// Relation builders available on anything that converts into a `LinearExpr`.
pub trait Relational: Into<LinearExpr> + Sized {
    fn equal_to(self, rhs: impl Into<LinearExpr>) -> Expression {
        Expression::reduce(self.into(), Operator::Equal, rhs.into())
    }

    fn less_than(self, rhs: impl Into<LinearExpr>) -> Expression {
        Expression::reduce(self.into(), Operator::Less, rhs.into())
    }

    fn greater_than(self, rhs: impl Into<LinearExpr>) -> Expression {
        Expression::reduce(self.into(), Operator::Greater, rhs.into())
    }

    fn less_or_equal(self, rhs: impl Into<LinearExpr>) -> Expression {
        Expression::reduce(self.into(), Operator::LessOrEqual, rhs.into())
    }

    fn greater_or_equal(self, rhs: impl Into<LinearExpr>) -> Expression {
        Expression::reduce(self.into(), Operator::GreaterOrEqual, rhs.into())
    }
}

impl<T: Into<LinearExpr>> Relational for T {}
