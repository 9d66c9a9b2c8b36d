//! Symbol model: compact variable identity plus coefficient-carrying terms.
//!
//! A `VariableIndex` packs kind, index and the derived flag into a single
//! `u32`, so rows and the tableau can key on it cheaply:
//!
//! ```text
//! bit 31..28  kind
//! bit 27      derived
//! bit 26..0   index
//! ```

use std::fmt;
use std::ops::Neg;

use crate::error::SolverError;

/// Number of bits available for the per-kind index.
pub const INDEX_BITS: u32 = 27;

/// Largest representable index.
pub const MAX_INDEX: u32 = (1 << INDEX_BITS) - 1;

const DERIVED_BIT: u32 = 1 << INDEX_BITS;
const KIND_SHIFT: u32 = INDEX_BITS + 1;

/// What a variable represents inside the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Kind {
    /// Folded into row constants; never stored as a term.
    Constant = 0,
    /// Element-scoped auxiliary variable.
    Local = 1,
    /// Cross-tree auxiliary variable.
    Global = 2,
    /// The objective row's own identity.
    Objective = 3,
    /// User-visible layout variable.
    Variable = 4,
    Slack = 5,
    Error = 6,
    Dummy = 7,
    Artificial = 8,
}

const KINDS: [Kind; 9] = [
    Kind::Constant,
    Kind::Local,
    Kind::Global,
    Kind::Objective,
    Kind::Variable,
    Kind::Slack,
    Kind::Error,
    Kind::Dummy,
    Kind::Artificial,
];

impl Kind {
    fn prefix(self) -> &'static str {
        match self {
            Kind::Constant => "c",
            Kind::Local => "l",
            Kind::Global => "g",
            Kind::Objective => "z",
            Kind::Variable => "v",
            Kind::Slack => "s",
            Kind::Error => "e",
            Kind::Dummy => "d",
            Kind::Artificial => "a",
        }
    }
}

/// Packed variable identity. Equality, hashing and ordering use the packed
/// value only, so the lowest index within a kind sorts first.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableIndex(u32);

impl VariableIndex {
    /// Pack an identity. The index must fit in 27 bits.
    #[inline]
    pub fn new(index: u32, kind: Kind, derived: bool) -> Self {
        debug_assert!(index <= MAX_INDEX, "variable index {index} overflows 27 bits");
        let derived = if derived { DERIVED_BIT } else { 0 };
        Self((index & MAX_INDEX) | derived | ((kind as u32) << KIND_SHIFT))
    }

    /// Fallible constructor for callers that allocate indices at runtime.
    pub fn try_new(index: u32, kind: Kind, derived: bool) -> Result<Self, SolverError> {
        if index > MAX_INDEX {
            return Err(SolverError::IndexSpaceExhausted(index));
        }
        Ok(Self::new(index, kind, derived))
    }

    /// The objective row's identity.
    pub const OBJECTIVE: Self = Self((Kind::Objective as u32) << KIND_SHIFT);

    #[inline]
    pub fn kind(self) -> Kind {
        KINDS[(self.0 >> KIND_SHIFT) as usize]
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.0 & MAX_INDEX
    }

    /// Whether this variable was copied from a parent scope.
    #[inline]
    pub fn is_derived(self) -> bool {
        self.0 & DERIVED_BIT != 0
    }

    /// Raw packed value.
    #[inline]
    pub fn packed(self) -> u32 {
        self.0
    }

    /// Slack, Error, Dummy or Artificial.
    #[inline]
    pub fn is_internal(self) -> bool {
        matches!(
            self.kind(),
            Kind::Slack | Kind::Error | Kind::Dummy | Kind::Artificial
        )
    }

    /// Only Slack and Error variables may enter the basis during optimization.
    #[inline]
    pub fn is_pivotable(self) -> bool {
        matches!(self.kind(), Kind::Slack | Kind::Error)
    }

    #[inline]
    pub fn is_external(self) -> bool {
        self.kind() == Kind::Variable
    }

    /// Variables that may take any sign. Rows keyed by them are excluded from
    /// the ratio test and never become infeasible.
    #[inline]
    pub fn is_unrestricted(self) -> bool {
        matches!(self.kind(), Kind::Variable | Kind::Local | Kind::Global)
    }

    #[inline]
    pub fn is_dummy(self) -> bool {
        self.kind() == Kind::Dummy
    }
}

impl fmt::Debug for VariableIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for VariableIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind().prefix(), self.index())?;
        if self.is_derived() {
            f.write_str("'")?;
        }
        Ok(())
    }
}

/// A variable identity together with the coefficient it carries in a row.
///
/// Symbols are plain values; rows store coefficients keyed by
/// `VariableIndex`, never by `Symbol`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Symbol {
    key: VariableIndex,
    coefficient: f64,
}

impl Symbol {
    #[inline]
    pub fn new(key: VariableIndex, coefficient: f64) -> Self {
        Self { key, coefficient }
    }

    /// A symbol with coefficient 1.
    #[inline]
    pub fn unit(key: VariableIndex) -> Self {
        Self::new(key, 1.0)
    }

    #[inline]
    pub fn key(&self) -> VariableIndex {
        self.key
    }

    #[inline]
    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }

    #[inline]
    pub fn with_coefficient(self, coefficient: f64) -> Self {
        Self { coefficient, ..self }
    }

    #[inline]
    pub fn scaled(self, factor: f64) -> Self {
        self.with_coefficient(self.coefficient * factor)
    }

    /// Same key as `other`, ignoring coefficients.
    #[inline]
    pub fn same_key(&self, other: &Symbol) -> bool {
        self.key == other.key
    }
}

impl Neg for Symbol {
    type Output = Symbol;

    fn neg(self) -> Symbol {
        self.scaled(-1.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}*{}", self.coefficient, self.key)
    }
}
