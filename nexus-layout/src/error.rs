//! Solver error types.

use thiserror::Error;

use crate::symbol::VariableIndex;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("constraint is unsatisfiable")]
    Unsatisfiable,

    #[error("objective is unbounded")]
    Unbounded,

    #[error("optimization exceeded {0} pivots")]
    IterationLimit(usize),

    #[error("unknown edit variable: {0}")]
    UnknownEditVariable(VariableIndex),

    #[error("duplicate edit variable: {0}")]
    DuplicateEditVariable(VariableIndex),

    #[error("edit variables cannot use required strength")]
    RequiredEditStrength,

    #[error("a batch is already in progress")]
    BatchInProgress,

    #[error("no batch in progress")]
    NoBatch,

    #[error("variable index space exhausted (index {0})")]
    IndexSpaceExhausted(u32),
}
