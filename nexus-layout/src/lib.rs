//! Nexus Layout - incremental linear constraint solving for element layout.
//!
//! This crate contains:
//! - Variable identities packed into 32 bits (`VariableIndex`)
//! - An arithmetic expression builder (`Relational`, `LinearExpr`)
//! - Constraint strengths
//! - A Cassowary-style simplex solver with edit variables, batching and
//!   rollback on failure
//!
//! Layout code describes positions and sizes as linear equalities and
//! inequalities, adds them to a `Solver` at some `Strength`, and reads the
//! solved values back with `Solver::get`.

pub mod expression;
pub mod row;
pub mod solver;
pub mod strength;
pub mod symbol;

mod config;
mod error;

pub use config::SolverConfig;
pub use error::SolverError;
pub use expression::{Expression, LinearExpr, Operator, Relation, Relational, Term, Variable};
pub use row::Row;
pub use solver::{ConstraintHandle, NOT_FOUND, Solver, SolverStats, Status, UNSOLVABLE};
pub use strength::Strength;
pub use symbol::{Kind, Symbol, VariableIndex};
