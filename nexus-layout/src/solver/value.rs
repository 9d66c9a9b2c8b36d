//! Solved-value sentinels.
//!
//! `Solver::get` returns a plain `f64`; the status travels in the value itself
//! so layout code can read positions without unwrapping.

/// Returned for variables that no live constraint mentions.
pub const NOT_FOUND: f64 = f64::NAN;

/// Returned while the solver holds an unsatisfiable system.
pub const UNSOLVABLE: f64 = f64::INFINITY;

/// Classification of a value returned by `Solver::get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    Unsolvable,
}

impl Status {
    pub fn of(value: f64) -> Self {
        if value.is_nan() {
            Status::NotFound
        } else if value == UNSOLVABLE {
            Status::Unsolvable
        } else {
            Status::Ok
        }
    }

    #[inline]
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}
