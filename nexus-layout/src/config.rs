//! Solver configuration.

use serde::Deserialize;

/// Tunables for a `Solver`.
///
/// Deserializable so hosts can ship it alongside other layout settings:
///
/// ```
/// use nexus_layout::SolverConfig;
///
/// let config: SolverConfig = serde_json::from_str(r#"{ "rollback_on_failure": false }"#).unwrap();
/// assert!(!config.rollback_on_failure);
/// assert_eq!(config.max_iterations, SolverConfig::default().max_iterations);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Tolerance for optimality, feasibility and redundancy checks.
    pub epsilon: f64,

    /// Restore the pre-insertion tableau when a constraint cannot be
    /// satisfied. When disabled, a failed insertion poisons the solver and
    /// every `get` reports `Status::Unsolvable` until `clear()`.
    pub rollback_on_failure: bool,

    /// Pivot limit for a single optimization pass.
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-8,
            rollback_on_failure: true,
            max_iterations: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config: SolverConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SolverConfig::default());
    }

    #[test]
    fn overrides_fields() {
        let config: SolverConfig =
            serde_json::from_str(r#"{ "epsilon": 1e-6, "max_iterations": 50 }"#).unwrap();
        assert_eq!(config.epsilon, 1e-6);
        assert_eq!(config.max_iterations, 50);
        assert!(config.rollback_on_failure);
    }
}
