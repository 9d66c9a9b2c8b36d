//! Constraint priority weights.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Priority of a constraint.
///
/// Soft constraints feed their error terms into the objective weighted by
/// strength, so a violation of a stronger constraint always costs more than
/// any combination of weaker ones (within the 10^3 spacing of the presets).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Strength(f64);

impl Strength {
    /// Must hold. Never represented in the objective.
    pub const REQUIRED: Strength = Strength(1e8);
    pub const STRONG: Strength = Strength(1e5);
    pub const MEDIUM: Strength = Strength(1e2);
    pub const WEAK: Strength = Strength(1.0);

    /// Arbitrary strength, clamped into `[0, REQUIRED]`.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Strength(0.0);
        }
        Strength(value.clamp(0.0, Self::REQUIRED.0))
    }

    /// Build a strength from strong/medium/weak components, each clamped to
    /// `[0, 1000]` and scaled by `weight`.
    pub fn compose(strong: f64, medium: f64, weak: f64, weight: f64) -> Self {
        let part = |v: f64| (v * weight).clamp(0.0, 1000.0);
        Self::new(part(strong) * 1e5 + part(medium) * 1e2 + part(weak))
    }

    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn is_required(self) -> bool {
        self.0 >= Self::REQUIRED.0
    }
}

impl Default for Strength {
    fn default() -> Self {
        Self::REQUIRED
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            s if s == Self::REQUIRED => f.write_str("required"),
            s if s == Self::STRONG => f.write_str("strong"),
            s if s == Self::MEDIUM => f.write_str("medium"),
            s if s == Self::WEAK => f.write_str("weak"),
            Strength(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_ordered() {
        assert!(Strength::REQUIRED > Strength::STRONG);
        assert!(Strength::STRONG > Strength::MEDIUM);
        assert!(Strength::MEDIUM > Strength::WEAK);
        assert!(Strength::REQUIRED.is_required());
        assert!(!Strength::STRONG.is_required());
    }

    #[test]
    fn new_clamps() {
        assert_eq!(Strength::new(1e12), Strength::REQUIRED);
        assert_eq!(Strength::new(-5.0).value(), 0.0);
        assert_eq!(Strength::new(f64::NAN).value(), 0.0);
    }

    #[test]
    fn compose_matches_presets() {
        assert_eq!(Strength::compose(1.0, 0.0, 0.0, 1.0), Strength::STRONG);
        assert_eq!(Strength::compose(0.0, 1.0, 0.0, 1.0), Strength::MEDIUM);
        assert_eq!(Strength::compose(0.0, 0.0, 1.0, 1.0), Strength::WEAK);
    }

    #[test]
    fn display_names_presets() {
        assert_eq!(Strength::MEDIUM.to_string(), "medium");
        assert_eq!(Strength::new(42.0).to_string(), "42");
    }
}
