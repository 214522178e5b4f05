//! Per-column PBL diagnosis results

use crate::core_types::units::{Hectopascals, Meters};
use serde::{Deserialize, Serialize};

/// Boundary-layer top diagnosed for one column
///
/// `top_level` is a 1-based level number: level `L` spans pressure edges
/// `L - 1` (bottom) and `L` (top). Levels below `top_level` lie fully inside
/// the boundary layer; `top_level` itself straddles the PBL top with
/// `top_fraction` of its pressure thickness inside.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PblState {
    /// Level containing the PBL top (1..=nz)
    pub top_level: usize,
    /// Fraction of `top_level` lying within the PBL (0..=1)
    pub top_fraction: f64,
    /// Pressure at the PBL top
    pub top_pressure: Hectopascals,
    /// Pressure thickness of the PBL (surface minus top)
    pub thickness: Hectopascals,
    /// Height of the PBL top above the surface
    pub top_height: Meters,
    /// PBL top in level units: `(top_level - 1) + top_fraction`
    pub top_level_units: f64,
}

impl PblState {
    /// Whether `level` (1-based) lies entirely below the PBL top
    #[inline]
    pub fn is_below_top(&self, level: usize) -> bool {
        level >= 1 && level < self.top_level
    }

    /// Fraction of `level` (1-based) lying under the PBL top
    #[inline]
    pub fn fraction_under_top(&self, level: usize) -> f64 {
        if self.is_below_top(level) {
            1.0
        } else if level == self.top_level {
            self.top_fraction
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_under_top_profile() {
        let state = PblState {
            top_level: 3,
            top_fraction: 0.25,
            ..Default::default()
        };
        assert_eq!(state.fraction_under_top(1), 1.0);
        assert_eq!(state.fraction_under_top(2), 1.0);
        assert_eq!(state.fraction_under_top(3), 0.25);
        assert_eq!(state.fraction_under_top(4), 0.0);
        assert!(!state.is_below_top(0));
        assert!(!state.is_below_top(3));
    }
}
