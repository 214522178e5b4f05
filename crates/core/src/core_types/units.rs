//! Semantic unit types for type-safe physical quantity handling
//!
//! Newtype wrappers keep pressures and lengths from being mixed up in the
//! boundary-layer diagnostics, where both appear side by side as `f64`.
//!
//! # Design Philosophy
//! - All quantities use f64: fraction sums are checked against a 1e-3 tolerance
//!   and mixing must conserve tracer mass to floating precision
//! - Total ordering via Ord trait (NaN handled as greater than all values)
//! - Private inner fields with validated constructors
//! - Serde support for serialization
//!
//! # Usage
//! ```
//! use pbl_mix_core::core_types::units::{Hectopascals, Meters};
//!
//! let surface = Hectopascals::new(1013.25);
//! let top = Hectopascals::new(850.0);
//! assert!((*(surface - top) - 163.25).abs() < 1e-9);
//!
//! let depth = Meters::new(1200.0);
//! assert_eq!(depth.to_kilometers(), 1.2);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Deref, Mul, Sub};

/// Compare f64 values with total ordering using Rust's built-in `total_cmp`
#[inline]
fn f64_total_cmp(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

// ============================================================================
// PRESSURE
// ============================================================================

/// Pressure in hectopascals (hPa, numerically equal to millibars)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Hectopascals(f64);

impl Eq for Hectopascals {}

impl PartialOrd for Hectopascals {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Hectopascals {
    fn cmp(&self, other: &Self) -> Ordering {
        f64_total_cmp(self.0, other.0)
    }
}

impl Deref for Hectopascals {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl Hectopascals {
    /// Hectopascals to pascals
    const PASCALS_PER_HPA: f64 = 100.0;

    /// Create a new pressure. Asserts value is finite and non-negative.
    #[inline]
    #[must_use]
    #[track_caller]
    pub fn new(value: f64) -> Self {
        assert!(
            value.is_finite() && value >= 0.0,
            "Hectopascals::new: pressure must be finite and non-negative"
        );
        Hectopascals(value)
    }

    /// Get the raw f64 value
    #[inline]
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Convert to pascals
    #[inline]
    #[must_use]
    pub fn to_pascals(self) -> f64 {
        self.0 * Self::PASCALS_PER_HPA
    }
}

impl Sub for Hectopascals {
    type Output = Hectopascals;
    fn sub(self, rhs: Self) -> Self::Output {
        Hectopascals(self.0 - rhs.0)
    }
}

impl Add for Hectopascals {
    type Output = Hectopascals;
    fn add(self, rhs: Self) -> Self::Output {
        Hectopascals(self.0 + rhs.0)
    }
}

impl Mul<f64> for Hectopascals {
    type Output = Hectopascals;
    fn mul(self, rhs: f64) -> Self::Output {
        Hectopascals(self.0 * rhs)
    }
}

impl From<Hectopascals> for f64 {
    fn from(value: Hectopascals) -> Self {
        value.0
    }
}

impl fmt::Display for Hectopascals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} hPa", self.0)
    }
}

// ============================================================================
// LENGTH
// ============================================================================

/// Distance or depth in meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Meters(f64);

impl Eq for Meters {}

impl PartialOrd for Meters {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Meters {
    fn cmp(&self, other: &Self) -> Ordering {
        f64_total_cmp(self.0, other.0)
    }
}

impl Deref for Meters {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl Meters {
    /// Create a new distance in meters. Asserts value is finite and non-negative.
    #[inline]
    #[must_use]
    #[track_caller]
    pub fn new(value: f64) -> Self {
        assert!(
            value.is_finite() && value >= 0.0,
            "Meters::new: distance must be finite and non-negative"
        );
        Meters(value)
    }

    /// Get the raw f64 value
    #[inline]
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Convert to kilometers
    #[inline]
    #[must_use]
    pub fn to_kilometers(self) -> f64 {
        self.0 / 1000.0
    }
}

impl Add for Meters {
    type Output = Meters;
    fn add(self, rhs: Self) -> Self::Output {
        Meters(self.0 + rhs.0)
    }
}

impl From<Meters> for f64 {
    fn from(value: Meters) -> Self {
        value.0
    }
}

impl fmt::Display for Meters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} m", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pressure_ordering_and_arithmetic() {
        let surface = Hectopascals::new(1000.0);
        let top = Hectopascals::new(700.0);
        assert!(surface > top);
        assert_eq!(*(surface - top), 300.0);
        assert_eq!(top.to_pascals(), 70000.0);
        assert_eq!(format!("{top}"), "700.00 hPa");
    }

    #[test]
    #[should_panic(expected = "pressure must be finite and non-negative")]
    fn test_negative_pressure_rejected() {
        let _ = Hectopascals::new(-1.0);
    }

    #[test]
    #[should_panic(expected = "distance must be finite and non-negative")]
    fn test_nan_distance_rejected() {
        let _ = Meters::new(f64::NAN);
    }

    #[test]
    fn test_meters_conversion() {
        let depth = Meters::new(850.0) + Meters::new(150.0);
        assert_eq!(depth.value(), 1000.0);
        assert_eq!(depth.to_kilometers(), 1.0);
    }
}
