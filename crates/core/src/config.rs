//! Configuration for boundary-layer diagnosis and mixing

use crate::error::PblError;
use serde::{Deserialize, Serialize};

/// Physical constants used by the boundary-layer diagnosis
pub mod constants {
    /// Atmospheric scale height (m) used in the barometric law
    pub const SCALE_HEIGHT_M: f64 = 7600.0;

    /// Tolerance on the per-column sum of PBL fractions
    pub const FRACTION_SUM_TOLERANCE: f64 = 1e-3;
}

/// Configuration for the PBL height and mixing engines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PblConfig {
    /// Scale height (m) in `p_top = p_surface * exp(-h / H)`
    pub scale_height_m: f64,

    /// Allowed deviation of the per-column fraction sum from 1
    pub fraction_tolerance: f64,

    /// Optional floor (m) applied to boundary-layer heights before diagnosis.
    ///
    /// `None` leaves heights untouched, so a zero-height column is reported
    /// as an invariant violation instead of being mixed.
    pub min_pbl_height_m: Option<f64>,

    /// Process columns with Rayon. The sequential path gives identical results.
    pub parallel: bool,
}

impl Default for PblConfig {
    fn default() -> Self {
        Self {
            scale_height_m: constants::SCALE_HEIGHT_M,
            fraction_tolerance: constants::FRACTION_SUM_TOLERANCE,
            min_pbl_height_m: None,
            parallel: true,
        }
    }
}

impl PblConfig {
    /// Check that every field holds a usable value
    ///
    /// # Errors
    ///
    /// Returns `PblError::InvalidConfig` naming the first bad field.
    pub fn validate(&self) -> Result<(), PblError> {
        if !(self.scale_height_m.is_finite() && self.scale_height_m > 0.0) {
            return Err(PblError::InvalidConfig {
                field: "scale_height_m",
                reason: format!("must be finite and positive, got {}", self.scale_height_m),
            });
        }
        if !(self.fraction_tolerance.is_finite() && self.fraction_tolerance > 0.0) {
            return Err(PblError::InvalidConfig {
                field: "fraction_tolerance",
                reason: format!(
                    "must be finite and positive, got {}",
                    self.fraction_tolerance
                ),
            });
        }
        if let Some(floor) = self.min_pbl_height_m {
            if !(floor.is_finite() && floor >= 0.0) {
                return Err(PblError::InvalidConfig {
                    field: "min_pbl_height_m",
                    reason: format!("must be finite and non-negative, got {floor}"),
                });
            }
        }
        Ok(())
    }
}
