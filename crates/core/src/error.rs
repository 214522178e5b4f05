//! Error types for boundary-layer diagnosis and mixing
//!
//! Two fault classes exist. Setup faults (bad dimensions, bad configuration,
//! failed allocation, mismatched input shapes) are raised before any column is
//! touched. Invariant violations (no valid PBL top, fraction sum away from 1,
//! a column with no air mass below the PBL top) are raised after every column
//! has been attempted and carry the offending column's `(i, j)` coordinates.
//! Neither class is recoverable: both indicate corrupted physical input.

use crate::grid::SpeciesId;

/// Errors raised by the PBL height and mixing engines
#[derive(Debug, Clone, PartialEq)]
pub enum PblError {
    /// Grid dimensions are unusable (zero extent or active depth out of range)
    InvalidDimensions(String),
    /// A configuration field holds an unusable value
    InvalidConfig {
        /// Name of the offending field
        field: &'static str,
        /// Description of the problem
        reason: String,
    },
    /// Allocation of per-column state failed
    Allocation {
        /// Tag of the resource being allocated
        resource: &'static str,
        /// Number of elements requested
        len: usize,
    },
    /// An input slice does not match the grid dimensions
    ShapeMismatch {
        /// Name of the offending input
        field: &'static str,
        /// Length implied by the grid dimensions
        expected: usize,
        /// Length actually supplied
        actual: usize,
    },
    /// Column geometry is malformed (non-finite or non-decreasing pressure edges)
    InvalidGeometry {
        /// Column x index
        i: usize,
        /// Column y index
        j: usize,
        /// Description of the problem
        reason: String,
    },
    /// The context was used before `initialize()`
    NotInitialized,
    /// Mixing was requested before a successful PBL height computation
    NoPblState,
    /// The PBL top lies above the model top edge, so no level straddles it
    NoTopLevel {
        /// Column x index
        i: usize,
        /// Column y index
        j: usize,
        /// Diagnosed PBL top pressure (hPa)
        top_pressure: f64,
        /// Pressure at the model top edge (hPa)
        model_top: f64,
    },
    /// Sum of PBL fractions over the active levels deviates from 1
    FractionSum {
        /// Column x index
        i: usize,
        /// Column y index
        j: usize,
        /// The computed sum
        sum: f64,
    },
    /// Fraction of the straddling level lies outside [0, 1]
    FractionOutOfRange {
        /// Column x index
        i: usize,
        /// Column y index
        j: usize,
        /// The computed fraction
        top_fraction: f64,
    },
    /// No air mass below the PBL top, so the column mean ratio is undefined
    DegenerateColumn {
        /// Column x index
        i: usize,
        /// Column y index
        j: usize,
        /// Air mass summed below the PBL top
        air_mass_below_top: f64,
    },
    /// An advected species id is not present in the species field
    UnknownSpecies(SpeciesId),
    /// The unit conversion collaborator failed
    UnitConversion(String),
}

impl PblError {
    /// Whether this error reports a violated physical invariant rather than a setup fault
    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            PblError::NoTopLevel { .. }
                | PblError::FractionSum { .. }
                | PblError::FractionOutOfRange { .. }
                | PblError::DegenerateColumn { .. }
        )
    }

    /// Column coordinates attached to the error, if any
    #[must_use]
    pub fn column(&self) -> Option<(usize, usize)> {
        match *self {
            PblError::InvalidGeometry { i, j, .. }
            | PblError::NoTopLevel { i, j, .. }
            | PblError::FractionSum { i, j, .. }
            | PblError::FractionOutOfRange { i, j, .. }
            | PblError::DegenerateColumn { i, j, .. } => Some((i, j)),
            _ => None,
        }
    }
}

impl std::fmt::Display for PblError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PblError::InvalidDimensions(msg) => write!(f, "Invalid grid dimensions: {msg}"),
            PblError::InvalidConfig { field, reason } => {
                write!(f, "Invalid configuration '{field}': {reason}")
            }
            PblError::Allocation { resource, len } => {
                write!(f, "Failed to allocate '{resource}' ({len} elements)")
            }
            PblError::ShapeMismatch {
                field,
                expected,
                actual,
            } => write!(
                f,
                "Input '{field}' has {actual} elements, expected {expected}"
            ),
            PblError::InvalidGeometry { i, j, reason } => {
                write!(f, "Invalid geometry at column ({i}, {j}): {reason}")
            }
            PblError::NotInitialized => write!(f, "PBL context used before initialize()"),
            PblError::NoPblState => {
                write!(f, "Mixing requested before PBL height was computed")
            }
            PblError::NoTopLevel {
                i,
                j,
                top_pressure,
                model_top,
            } => write!(
                f,
                "No PBL top level at column ({i}, {j}): top pressure {top_pressure} hPa is above model top {model_top} hPa"
            ),
            PblError::FractionSum { i, j, sum } => write!(
                f,
                "PBL fractions at column ({i}, {j}) sum to {sum}, expected 1"
            ),
            PblError::FractionOutOfRange { i, j, top_fraction } => write!(
                f,
                "PBL top fraction at column ({i}, {j}) is {top_fraction}, expected [0, 1]"
            ),
            PblError::DegenerateColumn {
                i,
                j,
                air_mass_below_top,
            } => write!(
                f,
                "Column ({i}, {j}) has air mass {air_mass_below_top} below the PBL top, cannot mix"
            ),
            PblError::UnknownSpecies(id) => write!(f, "Unknown advected species {id}"),
            PblError::UnitConversion(msg) => write!(f, "Unit conversion failed: {msg}"),
        }
    }
}

impl std::error::Error for PblError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_classification() {
        let fault = PblError::FractionSum {
            i: 3,
            j: 4,
            sum: 0.9,
        };
        assert!(fault.is_invariant_violation());
        assert_eq!(fault.column(), Some((3, 4)));

        let setup = PblError::Allocation {
            resource: "frac_of_pbl",
            len: 10,
        };
        assert!(!setup.is_invariant_violation());
        assert_eq!(setup.column(), None);
    }

    #[test]
    fn test_messages_name_the_column() {
        let err = PblError::NoTopLevel {
            i: 1,
            j: 2,
            top_pressure: 0.5,
            model_top: 1.0,
        };
        assert!(err.to_string().contains("(1, 2)"));

        let err = PblError::Allocation {
            resource: "pbl_state",
            len: 64,
        };
        assert!(err.to_string().contains("pbl_state"));
    }
}
