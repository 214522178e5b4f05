//! Boundary-layer top diagnosis on irregular pressure levels
//!
//! # Physics
//!
//! The PBL top pressure follows from the barometric law applied to the
//! boundary-layer height `h` supplied by meteorology:
//!
//! ```text
//! p_top = p_surface × exp(-h / H)
//! ```
//!
//! Levels are scanned upward from the surface. A level whose upper edge
//! pressure is still at or above `p_top` lies fully inside the PBL; the first
//! level whose upper edge is below `p_top` straddles it and becomes the top
//! level. A PBL top falling exactly on an edge therefore leaves the level
//! under that edge fully inside, and the next level straddles with fraction 0.
//!
//! ```text
//! f_top = 1 - (p_top - p[L]) / (p[L-1] - p[L])
//! ```
//!
//! Columns are independent and processed with Rayon; the level scan within a
//! column is sequential.

use super::context::PblContext;
use super::state::PblState;
use crate::config::PblConfig;
use crate::core_types::units::{Hectopascals, Meters};
use crate::error::PblError;
use crate::grid::GridGeometry;
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::{debug, error, warn};

/// Invariant violation found while diagnosing one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ColumnFault {
    NoTopLevel { top_pressure: f64, model_top: f64 },
    FractionOutOfRange { top_fraction: f64 },
    FractionSum { sum: f64 },
}

impl ColumnFault {
    fn at(self, i: usize, j: usize) -> PblError {
        match self {
            ColumnFault::NoTopLevel {
                top_pressure,
                model_top,
            } => PblError::NoTopLevel {
                i,
                j,
                top_pressure,
                model_top,
            },
            ColumnFault::FractionOutOfRange { top_fraction } => {
                PblError::FractionOutOfRange { i, j, top_fraction }
            }
            ColumnFault::FractionSum { sum } => PblError::FractionSum { i, j, sum },
        }
    }
}

/// Diagnose the PBL top of a single column
///
/// # Arguments
///
/// * `edges` - `nz + 1` pressure edges (hPa), surface first
/// * `heights` - `nz` box heights (m)
/// * `pbl_height_m` - Boundary-layer height above the surface (m)
/// * `config` - Scale height and fraction tolerance
/// * `frac_of_pbl` - Output, one value per active level
/// * `frac_under_top` - Output, one value per active level
/// * `in_pbl` - Output, one flag per level
pub(crate) fn diagnose_column(
    edges: &[f64],
    heights: &[f64],
    pbl_height_m: f64,
    config: &PblConfig,
    frac_of_pbl: &mut [f64],
    frac_under_top: &mut [f64],
    in_pbl: &mut [bool],
) -> Result<PblState, ColumnFault> {
    let nz = heights.len();
    let surface = edges[0];
    let top_pressure = surface * (-pbl_height_m / config.scale_height_m).exp();
    let thickness = surface - top_pressure;

    in_pbl.fill(false);
    let mut top_level = 0;
    for level in 1..=nz {
        if top_pressure <= edges[level] {
            in_pbl[level - 1] = true;
        } else {
            top_level = level;
            break;
        }
    }
    if top_level == 0 {
        return Err(ColumnFault::NoTopLevel {
            top_pressure,
            model_top: edges[nz],
        });
    }

    let bottom = edges[top_level - 1];
    let top = edges[top_level];
    let top_fraction = 1.0 - (top_pressure - top) / (bottom - top);
    if !(0.0..=1.0).contains(&top_fraction) {
        return Err(ColumnFault::FractionOutOfRange { top_fraction });
    }

    let straddle = top_level - 1;
    let top_height_m = heights[..straddle].iter().sum::<f64>() + top_fraction * heights[straddle];
    let top_level_units = straddle as f64 + top_fraction;

    for (index, (of_pbl, under_top)) in frac_of_pbl
        .iter_mut()
        .zip(frac_under_top.iter_mut())
        .enumerate()
    {
        let level = index + 1;
        match level.cmp(&top_level) {
            Ordering::Less => {
                *of_pbl = (edges[level - 1] - edges[level]) / thickness;
                *under_top = 1.0;
            }
            Ordering::Equal => {
                *of_pbl = (edges[level - 1] - top_pressure) / thickness;
                *under_top = top_fraction;
            }
            Ordering::Greater => {
                *of_pbl = 0.0;
                *under_top = 0.0;
            }
        }
    }

    // NaN (zero-thickness PBL) fails this check as well
    let sum: f64 = frac_of_pbl.iter().sum();
    let within_tolerance = (sum - 1.0).abs() <= config.fraction_tolerance;
    if !within_tolerance {
        return Err(ColumnFault::FractionSum { sum });
    }

    Ok(PblState {
        top_level,
        top_fraction,
        top_pressure: Hectopascals::new(top_pressure),
        thickness: Hectopascals::new(thickness),
        top_height: Meters::new(top_height_m),
        top_level_units,
    })
}

impl PblContext {
    /// Diagnose the PBL top of every column
    ///
    /// Every column is attempted. If any column violates an invariant the
    /// error for the lowest-indexed failing column is returned and the
    /// context holds no valid state until the next successful call.
    ///
    /// # Arguments
    ///
    /// * `geometry` - Pressure edges and box heights
    /// * `pbl_height_m` - Boundary-layer height per column (m), row-major
    ///
    /// # Errors
    ///
    /// - `PblError::NotInitialized` before `initialize()`
    /// - `PblError::InvalidDimensions` / `PblError::ShapeMismatch` for mismatched inputs
    /// - `PblError::NoTopLevel`, `PblError::FractionOutOfRange`, `PblError::FractionSum`
    ///   for invariant violations
    pub fn compute_pbl_height(
        &mut self,
        geometry: &GridGeometry,
        pbl_height_m: &[f64],
    ) -> Result<(), PblError> {
        let dims = self.dims;
        if geometry.dims() != dims {
            return Err(PblError::InvalidDimensions(format!(
                "geometry grid {:?} does not match context grid {:?}",
                geometry.dims(),
                dims
            )));
        }
        if pbl_height_m.len() != dims.columns() {
            return Err(PblError::ShapeMismatch {
                field: "pbl_height_m",
                expected: dims.columns(),
                actual: pbl_height_m.len(),
            });
        }

        let storage = self.storage.as_mut().ok_or(PblError::NotInitialized)?;
        self.has_state = false;

        let config = &self.config;
        let floor = config.min_pbl_height_m;
        if let Some(min) = floor {
            let clamped = pbl_height_m.iter().filter(|h| **h < min).count();
            if clamped > 0 {
                warn!(
                    "Raised boundary-layer height to {} m floor in {} of {} columns",
                    min,
                    clamped,
                    dims.columns()
                );
            }
        }

        let diagnose = |column: usize,
                        state: &mut PblState,
                        frac_of_pbl: &mut [f64],
                        frac_under_top: &mut [f64],
                        in_pbl: &mut [bool]|
         -> Option<(usize, ColumnFault)> {
            let mut height = pbl_height_m[column];
            if let Some(min) = floor {
                if height < min {
                    height = min;
                }
            }
            match diagnose_column(
                geometry.column_edges(column),
                geometry.column_heights(column),
                height,
                config,
                frac_of_pbl,
                frac_under_top,
                in_pbl,
            ) {
                Ok(diagnosed) => {
                    *state = diagnosed;
                    None
                }
                Err(fault) => {
                    let (i, j) = dims.column_coords(column);
                    error!(
                        "PBL invariant violated at column ({}, {}): {}",
                        i,
                        j,
                        fault.at(i, j)
                    );
                    Some((column, fault))
                }
            }
        };

        let active = dims.active_levels();
        let nz = dims.nz();
        let first_fault = if config.parallel {
            storage
                .columns
                .par_iter_mut()
                .zip(storage.frac_of_pbl.par_chunks_mut(active))
                .zip(storage.frac_under_top.par_chunks_mut(active))
                .zip(storage.in_pbl.par_chunks_mut(nz))
                .enumerate()
                .filter_map(|(column, (((state, of_pbl), under_top), flags))| {
                    diagnose(column, state, of_pbl, under_top, flags)
                })
                .min_by_key(|(column, _)| *column)
        } else {
            storage
                .columns
                .iter_mut()
                .zip(storage.frac_of_pbl.chunks_mut(active))
                .zip(storage.frac_under_top.chunks_mut(active))
                .zip(storage.in_pbl.chunks_mut(nz))
                .enumerate()
                .filter_map(|(column, (((state, of_pbl), under_top), flags))| {
                    diagnose(column, state, of_pbl, under_top, flags)
                })
                .min_by_key(|(column, _)| *column)
        };

        if let Some((column, fault)) = first_fault {
            let (i, j) = dims.column_coords(column);
            return Err(fault.at(i, j));
        }

        storage.max_top_level = storage
            .columns
            .iter()
            .map(|s| s.top_level)
            .max()
            .unwrap_or(0);
        self.has_state = true;

        debug!(
            "Diagnosed PBL top for {} columns, max top level {}",
            dims.columns(),
            storage.max_top_level
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EDGES: [f64; 4] = [1000.0, 800.0, 500.0, 200.0];
    const HEIGHTS: [f64; 3] = [1800.0, 3500.0, 6000.0];

    fn height_for_top(top_pressure: f64) -> f64 {
        -PblConfig::default().scale_height_m * (top_pressure / EDGES[0]).ln()
    }

    fn diagnose(pbl_height_m: f64) -> Result<(PblState, Vec<f64>, Vec<f64>, Vec<bool>), ColumnFault> {
        let mut of_pbl = vec![0.0; 3];
        let mut under_top = vec![0.0; 3];
        let mut flags = vec![false; 3];
        let state = diagnose_column(
            &EDGES,
            &HEIGHTS,
            pbl_height_m,
            &PblConfig::default(),
            &mut of_pbl,
            &mut under_top,
            &mut flags,
        )?;
        Ok((state, of_pbl, under_top, flags))
    }

    #[test]
    fn test_top_inside_second_level() {
        let (state, of_pbl, under_top, flags) = diagnose(height_for_top(700.0)).unwrap();

        assert_eq!(state.top_level, 2);
        assert_relative_eq!(state.top_fraction, 1.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(state.top_pressure.value(), 700.0, epsilon = 1e-9);
        assert_relative_eq!(state.thickness.value(), 300.0, epsilon = 1e-9);
        assert_relative_eq!(state.top_level_units, 1.0 + 1.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(state.top_height.value(), 1800.0 + 3500.0 / 3.0, epsilon = 1e-6);

        assert_relative_eq!(of_pbl[0], 200.0 / 300.0, epsilon = 1e-9);
        assert_relative_eq!(of_pbl[1], 100.0 / 300.0, epsilon = 1e-9);
        assert_eq!(of_pbl[2], 0.0);
        assert_eq!(under_top[0], 1.0);
        assert_relative_eq!(under_top[1], 1.0 / 3.0, epsilon = 1e-9);
        assert_eq!(under_top[2], 0.0);
        assert_eq!(flags, vec![true, false, false]);
    }

    #[test]
    fn test_top_on_edge_keeps_level_inside() {
        // Place the first edge exactly on p_top: level 1 is fully inside,
        // level 2 straddles with nothing in it
        let config = PblConfig::default();
        let pbl_height_m = 1500.0;
        let top_pressure = 1000.0 * (-pbl_height_m / config.scale_height_m).exp();
        let edges = [1000.0, top_pressure, 500.0, 200.0];

        let mut of_pbl = vec![0.0; 3];
        let mut under_top = vec![0.0; 3];
        let mut flags = vec![false; 3];
        let state = diagnose_column(
            &edges,
            &HEIGHTS,
            pbl_height_m,
            &config,
            &mut of_pbl,
            &mut under_top,
            &mut flags,
        )
        .unwrap();
        assert_eq!(state.top_pressure.value(), top_pressure);
        assert_eq!(state.top_level, 2);
        assert_eq!(state.top_fraction, 0.0);
        assert_eq!(flags, vec![true, false, false]);
        assert_eq!(of_pbl[0], 1.0);
    }

    #[test]
    fn test_top_in_lowest_level() {
        let (state, of_pbl, _, flags) = diagnose(height_for_top(900.0)).unwrap();
        assert_eq!(state.top_level, 1);
        assert_relative_eq!(state.top_fraction, 0.5, epsilon = 1e-9);
        assert_relative_eq!(of_pbl[0], 1.0, epsilon = 1e-12);
        assert_eq!(flags, vec![false, false, false]);
    }

    #[test]
    fn test_top_above_model_top_is_reported() {
        let fault = diagnose(height_for_top(100.0)).unwrap_err();
        match fault {
            ColumnFault::NoTopLevel {
                top_pressure,
                model_top,
            } => {
                assert_relative_eq!(top_pressure, 100.0, epsilon = 1e-9);
                assert_eq!(model_top, 200.0);
            }
            other => panic!("expected NoTopLevel, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_height_fails_fraction_sum() {
        let fault = diagnose(0.0).unwrap_err();
        match fault {
            ColumnFault::FractionSum { sum } => assert!(sum.is_nan()),
            other => panic!("expected FractionSum, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_height_fails_fraction_range() {
        assert!(matches!(
            diagnose(-100.0),
            Err(ColumnFault::FractionOutOfRange { .. })
        ));
    }

    #[test]
    fn test_top_beyond_active_levels_fails_sum() {
        let mut of_pbl = vec![0.0; 1];
        let mut under_top = vec![0.0; 1];
        let mut flags = vec![false; 3];
        let fault = diagnose_column(
            &EDGES,
            &HEIGHTS,
            height_for_top(400.0),
            &PblConfig::default(),
            &mut of_pbl,
            &mut under_top,
            &mut flags,
        )
        .unwrap_err();
        assert!(matches!(fault, ColumnFault::FractionSum { .. }));
    }
}
