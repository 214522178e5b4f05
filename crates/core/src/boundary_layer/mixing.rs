//! Mass-conserving homogenization of tracers below the PBL top
//!
//! # Physics
//!
//! Within each column the boundary layer is treated as fully mixed. With `m`
//! the dry-air mass, `r` the mixing ratio, `T` the top level and `f` its
//! fraction inside the PBL:
//!
//! ```text
//! M   = Σ_{L<T} m[L] + f m[T]
//! r̄   = (Σ_{L<T} m[L] r[L] + f m[T] r[T]) / M
//! Δ[L] = m[L] (r̄ - r[L])            L < T
//! Δ[T] = f m[T] (r̄ - r[T])
//! r[L] += Δ[L] / m[L]
//! ```
//!
//! `Σ Δ = r̄ M - r̄ M = 0`, so the air-mass weighted tracer content of the
//! levels up to and including `T` is unchanged to rounding.
//!
//! Before any value is written every column's `M` is checked; a column with
//! no air below the PBL top aborts the call with no species modified.

use super::context::PblContext;
use super::state::PblState;
use crate::diagnostics::MassDeltaField;
use crate::error::PblError;
use crate::grid::{AirMass, GridDims, SpeciesId, SpeciesStore};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::{debug, error};

/// Air mass below the PBL top, counting only the inside share of the top level
#[inline]
pub(crate) fn air_mass_below_top(air: &[f64], state: &PblState) -> f64 {
    let straddle = state.top_level - 1;
    air[..straddle].iter().sum::<f64>() + air[straddle] * state.top_fraction
}

/// Mix the selected species of one column
///
/// # Arguments
///
/// * `ratios` - The column's `[species][level]` block
/// * `air` - The column's air-mass profile
/// * `state` - The column's PBL state
/// * `air_below_top` - Result of [`air_mass_below_top`], known positive
/// * `slots` - Storage slots of the species to mix
/// * `deltas` - Output `[advected][level]` block, zero on entry
pub(crate) fn mix_column(
    ratios: &mut [f64],
    air: &[f64],
    state: &PblState,
    air_below_top: f64,
    slots: &[usize],
    deltas: &mut [f64],
) {
    let nz = air.len();
    let straddle = state.top_level - 1;
    let top_fraction = state.top_fraction;

    for (k, &slot) in slots.iter().enumerate() {
        let profile = &mut ratios[slot * nz..(slot + 1) * nz];
        let delta = &mut deltas[k * nz..(k + 1) * nz];

        let tracer_below_top = air[..straddle]
            .iter()
            .zip(&profile[..straddle])
            .map(|(mass, ratio)| mass * ratio)
            .sum::<f64>()
            + air[straddle] * profile[straddle] * top_fraction;
        let mean_ratio = tracer_below_top / air_below_top;

        for level in 0..straddle {
            let change = air[level] * (mean_ratio - profile[level]);
            profile[level] += change / air[level];
            delta[level] = change;
        }

        let change = top_fraction * air[straddle] * (mean_ratio - profile[straddle]);
        profile[straddle] += change / air[straddle];
        delta[straddle] = change;
    }
}

fn check_grid(field: &'static str, actual: GridDims, expected: GridDims) -> Result<(), PblError> {
    if actual == expected {
        Ok(())
    } else {
        Err(PblError::InvalidDimensions(format!(
            "{field} grid {actual:?} does not match context grid {expected:?}"
        )))
    }
}

/// Validated inputs of one `mix()` call
struct MixPlan {
    slots: Vec<usize>,
    air_below_top: Vec<f64>,
}

impl PblContext {
    /// Check that `mix()` would accept these inputs, without touching them
    ///
    /// Callers that convert units before mixing run this first so a rejected
    /// call leaves the host field in its own units.
    ///
    /// # Errors
    ///
    /// The same errors `mix()` reports before writing, except allocation of
    /// the mass-delta output.
    pub fn check_mix<S: SpeciesStore + ?Sized>(
        &self,
        species: &S,
        air_mass: &AirMass,
        advected: &[SpeciesId],
    ) -> Result<(), PblError> {
        self.plan_mix(species, air_mass, advected).map(|_| ())
    }

    fn plan_mix<S: SpeciesStore + ?Sized>(
        &self,
        species: &S,
        air_mass: &AirMass,
        advected: &[SpeciesId],
    ) -> Result<MixPlan, PblError> {
        let storage = self.ready_storage()?;
        let dims = self.dims;
        check_grid("species", species.dims(), dims)?;
        check_grid("air_mass", air_mass.dims(), dims)?;

        let mut seen = FxHashSet::default();
        let slots = advected
            .iter()
            .map(|id| {
                if !seen.insert(*id) {
                    return Err(PblError::InvalidDimensions(format!("{id} advected twice")));
                }
                species.slot(*id).ok_or(PblError::UnknownSpecies(*id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if slots.is_empty() {
            return Ok(MixPlan {
                slots,
                air_below_top: Vec::new(),
            });
        }

        let air_below_top: Vec<f64> = if self.config.parallel {
            storage
                .columns
                .par_iter()
                .enumerate()
                .map(|(column, state)| air_mass_below_top(air_mass.column(column), state))
                .collect()
        } else {
            storage
                .columns
                .iter()
                .enumerate()
                .map(|(column, state)| air_mass_below_top(air_mass.column(column), state))
                .collect()
        };

        let mut first_degenerate = None;
        for (column, total) in air_below_top.iter().enumerate() {
            if !(total.is_finite() && *total > 0.0) {
                let (i, j) = dims.column_coords(column);
                error!(
                    "Cannot mix column ({}, {}): air mass below PBL top is {}",
                    i, j, total
                );
                if first_degenerate.is_none() {
                    first_degenerate = Some(PblError::DegenerateColumn {
                        i,
                        j,
                        air_mass_below_top: *total,
                    });
                }
            }
        }
        match first_degenerate {
            Some(err) => Err(err),
            None => Ok(MixPlan {
                slots,
                air_below_top,
            }),
        }
    }

    /// Homogenize the advected species below the diagnosed PBL top
    ///
    /// Species values must already be air-mass compatible mixing ratios.
    /// The species store is borrowed exclusively for the duration of the call:
    /// an owned [`SpeciesField`](crate::grid::SpeciesField) or a host array
    /// wrapped in [`SpeciesSliceMut`](crate::grid::SpeciesSliceMut).
    ///
    /// # Arguments
    ///
    /// * `species` - Tracer field, modified in place
    /// * `air_mass` - Dry-air mass per box
    /// * `advected` - Species to mix, in the order used by the returned deltas
    ///
    /// # Returns
    ///
    /// Mass change per column, advected species and level
    ///
    /// # Errors
    ///
    /// - `PblError::NotInitialized` / `PblError::NoPblState` before PBL height is computed
    /// - `PblError::InvalidDimensions` for fields on another grid or repeated species
    /// - `PblError::UnknownSpecies` for an id missing from `species`
    /// - `PblError::DegenerateColumn` when a column has no air mass below its PBL top;
    ///   nothing is modified in that case
    pub fn mix<S: SpeciesStore + ?Sized>(
        &self,
        species: &mut S,
        air_mass: &AirMass,
        advected: &[SpeciesId],
    ) -> Result<MassDeltaField, PblError> {
        let MixPlan {
            slots,
            air_below_top,
        } = self.plan_mix(&*species, air_mass, advected)?;
        let storage = self.ready_storage()?;
        let dims = self.dims;

        let mut deltas = MassDeltaField::try_zeroed(dims, advected.to_vec())?;
        if slots.is_empty() {
            return Ok(deltas);
        }

        let column_len = species.column_len();
        let delta_len = deltas.column_len();
        let mix_one = |column: usize, ratios: &mut [f64], delta: &mut [f64]| {
            mix_column(
                ratios,
                air_mass.column(column),
                &storage.columns[column],
                air_below_top[column],
                &slots,
                delta,
            );
        };

        if self.config.parallel {
            species
                .values_mut()
                .par_chunks_mut(column_len)
                .zip(deltas.as_mut_slice().par_chunks_mut(delta_len))
                .enumerate()
                .for_each(|(column, (ratios, delta))| mix_one(column, ratios, delta));
        } else {
            species
                .values_mut()
                .chunks_mut(column_len)
                .zip(deltas.as_mut_slice().chunks_mut(delta_len))
                .enumerate()
                .for_each(|(column, (ratios, delta))| mix_one(column, ratios, delta));
        }

        debug!(
            "Mixed {} species over {} columns (max top level {})",
            slots.len(),
            dims.columns(),
            storage.max_top_level
        );
        Ok(deltas)
    }
}
