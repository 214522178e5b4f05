//! Mass-change output of the mixing engine and the collaborator interface
//! that consumes it
//!
//! Budget files and tendency diagnostics belong to the host model. The core
//! only produces [`MassDeltaField`] and hands it to a [`MixingDiagnostics`]
//! implementation. [`LevelBudget`] is a small in-memory accumulator for
//! drivers and tests.

use crate::boundary_layer::context::try_filled;
use crate::error::PblError;
use crate::grid::{GridDims, SpeciesId};
use rustc_hash::FxHashMap;

/// Air-mass weighted tracer change per (column, advected species, level)
///
/// Units are those of `air_mass × ratio` (kg of tracer for kg/kg ratios).
/// Levels above the PBL top are zero.
#[derive(Debug, Clone)]
pub struct MassDeltaField {
    dims: GridDims,
    species: Vec<SpeciesId>,
    data: Vec<f64>,
}

impl MassDeltaField {
    pub(crate) fn try_zeroed(dims: GridDims, species: Vec<SpeciesId>) -> Result<Self, PblError> {
        let len = dims.field_len("mass_delta", species.len())?;
        Ok(Self {
            dims,
            species,
            data: try_filled("mass_delta", len, 0.0)?,
        })
    }

    /// Grid dimensions
    #[inline]
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Advected species, in the order passed to `mix()`
    #[inline]
    pub fn species(&self) -> &[SpeciesId] {
        &self.species
    }

    /// Number of values per column
    #[inline]
    pub(crate) fn column_len(&self) -> usize {
        self.species.len() * self.dims.nz()
    }

    /// Mass change profile of advected species `k` in `column`
    pub fn profile(&self, column: usize, k: usize) -> &[f64] {
        let nz = self.dims.nz();
        let start = column * self.column_len() + k * nz;
        &self.data[start..start + nz]
    }

    /// Net mass change of advected species `k` over `column` (zero up to rounding)
    pub fn column_total(&self, column: usize, k: usize) -> f64 {
        self.profile(column, k).iter().sum()
    }

    /// Mass change of advected species `k` per level, summed over all columns
    pub fn level_totals(&self, k: usize) -> Vec<f64> {
        let mut totals = vec![0.0; self.dims.nz()];
        for column in 0..self.dims.columns() {
            for (total, delta) in totals.iter_mut().zip(self.profile(column, k)) {
                *total += delta;
            }
        }
        totals
    }

    /// Whole field, `[column][species][level]`
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }
}

/// Consumer of per-step mixing mass changes
pub trait MixingDiagnostics {
    /// Record the mass changes produced by one `mix()` call
    fn record_mixing(&mut self, deltas: &MassDeltaField);
}

/// Discards all diagnostics
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiagnostics;

impl MixingDiagnostics for NoDiagnostics {
    fn record_mixing(&mut self, _deltas: &MassDeltaField) {}
}

/// Running per-level mass change for each species, summed over columns and steps
#[derive(Debug, Clone, Default)]
pub struct LevelBudget {
    totals: FxHashMap<SpeciesId, Vec<f64>>,
    steps: usize,
}

impl LevelBudget {
    /// Empty budget
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulated mass change per level of `species`
    pub fn species_totals(&self, species: SpeciesId) -> Option<&[f64]> {
        self.totals.get(&species).map(Vec::as_slice)
    }

    /// Number of recorded `mix()` calls
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Largest absolute net mass change of any species over all levels
    pub fn max_net_change(&self) -> f64 {
        self.totals
            .values()
            .map(|levels| levels.iter().sum::<f64>().abs())
            .fold(0.0, f64::max)
    }
}

impl MixingDiagnostics for LevelBudget {
    fn record_mixing(&mut self, deltas: &MassDeltaField) {
        let nz = deltas.dims().nz();
        for (k, species) in deltas.species().iter().enumerate() {
            let entry = self
                .totals
                .entry(*species)
                .or_insert_with(|| vec![0.0; nz]);
            if entry.len() < nz {
                entry.resize(nz, 0.0);
            }
            for (total, delta) in entry.iter_mut().zip(deltas.level_totals(k)) {
                *total += delta;
            }
        }
        self.steps += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deltas() -> MassDeltaField {
        let dims = GridDims::new(2, 1, 3, 3).unwrap();
        let mut field =
            MassDeltaField::try_zeroed(dims, vec![SpeciesId(4), SpeciesId(9)]).unwrap();
        // column 0, species 4 / species 9; column 1, species 4 / species 9
        field
            .as_mut_slice()
            .copy_from_slice(&[1.0, -1.0, 0.0, 2.0, -2.0, 0.0, 0.5, -0.5, 0.0, 0.0, 0.0, 0.0]);
        field
    }

    #[test]
    fn test_profiles_and_totals() {
        let field = deltas();
        assert_eq!(field.profile(1, 0), &[0.5, -0.5, 0.0]);
        assert_eq!(field.column_total(0, 1), 0.0);
        assert_eq!(field.level_totals(0), vec![1.5, -1.5, 0.0]);
    }

    #[test]
    fn test_level_budget_accumulates() {
        let field = deltas();
        let mut budget = LevelBudget::new();
        budget.record_mixing(&field);
        budget.record_mixing(&field);

        assert_eq!(budget.steps(), 2);
        assert_eq!(
            budget.species_totals(SpeciesId(9)),
            Some([4.0, -4.0, 0.0].as_slice())
        );
        assert!(budget.species_totals(SpeciesId(1)).is_none());
        assert_eq!(budget.max_net_change(), 0.0);
    }
}
