//! Air-mass and tracer fields owned by the host model
//!
//! Both fields store data column-contiguously so that Rayon can hand each
//! worker a disjoint `&mut` chunk per column. The species field is laid out
//! `[column][species][level]`: one column is one chunk, and within it each
//! species profile is a contiguous run of `nz` values.

use super::GridDims;
use crate::error::PblError;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a tracer species, as assigned by the host model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpeciesId(pub u32);

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "species #{}", self.0)
    }
}

/// Dry-air mass per grid box (kg), `nz` values per column
#[derive(Debug, Clone)]
pub struct AirMass {
    dims: GridDims,
    data: Vec<f64>,
}

impl AirMass {
    /// Wrap a column-contiguous air-mass array
    ///
    /// # Errors
    ///
    /// Returns `PblError::ShapeMismatch` if `data.len() != columns * nz` and
    /// `PblError::InvalidGeometry` for a box whose mass is not finite and positive.
    pub fn new(dims: GridDims, data: Vec<f64>) -> Result<Self, PblError> {
        let expected = dims.columns() * dims.nz();
        if data.len() != expected {
            return Err(PblError::ShapeMismatch {
                field: "air_mass",
                expected,
                actual: data.len(),
            });
        }
        if let Some(index) = data.iter().position(|m| !(m.is_finite() && *m > 0.0)) {
            let (i, j) = dims.column_coords(index / dims.nz());
            return Err(PblError::InvalidGeometry {
                i,
                j,
                reason: format!(
                    "air mass at level {} is {}",
                    index % dims.nz() + 1,
                    data[index]
                ),
            });
        }
        Ok(Self { dims, data })
    }

    /// Air mass with the same profile in every column
    ///
    /// # Errors
    ///
    /// Returns `PblError::ShapeMismatch` if `profile.len() != nz`.
    pub fn uniform(dims: GridDims, profile: &[f64]) -> Result<Self, PblError> {
        if profile.len() != dims.nz() {
            return Err(PblError::ShapeMismatch {
                field: "air_mass profile",
                expected: dims.nz(),
                actual: profile.len(),
            });
        }
        Self::new(dims, profile.repeat(dims.columns()))
    }

    /// Grid dimensions
    #[inline]
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Air-mass profile of one column
    #[inline]
    pub fn column(&self, column: usize) -> &[f64] {
        let nz = self.dims.nz();
        &self.data[column * nz..(column + 1) * nz]
    }

    /// Whole field, column-contiguous
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

/// `[column][species][level]` tracer storage the mixing engine can update
///
/// Implemented by the owned [`SpeciesField`] and by [`SpeciesSliceMut`],
/// which borrows a host array in place.
pub trait SpeciesStore {
    /// Grid dimensions
    fn dims(&self) -> GridDims;

    /// Storage slot of a species
    fn slot(&self, id: SpeciesId) -> Option<usize>;

    /// Number of values in one column (species × levels)
    fn column_len(&self) -> usize;

    /// Whole array, mutable
    fn values_mut(&mut self) -> &mut [f64];
}

fn slot_index(species: &[SpeciesId]) -> Result<FxHashMap<SpeciesId, usize>, PblError> {
    let mut index = FxHashMap::default();
    for (slot, id) in species.iter().enumerate() {
        if index.insert(*id, slot).is_some() {
            return Err(PblError::InvalidDimensions(format!("{id} listed twice")));
        }
    }
    Ok(index)
}

fn check_species_len(dims: GridDims, species: usize, actual: usize) -> Result<(), PblError> {
    let expected = dims.field_len("species", species)?;
    if actual == expected {
        Ok(())
    } else {
        Err(PblError::ShapeMismatch {
            field: "species",
            expected,
            actual,
        })
    }
}

/// Tracer values indexed by (column, species, level)
///
/// Values are mixing ratios while the mixing engine runs; the unit
/// conversion collaborator may hold other units between calls.
#[derive(Debug, Clone)]
pub struct SpeciesField {
    dims: GridDims,
    species: Vec<SpeciesId>,
    index: FxHashMap<SpeciesId, usize>,
    data: Vec<f64>,
}

impl SpeciesField {
    /// Create a field with every value set to `value`
    ///
    /// # Errors
    ///
    /// Returns `PblError::InvalidDimensions` if a species id is repeated or
    /// the field length overflows.
    pub fn with_value(dims: GridDims, species: Vec<SpeciesId>, value: f64) -> Result<Self, PblError> {
        let len = dims.field_len("species", species.len())?;
        Self::from_vec(dims, species, vec![value; len])
    }

    /// Wrap an existing `[column][species][level]` array
    ///
    /// # Errors
    ///
    /// Returns `PblError::ShapeMismatch` on a wrong length and
    /// `PblError::InvalidDimensions` if a species id is repeated or the
    /// field length overflows.
    pub fn from_vec(
        dims: GridDims,
        species: Vec<SpeciesId>,
        data: Vec<f64>,
    ) -> Result<Self, PblError> {
        check_species_len(dims, species.len(), data.len())?;
        let index = slot_index(&species)?;
        Ok(Self {
            dims,
            species,
            index,
            data,
        })
    }

    /// Grid dimensions
    #[inline]
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Species carried by the field, in storage order
    #[inline]
    pub fn species(&self) -> &[SpeciesId] {
        &self.species
    }

    /// Storage slot of a species
    #[inline]
    pub fn slot(&self, id: SpeciesId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Number of values in one column (species × levels)
    #[inline]
    pub fn column_len(&self) -> usize {
        self.species.len() * self.dims.nz()
    }

    /// Profile of one species in one column
    ///
    /// # Panics
    ///
    /// Panics if `column` or `slot` is out of range.
    #[inline]
    pub fn profile(&self, column: usize, slot: usize) -> &[f64] {
        let nz = self.dims.nz();
        let start = column * self.column_len() + slot * nz;
        &self.data[start..start + nz]
    }

    /// Mutable profile of one species in one column
    ///
    /// # Panics
    ///
    /// Panics if `column` or `slot` is out of range.
    #[inline]
    pub fn profile_mut(&mut self, column: usize, slot: usize) -> &mut [f64] {
        let nz = self.dims.nz();
        let start = column * self.column_len() + slot * nz;
        &mut self.data[start..start + nz]
    }

    /// Whole field
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Whole field, mutable
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Air-mass weighted tracer mass of one species in one column
    pub fn column_mass(&self, column: usize, slot: usize, air_mass: &AirMass) -> f64 {
        self.profile(column, slot)
            .iter()
            .zip(air_mass.column(column))
            .map(|(ratio, mass)| ratio * mass)
            .sum()
    }
}

impl SpeciesStore for SpeciesField {
    fn dims(&self) -> GridDims {
        self.dims
    }

    fn slot(&self, id: SpeciesId) -> Option<usize> {
        SpeciesField::slot(self, id)
    }

    fn column_len(&self) -> usize {
        SpeciesField::column_len(self)
    }

    fn values_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }
}

/// Host-owned `[column][species][level]` array borrowed for one call
///
/// Same layout and checks as [`SpeciesField`], without copying the values.
#[derive(Debug)]
pub struct SpeciesSliceMut<'a> {
    dims: GridDims,
    species_count: usize,
    index: FxHashMap<SpeciesId, usize>,
    data: &'a mut [f64],
}

impl<'a> SpeciesSliceMut<'a> {
    /// Borrow `data` as a species array on `dims`
    ///
    /// # Errors
    ///
    /// Returns `PblError::ShapeMismatch` on a wrong length and
    /// `PblError::InvalidDimensions` if a species id is repeated or the
    /// field length overflows.
    pub fn new(
        dims: GridDims,
        species: &[SpeciesId],
        data: &'a mut [f64],
    ) -> Result<Self, PblError> {
        check_species_len(dims, species.len(), data.len())?;
        Ok(Self {
            dims,
            species_count: species.len(),
            index: slot_index(species)?,
            data,
        })
    }

    /// Whole array
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data[..]
    }
}

impl SpeciesStore for SpeciesSliceMut<'_> {
    fn dims(&self) -> GridDims {
        self.dims
    }

    fn slot(&self, id: SpeciesId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    fn column_len(&self) -> usize {
        self.species_count * self.dims.nz()
    }

    fn values_mut(&mut self) -> &mut [f64] {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> GridDims {
        GridDims::new(2, 2, 3, 3).unwrap()
    }

    #[test]
    fn test_species_layout() {
        let species = vec![SpeciesId(7), SpeciesId(3)];
        let mut field = SpeciesField::with_value(dims(), species, 0.0).unwrap();
        assert_eq!(field.slot(SpeciesId(3)), Some(1));
        assert_eq!(field.slot(SpeciesId(9)), None);
        assert_eq!(field.column_len(), 6);

        field.profile_mut(2, 1).copy_from_slice(&[1.0, 2.0, 3.0]);
        // column 2 starts at 12; slot 1 starts 3 further in
        assert_eq!(&field.as_slice()[15..18], &[1.0, 2.0, 3.0]);
        assert_eq!(field.profile(2, 0), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_borrowed_slice_matches_owned_layout() {
        let ids = [SpeciesId(7), SpeciesId(3)];
        let owned = SpeciesField::with_value(dims(), ids.to_vec(), 0.0).unwrap();
        let mut data = vec![0.0; 24];
        let mut view = SpeciesSliceMut::new(dims(), &ids, &mut data).unwrap();

        assert_eq!(SpeciesStore::slot(&view, SpeciesId(3)), owned.slot(SpeciesId(3)));
        assert_eq!(SpeciesStore::column_len(&view), owned.column_len());
        view.values_mut()[15] = 4.0;
        assert_eq!(view.as_slice()[15], 4.0);
        assert_eq!(data[15], 4.0);
    }

    #[test]
    fn test_borrowed_slice_checks_shape() {
        let mut short = vec![0.0; 23];
        assert!(matches!(
            SpeciesSliceMut::new(dims(), &[SpeciesId(1), SpeciesId(2)], &mut short),
            Err(PblError::ShapeMismatch { field: "species", expected: 24, actual: 23 })
        ));
        let mut data = vec![0.0; 24];
        assert!(matches!(
            SpeciesSliceMut::new(dims(), &[SpeciesId(1), SpeciesId(1)], &mut data),
            Err(PblError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_duplicate_species_rejected() {
        let species = vec![SpeciesId(1), SpeciesId(1)];
        assert!(matches!(
            SpeciesField::with_value(dims(), species, 0.0),
            Err(PblError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_column_mass() {
        let air = AirMass::uniform(dims(), &[10.0, 20.0, 30.0]).unwrap();
        let mut field = SpeciesField::with_value(dims(), vec![SpeciesId(0)], 1.0).unwrap();
        field.profile_mut(0, 0).copy_from_slice(&[1.0, 2.0, 3.0]);
        assert_eq!(field.column_mass(0, 0, &air), 140.0);
        assert_eq!(field.column_mass(1, 0, &air), 60.0);
    }

    #[test]
    fn test_air_mass_shape_checked() {
        assert!(matches!(
            AirMass::new(dims(), vec![1.0; 11]),
            Err(PblError::ShapeMismatch { field: "air_mass", .. })
        ));
        assert!(AirMass::uniform(dims(), &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_air_mass_must_be_positive() {
        let mut data = vec![1.0; 12];
        data[7] = 0.0;
        match AirMass::new(dims(), data) {
            Err(PblError::InvalidGeometry { i, j, reason }) => {
                assert_eq!((i, j), (0, 1));
                assert!(reason.contains("level 2"));
            }
            other => panic!("expected InvalidGeometry, got {other:?}"),
        }
    }
}
