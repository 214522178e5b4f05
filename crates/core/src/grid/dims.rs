//! Grid dimensions shared by every field in the boundary-layer core

use crate::error::PblError;
use serde::{Deserialize, Serialize};

/// Horizontal and vertical extent of the computational grid
///
/// Columns are numbered row-major: column `c = j * nx + i`.
/// Levels are numbered from 1 at the surface to `nz` at the model top;
/// pressure edge `L` is the upper edge of level `L` (edge 0 is the surface).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawGridDims")]
pub struct GridDims {
    nx: usize,
    ny: usize,
    nz: usize,
    active_levels: usize,
}

/// Unvalidated wire form of [`GridDims`]
#[derive(Deserialize)]
struct RawGridDims {
    nx: usize,
    ny: usize,
    nz: usize,
    active_levels: usize,
}

impl TryFrom<RawGridDims> for GridDims {
    type Error = PblError;

    fn try_from(raw: RawGridDims) -> Result<Self, Self::Error> {
        Self::new(raw.nx, raw.ny, raw.nz, raw.active_levels)
    }
}

impl GridDims {
    /// Create grid dimensions
    ///
    /// # Arguments
    ///
    /// * `nx` - Columns in x
    /// * `ny` - Columns in y
    /// * `nz` - Vertical levels per column
    /// * `active_levels` - Lowest levels for which PBL fractions are stored (1..=nz)
    ///
    /// # Errors
    ///
    /// Returns `PblError::InvalidDimensions` if any extent is zero, the column
    /// count overflows, or `active_levels` exceeds `nz`.
    pub fn new(nx: usize, ny: usize, nz: usize, active_levels: usize) -> Result<Self, PblError> {
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(PblError::InvalidDimensions(format!(
                "extents must be positive, got {nx}x{ny}x{nz}"
            )));
        }
        if active_levels == 0 || active_levels > nz {
            return Err(PblError::InvalidDimensions(format!(
                "active levels must be in 1..={nz}, got {active_levels}"
            )));
        }
        let columns = nx.checked_mul(ny).ok_or_else(|| {
            PblError::InvalidDimensions(format!("column count {nx}x{ny} overflows"))
        })?;
        columns.checked_mul(nz + 1).ok_or_else(|| {
            PblError::InvalidDimensions(format!("{columns} columns of {nz} levels overflows"))
        })?;
        Ok(Self {
            nx,
            ny,
            nz,
            active_levels,
        })
    }

    /// Columns in x
    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Columns in y
    #[inline]
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Vertical levels per column
    #[inline]
    pub fn nz(&self) -> usize {
        self.nz
    }

    /// Levels carrying detailed PBL fractions
    #[inline]
    pub fn active_levels(&self) -> usize {
        self.active_levels
    }

    /// Total number of columns
    #[inline]
    pub fn columns(&self) -> usize {
        self.nx * self.ny
    }

    /// Length of a `[column][per_column][level]` array on this grid
    ///
    /// # Errors
    ///
    /// Returns `PblError::InvalidDimensions` if the length overflows `usize`.
    pub fn field_len(&self, field: &str, per_column: usize) -> Result<usize, PblError> {
        self.columns()
            .checked_mul(per_column)
            .and_then(|len| len.checked_mul(self.nz))
            .ok_or_else(|| {
                PblError::InvalidDimensions(format!(
                    "{field}: {} columns x {per_column} x {} levels overflows",
                    self.columns(),
                    self.nz
                ))
            })
    }

    /// Flat column index for `(i, j)`, or `None` when out of range
    #[inline]
    pub fn column_index(&self, i: usize, j: usize) -> Option<usize> {
        (i < self.nx && j < self.ny).then(|| j * self.nx + i)
    }

    /// `(i, j)` coordinates of a flat column index
    #[inline]
    pub fn column_coords(&self, column: usize) -> (usize, usize) {
        (column % self.nx, column / self.nx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_indexing_round_trip() {
        let dims = GridDims::new(4, 3, 10, 5).unwrap();
        assert_eq!(dims.columns(), 12);
        assert_eq!(dims.column_index(2, 1), Some(6));
        assert_eq!(dims.column_coords(6), (2, 1));
        assert_eq!(dims.column_index(4, 0), None);
        assert_eq!(dims.column_index(0, 3), None);
    }

    #[test]
    fn test_rejects_zero_extent() {
        assert!(GridDims::new(0, 3, 10, 5).is_err());
        assert!(GridDims::new(3, 3, 0, 0).is_err());
    }

    #[test]
    fn test_active_levels_bounded_by_nz() {
        assert!(GridDims::new(1, 1, 10, 10).is_ok());
        assert!(matches!(
            GridDims::new(1, 1, 10, 11),
            Err(PblError::InvalidDimensions(_))
        ));
        assert!(GridDims::new(1, 1, 10, 0).is_err());
    }

    #[test]
    fn test_deserialize_validates_extents() {
        let dims: GridDims =
            serde_json::from_str(r#"{"nx":4,"ny":3,"nz":10,"active_levels":5}"#).unwrap();
        assert_eq!(dims, GridDims::new(4, 3, 10, 5).unwrap());

        let zero_active =
            serde_json::from_str::<GridDims>(r#"{"nx":1,"ny":1,"nz":3,"active_levels":0}"#);
        assert!(zero_active.unwrap_err().to_string().contains("active levels"));
        for json in [
            r#"{"nx":1,"ny":1,"nz":0,"active_levels":0}"#,
            r#"{"nx":1,"ny":1,"nz":3,"active_levels":4}"#,
            r#"{"nx":0,"ny":1,"nz":3,"active_levels":3}"#,
        ] {
            assert!(serde_json::from_str::<GridDims>(json).is_err(), "{json}");
        }
    }

    #[test]
    fn test_field_len_overflow_is_rejected() {
        let dims = GridDims::new(1 << 20, 1 << 20, 3, 3).unwrap();
        assert_eq!(dims.field_len("species", 1).unwrap(), 3 << 40);
        assert!(matches!(
            dims.field_len("species", usize::MAX / 2),
            Err(PblError::InvalidDimensions(_))
        ));
        assert_eq!(dims.field_len("species", 0).unwrap(), 0);
    }
}
