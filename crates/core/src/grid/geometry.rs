//! Per-column vertical geometry supplied by the meteorology layer
//!
//! The core does not regrid or derive geometry; it only validates what the
//! host hands over. Pressure edges must be finite, non-negative and strictly
//! decreasing upward so that every level has a positive pressure thickness.

use super::GridDims;
use crate::error::PblError;

/// Pressure edges and box heights for every column
#[derive(Debug, Clone)]
pub struct GridGeometry {
    dims: GridDims,
    /// Pressure edges (hPa), `nz + 1` per column, surface first
    pressure_edges: Vec<f64>,
    /// Box heights (m), `nz` per column, lowest level first
    box_heights: Vec<f64>,
}

impl GridGeometry {
    /// Build geometry from column-contiguous arrays
    ///
    /// # Arguments
    ///
    /// * `dims` - Grid dimensions
    /// * `pressure_edges` - `columns * (nz + 1)` edges in hPa; element 0 of each column is surface pressure
    /// * `box_heights` - `columns * nz` level thicknesses in meters
    ///
    /// # Errors
    ///
    /// Returns `PblError::ShapeMismatch` on wrong lengths and
    /// `PblError::InvalidGeometry` naming the first malformed column.
    pub fn new(
        dims: GridDims,
        pressure_edges: Vec<f64>,
        box_heights: Vec<f64>,
    ) -> Result<Self, PblError> {
        let edges_per_column = dims.nz() + 1;
        let expected_edges = dims.columns() * edges_per_column;
        if pressure_edges.len() != expected_edges {
            return Err(PblError::ShapeMismatch {
                field: "pressure_edges",
                expected: expected_edges,
                actual: pressure_edges.len(),
            });
        }
        let expected_heights = dims.columns() * dims.nz();
        if box_heights.len() != expected_heights {
            return Err(PblError::ShapeMismatch {
                field: "box_heights",
                expected: expected_heights,
                actual: box_heights.len(),
            });
        }

        for (column, edges) in pressure_edges.chunks_exact(edges_per_column).enumerate() {
            if let Some(reason) = check_edges(edges) {
                let (i, j) = dims.column_coords(column);
                return Err(PblError::InvalidGeometry { i, j, reason });
            }
        }
        for (column, heights) in box_heights.chunks_exact(dims.nz()).enumerate() {
            if let Some(level) = heights.iter().position(|h| !(h.is_finite() && *h >= 0.0)) {
                let (i, j) = dims.column_coords(column);
                return Err(PblError::InvalidGeometry {
                    i,
                    j,
                    reason: format!("box height at level {} is {}", level + 1, heights[level]),
                });
            }
        }

        Ok(Self {
            dims,
            pressure_edges,
            box_heights,
        })
    }

    /// Build geometry where every column shares the same edges and box heights
    ///
    /// # Errors
    ///
    /// Same as [`GridGeometry::new`].
    pub fn uniform(dims: GridDims, edges: &[f64], heights: &[f64]) -> Result<Self, PblError> {
        let columns = dims.columns();
        let pressure_edges = edges.repeat(columns);
        let box_heights = heights.repeat(columns);
        Self::new(dims, pressure_edges, box_heights)
    }

    /// Grid dimensions
    #[inline]
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Pressure edges of one column (surface first)
    #[inline]
    pub fn column_edges(&self, column: usize) -> &[f64] {
        let n = self.dims.nz() + 1;
        &self.pressure_edges[column * n..(column + 1) * n]
    }

    /// Box heights of one column (lowest level first)
    #[inline]
    pub fn column_heights(&self, column: usize) -> &[f64] {
        let n = self.dims.nz();
        &self.box_heights[column * n..(column + 1) * n]
    }

    /// Surface pressure of one column (hPa)
    #[inline]
    pub fn surface_pressure(&self, column: usize) -> f64 {
        self.pressure_edges[column * (self.dims.nz() + 1)]
    }

    /// All pressure edges, column-contiguous
    #[inline]
    pub fn pressure_edges(&self) -> &[f64] {
        &self.pressure_edges
    }

    /// All box heights, column-contiguous
    #[inline]
    pub fn box_heights(&self) -> &[f64] {
        &self.box_heights
    }
}

fn check_edges(edges: &[f64]) -> Option<String> {
    if let Some(edge) = edges.iter().position(|p| !(p.is_finite() && *p >= 0.0)) {
        return Some(format!("pressure edge {edge} is {}", edges[edge]));
    }
    edges.windows(2).position(|w| w[1] >= w[0]).map(|level| {
        format!(
            "pressure edges must decrease upward, level {} spans {} -> {} hPa",
            level + 1,
            edges[level],
            edges[level + 1]
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> GridDims {
        GridDims::new(2, 1, 3, 3).unwrap()
    }

    #[test]
    fn test_uniform_geometry_accessors() {
        let geometry = GridGeometry::uniform(
            dims(),
            &[1000.0, 800.0, 500.0, 200.0],
            &[1800.0, 3500.0, 6000.0],
        )
        .unwrap();
        assert_eq!(geometry.column_edges(1), &[1000.0, 800.0, 500.0, 200.0]);
        assert_eq!(geometry.column_heights(0), &[1800.0, 3500.0, 6000.0]);
        assert_eq!(geometry.surface_pressure(1), 1000.0);
    }

    #[test]
    fn test_rejects_wrong_edge_count() {
        let result = GridGeometry::new(dims(), vec![1000.0; 7], vec![100.0; 6]);
        assert!(matches!(
            result,
            Err(PblError::ShapeMismatch {
                field: "pressure_edges",
                expected: 8,
                actual: 7
            })
        ));
    }

    #[test]
    fn test_rejects_non_decreasing_edges() {
        let mut edges = vec![1000.0, 800.0, 500.0, 200.0];
        edges.extend([1000.0, 800.0, 800.0, 200.0]);
        let result = GridGeometry::new(dims(), edges, vec![100.0; 6]);
        match result {
            Err(PblError::InvalidGeometry { i, j, .. }) => assert_eq!((i, j), (1, 0)),
            other => panic!("expected InvalidGeometry, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_nan_box_height() {
        let result = GridGeometry::uniform(
            dims(),
            &[1000.0, 800.0, 500.0, 200.0],
            &[100.0, f64::NAN, 100.0],
        );
        assert!(matches!(result, Err(PblError::InvalidGeometry { .. })));
    }
}
