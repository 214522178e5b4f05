//! Grid dimensions, column geometry and host-owned fields

pub mod dims;
pub mod fields;
pub mod geometry;

// Re-export main types
pub use dims::GridDims;
pub use fields::{AirMass, SpeciesField, SpeciesId, SpeciesSliceMut, SpeciesStore};
pub use geometry::GridGeometry;
