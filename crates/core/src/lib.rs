//! Planetary Boundary Layer Mixing Core Library
//!
//! Diagnoses the height of the planetary boundary layer (PBL) in every column
//! of a 3-D atmospheric chemistry grid and instantaneously homogenizes
//! advected tracers below it while conserving tracer mass exactly.
//!
//! ## Components
//!
//! - [`PblContext`]: per-column PBL state, fractions and flags for a run
//! - [`PblContext::compute_pbl_height`]: barometric PBL top from meteorology
//! - [`PblContext::mix`]: air-mass weighted mixing below the PBL top
//! - [`PblMixer`]: per-timestep driver with unit conversion and diagnostics
//!
//! ## Example
//!
//! ```
//! use pbl_mix_core::{AirMass, GridDims, GridGeometry, PblConfig, PblContext, SpeciesField, SpeciesId};
//!
//! let dims = GridDims::new(1, 1, 3, 3).unwrap();
//! let geometry =
//!     GridGeometry::uniform(dims, &[1000.0, 800.0, 500.0, 200.0], &[1800.0, 3500.0, 6000.0])
//!         .unwrap();
//! let air = AirMass::uniform(dims, &[10.0, 10.0, 10.0]).unwrap();
//! let mut species =
//!     SpeciesField::from_vec(dims, vec![SpeciesId(0)], vec![2.0, 2.0, 9.0]).unwrap();
//!
//! let mut context = PblContext::new(dims, PblConfig::default()).unwrap();
//! context.initialize().unwrap();
//! context.compute_pbl_height(&geometry, &[1500.0]).unwrap();
//! context.mix(&mut species, &air, &[SpeciesId(0)]).unwrap();
//!
//! assert_eq!(context.max_top_level(), 1);
//! ```

// Core types and utilities
pub mod core_types;

pub mod boundary_layer;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod grid;

pub use boundary_layer::{PblContext, PblState};
pub use config::PblConfig;
pub use core_types::{Hectopascals, Meters};
pub use diagnostics::{LevelBudget, MassDeltaField, MixingDiagnostics, NoDiagnostics};
pub use driver::{IdentityUnits, PblMixer, StepSummary, TracerMassUnits, UnitConverter};
pub use error::PblError;
pub use grid::{
    AirMass, GridDims, GridGeometry, SpeciesField, SpeciesId, SpeciesSliceMut, SpeciesStore,
};
