//! Planetary boundary layer diagnosis and tracer mixing
//!
//! This module holds the two column engines and the context they share:
//! - Height engine: barometric PBL top, straddling level and fractions
//!   (`PblContext::compute_pbl_height`)
//! - Mixing engine: air-mass weighted homogenization below the PBL top
//!   (`PblContext::mix`)
//!
//! # Scientific Background
//!
//! The PBL is the near-surface layer dominated by turbulent mixing. On
//! timescales of a chemistry step it is close to well mixed, so tracers within
//! it are relaxed to their column mean mixing ratio. The PBL top generally
//! falls inside a model level; that level takes part in proportion to the
//! fraction of its pressure thickness lying below the top.
//!
//! # References
//!
//! - Stull, R.B. (1988). "An Introduction to Boundary Layer Meteorology." Kluwer.
//! - Holtslag, A.A.M. & Boville, B.A. (1993). "Local versus nonlocal boundary-layer
//!   diffusion in a global climate model." J. Climate, 6, 1825-1842.

pub(crate) mod context;
mod height;
mod mixing;
mod state;

pub use context::PblContext;
pub use state::PblState;
