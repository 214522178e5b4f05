//! Explicit context holding boundary-layer state for the lifetime of a run
//!
//! The context is created once the grid is known, initialized explicitly,
//! refreshed by [`PblContext::compute_pbl_height`] every time meteorology
//! changes, and consumed by [`PblContext::mix`]. Storage is released when the
//! context is dropped.

use super::state::PblState;
use crate::config::PblConfig;
use crate::error::PblError;
use crate::grid::GridDims;
use tracing::{debug, info};

/// Allocate a vector of `len` copies of `value`, reporting failure with `resource`
pub(crate) fn try_filled<T: Clone>(
    resource: &'static str,
    len: usize,
    value: T,
) -> Result<Vec<T>, PblError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| PblError::Allocation { resource, len })?;
    buffer.resize(len, value);
    Ok(buffer)
}

/// Per-column storage, allocated once by `initialize()`
#[derive(Debug)]
pub(crate) struct PblStorage {
    pub(crate) columns: Vec<PblState>,
    /// `columns * active_levels`
    pub(crate) frac_of_pbl: Vec<f64>,
    /// `columns * active_levels`
    pub(crate) frac_under_top: Vec<f64>,
    /// `columns * nz`, true for levels fully below the PBL top
    pub(crate) in_pbl: Vec<bool>,
    pub(crate) max_top_level: usize,
}

/// Boundary-layer state shared by the height and mixing engines
///
/// # Example
///
/// ```
/// use pbl_mix_core::{GridDims, GridGeometry, PblConfig, PblContext};
///
/// let dims = GridDims::new(1, 1, 3, 3).unwrap();
/// let geometry = GridGeometry::uniform(dims, &[1000.0, 800.0, 500.0, 200.0], &[1800.0, 3500.0, 6000.0]).unwrap();
///
/// let mut context = PblContext::new(dims, PblConfig::default()).unwrap();
/// context.initialize().unwrap();
/// context.compute_pbl_height(&geometry, &[2000.0]).unwrap();
/// assert_eq!(context.max_top_level(), 2);
/// ```
#[derive(Debug)]
pub struct PblContext {
    pub(crate) dims: GridDims,
    pub(crate) config: PblConfig,
    pub(crate) storage: Option<PblStorage>,
    pub(crate) has_state: bool,
}

impl PblContext {
    /// Create an uninitialized context
    ///
    /// # Errors
    ///
    /// Returns `PblError::InvalidConfig` if the configuration is unusable.
    pub fn new(dims: GridDims, config: PblConfig) -> Result<Self, PblError> {
        config.validate()?;
        Ok(Self {
            dims,
            config,
            storage: None,
            has_state: false,
        })
    }

    /// Allocate per-column storage
    ///
    /// Calling this on an already initialized context is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `PblError::Allocation` naming the buffer that could not be allocated.
    pub fn initialize(&mut self) -> Result<(), PblError> {
        if self.storage.is_some() {
            debug!("PBL context already initialized");
            return Ok(());
        }

        let columns = self.dims.columns();
        let profile_len = columns * self.dims.active_levels();
        let storage = PblStorage {
            columns: try_filled("pbl_state", columns, PblState::default())?,
            frac_of_pbl: try_filled("frac_of_pbl", profile_len, 0.0)?,
            frac_under_top: try_filled("frac_under_top", profile_len, 0.0)?,
            in_pbl: try_filled("in_pbl", columns * self.dims.nz(), false)?,
            max_top_level: 0,
        };
        self.storage = Some(storage);

        info!(
            "Initialized PBL context: {}x{} columns, {} levels ({} active)",
            self.dims.nx(),
            self.dims.ny(),
            self.dims.nz(),
            self.dims.active_levels()
        );
        Ok(())
    }

    /// Whether `initialize()` has completed
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.storage.is_some()
    }

    /// Whether PBL state from a successful height computation is available
    #[inline]
    pub fn has_state(&self) -> bool {
        self.has_state && self.storage.is_some()
    }

    /// Grid dimensions
    #[inline]
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Configuration
    #[inline]
    pub fn config(&self) -> &PblConfig {
        &self.config
    }

    /// Storage holding valid PBL state
    pub(crate) fn ready_storage(&self) -> Result<&PblStorage, PblError> {
        let storage = self.storage.as_ref().ok_or(PblError::NotInitialized)?;
        if !self.has_state {
            return Err(PblError::NoPblState);
        }
        Ok(storage)
    }

    fn valid_storage(&self) -> Option<&PblStorage> {
        self.ready_storage().ok()
    }

    /// Highest PBL top level over all columns (0 until PBL height is computed)
    pub fn max_top_level(&self) -> usize {
        self.valid_storage().map_or(0, |s| s.max_top_level)
    }

    /// All column states in row-major order
    pub fn states(&self) -> Option<&[PblState]> {
        self.valid_storage().map(|s| s.columns.as_slice())
    }

    /// PBL state of column `(i, j)`
    pub fn pbl_state(&self, i: usize, j: usize) -> Option<&PblState> {
        let column = self.dims.column_index(i, j)?;
        self.valid_storage().map(|s| &s.columns[column])
    }

    /// Share of the PBL's mass in 1-based `level` of column `(i, j)`
    pub fn frac_of_pbl(&self, i: usize, j: usize, level: usize) -> Option<f64> {
        let index = self.profile_index(i, j, level)?;
        self.valid_storage().map(|s| s.frac_of_pbl[index])
    }

    /// Fraction of 1-based `level` of column `(i, j)` lying under the PBL top
    pub fn frac_under_top(&self, i: usize, j: usize, level: usize) -> Option<f64> {
        let index = self.profile_index(i, j, level)?;
        self.valid_storage().map(|s| s.frac_under_top[index])
    }

    /// Whether 1-based `level` of column `(i, j)` lies fully inside the PBL
    pub fn in_pbl(&self, i: usize, j: usize, level: usize) -> Option<bool> {
        let column = self.dims.column_index(i, j)?;
        if level == 0 || level > self.dims.nz() {
            return None;
        }
        self.valid_storage()
            .map(|s| s.in_pbl[column * self.dims.nz() + level - 1])
    }

    /// PBL top pressure (hPa) of column `(i, j)`
    pub fn pbl_top_hpa(&self, i: usize, j: usize) -> Option<f64> {
        self.pbl_state(i, j).map(|s| s.top_pressure.value())
    }

    /// PBL top height (m) of column `(i, j)`
    pub fn pbl_top_m(&self, i: usize, j: usize) -> Option<f64> {
        self.pbl_state(i, j).map(|s| s.top_height.value())
    }

    /// PBL top in level units of column `(i, j)`
    pub fn pbl_top_level_units(&self, i: usize, j: usize) -> Option<f64> {
        self.pbl_state(i, j).map(|s| s.top_level_units)
    }

    /// PBL pressure thickness (hPa) of column `(i, j)`
    pub fn pbl_thickness_hpa(&self, i: usize, j: usize) -> Option<f64> {
        self.pbl_state(i, j).map(|s| s.thickness.value())
    }

    fn profile_index(&self, i: usize, j: usize, level: usize) -> Option<usize> {
        let column = self.dims.column_index(i, j)?;
        let active = self.dims.active_levels();
        (level >= 1 && level <= active).then(|| column * active + level - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> PblContext {
        let dims = GridDims::new(3, 2, 5, 4).unwrap();
        PblContext::new(dims, PblConfig::default()).unwrap()
    }

    #[test]
    fn test_initialize_allocates_once() {
        let mut ctx = context();
        assert!(!ctx.is_initialized());
        ctx.initialize().unwrap();
        assert!(ctx.is_initialized());

        let storage = ctx.storage.as_ref().unwrap();
        assert_eq!(storage.columns.len(), 6);
        assert_eq!(storage.frac_of_pbl.len(), 24);
        assert_eq!(storage.in_pbl.len(), 30);
        let ptr = storage.frac_of_pbl.as_ptr();

        // Second call keeps the same buffers
        ctx.initialize().unwrap();
        assert_eq!(ctx.storage.as_ref().unwrap().frac_of_pbl.as_ptr(), ptr);
    }

    #[test]
    fn test_queries_empty_before_compute() {
        let mut ctx = context();
        assert_eq!(ctx.max_top_level(), 0);
        assert!(matches!(ctx.ready_storage(), Err(PblError::NotInitialized)));

        ctx.initialize().unwrap();
        assert!(!ctx.has_state());
        assert!(matches!(ctx.ready_storage(), Err(PblError::NoPblState)));
        assert!(ctx.pbl_state(0, 0).is_none());
        assert!(ctx.frac_of_pbl(0, 0, 1).is_none());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let dims = GridDims::new(1, 1, 2, 2).unwrap();
        let config = PblConfig {
            fraction_tolerance: f64::NAN,
            ..Default::default()
        };
        assert!(PblContext::new(dims, config).is_err());
    }

    #[test]
    fn test_try_filled_reports_resource() {
        let err = try_filled("huge", usize::MAX, 0_u8).unwrap_err();
        assert_eq!(
            err,
            PblError::Allocation {
                resource: "huge",
                len: usize::MAX
            }
        );
    }
}
