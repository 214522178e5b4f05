use pbl_mix_core::{GridDims, PblConfig, PblContext};
use std::ptr;
use std::sync::RwLock;

use crate::error::{DefaultPblMixError, PblMixErrorCode};
use crate::helpers::{to_code, track_error, track_result, with_context_mut};

/// C-compatible PBL configuration.
///
/// Obtain defaults with `pbl_mix_default_config()` and override fields as needed.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PblMixConfig {
    /// Scale height (m) in the barometric law. Default 7600.
    pub scale_height_m: f64,
    /// Allowed deviation of the per-column fraction sum from 1. Default 1e-3.
    pub fraction_tolerance: f64,
    /// Floor (m) applied to boundary-layer heights. Ignored unless `use_min_pbl_height`.
    pub min_pbl_height_m: f64,
    /// Whether `min_pbl_height_m` is applied.
    pub use_min_pbl_height: bool,
    /// Process columns on the internal thread pool.
    pub parallel: bool,
}

impl From<&PblConfig> for PblMixConfig {
    fn from(config: &PblConfig) -> Self {
        Self {
            scale_height_m: config.scale_height_m,
            fraction_tolerance: config.fraction_tolerance,
            min_pbl_height_m: config.min_pbl_height_m.unwrap_or(0.0),
            use_min_pbl_height: config.min_pbl_height_m.is_some(),
            parallel: config.parallel,
        }
    }
}

impl From<&PblMixConfig> for PblConfig {
    fn from(config: &PblMixConfig) -> Self {
        Self {
            scale_height_m: config.scale_height_m,
            fraction_tolerance: config.fraction_tolerance,
            min_pbl_height_m: config.use_min_pbl_height.then_some(config.min_pbl_height_m),
            parallel: config.parallel,
        }
    }
}

/// Boundary-layer state for one model grid.
///
/// # Thread Safety
/// The context is protected by an `RwLock`:
/// - **Queries** take a shared `.read()` lock and may run concurrently
/// - **`pbl_mix_compute_height` / `pbl_mix_initialize`** take an exclusive `.write()` lock
/// - **`pbl_mix_mix`** only reads PBL state; the species array it modifies is
///   caller-owned and must not be shared with another concurrent call
///
/// # Usage
/// ```c
/// PblMixInstance* pbl = NULL;
/// PblMixConfig config = pbl_mix_default_config();
/// if (pbl_mix_new(nx, ny, nz, n_active, &config, &pbl) != Ok) { abort(); }
/// if (pbl_mix_initialize(pbl) != Ok) { abort(); }
///
/// // every chemistry step
/// pbl_mix_compute_height(pbl, edges, n_edges, heights, n_heights, pbl_h, n_columns);
/// pbl_mix_mix(pbl, species, n_values, ids, n_species, air, n_air, adv, n_adv, NULL, 0);
///
/// pbl_mix_destroy(pbl);
/// ```
pub struct PblMixInstance {
    pub(crate) context: RwLock<PblContext>,
}

impl PblMixInstance {
    /// Creates an uninitialized instance for an `nx × ny × nz` grid.
    ///
    /// # Errors
    ///
    /// Returns `PblMixErrorCode::InvalidDimensions` for unusable dimensions and
    /// `PblMixErrorCode::InvalidParameter` for an unusable configuration.
    pub(crate) fn new(
        nx: usize,
        ny: usize,
        nz: usize,
        active_levels: usize,
        config: PblConfig,
    ) -> Result<Box<Self>, DefaultPblMixError> {
        let dims = GridDims::new(nx, ny, nz, active_levels)?;
        let context = PblContext::new(dims, config)?;
        Ok(Box::new(Self {
            context: RwLock::new(context),
        }))
    }
}

/// Default configuration values.
#[no_mangle]
pub extern "C" fn pbl_mix_default_config() -> PblMixConfig {
    PblMixConfig::from(&PblConfig::default())
}

/// Create a new instance and return it via out-parameter.
///
/// Parameters
/// - `nx`, `ny`: horizontal grid size
/// - `nz`: number of vertical levels
/// - `active_levels`: levels that may hold the PBL top (`1..=nz`)
/// - `config`: configuration, or null for defaults
/// - `out_instance`: receives the instance; set to null on failure
///
/// Returns
/// - `PblMixErrorCode::Ok` (0): success
/// - `PblMixErrorCode::NullPointer`: `out_instance` is null
/// - `PblMixErrorCode::InvalidDimensions`: zero or inconsistent dimensions
/// - `PblMixErrorCode::InvalidParameter`: invalid configuration
///
/// # Safety
///
/// - `out_instance` must be a valid, non-null pointer to writable memory.
/// - `config` must be null or point to a valid `PblMixConfig`.
/// - The caller takes ownership of the returned instance and MUST call
///   `pbl_mix_destroy` exactly once.
#[no_mangle]
pub unsafe extern "C" fn pbl_mix_new(
    nx: usize,
    ny: usize,
    nz: usize,
    active_levels: usize,
    config: *const PblMixConfig,
    out_instance: *mut *mut PblMixInstance,
) -> PblMixErrorCode {
    if out_instance.is_null() {
        return track_error(&DefaultPblMixError::null_pointer("out_instance"));
    }

    // SAFETY: null checked by `as_ref`, validity guaranteed by the caller.
    let config = unsafe { config.as_ref() }.map_or_else(PblConfig::default, PblConfig::from);

    match track_result(PblMixInstance::new(nx, ny, nz, active_levels, config)) {
        Ok(instance) => {
            unsafe {
                *out_instance = Box::into_raw(instance);
            }
            PblMixErrorCode::Ok
        }
        Err(code) => {
            unsafe {
                *out_instance = ptr::null_mut();
            }
            code
        }
    }
}

/// Allocate per-column storage. Calling it again is a no-op.
///
/// Returns `PblMixErrorCode::AllocationFailed` if storage cannot be allocated;
/// the run must be aborted.
///
/// # Safety
/// `instance` must be a live pointer from `pbl_mix_new`.
#[no_mangle]
pub unsafe extern "C" fn pbl_mix_initialize(instance: *mut PblMixInstance) -> PblMixErrorCode {
    to_code(unsafe { with_context_mut(instance, |context| context.initialize().map_err(Into::into)) })
}

/// Destroys an instance previously created by `pbl_mix_new`.
///
/// If `ptr` is null, this function is a no-op.
///
/// # Safety
/// - The pointer MUST have been created by `pbl_mix_new`.
/// - The pointer MUST NOT have been freed already.
#[no_mangle]
pub unsafe extern "C" fn pbl_mix_destroy(ptr: *mut PblMixInstance) {
    if ptr.is_null() {
        return;
    }

    // SAFETY: created by `Box::into_raw` in `pbl_mix_new` and not yet freed.
    unsafe {
        drop(Box::from_raw(ptr));
    }
}
