use pbl_mix_core::{PblContext, PblError, PblState};

use crate::error::{DefaultPblMixError, PblMixErrorCode};
use crate::helpers::{to_code, with_context};
use crate::instance::PblMixInstance;

#[repr(C)]
/// FFI-friendly snapshot of one column's PBL state.
/// Keep this layout stable for C/C++/Fortran consumers.
pub struct PblColumnState {
    /// 1-based level containing the PBL top.
    pub top_level: u32,

    /// Fraction of `top_level` below the PBL top (0.0 - 1.0).
    pub top_fraction: f64,

    /// PBL top pressure (hPa).
    pub top_pressure_hpa: f64,

    /// PBL pressure thickness (hPa).
    pub thickness_hpa: f64,

    /// PBL top height above the surface (m).
    pub top_height_m: f64,

    /// PBL top in level units, `(top_level - 1) + top_fraction`.
    pub top_level_units: f64,
}

impl From<&PblState> for PblColumnState {
    fn from(state: &PblState) -> Self {
        Self {
            top_level: state.top_level as u32,
            top_fraction: state.top_fraction,
            top_pressure_hpa: state.top_pressure.value(),
            thickness_hpa: state.thickness.value(),
            top_height_m: state.top_height.value(),
            top_level_units: state.top_level_units,
        }
    }
}

fn require_state(context: &PblContext) -> Result<(), DefaultPblMixError> {
    if !context.is_initialized() {
        return Err(PblError::NotInitialized.into());
    }
    if !context.has_state() {
        return Err(PblError::NoPblState.into());
    }
    Ok(())
}

fn out_of_range(i: usize, j: usize, level: Option<usize>) -> DefaultPblMixError {
    let what = match level {
        Some(level) => format!("column ({i}, {j}) level {level}"),
        None => format!("column ({i}, {j})"),
    };
    DefaultPblMixError::out_of_range(&what)
}

/// Write `value` through `out`, failing on a null pointer.
unsafe fn write_out<T>(out: *mut T, name: &str, value: T) -> Result<(), DefaultPblMixError> {
    if out.is_null() {
        return Err(DefaultPblMixError::null_pointer(name));
    }
    // SAFETY: non-null and writable per the caller's contract.
    unsafe {
        out.write(value);
    }
    Ok(())
}

/// Get the PBL state of column `(i, j)`.
///
/// Returns `PblMixErrorCode::InvalidDimensions` if the column is outside the
/// grid and `PblMixErrorCode::NotReady` if no PBL height has been computed.
///
/// # Safety
/// `instance` must be a live pointer from `pbl_mix_new`; `out_state` must be writable.
#[no_mangle]
pub unsafe extern "C" fn pbl_mix_get_column_state(
    instance: *const PblMixInstance,
    i: usize,
    j: usize,
    out_state: *mut PblColumnState,
) -> PblMixErrorCode {
    to_code(unsafe {
        with_context(instance, |context| {
            require_state(context)?;
            let state = context.pbl_state(i, j).ok_or_else(|| out_of_range(i, j, None))?;
            write_out(out_state, "out_state", PblColumnState::from(state))
        })
    })
}

/// Get the highest PBL top level over all columns (0 before any computation).
///
/// # Safety
/// `instance` must be a live pointer from `pbl_mix_new`; `out_level` must be writable.
#[no_mangle]
pub unsafe extern "C" fn pbl_mix_get_max_top_level(
    instance: *const PblMixInstance,
    out_level: *mut u32,
) -> PblMixErrorCode {
    to_code(unsafe {
        with_context(instance, |context| {
            write_out(out_level, "out_level", context.max_top_level() as u32)
        })
    })
}

/// Get the share of the PBL's mass in 1-based `level` of column `(i, j)`.
///
/// # Safety
/// `instance` must be a live pointer from `pbl_mix_new`; `out_fraction` must be writable.
#[no_mangle]
pub unsafe extern "C" fn pbl_mix_get_frac_of_pbl(
    instance: *const PblMixInstance,
    i: usize,
    j: usize,
    level: usize,
    out_fraction: *mut f64,
) -> PblMixErrorCode {
    to_code(unsafe {
        with_context(instance, |context| {
            require_state(context)?;
            let fraction = context
                .frac_of_pbl(i, j, level)
                .ok_or_else(|| out_of_range(i, j, Some(level)))?;
            write_out(out_fraction, "out_fraction", fraction)
        })
    })
}

/// Get the fraction of 1-based `level` of column `(i, j)` lying under the PBL top.
///
/// # Safety
/// `instance` must be a live pointer from `pbl_mix_new`; `out_fraction` must be writable.
#[no_mangle]
pub unsafe extern "C" fn pbl_mix_get_frac_under_top(
    instance: *const PblMixInstance,
    i: usize,
    j: usize,
    level: usize,
    out_fraction: *mut f64,
) -> PblMixErrorCode {
    to_code(unsafe {
        with_context(instance, |context| {
            require_state(context)?;
            let fraction = context
                .frac_under_top(i, j, level)
                .ok_or_else(|| out_of_range(i, j, Some(level)))?;
            write_out(out_fraction, "out_fraction", fraction)
        })
    })
}

/// Get whether 1-based `level` of column `(i, j)` lies fully inside the PBL.
///
/// # Safety
/// `instance` must be a live pointer from `pbl_mix_new`; `out_inside` must be writable.
#[no_mangle]
pub unsafe extern "C" fn pbl_mix_get_in_pbl(
    instance: *const PblMixInstance,
    i: usize,
    j: usize,
    level: usize,
    out_inside: *mut bool,
) -> PblMixErrorCode {
    to_code(unsafe {
        with_context(instance, |context| {
            require_state(context)?;
            let inside = context
                .in_pbl(i, j, level)
                .ok_or_else(|| out_of_range(i, j, Some(level)))?;
            write_out(out_inside, "out_inside", inside)
        })
    })
}
