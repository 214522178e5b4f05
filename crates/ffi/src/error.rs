use pbl_mix_core::PblError;
use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

/// Common interface for FFI error types.
///
/// # Design
/// - `code()` - Returns the error code to be passed across FFI boundary
/// - `msg()` - Returns the error message for diagnostic purposes
pub(crate) trait PblMixError {
    /// Returns the error code to be returned across the FFI boundary.
    fn code(&self) -> PblMixErrorCode;

    /// Returns the human-readable error message.
    fn msg(&self) -> &str;
}

/// Default implementation of `PblMixError` for FFI error scenarios.
///
/// Wraps a `PblMixErrorCode` with a message; core errors convert via `From<PblError>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DefaultPblMixError {
    code: PblMixErrorCode,
    msg: String,
}

impl DefaultPblMixError {
    /// Create error for null pointer passed where non-null required.
    ///
    /// # Arguments
    /// * `param_name` - The name of the parameter that was null (e.g., `"out_instance"`, `"species"`)
    pub fn null_pointer(param_name: &str) -> Self {
        Self {
            code: PblMixErrorCode::NullPointer,
            msg: format!("Parameter '{param_name}' cannot be null"),
        }
    }

    /// Create error for poisoned lock.
    ///
    /// # Arguments
    /// * `lock_name` - The name of the lock that was poisoned (e.g., `"context"`)
    pub fn lock_poisoned(lock_name: &str) -> Self {
        Self {
            code: PblMixErrorCode::LockPoisoned,
            msg: format!("Lock '{lock_name}' was poisoned by a panic in another thread"),
        }
    }

    /// Create error for an array whose length does not match the grid.
    ///
    /// # Arguments
    /// * `param_name` - The array parameter (e.g., `"pressure_edges"`)
    /// * `expected` - Length required by the grid
    /// * `actual` - Length passed by the caller
    pub fn length_mismatch(param_name: &str, expected: usize, actual: usize) -> Self {
        Self {
            code: PblMixErrorCode::InvalidDimensions,
            msg: format!("Array '{param_name}' has {actual} values, expected {expected}"),
        }
    }

    /// Create error for a column or level outside the grid.
    ///
    /// # Arguments
    /// * `what` - The requested location (e.g., `"column (3, 4) level 2"`)
    pub fn out_of_range(what: &str) -> Self {
        Self {
            code: PblMixErrorCode::InvalidDimensions,
            msg: format!("{what} is outside the grid"),
        }
    }
}

impl PblMixError for DefaultPblMixError {
    fn code(&self) -> PblMixErrorCode {
        self.code
    }

    fn msg(&self) -> &str {
        &self.msg
    }
}

impl From<PblError> for DefaultPblMixError {
    fn from(error: PblError) -> Self {
        let code = match &error {
            PblError::InvalidDimensions(_)
            | PblError::ShapeMismatch { .. }
            | PblError::InvalidGeometry { .. } => PblMixErrorCode::InvalidDimensions,
            PblError::InvalidConfig { .. } | PblError::UnitConversion(_) => {
                PblMixErrorCode::InvalidParameter
            }
            PblError::Allocation { .. } => PblMixErrorCode::AllocationFailed,
            PblError::NotInitialized | PblError::NoPblState => PblMixErrorCode::NotReady,
            PblError::NoTopLevel { .. }
            | PblError::FractionSum { .. }
            | PblError::FractionOutOfRange { .. } => PblMixErrorCode::InvariantViolation,
            PblError::DegenerateColumn { .. } => PblMixErrorCode::DegenerateColumn,
            PblError::UnknownSpecies(_) => PblMixErrorCode::UnknownSpecies,
        };
        Self {
            code,
            msg: error.to_string(),
        }
    }
}

/// FFI error codes returned by PBL mixing functions.
/// Follows standard C convention: 0 = success, non-zero = error.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PblMixErrorCode {
    /// Operation completed successfully.
    Ok = 0,

    /// Invalid pointer: null pointer passed where non-null required.
    NullPointer = 1,

    /// Lock poisoned: internal synchronization primitive was poisoned by a panic.
    LockPoisoned = 2,

    /// Grid dimensions, array lengths or geometry are invalid.
    InvalidDimensions = 3,

    /// Invalid parameter passed to function.
    InvalidParameter = 4,

    /// Per-column storage could not be allocated. Fatal to the run.
    AllocationFailed = 5,

    /// Context not initialized, or no PBL height computed yet.
    NotReady = 6,

    /// PBL fraction sum or top level invariant violated. Fatal to the run.
    InvariantViolation = 7,

    /// A column has no air mass below its PBL top. Fatal to the run.
    DegenerateColumn = 8,

    /// An advected species id is not carried by the species array.
    UnknownSpecies = 9,
}

impl From<DefaultPblMixError> for PblMixErrorCode {
    fn from(error: DefaultPblMixError) -> Self {
        error.code
    }
}

thread_local! {
    /// Thread-local storage for the most recent FFI error (C string, error code).
    /// The CString is stored to keep the returned pointer alive.
    static LAST_ERROR: RefCell<(Option<CString>, PblMixErrorCode)> = const { RefCell::new((None, PblMixErrorCode::Ok)) };
}

/// Internal helper to read `LAST_ERROR` thread-local storage (cstring, code).
pub(crate) fn with_last_error<F, R>(f: F) -> R
where
    F: FnOnce(&(Option<CString>, PblMixErrorCode)) -> R,
{
    LAST_ERROR.with_borrow(f)
}

/// Internal helper to mutate `LAST_ERROR` thread-local storage (cstring, code).
pub(crate) fn with_last_error_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut (Option<CString>, PblMixErrorCode)) -> R,
{
    LAST_ERROR.with_borrow_mut(f)
}

/// Retrieve the most recent FFI error message as a null-terminated C string.
///
/// Returns:
/// - A borrowed pointer to the error message if an error occurred.
/// - `null` if the last call on this thread succeeded.
///
/// # Lifetime
/// The returned pointer is valid until the next FFI call on this thread.
///
/// **DO NOT FREE THIS POINTER** - it is managed internally.
///
/// Example:
/// ```c
/// PblMixErrorCode err = pbl_mix_compute_height(pbl, edges, n_edges, heights, n_heights, h, n_cols);
/// if (err != Ok) {
///     const char* error = pbl_mix_get_last_error();
///     if (error) {
///         fprintf(stderr, "PBL diagnosis failed: %s\n", error);
///     }
///     abort();
/// }
/// ```
#[no_mangle]
pub extern "C" fn pbl_mix_get_last_error() -> *const c_char {
    with_last_error(|(cstring, _code)| cstring.as_ref().map_or(ptr::null(), |cs| cs.as_ptr()))
}

/// Retrieve the most recent FFI error code.
///
/// Returns `PblMixErrorCode::Ok` (0) if the last call on this thread succeeded.
#[no_mangle]
pub extern "C" fn pbl_mix_get_last_error_code() -> PblMixErrorCode {
    with_last_error(|(_cstring, code)| *code)
}
