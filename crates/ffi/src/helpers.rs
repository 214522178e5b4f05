use crate::error::{with_last_error_mut, DefaultPblMixError, PblMixError, PblMixErrorCode};
use crate::instance::PblMixInstance;
use pbl_mix_core::PblContext;
use std::ffi::CString;
use std::slice;

/// Set the thread-local error message and code.
pub(crate) fn set_last_error(error: &impl PblMixError) {
    with_last_error_mut(|(cstring, code)| {
        *cstring = CString::new(error.msg()).ok();
        *code = error.code();
    });
}

/// Track an error by setting it in thread-local storage and returning its code.
#[inline]
pub(crate) fn track_error(error: &impl PblMixError) -> PblMixErrorCode {
    set_last_error(error);
    error.code()
}

/// Clear the thread-local error message and code.
pub(crate) fn clear_last_error() {
    with_last_error_mut(|(cstring, code)| {
        *cstring = None;
        *code = PblMixErrorCode::Ok;
    });
}

/// Record the outcome of a fallible operation and collapse it to an error code.
pub(crate) fn track_result<T>(result: Result<T, DefaultPblMixError>) -> Result<T, PblMixErrorCode> {
    match result {
        Ok(value) => {
            clear_last_error();
            Ok(value)
        }
        Err(error) => Err(track_error(&error)),
    }
}

/// Collapse a unit result to the code returned across the boundary.
pub(crate) fn to_code(result: Result<(), DefaultPblMixError>) -> PblMixErrorCode {
    match track_result(result) {
        Ok(()) => PblMixErrorCode::Ok,
        Err(code) => code,
    }
}

/// Borrow a caller-owned array, treating a zero length as an empty slice.
///
/// # Safety
/// If `len > 0`, `ptr` must be valid for reads of `len` values.
pub(crate) unsafe fn slice_from_raw<'a, T>(
    ptr: *const T,
    len: usize,
    name: &str,
) -> Result<&'a [T], DefaultPblMixError> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(DefaultPblMixError::null_pointer(name));
    }
    // SAFETY: non-null and the caller guarantees `len` readable values.
    Ok(unsafe { slice::from_raw_parts(ptr, len) })
}

/// Mutable counterpart of [`slice_from_raw`].
///
/// # Safety
/// If `len > 0`, `ptr` must be valid for writes of `len` values and not aliased.
pub(crate) unsafe fn slice_from_raw_mut<'a, T>(
    ptr: *mut T,
    len: usize,
    name: &str,
) -> Result<&'a mut [T], DefaultPblMixError> {
    if len == 0 {
        return Ok(&mut []);
    }
    if ptr.is_null() {
        return Err(DefaultPblMixError::null_pointer(name));
    }
    // SAFETY: non-null and the caller guarantees `len` writable, unaliased values.
    Ok(unsafe { slice::from_raw_parts_mut(ptr, len) })
}

/// Run `f` with shared access to the instance's context.
///
/// # Safety
/// `instance` must be null or a live pointer from `pbl_mix_new`.
pub(crate) unsafe fn with_context<T>(
    instance: *const PblMixInstance,
    f: impl FnOnce(&PblContext) -> Result<T, DefaultPblMixError>,
) -> Result<T, DefaultPblMixError> {
    // SAFETY: null checked by `as_ref`, liveness guaranteed by the caller.
    let instance = unsafe { instance.as_ref() }
        .ok_or_else(|| DefaultPblMixError::null_pointer("instance"))?;
    let context = instance
        .context
        .read()
        .map_err(|_| DefaultPblMixError::lock_poisoned("context"))?;
    f(&context)
}

/// Run `f` with exclusive access to the instance's context.
///
/// # Safety
/// `instance` must be null or a live pointer from `pbl_mix_new`.
pub(crate) unsafe fn with_context_mut<T>(
    instance: *const PblMixInstance,
    f: impl FnOnce(&mut PblContext) -> Result<T, DefaultPblMixError>,
) -> Result<T, DefaultPblMixError> {
    // SAFETY: null checked by `as_ref`, liveness guaranteed by the caller.
    let instance = unsafe { instance.as_ref() }
        .ok_or_else(|| DefaultPblMixError::null_pointer("instance"))?;
    let mut context = instance
        .context
        .write()
        .map_err(|_| DefaultPblMixError::lock_poisoned("context"))?;
    f(&mut context)
}
