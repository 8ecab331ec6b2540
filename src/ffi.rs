//! C-compatible surface, mirroring the original `se_*` function family and its
//! `SEContext`/`SEBlockInfo`/`SELineInfo` structs one field at a time.
//!
//! Concurrency note: like the source, per-block calls (`se_fetch`, `se_filter`) are safe
//! to call from multiple threads for *distinct* `block_idx` values against the same
//! context, because [`Engine::fetch`]/[`Engine::filter`] only ever touch the one block
//! they're given. `se_merge_scope`/`se_get_line`/`se_set_*` are not safe to call
//! concurrently with an in-flight fetch/filter, or with each other — exactly as
//! documented on [`Engine`] itself.

use std::ffi::{c_char, CStr};
use std::ptr;

use crate::constants::{MAX_ERROR_LENGTH, MAX_SCOPE_AFTER, MAX_SCOPE_BEFORE};
use crate::engine::{Engine, ScopeConfig};
use crate::error::EngineError;

/// Mirrors `SearchEngineError`. `NoError` is `0` so a C caller's `if (err)` idiom works.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeError {
    NoError = 0,
    BadArgument,
    NotSupported,
    InvalidContext,
    FileOpenFailed,
    FileStatFailed,
    FileMapFailed,
    InitFailed,
    EngineOpFailed,
    UnknownError,
}

impl From<EngineError> for SeError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::BadArgument | EngineError::BadBlock { .. } => SeError::BadArgument,
            EngineError::NotSupported => SeError::NotSupported,
            EngineError::InvalidContext => SeError::InvalidContext,
            EngineError::FileOpenFailed(_) => SeError::FileOpenFailed,
            EngineError::FileStatFailed(_) => SeError::FileStatFailed,
            EngineError::FileMapFailed(_) => SeError::FileMapFailed,
            EngineError::InitFailed => SeError::InitFailed,
            EngineError::EngineOpFailed { .. } | EngineError::InvalidPattern(_) => SeError::EngineOpFailed,
            EngineError::Unknown => SeError::UnknownError,
        }
    }
}

/// Mirrors `SEContext`. Owns the boxed [`Engine`] behind an opaque pointer; `blocks`
/// and `bytes` are cached for callers that only need the summary.
#[repr(C)]
pub struct SeContext {
    engine: *mut Engine,
    pub blocks: u32,
    pub bytes: u64,
}

/// Mirrors `SEBlockInfo`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct SeBlockInfo {
    pub lines: u32,
    pub max_length: u32,
}

/// Mirrors `SELineInfo`. `line` points into the engine's memory map and is valid only
/// until the next `se_get_line`/`se_destroy` call on the same context.
#[repr(C)]
pub struct SeLineInfo {
    pub line: *const u8,
    pub length: u32,
    pub number: u32,
    pub scope: bool,
}

unsafe fn engine_mut<'a>(context: *mut SeContext) -> Option<&'a mut Engine> {
    if context.is_null() {
        return None;
    }
    let ctx = unsafe { &mut *context };
    if ctx.engine.is_null() {
        return None;
    }
    Some(unsafe { &mut *ctx.engine })
}

/// # Safety
/// `file` must be a valid, NUL-terminated C string. `context` must point to valid,
/// writable `SeContext` storage that the caller owns until `se_destroy` is called.
#[no_mangle]
pub unsafe extern "C" fn se_init(file: *const c_char, context: *mut SeContext) -> SeError {
    if file.is_null() || context.is_null() {
        return SeError::BadArgument;
    }
    let path = match unsafe { CStr::from_ptr(file) }.to_str() {
        Ok(s) => s,
        Err(_) => return SeError::BadArgument,
    };

    match Engine::open(path, ScopeConfig::new()) {
        Ok(engine) => {
            let blocks = engine.block_count() as u32;
            let bytes = engine.total_bytes();
            let boxed = Box::into_raw(Box::new(engine));
            unsafe {
                (*context).engine = boxed;
                (*context).blocks = blocks;
                (*context).bytes = bytes;
            }
            SeError::NoError
        }
        Err(e) => e.into(),
    }
}

/// # Safety
/// `context` must have been initialized by `se_init` and not yet destroyed. `info` must
/// point to valid, writable `SeBlockInfo` storage.
#[no_mangle]
pub unsafe extern "C" fn se_fetch(context: *mut SeContext, block_idx: u32, info: *mut SeBlockInfo) -> SeError {
    if info.is_null() {
        return SeError::BadArgument;
    }
    let Some(engine) = (unsafe { engine_mut(context) }) else {
        return SeError::InvalidContext;
    };
    match engine.fetch(block_idx as usize) {
        Ok(result) => {
            unsafe { *info = SeBlockInfo { lines: result.lines, max_length: result.max_length } };
            SeError::NoError
        }
        Err(e) => e.into(),
    }
}

/// # Safety
/// Same preconditions as [`se_fetch`].
#[no_mangle]
pub unsafe extern "C" fn se_filter(context: *mut SeContext, block_idx: u32, info: *mut SeBlockInfo) -> SeError {
    if info.is_null() {
        return SeError::BadArgument;
    }
    let Some(engine) = (unsafe { engine_mut(context) }) else {
        return SeError::InvalidContext;
    };
    match engine.filter(block_idx as usize) {
        Ok(result) => {
            unsafe { *info = SeBlockInfo { lines: result.lines, max_length: result.max_length } };
            SeError::NoError
        }
        Err(e) => e.into(),
    }
}

/// # Safety
/// `context` must have been initialized by `se_init`. `filtered_lines` must point to a
/// valid, writable `u32` that is accumulated into (matching the source's out-param).
#[no_mangle]
pub unsafe extern "C" fn se_merge_scope(context: *mut SeContext, filtered_lines: *mut u32) -> SeError {
    if filtered_lines.is_null() {
        return SeError::BadArgument;
    }
    let Some(engine) = (unsafe { engine_mut(context) }) else {
        return SeError::InvalidContext;
    };
    match engine.merge_scope() {
        Ok(extra) => {
            unsafe { *filtered_lines += extra };
            SeError::NoError
        }
        Err(e) => e.into(),
    }
}

/// # Safety
/// Same preconditions as [`se_fetch`]; `line_info` must point to valid, writable
/// `SeLineInfo` storage.
#[no_mangle]
pub unsafe extern "C" fn se_get_line(context: *mut SeContext, line_number: u32, line_info: *mut SeLineInfo) -> SeError {
    if line_info.is_null() {
        return SeError::BadArgument;
    }
    let Some(engine) = (unsafe { engine_mut(context) }) else {
        return SeError::InvalidContext;
    };
    match engine.get_line(line_number) {
        Ok(view) => {
            unsafe {
                *line_info = SeLineInfo {
                    line: view.line.as_ptr(),
                    length: view.line.len() as u32,
                    number: view.number,
                    scope: view.scope,
                };
            }
            SeError::NoError
        }
        Err(e) => e.into(),
    }
}

/// # Safety
/// Same preconditions as [`se_fetch`]; `row` must point to a valid, writable `u32`.
#[no_mangle]
pub unsafe extern "C" fn se_get_row_for_abs_line(context: *mut SeContext, abs_line: u32, row: *mut u32) -> SeError {
    if row.is_null() {
        return SeError::BadArgument;
    }
    let Some(engine) = (unsafe { engine_mut(context) }) else {
        return SeError::InvalidContext;
    };
    match engine.get_row_for_abs_line(abs_line) {
        Ok(r) => {
            unsafe { *row = r };
            SeError::NoError
        }
        Err(e) => e.into(),
    }
}

/// # Safety
/// `context` must have been initialized by `se_init`.
#[no_mangle]
pub unsafe extern "C" fn se_is_filtered(context: *mut SeContext) -> bool {
    unsafe { engine_mut(context) }.map(|e| e.is_filtered()).unwrap_or(false)
}

/// # Safety
/// `context` must have been initialized by `se_init`. `pattern` must be a valid,
/// NUL-terminated C string. `error`, if non-null, must point to at least
/// `MAX_ERROR_LENGTH` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn se_set_pattern(context: *mut SeContext, pattern: *const c_char, error: *mut c_char) -> SeError {
    if pattern.is_null() {
        return SeError::BadArgument;
    }
    let Some(engine) = (unsafe { engine_mut(context) }) else {
        return SeError::InvalidContext;
    };
    let pattern_str = match unsafe { CStr::from_ptr(pattern) }.to_str() {
        Ok(s) => s,
        Err(_) => return SeError::BadArgument,
    };
    match engine.set_pattern(pattern_str) {
        Ok(()) => SeError::NoError,
        Err(e) => {
            if !error.is_null() {
                write_c_error(error, &e.to_string());
            }
            e.into()
        }
    }
}

fn write_c_error(dst: *mut c_char, message: &str) {
    let bytes = message.as_bytes();
    let n = bytes.len().min(MAX_ERROR_LENGTH - 1);
    unsafe {
        ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, dst, n);
        *dst.add(n) = 0;
    }
}

/// # Safety
/// `context` must have been initialized by `se_init`.
#[no_mangle]
pub unsafe extern "C" fn se_set_ignore_case(context: *mut SeContext, ignore_case: bool) -> SeError {
    let Some(engine) = (unsafe { engine_mut(context) }) else {
        return SeError::InvalidContext;
    };
    engine.set_ignore_case(ignore_case);
    SeError::NoError
}

/// # Safety
/// `context` must have been initialized by `se_init`. `before`/`after` are clamped to
/// `MAX_SCOPE_BEFORE`/`MAX_SCOPE_AFTER` by the underlying trackers.
#[no_mangle]
pub unsafe extern "C" fn se_set_scope(context: *mut SeContext, before: u32, after: u32) -> SeError {
    let Some(engine) = (unsafe { engine_mut(context) }) else {
        return SeError::InvalidContext;
    };
    let before = before.min(MAX_SCOPE_BEFORE as u32);
    let after = after.min(MAX_SCOPE_AFTER as u32);
    engine.set_scope(before, after);
    SeError::NoError
}

/// # Safety
/// `context` must have been initialized by `se_init` and must not be used again after
/// this call (mirrors the source's `se_destroy`).
#[no_mangle]
pub unsafe extern "C" fn se_destroy(context: *mut SeContext) {
    if context.is_null() {
        return;
    }
    let ctx = unsafe { &mut *context };
    if !ctx.engine.is_null() {
        drop(unsafe { Box::from_raw(ctx.engine) });
        ctx.engine = ptr::null_mut();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::io::Write;

    #[test]
    fn init_fetch_get_line_destroy_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"alpha\nbeta\n").unwrap();
        file.flush().unwrap();

        let path = CString::new(file.path().to_str().unwrap()).unwrap();
        let mut context = SeContext { engine: ptr::null_mut(), blocks: 0, bytes: 0 };

        unsafe {
            assert_eq!(se_init(path.as_ptr(), &mut context), SeError::NoError);
            assert_eq!(context.blocks, 1);

            let mut info = SeBlockInfo::default();
            assert_eq!(se_fetch(&mut context, 0, &mut info), SeError::NoError);
            assert_eq!(info.lines, 2);

            let mut line = SeLineInfo { line: ptr::null(), length: 0, number: 0, scope: false };
            assert_eq!(se_get_line(&mut context, 0, &mut line), SeError::NoError);
            let slice = std::slice::from_raw_parts(line.line, line.length as usize);
            assert_eq!(slice, b"alpha");

            se_destroy(&mut context);
            assert!(context.engine.is_null());
        }
    }

    #[test]
    fn null_pointers_return_bad_argument_or_invalid_context() {
        unsafe {
            assert_eq!(se_init(ptr::null(), ptr::null_mut()), SeError::BadArgument);
            let mut info = SeBlockInfo::default();
            let mut empty_ctx = SeContext { engine: ptr::null_mut(), blocks: 0, bytes: 0 };
            assert_eq!(se_fetch(&mut empty_ctx, 0, &mut info), SeError::InvalidContext);
        }
    }
}
