//! C ABI DLL for deskauto -- loadable by ctypes, C#, or any FFI consumer.
//!
//! All exported functions follow the convention:
//! - Return `i32` status code: `DKA_OK=0`, `DKA_ERROR=-1`
//! - String outputs allocated by Rust, freed via `dka_free_string()`
//! - Last error retrievable via `dka_last_error()`

use std::cell::RefCell;
use std::ffi::{c_char, CStr, CString};
use std::ptr;

use deskauto_core::sequence::CompileOptions;
use deskauto_core::sink::{send_markup, DeliveryMode};

pub const DKA_OK: i32 = 0;
pub const DKA_ERROR: i32 = -1;

/// `mode` argument of [`dka_send`].
pub const DKA_MODE_INJECTED: i32 = 0;
pub const DKA_MODE_GAME: i32 = 1;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Borrow a C string argument as UTF-8, recording the failure reason.
///
/// # Safety
///
/// `ptr` must be null or a valid null-terminated C string that outlives `'a`.
unsafe fn arg_str<'a>(ptr: *const c_char, name: &str) -> Option<&'a str> {
    if ptr.is_null() {
        set_last_error(&format!("{name} is null"));
        return None;
    }
    match unsafe { CStr::from_ptr(ptr) }.to_str() {
        Ok(s) => Some(s),
        Err(e) => {
            set_last_error(&format!("Invalid UTF-8: {e}"));
            None
        }
    }
}

fn options_from_raw(open: u32, close: u32, strict: i32) -> Option<CompileOptions> {
    let defaults = CompileOptions::default();
    let delimiter = |raw: u32, fallback: char| {
        if raw == 0 {
            Some(fallback)
        } else {
            char::from_u32(raw)
        }
    };
    match (delimiter(open, defaults.open), delimiter(close, defaults.close)) {
        (Some(open), Some(close)) => Some(CompileOptions {
            open,
            close,
            strict_modifiers: strict != 0,
        }),
        _ => {
            set_last_error("delimiter is not a valid Unicode scalar value");
            None
        }
    }
}

fn mode_from_raw(mode: i32, delay_ms: u32) -> Option<DeliveryMode> {
    match mode {
        DKA_MODE_INJECTED => Some(DeliveryMode::Injected),
        DKA_MODE_GAME => Some(DeliveryMode::game_style(
            (delay_ms != 0).then_some(u64::from(delay_ms)),
        )),
        other => {
            set_last_error(&format!("unknown delivery mode: {other}"));
            None
        }
    }
}

/// Retrieve the last error message (thread-local).
///
/// Returns a pointer valid until the next dka_* call on this thread.
/// Returns null if no error has occurred.
#[no_mangle]
pub extern "C" fn dka_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|s| s.as_ptr())
            .unwrap_or(ptr::null())
    })
}

/// Free a string previously allocated by a dka_* function.
///
/// # Safety
///
/// `ptr` must be a pointer returned by a dka_* function or null.
#[no_mangle]
pub unsafe extern "C" fn dka_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}

/// Compile markup with the default `[` / `]` delimiters into a JSON array
/// of events.
///
/// # Safety
///
/// `text` must be a valid null-terminated UTF-8 C string.
/// `out_json` must be a valid pointer to a `*mut c_char`.
/// On success, `*out_json` is set to a heap-allocated JSON C string.
/// Caller must free with `dka_free_string()`.
#[no_mangle]
pub unsafe extern "C" fn dka_compile(text: *const c_char, out_json: *mut *mut c_char) -> i32 {
    unsafe { dka_compile_with(text, 0, 0, 0, out_json) }
}

/// Compile markup with explicit options.
///
/// `open` / `close` are Unicode code points (0 selects the default).
/// A non-zero `strict` rejects modifier blocks with nothing after them.
///
/// # Safety
///
/// Same contract as [`dka_compile`].
#[no_mangle]
pub unsafe extern "C" fn dka_compile_with(
    text: *const c_char,
    open: u32,
    close: u32,
    strict: i32,
    out_json: *mut *mut c_char,
) -> i32 {
    if out_json.is_null() {
        set_last_error("out_json is null");
        return DKA_ERROR;
    }
    let Some(text_str) = (unsafe { arg_str(text, "text") }) else {
        return DKA_ERROR;
    };
    let Some(options) = options_from_raw(open, close, strict) else {
        return DKA_ERROR;
    };

    match deskauto_core::sequence::compile_with(text_str, options) {
        Ok(events) => match serde_json::to_string(&events) {
            Ok(json) => match CString::new(json) {
                Ok(cstr) => {
                    unsafe { *out_json = cstr.into_raw() };
                    DKA_OK
                }
                Err(e) => {
                    set_last_error(&format!("CString conversion failed: {e}"));
                    DKA_ERROR
                }
            },
            Err(e) => {
                set_last_error(&format!("JSON serialization failed: {e}"));
                DKA_ERROR
            }
        },
        Err(e) => {
            set_last_error(&format!("CompileError: {e}"));
            DKA_ERROR
        }
    }
}

/// Compile markup and send it via SendInput.
///
/// `mode` is `DKA_MODE_INJECTED` or `DKA_MODE_GAME`; `delay_ms` applies to
/// game mode only (0 selects the default delay).
///
/// # Safety
///
/// `text` must be a valid null-terminated UTF-8 C string.
/// `out_count` must be null or a valid pointer to a `u32`.
#[no_mangle]
pub unsafe extern "C" fn dka_send(
    text: *const c_char,
    mode: i32,
    delay_ms: u32,
    out_count: *mut u32,
) -> i32 {
    let Some(text_str) = (unsafe { arg_str(text, "text") }) else {
        return DKA_ERROR;
    };
    let Some(mode) = mode_from_raw(mode, delay_ms) else {
        return DKA_ERROR;
    };

    let result = deskauto_core::input::injector(mode)
        .and_then(|sink| send_markup(text_str, CompileOptions::default(), sink.as_ref()));
    match result {
        Ok(count) => {
            if !out_count.is_null() {
                unsafe { *out_count = count };
            }
            DKA_OK
        }
        Err(e) => {
            set_last_error(&e.to_string());
            DKA_ERROR
        }
    }
}

/// Compile markup and post it to the window `hwnd`.
///
/// # Safety
///
/// `text` must be a valid null-terminated UTF-8 C string.
/// `out_count` must be null or a valid pointer to a `u32`.
#[no_mangle]
pub unsafe extern "C" fn dka_post(text: *const c_char, hwnd: isize, out_count: *mut u32) -> i32 {
    let Some(text_str) = (unsafe { arg_str(text, "text") }) else {
        return DKA_ERROR;
    };

    let result = deskauto_core::input::poster(hwnd)
        .and_then(|sink| send_markup(text_str, CompileOptions::default(), sink.as_ref()));
    match result {
        Ok(count) => {
            if !out_count.is_null() {
                unsafe { *out_count = count };
            }
            DKA_OK
        }
        Err(e) => {
            set_last_error(&e.to_string());
            DKA_ERROR
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
