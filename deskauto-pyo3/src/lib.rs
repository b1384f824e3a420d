//! `deskauto` -- Thin PyO3 wrappers around `deskauto_core`.
//!
//! Each function releases the GIL via `py.allow_threads()` and converts
//! the Rust result to Python objects.  All business logic lives in
//! `deskauto_core`.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use deskauto_core::errors::DeskAutoError;
use deskauto_core::keys::{KeyDescriptor, KeyKind, KeyTable, StandardKeys};
use deskauto_core::sequence::{normalize_key_name, CompileOptions, Event, KeyState, Target};
use deskauto_core::sink::{send_markup, DeliveryMode};
use deskauto_core::window::{WindowInfo, WindowQuery};

// ---------------------------------------------------------------------------
// Error conversion helper
// ---------------------------------------------------------------------------

/// Markup errors are the caller's fault (`ValueError`); everything else is
/// an environment failure (`RuntimeError`).
fn to_py_err(e: DeskAutoError) -> PyErr {
    match e {
        DeskAutoError::Compile(inner) => PyValueError::new_err(inner.to_string()),
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

fn options(open: char, close: char, strict: bool) -> CompileOptions {
    CompileOptions {
        open,
        close,
        strict_modifiers: strict,
    }
}

// ---------------------------------------------------------------------------
// Rust -> Python dict conversion
// ---------------------------------------------------------------------------

fn kind_name(kind: KeyKind) -> &'static str {
    match kind {
        KeyKind::Keyboard { .. } => "keyboard",
        KeyKind::Mouse { .. } => "mouse",
        KeyKind::Wheel { .. } => "wheel",
    }
}

fn key_to_py_dict<'py>(py: Python<'py>, key: &KeyDescriptor) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("name", key.name)?;
    dict.set_item("vk", key.vk)?;
    dict.set_item("kind", kind_name(key.kind))?;
    dict.set_item("stateless", key.is_stateless())?;
    Ok(dict)
}

/// `{"key": ..., "vk": ..., "char": ..., "state": "down"|"up", "is_text_injection": ...}`
fn event_to_py_dict<'py>(py: Python<'py>, event: &Event) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    match event.target {
        Target::Key(key) => {
            dict.set_item("key", key.name)?;
            dict.set_item("vk", key.vk)?;
            dict.set_item("char", py.None())?;
        }
        Target::Char(ch) => {
            dict.set_item("key", py.None())?;
            dict.set_item("vk", py.None())?;
            dict.set_item("char", ch.to_string())?;
        }
    }
    let state = match event.state {
        KeyState::Down => "down",
        KeyState::Up => "up",
    };
    dict.set_item("state", state)?;
    dict.set_item("is_text_injection", event.is_text_injection)?;
    Ok(dict)
}

fn window_to_py_dict<'py>(py: Python<'py>, w: &WindowInfo) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("hwnd", w.hwnd)?;
    dict.set_item("title", &w.title)?;
    dict.set_item("class_name", &w.class_name)?;
    dict.set_item("pid", w.pid)?;
    dict.set_item("is_minimized", w.is_minimized)?;
    dict.set_item("is_foreground", w.is_foreground)?;
    Ok(dict)
}

// ---------------------------------------------------------------------------
// compile / resolve_key
// ---------------------------------------------------------------------------

/// Compile `[...]` markup into a list of event dicts.
#[pyfunction]
#[pyo3(signature = (text, open='[', close=']', strict=false))]
fn compile(py: Python<'_>, text: &str, open: char, close: char, strict: bool) -> PyResult<PyObject> {
    let text_owned = text.to_owned();
    let events = py
        .allow_threads(move || {
            deskauto_core::sequence::compile_with(&text_owned, options(open, close, strict))
        })
        .map_err(|e| to_py_err(e.into()))?;

    let result = PyList::empty(py);
    for event in &events {
        result.append(event_to_py_dict(py, event)?)?;
    }
    Ok(result.into())
}

/// Look up a key name; returns `None` for unknown names.
#[pyfunction]
#[pyo3(signature = (name,))]
fn resolve_key(py: Python<'_>, name: &str) -> PyResult<PyObject> {
    match StandardKeys.resolve(&normalize_key_name(name)) {
        Some(key) => Ok(key_to_py_dict(py, &key)?.into()),
        None => Ok(py.None()),
    }
}

// ---------------------------------------------------------------------------
// delivery
// ---------------------------------------------------------------------------

/// Compile markup and send it via SendInput.
///
/// `mode` is `"injected"` (one atomic batch) or `"game"` (scan codes, one
/// event at a time, `delay_ms` apart).
#[pyfunction]
#[pyo3(signature = (text, mode="injected", delay_ms=None, open='[', close=']', strict=false))]
fn send(
    py: Python<'_>,
    text: &str,
    mode: &str,
    delay_ms: Option<u64>,
    open: char,
    close: char,
    strict: bool,
) -> PyResult<u32> {
    let mode = match mode.to_lowercase().as_str() {
        "injected" => DeliveryMode::Injected,
        "game" => DeliveryMode::game_style(delay_ms),
        other => {
            return Err(PyValueError::new_err(format!(
                "unknown delivery mode: {other}"
            )))
        }
    };
    let text_owned = text.to_owned();
    py.allow_threads(move || {
        let sink = deskauto_core::input::injector(mode)?;
        send_markup(&text_owned, options(open, close, strict), sink.as_ref())
    })
    .map_err(to_py_err)
}

/// Compile markup and post it to the window `hwnd`.
#[pyfunction]
#[pyo3(signature = (text, hwnd, open='[', close=']', strict=false))]
fn post(
    py: Python<'_>,
    text: &str,
    hwnd: isize,
    open: char,
    close: char,
    strict: bool,
) -> PyResult<u32> {
    let text_owned = text.to_owned();
    py.allow_threads(move || {
        let sink = deskauto_core::input::poster(hwnd)?;
        send_markup(&text_owned, options(open, close, strict), sink.as_ref())
    })
    .map_err(to_py_err)
}

// ---------------------------------------------------------------------------
// windows
// ---------------------------------------------------------------------------

/// List top-level windows that can receive input, optionally filtered by a
/// case-insensitive title substring.
#[pyfunction]
#[pyo3(signature = (title=None,))]
fn list_windows(py: Python<'_>, title: Option<String>) -> PyResult<PyObject> {
    let query = WindowQuery {
        title,
        ..WindowQuery::default()
    };
    let windows = py
        .allow_threads(move || deskauto_core::window::find_windows(&query))
        .map_err(to_py_err)?;

    let result = PyList::empty(py);
    for w in &windows {
        result.append(window_to_py_dict(py, w)?)?;
    }
    Ok(result.into())
}

// ---------------------------------------------------------------------------
// Module registration
// ---------------------------------------------------------------------------

/// Register the `deskauto` Python module.
#[pymodule]
fn deskauto(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(compile, m)?)?;
    m.add_function(wrap_pyfunction!(resolve_key, m)?)?;
    m.add_function(wrap_pyfunction!(send, m)?)?;
    m.add_function(wrap_pyfunction!(post, m)?)?;
    m.add_function(wrap_pyfunction!(list_windows, m)?)?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("__doc__", "Input markup compiler and delivery for Windows desktop automation.")?;

    Ok(())
}
