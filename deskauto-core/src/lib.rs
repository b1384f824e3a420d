//! `deskauto_core` -- Pure Rust core library for deskauto.
//!
//! This crate contains all business logic with **no PyO3 dependency**.
//! It can be consumed by:
//! - `deskauto-pyo3` (PyO3 Python extension)
//! - `deskauto-ffi` (C ABI DLL for ctypes / other languages)
//! - `deskauto-cli` (standalone CLI tools)
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`errors`] | `CompileError` / `DeskAutoError` enums via `thiserror` |
//! | [`keys`] | Immutable semantic key table |
//! | [`sequence`] | `[...]` input markup → ordered key/char events |
//! | [`sink`] | `EventSink` trait, recording sink, compile-and-deliver |
//! | [`input`] | `SendInput` / `PostMessageW` delivery (Windows) |
//! | [`window`] | Top-level window lookup (Windows) |
//!
//! # Example
//!
//! ```
//! use deskauto_core::sequence::{compile, KeyState};
//!
//! let events = compile("hi[Enter]").unwrap();
//! assert_eq!(events.len(), 6);
//! assert_eq!(events[4].state, KeyState::Down);
//! ```

pub mod errors;
pub mod input;
pub mod keys;
pub mod sequence;
pub mod sink;
pub mod window;
