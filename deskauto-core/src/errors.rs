//! Error types for `deskauto_core`.
//!
//! Markup failures are reported as [`CompileError`], which always carries
//! the character index of the offending input.  Everything else (delivery,
//! window lookup, platform support) is funnelled through [`DeskAutoError`].
//! Both use `thiserror` for `Display` and `Error` derives.  Python and C ABI
//! conversion is handled in the binding crates.

use thiserror::Error;

/// A markup string that could not be compiled into an event sequence.
///
/// Positions are character (not byte) indices into the original input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// An open delimiter has no matching close delimiter.
    #[error("unterminated block opened at position {position}")]
    UnterminatedBlock { position: usize },

    /// A block encloses zero characters.
    #[error("empty block at position {position}")]
    EmptyBlock { position: usize },

    /// A bare close delimiter appears outside any block.
    #[error("unexpected close delimiter at position {position} (write it twice to type it)")]
    UnexpectedCloseChar { position: usize },

    /// Block text does not match `keyname (text|down|up|<count>)*`.
    #[error("invalid block `{block}` at position {position}: {reason}")]
    InvalidBlockGrammar {
        position: usize,
        block: String,
        reason: &'static str,
    },

    /// Both `down` and `up` requested, or `up` on a key that cannot be released.
    #[error("conflicting key state for `{key}` at position {position}")]
    ConflictingState { position: usize, key: String },

    /// Key name not present in the key table.
    #[error("unknown key name `{name}` at position {position}")]
    UnknownKeyName { position: usize, name: String },

    /// Repeat count parsed as an integer but is not positive.
    #[error("repeat count {value} at position {position} must be positive")]
    NegativeOrZeroRepeat { position: usize, value: i64 },

    /// The compiled sequence would exceed [`crate::sequence::MAX_EVENTS`].
    #[error("block at position {position} would exceed the {limit} event limit")]
    EventLimitExceeded { position: usize, limit: usize },

    /// Modifiers left pending at end of input (strict mode only).
    #[error("modifier block at position {position} is not followed by anything to modify")]
    DanglingModifiers { position: usize },

    /// Delimiter pair cannot be scanned unambiguously.
    #[error("invalid delimiters {open:?} / {close:?}")]
    InvalidDelimiters { open: char, close: char },
}

impl CompileError {
    /// Character index the error refers to, if it refers to one.
    pub fn position(&self) -> Option<usize> {
        match self {
            CompileError::UnterminatedBlock { position }
            | CompileError::EmptyBlock { position }
            | CompileError::UnexpectedCloseChar { position }
            | CompileError::InvalidBlockGrammar { position, .. }
            | CompileError::ConflictingState { position, .. }
            | CompileError::UnknownKeyName { position, .. }
            | CompileError::NegativeOrZeroRepeat { position, .. }
            | CompileError::EventLimitExceeded { position, .. }
            | CompileError::DanglingModifiers { position } => Some(*position),
            CompileError::InvalidDelimiters { .. } => None,
        }
    }
}

/// Top-level error type for the `deskauto_core` library.
///
/// Each variant corresponds to a distinct subsystem.
#[derive(Debug, Error)]
pub enum DeskAutoError {
    /// Markup compilation failure.
    #[error("CompileError: {0}")]
    Compile(#[from] CompileError),

    /// Input delivery failure (SendInput / PostMessage).
    #[error("InputError: {0}")]
    InputError(String),

    /// Window enumeration or lookup failure.
    #[error("WindowError: {0}")]
    WindowError(String),

    /// Operation needs a platform this build does not target.
    #[error("Unsupported: {0}")]
    Unsupported(&'static str),
}

/// Convert a `windows::core::Error` (Win32 failure) into a
/// `DeskAutoError::InputError`.
#[cfg(windows)]
impl From<windows::core::Error> for DeskAutoError {
    fn from(err: windows::core::Error) -> Self {
        DeskAutoError::InputError(format!("Win32 error: {err}"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
