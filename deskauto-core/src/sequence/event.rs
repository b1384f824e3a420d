//! Output unit of the sequence compiler.
//!
//! An [`Event`] is one down or up transition of a semantic key, or one half
//! of a typed character.  Events are `Copy`, hold no references into the
//! compiled text, and serialize to JSON for the worker and FFI layers.

use serde::Serialize;

use crate::keys::KeyDescriptor;

/// Which half of a transition an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    Down,
    Up,
}

/// What an event acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// A key from the key table.
    Key(KeyDescriptor),
    /// A literal character, typed independently of the keyboard layout.
    Char(char),
}

/// One key transition or one half of a typed character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Event {
    pub target: Target,
    pub state: KeyState,
    /// `true` for "type this character", `false` for "press this key".
    pub is_text_injection: bool,
}

impl Event {
    pub fn new(target: Target, state: KeyState) -> Self {
        Self {
            target,
            state,
            is_text_injection: matches!(target, Target::Char(_)),
        }
    }

    pub fn key(key: KeyDescriptor, state: KeyState) -> Self {
        Self {
            target: Target::Key(key),
            state,
            is_text_injection: false,
        }
    }

    pub fn char(ch: char, state: KeyState) -> Self {
        Self {
            target: Target::Char(ch),
            state,
            is_text_injection: true,
        }
    }

    /// The key descriptor, if this is a key event.
    pub fn as_key(&self) -> Option<&KeyDescriptor> {
        match &self.target {
            Target::Key(k) => Some(k),
            Target::Char(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
