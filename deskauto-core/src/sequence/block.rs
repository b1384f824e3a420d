//! Grammar of a named block's inner text.
//!
//! ```text
//! block  := keyname (" " option)*
//! option := "text" | "down" | "up" | <integer>
//! ```
//!
//! Options are case-insensitive and each may appear at most once.  Key
//! names are not resolved here; that happens in the compile stage.

use crate::errors::CompileError;
use crate::sequence::event::KeyState;

/// Parsed interpretation of a `[...]` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockDescriptor {
    pub key_name: String,
    /// Type `key_name` as characters instead of pressing a key.
    pub as_text: bool,
    /// Emit only this half of the transition.
    pub state: Option<KeyState>,
    pub repeat: u32,
}

impl BlockDescriptor {
    /// Parse block text found at `position` (index of the open delimiter).
    pub(crate) fn parse(position: usize, raw: &str) -> Result<Self, CompileError> {
        let invalid = |reason: &'static str| CompileError::InvalidBlockGrammar {
            position,
            block: raw.to_owned(),
            reason,
        };

        let mut parts = raw.split(' ');
        let key_name = match parts.next() {
            Some(name) if !name.is_empty() => name,
            _ => return Err(invalid("missing key name")),
        };

        let mut as_text = false;
        let mut state: Option<KeyState> = None;
        let mut repeat: Option<u32> = None;

        for part in parts {
            if part.is_empty() {
                return Err(invalid("options must be separated by a single space"));
            }

            if part.eq_ignore_ascii_case("text") {
                if as_text {
                    return Err(invalid("`text` given twice"));
                }
                as_text = true;
                continue;
            }

            let requested = if part.eq_ignore_ascii_case("down") {
                Some(KeyState::Down)
            } else if part.eq_ignore_ascii_case("up") {
                Some(KeyState::Up)
            } else {
                None
            };
            if let Some(requested) = requested {
                match state {
                    None => state = Some(requested),
                    Some(prev) if prev == requested => {
                        return Err(invalid("key state given twice"));
                    }
                    Some(_) => {
                        return Err(CompileError::ConflictingState {
                            position,
                            key: key_name.to_owned(),
                        });
                    }
                }
                continue;
            }

            if looks_numeric(part) {
                if repeat.is_some() {
                    return Err(invalid("more than one repeat count"));
                }
                // Counts too negative for i64 saturate so they still report
                // as non-positive.
                let value: i64 = match part.parse() {
                    Ok(value) => value,
                    Err(_) if part.starts_with('-') => i64::MIN,
                    Err(_) => return Err(invalid("repeat count out of range")),
                };
                if value <= 0 {
                    return Err(CompileError::NegativeOrZeroRepeat { position, value });
                }
                let count =
                    u32::try_from(value).map_err(|_| invalid("repeat count out of range"))?;
                repeat = Some(count);
                continue;
            }

            return Err(invalid("unrecognised option"));
        }

        if as_text && state.is_some() {
            return Err(invalid("`text` cannot be combined with `down` or `up`"));
        }

        Ok(Self {
            key_name: key_name.to_owned(),
            as_text,
            state,
            repeat: repeat.unwrap_or(1),
        })
    }
}

/// Optional sign followed by at least one ASCII digit.
fn looks_numeric(part: &str) -> bool {
    let digits = part.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(part);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
