//! Input markup compiler.
//!
//! [`compile`] turns a markup string such as `"Hello [Enter 3][+!][a]"`
//! into the ordered list of [`Event`]s an [`EventSink`](crate::sink::EventSink)
//! replays.  The work happens in two pure stages:
//!
//! 1. `scanner` -- line-break pre-pass and the `Scanning` / `InBlock`
//!    state machine, producing positioned tokens.
//! 2. [`Compiler::compile`] -- resolves key names against a [`KeyTable`],
//!    applies pending modifiers and expands repeat counts.
//!
//! # Markup
//!
//! | Markup | Meaning |
//! |--------|---------|
//! | `abc` | type the characters |
//! | `[[` / `]]` | literal `[` / `]` |
//! | `[Enter]` | press and release a named key |
//! | `[Tab 3]` | three presses |
//! | `[LShift down]` / `[LShift up]` | one half of the transition only |
//! | `[hello 2 text]` | type `hello` twice |
//! | `[+!#^]` | hold Shift / Alt / Win / Ctrl around the next token |
//!
//! A single-digit key name means the top-row digit key (`[1]` is `[D1]`).
//! Line breaks in the input press Enter.
//!
//! The compiler holds no state between calls and is safe to share across
//! threads.

mod block;
pub mod event;
mod scanner;

use std::borrow::Cow;

use crate::errors::CompileError;
use crate::keys::{KeyDescriptor, KeyTable, StandardKeys};

pub use event::{Event, KeyState, Target};
pub use scanner::{Modifier, ModifierSet};

use block::BlockDescriptor;
use scanner::{Spanned, Token};

/// Upper bound on the events `[...]` blocks may expand to in one call.
/// Literal characters are not counted, so plain text of any length compiles.
pub const MAX_EVENTS: usize = 100_000;

/// Prefix that turns a bare digit into its key name (`1` → `D1`).
const DIGIT_KEY_PREFIX: &str = "D";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Per-call compiler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub open: char,
    pub close: char,
    /// Reject modifier blocks left dangling at end of input instead of
    /// discarding them.
    pub strict_modifiers: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            open: '[',
            close: ']',
            strict_modifiers: false,
        }
    }
}

impl CompileOptions {
    /// Delimiters must differ and must not be whitespace or shorthand
    /// symbols, otherwise scanning would be ambiguous.
    pub fn validate(&self) -> Result<(), CompileError> {
        let usable = |c: char| !c.is_whitespace() && Modifier::from_symbol(c).is_none();
        if self.open == self.close || !usable(self.open) || !usable(self.close) {
            return Err(CompileError::InvalidDelimiters {
                open: self.open,
                close: self.close,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Compiler
// ---------------------------------------------------------------------------

/// Rewrite a single digit to its top-row key name; other names pass through.
pub fn normalize_key_name(name: &str) -> Cow<'_, str> {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(d), None) if d.is_ascii_digit() => Cow::Owned(format!("{DIGIT_KEY_PREFIX}{d}")),
        _ => Cow::Borrowed(name),
    }
}

/// Compiles markup against a key table.
pub struct Compiler<'t, T: KeyTable + ?Sized = StandardKeys> {
    table: &'t T,
    options: CompileOptions,
}

impl<'t, T: KeyTable + ?Sized> Compiler<'t, T> {
    pub fn new(table: &'t T) -> Self {
        Self {
            table,
            options: CompileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile `text` into a complete event sequence, or fail wholesale.
    pub fn compile(&self, text: &str) -> Result<Vec<Event>, CompileError> {
        self.options.validate()?;
        let tokens = scanner::tokenize(text, self.options.open, self.options.close)?;

        let mut events: Vec<Event> = Vec::with_capacity(tokens.len() * 2);
        let mut pending: Option<(usize, ModifierSet)> = None;
        let mut expanded: usize = 0;

        for Spanned { position, token } in tokens {
            log::trace!("token at {position}: {token:?}");
            match token {
                Token::Modifiers(set) => match pending.as_mut() {
                    Some((_, held)) => held.merge(&set),
                    None => pending = Some((position, set)),
                },
                Token::Char(ch) => {
                    let held = take_held(&mut pending);
                    self.emit_char(position, ch, &held, &mut events)?;
                }
                Token::Block(block) => {
                    let held = take_held(&mut pending);
                    self.emit_block(position, &block, &held, &mut expanded, &mut events)?;
                }
            }
        }

        if let Some((position, _)) = pending {
            if self.options.strict_modifiers {
                return Err(CompileError::DanglingModifiers { position });
            }
            log::warn!("discarding modifier block at position {position}: nothing follows it");
        }

        log::debug!(
            "compiled {} chars into {} events",
            text.chars().count(),
            events.len()
        );
        Ok(events)
    }

    fn resolve(&self, position: usize, name: &str) -> Result<KeyDescriptor, CompileError> {
        self.table
            .resolve(&normalize_key_name(name))
            .ok_or_else(|| CompileError::UnknownKeyName {
                position,
                name: name.to_owned(),
            })
    }

    /// A literal char.  When modifiers are held and the char names a key
    /// (`a`, `7`), the key is pressed so shortcuts like Ctrl+A work.
    fn emit_char(
        &self,
        position: usize,
        ch: char,
        held: &ModifierSet,
        events: &mut Vec<Event>,
    ) -> Result<(), CompileError> {
        let target = if !held.is_empty() && ch.is_ascii_alphanumeric() {
            let mut buf = [0u8; 4];
            match self.table.resolve(&normalize_key_name(ch.encode_utf8(&mut buf))) {
                Some(key) => Target::Key(key),
                None => Target::Char(ch),
            }
        } else {
            Target::Char(ch)
        };

        events.reserve(2 + 2 * held.len());
        press(held, events);
        events.push(Event::new(target, KeyState::Down));
        events.push(Event::new(target, KeyState::Up));
        release(held, events);
        Ok(())
    }

    fn emit_block(
        &self,
        position: usize,
        block: &BlockDescriptor,
        held: &ModifierSet,
        expanded: &mut usize,
        events: &mut Vec<Event>,
    ) -> Result<(), CompileError> {
        let repeat = block.repeat as usize;

        if block.as_text {
            let chars: Vec<char> = block.key_name.chars().collect();
            let body = chars.len().saturating_mul(2).saturating_mul(repeat);
            charge(position, expanded, body)?;
            events.reserve(body.saturating_add(2 * held.len()));
            press(held, events);
            for _ in 0..repeat {
                for &ch in &chars {
                    events.push(Event::char(ch, KeyState::Down));
                    events.push(Event::char(ch, KeyState::Up));
                }
            }
            release(held, events);
            return Ok(());
        }

        let key = self.resolve(position, &block.key_name)?;
        let stateless = key.is_stateless();
        let body = match block.state {
            Some(KeyState::Up) if stateless => {
                return Err(CompileError::ConflictingState {
                    position,
                    key: key.name.to_owned(),
                });
            }
            Some(_) => 1,
            None if stateless => repeat,
            None => repeat.saturating_mul(2),
        };
        charge(position, expanded, body)?;
        events.reserve(body.saturating_add(2 * held.len()));

        press(held, events);
        match block.state {
            Some(state) => events.push(Event::key(key, state)),
            None => {
                for _ in 0..repeat {
                    events.push(Event::key(key, KeyState::Down));
                    if !stateless {
                        events.push(Event::key(key, KeyState::Up));
                    }
                }
            }
        }
        release(held, events);
        Ok(())
    }
}

fn take_held(pending: &mut Option<(usize, ModifierSet)>) -> ModifierSet {
    pending.take().map(|(_, set)| set).unwrap_or_default()
}

/// Modifier downs, in acquisition order.
fn press(held: &ModifierSet, events: &mut Vec<Event>) {
    events.extend(held.iter().map(|m| Event::key(m.key(), KeyState::Down)));
}

/// Modifier ups, in reverse acquisition order.
fn release(held: &ModifierSet, events: &mut Vec<Event>) {
    events.extend(held.iter().rev().map(|m| Event::key(m.key(), KeyState::Up)));
}

/// Count `body` block events against [`MAX_EVENTS`] before they are built.
fn charge(position: usize, expanded: &mut usize, body: usize) -> Result<(), CompileError> {
    let total = expanded.saturating_add(body);
    if total > MAX_EVENTS {
        return Err(CompileError::EventLimitExceeded {
            position,
            limit: MAX_EVENTS,
        });
    }
    *expanded = total;
    Ok(())
}

// ---------------------------------------------------------------------------
// Public API -- free functions
// ---------------------------------------------------------------------------

/// Compile with the standard key table and `[` / `]` delimiters.
pub fn compile(text: &str) -> Result<Vec<Event>, CompileError> {
    Compiler::new(&StandardKeys).compile(text)
}

/// Compile with the standard key table and custom options.
pub fn compile_with(text: &str, options: CompileOptions) -> Result<Vec<Event>, CompileError> {
    Compiler::new(&StandardKeys).with_options(options).compile(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyKind, WheelDirection, LALT, RCTRL, RSHIFT};
    use proptest::prelude::*;

    fn key(name: &str) -> KeyDescriptor {
        StandardKeys.resolve(name).unwrap()
    }

    fn down(name: &str) -> Event {
        Event::key(key(name), KeyState::Down)
    }

    fn up(name: &str) -> Event {
        Event::key(key(name), KeyState::Up)
    }

    fn typed(text: &str) -> Vec<Event> {
        text.chars()
            .flat_map(|c| [Event::char(c, KeyState::Down), Event::char(c, KeyState::Up)])
            .collect()
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(compile("Hi!").unwrap(), typed("Hi!"));
        assert!(compile("").unwrap().is_empty());
    }

    #[test]
    fn test_escaped_delimiters() {
        assert_eq!(compile("[[").unwrap(), typed("["));
        assert_eq!(compile("]]").unwrap(), typed("]"));
    }

    #[test]
    fn test_named_key() {
        assert_eq!(compile("[Enter]").unwrap(), vec![down("Enter"), up("Enter")]);
    }

    #[test]
    fn test_repeat_count() {
        let events = compile("[Enter 3]").unwrap();
        assert_eq!(events.len(), 6);
        assert_eq!(events, [down("Enter"), up("Enter")].repeat(3));
    }

    #[test]
    fn test_explicit_state() {
        assert_eq!(compile("[Enter down]").unwrap(), vec![down("Enter")]);
        assert_eq!(compile("[Enter up]").unwrap(), vec![up("Enter")]);
        // Count is ignored when a state is given.
        assert_eq!(compile("[Enter down 4]").unwrap(), vec![down("Enter")]);
        assert!(matches!(
            compile("[Enter down up]"),
            Err(CompileError::ConflictingState { position: 0, .. })
        ));
    }

    #[test]
    fn test_stateless_key() {
        assert_eq!(compile("[WheelUp]").unwrap(), vec![down("WheelUp")]);
        assert_eq!(compile("[WheelUp 3]").unwrap(), vec![down("WheelUp"); 3]);
        assert_eq!(compile("[WheelUp down]").unwrap(), vec![down("WheelUp")]);
        assert!(matches!(
            compile("[WheelUp up]"),
            Err(CompileError::ConflictingState { .. })
        ));
    }

    #[test]
    fn test_modifiers_wrap_next_block() {
        let a = key("a");
        assert_eq!(
            compile("[+!][a]").unwrap(),
            vec![
                Event::key(RSHIFT, KeyState::Down),
                Event::key(LALT, KeyState::Down),
                Event::key(a, KeyState::Down),
                Event::key(a, KeyState::Up),
                Event::key(LALT, KeyState::Up),
                Event::key(RSHIFT, KeyState::Up),
            ]
        );
    }

    #[test]
    fn test_modifiers_apply_to_next_token_only() {
        let events = compile("[^]ab").unwrap();
        let a = key("a");
        assert_eq!(
            events,
            vec![
                Event::key(RCTRL, KeyState::Down),
                Event::key(a, KeyState::Down),
                Event::key(a, KeyState::Up),
                Event::key(RCTRL, KeyState::Up),
                Event::char('b', KeyState::Down),
                Event::char('b', KeyState::Up),
            ]
        );
    }

    #[test]
    fn test_modified_punctuation_stays_text() {
        let events = compile("[+]?").unwrap();
        assert_eq!(events[1], Event::char('?', KeyState::Down));
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn test_modified_digit_char_becomes_key() {
        let events = compile("[#]1").unwrap();
        assert_eq!(events[1], down("D1"));
    }

    #[test]
    fn test_consecutive_modifier_blocks_merge() {
        let merged = compile("[^][+][Tab]").unwrap();
        assert_eq!(merged, compile("[^+][Tab]").unwrap());
        // Repeating a held modifier across blocks is harmless.
        assert_eq!(compile("[^][^][Tab]").unwrap(), compile("[^][Tab]").unwrap());
    }

    #[test]
    fn test_modifiers_wrap_whole_repeat() {
        let events = compile("[^][z 2]").unwrap();
        let z = key("z");
        assert_eq!(events.first(), Some(&Event::key(RCTRL, KeyState::Down)));
        assert_eq!(events.last(), Some(&Event::key(RCTRL, KeyState::Up)));
        let press_z = [Event::key(z, KeyState::Down), Event::key(z, KeyState::Up)];
        assert_eq!(&events[1..5], &press_z.repeat(2)[..]);
    }

    #[test]
    fn test_dangling_modifiers() {
        assert_eq!(compile("ab[+]").unwrap(), typed("ab"));
        let strict = CompileOptions {
            strict_modifiers: true,
            ..CompileOptions::default()
        };
        assert_eq!(
            compile_with("ab[+]", strict),
            Err(CompileError::DanglingModifiers { position: 2 })
        );
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(
            compile("[abc"),
            Err(CompileError::UnterminatedBlock { position: 0 })
        );
        assert_eq!(compile("[]"), Err(CompileError::EmptyBlock { position: 0 }));
        assert_eq!(
            compile("x]"),
            Err(CompileError::UnexpectedCloseChar { position: 1 })
        );
    }

    #[test]
    fn test_unknown_key_reports_original_name() {
        assert_eq!(
            compile("ok [Nope]"),
            Err(CompileError::UnknownKeyName {
                position: 3,
                name: "Nope".into()
            })
        );
    }

    #[test]
    fn test_text_block_repeats_whole_string() {
        let events = compile("[Enter 5 text]").unwrap();
        assert_eq!(events, typed(&"Enter".repeat(5)));
        assert_eq!(events.iter().filter(|e| e.state == KeyState::Down).count(), 25);
        assert!(events.iter().all(|e| e.is_text_injection));
    }

    #[test]
    fn test_text_block_skips_key_lookup() {
        // `Nope` is not a key, and `1` is not rewritten to `D1`.
        assert_eq!(compile("[Nope text]").unwrap(), typed("Nope"));
        assert_eq!(compile("[1 text]").unwrap(), typed("1"));
    }

    #[test]
    fn test_digit_key_names() {
        assert_eq!(compile("[1]").unwrap(), vec![down("D1"), up("D1")]);
        assert_eq!(compile("[1]").unwrap(), compile("[d1]").unwrap());
    }

    #[test]
    fn test_key_names_case_insensitive() {
        assert_eq!(compile("[eNTER]").unwrap(), compile("[Enter]").unwrap());
    }

    #[test]
    fn test_line_breaks_press_enter() {
        let expected = [typed("a"), vec![down("Enter"), up("Enter")], typed("b")].concat();
        assert_eq!(compile("a\r\nb").unwrap(), expected);
        assert_eq!(compile("a\nb").unwrap(), expected);
        assert_eq!(compile("a\rb").unwrap(), expected);
    }

    #[test]
    fn test_modifier_then_line_break() {
        let events = compile("[^]\n").unwrap();
        assert_eq!(
            events,
            vec![
                Event::key(RCTRL, KeyState::Down),
                down("Enter"),
                up("Enter"),
                Event::key(RCTRL, KeyState::Up),
            ]
        );
    }

    #[test]
    fn test_mixed_sentence() {
        let events = compile("Hello [Enter 3][+!][a]").unwrap();
        assert_eq!(events.len(), 12 + 6 + 6);
        assert_eq!(&events[..12], &typed("Hello ")[..]);
    }

    #[test]
    fn test_event_limit() {
        assert!(matches!(
            compile("x[a 4000000000]"),
            Err(CompileError::EventLimitExceeded { position: 1, .. })
        ));
        assert!(matches!(
            compile("[abcdefghij 10000 text]"),
            Err(CompileError::EventLimitExceeded { .. })
        ));
        assert_eq!(compile("[a 50000]").unwrap().len(), MAX_EVENTS);
        // The budget is shared by every block in the call.
        assert!(matches!(
            compile("[a 25000] [a 25001]"),
            Err(CompileError::EventLimitExceeded { position: 10, .. })
        ));
    }

    #[test]
    fn test_long_plain_text_is_not_capped() {
        let text = "a".repeat(60_000);
        let events = compile(&text).unwrap();
        assert_eq!(events.len(), 120_000);
        assert!(events.iter().all(|e| e.is_text_injection));
        // Literal chars do not eat into the block budget either.
        let text = format!("{text}[a 50000]");
        assert_eq!(compile(&text).unwrap().len(), 120_000 + MAX_EVENTS);
    }

    #[test]
    fn test_custom_delimiters() {
        let opts = CompileOptions {
            open: '{',
            close: '}',
            ..CompileOptions::default()
        };
        let events = compile_with("{Tab}[", opts).unwrap();
        assert_eq!(events[..2], [down("Tab"), up("Tab")]);
        assert_eq!(events[2..], typed("[")[..]);
    }

    #[test]
    fn test_invalid_delimiters() {
        for (open, close) in [('[', '['), (' ', ']'), ('+', ']'), ('[', '^')] {
            let opts = CompileOptions {
                open,
                close,
                ..CompileOptions::default()
            };
            assert_eq!(
                compile_with("x", opts),
                Err(CompileError::InvalidDelimiters { open, close })
            );
        }
    }

    #[test]
    fn test_normalize_key_name() {
        assert_eq!(normalize_key_name("7"), "D7");
        assert_eq!(normalize_key_name("12"), "12");
        assert_eq!(normalize_key_name("a"), "a");
        assert!(matches!(normalize_key_name("Enter"), Cow::Borrowed(_)));
    }

    struct PadKeys;

    impl KeyTable for PadKeys {
        fn resolve(&self, name: &str) -> Option<KeyDescriptor> {
            match name.to_ascii_lowercase().as_str() {
                "fire" => Some(KeyDescriptor {
                    name: "Fire",
                    vk: 0x20,
                    kind: KeyKind::Keyboard { extended: false },
                }),
                "tick" => Some(KeyDescriptor {
                    name: "Tick",
                    vk: 0,
                    kind: KeyKind::Wheel {
                        direction: WheelDirection::Down,
                    },
                }),
                _ => None,
            }
        }
    }

    #[test]
    fn test_custom_key_table() {
        let compiler = Compiler::new(&PadKeys);
        let events = compiler.compile("[FIRE 2][tick]").unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(events[4].as_key().map(|k| k.name), Some("Tick"));
        assert!(matches!(
            compiler.compile("[Enter]"),
            Err(CompileError::UnknownKeyName { .. })
        ));
    }

    #[test]
    fn test_compiler_is_shareable() {
        let compiler = Compiler::new(&StandardKeys);
        std::thread::scope(|s| {
            let a = s.spawn(|| compiler.compile("[Tab 2]x"));
            let b = s.spawn(|| compiler.compile("[Tab 2]x"));
            assert_eq!(a.join().unwrap(), b.join().unwrap());
        });
    }

    proptest! {
        #[test]
        fn prop_bracket_free_text_types_each_char(text in "[^\\[\\]\r\n]{0,64}") {
            let events = compile(&text).unwrap();
            prop_assert_eq!(events, typed(&text));
        }

        #[test]
        fn prop_compile_is_deterministic(text in "[a-z \\[\\]+^]{0,32}") {
            prop_assert_eq!(compile(&text), compile(&text));
        }
    }
}
