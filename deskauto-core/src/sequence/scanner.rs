//! Tokenize stage: markup text → positioned tokens.
//!
//! Line breaks are normalised first (`\r\n`, `\r`, `\n` all become one
//! Enter press), then a two-state machine walks the units left to right:
//!
//! | State | Input | Action |
//! |-------|-------|--------|
//! | `Scanning` | open, open | literal open |
//! | `Scanning` | open | enter `InBlock` |
//! | `Scanning` | close, close | literal close |
//! | `Scanning` | close | `UnexpectedCloseChar` |
//! | `Scanning` | line break | Enter block |
//! | `Scanning` | other | literal char |
//! | `InBlock` | close | classify block, back to `Scanning` |
//! | `InBlock` | line break | `UnterminatedBlock` |
//! | `InBlock` | other | accumulate |
//!
//! End of input while `InBlock` is `UnterminatedBlock`.

use crate::errors::CompileError;
use crate::keys::{KeyDescriptor, LALT, RCTRL, RSHIFT, RWIN};
use crate::sequence::block::BlockDescriptor;

/// Key name a line break compiles to.
const LINE_BREAK_KEY: &str = "Enter";

// ---------------------------------------------------------------------------
// Modifiers
// ---------------------------------------------------------------------------

/// A modifier that can be held with the shorthand block syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    /// `+`
    Shift,
    /// `!`
    Alt,
    /// `#`
    Win,
    /// `^`
    Ctrl,
}

impl Modifier {
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '+' => Some(Modifier::Shift),
            '!' => Some(Modifier::Alt),
            '#' => Some(Modifier::Win),
            '^' => Some(Modifier::Ctrl),
            _ => None,
        }
    }

    /// The physical key held for this modifier.
    pub fn key(self) -> KeyDescriptor {
        match self {
            Modifier::Shift => RSHIFT,
            Modifier::Alt => LALT,
            Modifier::Win => RWIN,
            Modifier::Ctrl => RCTRL,
        }
    }
}

/// Modifiers in acquisition order, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifierSet(Vec<Modifier>);

impl ModifierSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Modifier> + '_ {
        self.0.iter().copied()
    }

    /// Returns `false` if the modifier was already held.
    fn insert(&mut self, modifier: Modifier) -> bool {
        if self.0.contains(&modifier) {
            return false;
        }
        self.0.push(modifier);
        true
    }

    /// Add every modifier of `other` not already held, keeping order.
    pub(crate) fn merge(&mut self, other: &ModifierSet) {
        for m in other.iter() {
            self.insert(m);
        }
    }

    /// Parse shorthand block text such as `+!`.
    ///
    /// Returns `None` when `raw` contains anything other than shorthand
    /// symbols, so the caller can treat it as a named block instead.
    fn from_shorthand(position: usize, raw: &str) -> Option<Result<Self, CompileError>> {
        let mut set = ModifierSet::default();
        for symbol in raw.chars() {
            let modifier = Modifier::from_symbol(symbol)?;
            if !set.insert(modifier) {
                return Some(Err(CompileError::InvalidBlockGrammar {
                    position,
                    block: raw.to_owned(),
                    reason: "modifier repeated in shorthand block",
                }));
            }
        }
        Some(Ok(set))
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Char(char),
    Modifiers(ModifierSet),
    Block(BlockDescriptor),
}

/// A token and the character index it starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Spanned {
    pub position: usize,
    pub token: Token,
}

impl Spanned {
    fn new(position: usize, token: Token) -> Self {
        Self { position, token }
    }
}

// ---------------------------------------------------------------------------
// Pre-pass
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unit {
    Char(char),
    LineBreak,
}

/// Split `text` into positioned units, folding each line break sequence
/// into a single [`Unit::LineBreak`].
pub(crate) fn normalize_line_breaks(text: &str) -> Vec<(usize, Unit)> {
    let mut units = Vec::with_capacity(text.len());
    let mut chars = text.chars().enumerate().peekable();
    while let Some((position, ch)) = chars.next() {
        match ch {
            '\r' => {
                chars.next_if(|&(_, c)| c == '\n');
                units.push((position, Unit::LineBreak));
            }
            '\n' => units.push((position, Unit::LineBreak)),
            _ => units.push((position, Unit::Char(ch))),
        }
    }
    units
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

enum State {
    Scanning,
    InBlock { start: usize, raw: String },
}

/// Run the scanner over `text`.
pub(crate) fn tokenize(text: &str, open: char, close: char) -> Result<Vec<Spanned>, CompileError> {
    let units = normalize_line_breaks(text);
    let mut tokens: Vec<Spanned> = Vec::with_capacity(units.len());
    let mut units = units.into_iter().peekable();
    let mut state = State::Scanning;

    while let Some((position, unit)) = units.next() {
        state = match (state, unit) {
            (State::Scanning, Unit::LineBreak) => {
                tokens.push(Spanned::new(position, Token::Block(line_break_block())));
                State::Scanning
            }
            (State::Scanning, Unit::Char(ch)) if ch == open => {
                if units.next_if(|&(_, u)| u == Unit::Char(open)).is_some() {
                    tokens.push(Spanned::new(position, Token::Char(open)));
                    State::Scanning
                } else {
                    State::InBlock {
                        start: position,
                        raw: String::new(),
                    }
                }
            }
            (State::Scanning, Unit::Char(ch)) if ch == close => {
                if units.next_if(|&(_, u)| u == Unit::Char(close)).is_none() {
                    return Err(CompileError::UnexpectedCloseChar { position });
                }
                tokens.push(Spanned::new(position, Token::Char(close)));
                State::Scanning
            }
            (State::Scanning, Unit::Char(ch)) => {
                tokens.push(Spanned::new(position, Token::Char(ch)));
                State::Scanning
            }
            (State::InBlock { start, .. }, Unit::LineBreak) => {
                return Err(CompileError::UnterminatedBlock { position: start });
            }
            (State::InBlock { start, raw }, Unit::Char(ch)) if ch == close => {
                tokens.push(classify_block(start, &raw)?);
                State::Scanning
            }
            (State::InBlock { start, mut raw }, Unit::Char(ch)) => {
                raw.push(ch);
                State::InBlock { start, raw }
            }
        };
    }

    if let State::InBlock { start, .. } = state {
        return Err(CompileError::UnterminatedBlock { position: start });
    }
    Ok(tokens)
}

/// Decide whether a closed block is a modifier shorthand or a named block.
fn classify_block(position: usize, raw: &str) -> Result<Spanned, CompileError> {
    if raw.is_empty() {
        return Err(CompileError::EmptyBlock { position });
    }
    let token = match ModifierSet::from_shorthand(position, raw) {
        Some(set) => Token::Modifiers(set?),
        None => Token::Block(BlockDescriptor::parse(position, raw)?),
    };
    Ok(Spanned::new(position, token))
}

fn line_break_block() -> BlockDescriptor {
    BlockDescriptor {
        key_name: LINE_BREAK_KEY.to_owned(),
        as_text: false,
        state: None,
        repeat: 1,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(text: &str) -> Result<Vec<Token>, CompileError> {
        tokenize(text, '[', ']').map(|t| t.into_iter().map(|s| s.token).collect())
    }

    #[test]
    fn test_plain_text_is_one_token_per_char() {
        let tokens = scan("héllo").unwrap();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[1], Token::Char('é'));
    }

    #[test]
    fn test_escaped_delimiters() {
        assert_eq!(scan("[[").unwrap(), vec![Token::Char('[')]);
        assert_eq!(scan("]]").unwrap(), vec![Token::Char(']')]);
        assert_eq!(
            scan("a[[b]]").unwrap(),
            vec![
                Token::Char('a'),
                Token::Char('['),
                Token::Char('b'),
                Token::Char(']'),
            ]
        );
    }

    #[test]
    fn test_line_breaks_fold_to_enter() {
        let tokens = tokenize("a\r\nb\rc\nd", '[', ']').unwrap();
        let enters: Vec<usize> = tokens
            .iter()
            .filter(|s| matches!(&s.token, Token::Block(b) if b.key_name == LINE_BREAK_KEY))
            .map(|s| s.position)
            .collect();
        assert_eq!(enters, vec![1, 4, 6]);
        assert_eq!(tokens.len(), 7);
    }

    #[test]
    fn test_shorthand_block() {
        let tokens = scan("[+!]").unwrap();
        let Token::Modifiers(set) = &tokens[0] else {
            panic!("expected modifiers, got {tokens:?}");
        };
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![Modifier::Shift, Modifier::Alt]
        );
    }

    #[test]
    fn test_repeated_shorthand_rejected() {
        assert!(matches!(
            scan("[++]"),
            Err(CompileError::InvalidBlockGrammar { position: 0, .. })
        ));
    }

    #[test]
    fn test_mixed_block_is_named() {
        // Not every char is a shorthand symbol, so this is a key name.
        let tokens = scan("[+a]").unwrap();
        assert!(matches!(&tokens[0], Token::Block(b) if b.key_name == "+a"));
    }

    #[test]
    fn test_error_positions() {
        assert_eq!(
            scan("ab[cd"),
            Err(CompileError::UnterminatedBlock { position: 2 })
        );
        assert_eq!(scan("x[]"), Err(CompileError::EmptyBlock { position: 1 }));
        assert_eq!(
            scan("xy]"),
            Err(CompileError::UnexpectedCloseChar { position: 2 })
        );
    }

    #[test]
    fn test_line_break_inside_block_is_unterminated() {
        assert_eq!(
            scan("[Ent\ner]"),
            Err(CompileError::UnterminatedBlock { position: 0 })
        );
        assert_eq!(
            scan("[\n"),
            Err(CompileError::UnterminatedBlock { position: 0 })
        );
    }

    #[test]
    fn test_open_char_inside_block_is_accumulated() {
        let tokens = scan("[a[b]").unwrap();
        assert!(matches!(&tokens[0], Token::Block(b) if b.key_name == "a[b"));
    }

    #[test]
    fn test_custom_delimiters() {
        let tokens = tokenize("{Tab}[x]", '{', '}').unwrap();
        assert_eq!(tokens.len(), 4);
        assert!(matches!(&tokens[0].token, Token::Block(b) if b.key_name == "Tab"));
        assert_eq!(tokens[1].token, Token::Char('['));
        assert_eq!(tokens[3].position, 7);
    }

    #[test]
    fn test_modifier_set_merge_keeps_order() {
        let mut a = ModifierSet::from_shorthand(0, "^").unwrap().unwrap();
        let b = ModifierSet::from_shorthand(0, "+^").unwrap().unwrap();
        a.merge(&b);
        assert_eq!(
            a.iter().collect::<Vec<_>>(),
            vec![Modifier::Ctrl, Modifier::Shift]
        );
        assert_eq!(a.len(), 2);
    }
}
