//! Semantic key table.
//!
//! Maps case-insensitive key names (`Enter`, `a`, `D1`, `WheelUp`, ...) to
//! [`KeyDescriptor`] rows carrying the Win32 virtual-key code and the kind
//! of device transition the key produces.  Names follow the familiar
//! `System.Windows.Forms.Keys` spelling, with a handful of short aliases.
//!
//! The table is immutable: rows live in a `static` slice and the
//! case-insensitive index is built once on first lookup via `OnceLock`.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// Physical mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    X1,
    X2,
}

/// Direction of a single wheel tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelDirection {
    Up,
    Down,
    Left,
    Right,
}

/// What kind of device transition a key produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyKind {
    /// Keyboard key.  `extended` keys need `KEYEVENTF_EXTENDEDKEY` when
    /// sent as hardware scan codes.
    Keyboard { extended: bool },
    /// Mouse button with real down/up transitions.
    Mouse { button: MouseButton },
    /// Wheel tick: fires once, has no release.
    Wheel { direction: WheelDirection },
}

/// One row of the key table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct KeyDescriptor {
    /// Canonical name (aliases resolve to this).
    pub name: &'static str,
    /// Win32 virtual-key code, 0 for wheel ticks.
    pub vk: u16,
    pub kind: KeyKind,
}

impl KeyDescriptor {
    /// Stateless keys have no meaningful "up" transition.
    pub fn is_stateless(&self) -> bool {
        matches!(self.kind, KeyKind::Wheel { .. })
    }
}

/// Name → key lookup used by the sequence compiler.
///
/// Implementations must match names case-insensitively.
pub trait KeyTable {
    fn resolve(&self, name: &str) -> Option<KeyDescriptor>;
}

// ---------------------------------------------------------------------------
// Row constructors
// ---------------------------------------------------------------------------

const fn key(name: &'static str, vk: u16) -> KeyDescriptor {
    KeyDescriptor {
        name,
        vk,
        kind: KeyKind::Keyboard { extended: false },
    }
}

const fn ext(name: &'static str, vk: u16) -> KeyDescriptor {
    KeyDescriptor {
        name,
        vk,
        kind: KeyKind::Keyboard { extended: true },
    }
}

const fn mouse(name: &'static str, vk: u16, button: MouseButton) -> KeyDescriptor {
    KeyDescriptor {
        name,
        vk,
        kind: KeyKind::Mouse { button },
    }
}

const fn wheel(name: &'static str, direction: WheelDirection) -> KeyDescriptor {
    KeyDescriptor {
        name,
        vk: 0,
        kind: KeyKind::Wheel { direction },
    }
}

// ---------------------------------------------------------------------------
// Standard table
// ---------------------------------------------------------------------------

/// Right Shift, held by the `+` shorthand.
pub const RSHIFT: KeyDescriptor = key("RShiftKey", 0xA1);
/// Left Alt, held by the `!` shorthand.
pub const LALT: KeyDescriptor = key("LMenu", 0xA4);
/// Right Windows key, held by the `#` shorthand.
pub const RWIN: KeyDescriptor = ext("RWin", 0x5C);
/// Right Ctrl, held by the `^` shorthand.
pub const RCTRL: KeyDescriptor = ext("RControlKey", 0xA3);

static KEYS: &[KeyDescriptor] = &[
    // Mouse buttons
    mouse("LButton", 0x01, MouseButton::Left),
    mouse("RButton", 0x02, MouseButton::Right),
    mouse("MButton", 0x04, MouseButton::Middle),
    mouse("XButton1", 0x05, MouseButton::X1),
    mouse("XButton2", 0x06, MouseButton::X2),
    // Wheel ticks (no virtual-key code)
    wheel("WheelUp", WheelDirection::Up),
    wheel("WheelDown", WheelDirection::Down),
    wheel("WheelLeft", WheelDirection::Left),
    wheel("WheelRight", WheelDirection::Right),
    // Editing and whitespace
    ext("Cancel", 0x03),
    key("Back", 0x08),
    key("Tab", 0x09),
    key("Clear", 0x0C),
    key("Enter", 0x0D),
    key("Pause", 0x13),
    key("CapsLock", 0x14),
    key("Escape", 0x1B),
    key("Space", 0x20),
    // Navigation
    ext("PageUp", 0x21),
    ext("PageDown", 0x22),
    ext("End", 0x23),
    ext("Home", 0x24),
    ext("Left", 0x25),
    ext("Up", 0x26),
    ext("Right", 0x27),
    ext("Down", 0x28),
    key("Select", 0x29),
    key("Print", 0x2A),
    key("Execute", 0x2B),
    ext("PrintScreen", 0x2C),
    ext("Insert", 0x2D),
    ext("Delete", 0x2E),
    key("Help", 0x2F),
    // Top-row digits
    key("D0", 0x30),
    key("D1", 0x31),
    key("D2", 0x32),
    key("D3", 0x33),
    key("D4", 0x34),
    key("D5", 0x35),
    key("D6", 0x36),
    key("D7", 0x37),
    key("D8", 0x38),
    key("D9", 0x39),
    // Letters
    key("A", 0x41),
    key("B", 0x42),
    key("C", 0x43),
    key("D", 0x44),
    key("E", 0x45),
    key("F", 0x46),
    key("G", 0x47),
    key("H", 0x48),
    key("I", 0x49),
    key("J", 0x4A),
    key("K", 0x4B),
    key("L", 0x4C),
    key("M", 0x4D),
    key("N", 0x4E),
    key("O", 0x4F),
    key("P", 0x50),
    key("Q", 0x51),
    key("R", 0x52),
    key("S", 0x53),
    key("T", 0x54),
    key("U", 0x55),
    key("V", 0x56),
    key("W", 0x57),
    key("X", 0x58),
    key("Y", 0x59),
    key("Z", 0x5A),
    // Windows and application keys
    ext("LWin", 0x5B),
    RWIN,
    ext("Apps", 0x5D),
    key("Sleep", 0x5F),
    // Numeric keypad
    key("NumPad0", 0x60),
    key("NumPad1", 0x61),
    key("NumPad2", 0x62),
    key("NumPad3", 0x63),
    key("NumPad4", 0x64),
    key("NumPad5", 0x65),
    key("NumPad6", 0x66),
    key("NumPad7", 0x67),
    key("NumPad8", 0x68),
    key("NumPad9", 0x69),
    key("Multiply", 0x6A),
    key("Add", 0x6B),
    key("Separator", 0x6C),
    key("Subtract", 0x6D),
    key("Decimal", 0x6E),
    ext("Divide", 0x6F),
    ext("NumLock", 0x90),
    key("Scroll", 0x91),
    // Function keys
    key("F1", 0x70),
    key("F2", 0x71),
    key("F3", 0x72),
    key("F4", 0x73),
    key("F5", 0x74),
    key("F6", 0x75),
    key("F7", 0x76),
    key("F8", 0x77),
    key("F9", 0x78),
    key("F10", 0x79),
    key("F11", 0x7A),
    key("F12", 0x7B),
    key("F13", 0x7C),
    key("F14", 0x7D),
    key("F15", 0x7E),
    key("F16", 0x7F),
    key("F17", 0x80),
    key("F18", 0x81),
    key("F19", 0x82),
    key("F20", 0x83),
    key("F21", 0x84),
    key("F22", 0x85),
    key("F23", 0x86),
    key("F24", 0x87),
    // Modifiers
    key("ShiftKey", 0x10),
    key("ControlKey", 0x11),
    key("Menu", 0x12),
    key("LShiftKey", 0xA0),
    RSHIFT,
    key("LControlKey", 0xA2),
    RCTRL,
    LALT,
    ext("RMenu", 0xA5),
    // Browser, volume and media
    ext("BrowserBack", 0xA6),
    ext("BrowserForward", 0xA7),
    ext("BrowserRefresh", 0xA8),
    ext("BrowserStop", 0xA9),
    ext("BrowserSearch", 0xAA),
    ext("BrowserFavorites", 0xAB),
    ext("BrowserHome", 0xAC),
    ext("VolumeMute", 0xAD),
    ext("VolumeDown", 0xAE),
    ext("VolumeUp", 0xAF),
    ext("MediaNextTrack", 0xB0),
    ext("MediaPreviousTrack", 0xB1),
    ext("MediaStop", 0xB2),
    ext("MediaPlayPause", 0xB3),
    ext("LaunchMail", 0xB4),
    ext("SelectMedia", 0xB5),
    ext("LaunchApplication1", 0xB6),
    ext("LaunchApplication2", 0xB7),
    // OEM punctuation (US layout positions)
    key("OemSemicolon", 0xBA),
    key("Oemplus", 0xBB),
    key("Oemcomma", 0xBC),
    key("OemMinus", 0xBD),
    key("OemPeriod", 0xBE),
    key("OemQuestion", 0xBF),
    key("Oemtilde", 0xC0),
    key("OemOpenBrackets", 0xDB),
    key("OemPipe", 0xDC),
    key("OemCloseBrackets", 0xDD),
    key("OemQuotes", 0xDE),
];

/// Alternative spellings, resolved to a canonical row name.
const ALIASES: &[(&str, &str)] = &[
    ("Backspace", "Back"),
    ("Return", "Enter"),
    ("Esc", "Escape"),
    ("Shift", "ShiftKey"),
    ("Ctrl", "ControlKey"),
    ("Control", "ControlKey"),
    ("Alt", "Menu"),
    ("LShift", "LShiftKey"),
    ("RShift", "RShiftKey"),
    ("LCtrl", "LControlKey"),
    ("RCtrl", "RControlKey"),
    ("LAlt", "LMenu"),
    ("RAlt", "RMenu"),
    ("Win", "LWin"),
    ("PgUp", "PageUp"),
    ("PgDn", "PageDown"),
    ("Prior", "PageUp"),
    ("Next", "PageDown"),
    ("Ins", "Insert"),
    ("Del", "Delete"),
    ("Capital", "CapsLock"),
    ("ScrollLock", "Scroll"),
    ("Snapshot", "PrintScreen"),
    ("ContextMenu", "Apps"),
];

static INDEX: OnceLock<HashMap<String, KeyDescriptor>> = OnceLock::new();

fn index() -> &'static HashMap<String, KeyDescriptor> {
    INDEX.get_or_init(|| {
        let mut map: HashMap<String, KeyDescriptor> =
            HashMap::with_capacity(KEYS.len() + ALIASES.len());
        for row in KEYS {
            map.insert(row.name.to_ascii_lowercase(), *row);
        }
        for (alias, canonical) in ALIASES {
            if let Some(row) = KEYS.iter().find(|r| r.name == *canonical) {
                map.insert(alias.to_ascii_lowercase(), *row);
            }
        }
        map
    })
}

/// The built-in key table.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardKeys;

impl StandardKeys {
    /// Every canonical row, in virtual-key order within each group.
    pub fn all() -> &'static [KeyDescriptor] {
        KEYS
    }

    /// Reverse lookup by virtual-key code.  Wheel ticks have no code and
    /// are never returned.
    pub fn by_vk(vk: u16) -> Option<KeyDescriptor> {
        if vk == 0 {
            return None;
        }
        KEYS.iter().find(|r| r.vk == vk).copied()
    }
}

impl KeyTable for StandardKeys {
    fn resolve(&self, name: &str) -> Option<KeyDescriptor> {
        index().get(&name.to_ascii_lowercase()).copied()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_case_insensitive() {
        let enter = StandardKeys.resolve("Enter").unwrap();
        assert_eq!(StandardKeys.resolve("ENTER"), Some(enter));
        assert_eq!(StandardKeys.resolve("enter"), Some(enter));
        assert_eq!(enter.vk, 0x0D);
    }

    #[test]
    fn test_aliases_resolve_to_canonical_rows() {
        assert_eq!(StandardKeys.resolve("Return").unwrap().name, "Enter");
        assert_eq!(StandardKeys.resolve("esc").unwrap().name, "Escape");
        assert_eq!(StandardKeys.resolve("RCtrl"), Some(RCTRL));
        assert_eq!(StandardKeys.resolve("lalt"), Some(LALT));
    }

    #[test]
    fn test_letters_and_digits() {
        assert_eq!(StandardKeys.resolve("a").unwrap().vk, 0x41);
        assert_eq!(StandardKeys.resolve("Z").unwrap().vk, 0x5A);
        assert_eq!(StandardKeys.resolve("D0").unwrap().vk, 0x30);
        assert_eq!(StandardKeys.resolve("d9").unwrap().vk, 0x39);
        // Bare digits are normalised by the compiler, not the table.
        assert!(StandardKeys.resolve("1").is_none());
    }

    #[test]
    fn test_function_keys_cover_f24() {
        assert_eq!(StandardKeys.resolve("F1").unwrap().vk, 0x70);
        assert_eq!(StandardKeys.resolve("F24").unwrap().vk, 0x87);
        assert!(StandardKeys.resolve("F25").is_none());
    }

    #[test]
    fn test_only_wheel_ticks_are_stateless() {
        for row in StandardKeys::all() {
            let wheel = matches!(row.kind, KeyKind::Wheel { .. });
            assert_eq!(row.is_stateless(), wheel, "{}", row.name);
        }
        assert!(StandardKeys.resolve("WheelUp").unwrap().is_stateless());
        assert!(!StandardKeys.resolve("LButton").unwrap().is_stateless());
    }

    #[test]
    fn test_canonical_names_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for row in StandardKeys::all() {
            assert!(seen.insert(row.name.to_ascii_lowercase()), "{}", row.name);
        }
    }

    #[test]
    fn test_aliases_point_at_existing_rows() {
        for (alias, canonical) in ALIASES {
            assert_eq!(
                StandardKeys.resolve(alias).map(|r| r.name),
                Some(*canonical),
                "{alias}"
            );
        }
    }

    #[test]
    fn test_by_vk() {
        assert_eq!(StandardKeys::by_vk(0x0D).unwrap().name, "Enter");
        assert_eq!(StandardKeys::by_vk(0xA1), Some(RSHIFT));
        assert!(StandardKeys::by_vk(0).is_none());
    }

    #[test]
    fn test_descriptor_serialization() {
        let json = serde_json::to_string(&RCTRL).unwrap();
        assert!(json.contains("\"name\":\"RControlKey\""));
        assert!(json.contains("\"type\":\"keyboard\""));
        assert!(json.contains("\"extended\":true"));
    }
}
