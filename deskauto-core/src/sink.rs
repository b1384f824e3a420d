//! Event delivery seam.
//!
//! The compiler only produces an ordered [`Event`] list; an [`EventSink`]
//! decides how that list reaches the system.  Implementations:
//!
//! | Sink | Platform | Delivery |
//! |------|----------|----------|
//! | [`RecordingSink`] | all | stores events (dry runs, tests) |
//! | `SendInputSink` | Windows | synthetic input queue (`SendInput`) |
//! | `PostMessageSink` | Windows | messages posted to one window |
//!
//! Sinks take `&self` so one instance can be shared between callers.
//! System sinks release any key they pressed if delivery fails part way.

use std::time::Duration;

use parking_lot::Mutex;

use crate::errors::DeskAutoError;
use crate::keys::KeyDescriptor;
use crate::sequence::{self, CompileOptions, Event, KeyState, Target};

/// Pause between events in [`DeliveryMode::GameStyle`] unless overridden.
pub const DEFAULT_GAME_DELAY: Duration = Duration::from_millis(20);

/// How a system sink pushes events into the input queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Virtual-key codes, whole sequence in one atomic batch.
    #[default]
    Injected,
    /// Hardware scan codes, one event at a time with `delay` between.
    GameStyle { delay: Duration },
}

impl DeliveryMode {
    /// Game-style delivery with the given delay in milliseconds, or the
    /// default delay when `None`.
    pub fn game_style(delay_ms: Option<u64>) -> Self {
        DeliveryMode::GameStyle {
            delay: delay_ms.map_or(DEFAULT_GAME_DELAY, Duration::from_millis),
        }
    }
}

/// Consumer of compiled event sequences.
pub trait EventSink {
    /// Deliver `events` in order.  Returns the number of events delivered.
    fn deliver(&self, events: &[Event]) -> Result<u32, DeskAutoError>;
}

/// Convert a delivered event count to the `u32` sinks report.
pub fn delivered_count(count: usize) -> Result<u32, DeskAutoError> {
    u32::try_from(count).map_err(|_| {
        DeskAutoError::InputError(format!("{count} events exceed the u32 count range"))
    })
}

/// Keys a sink has pressed and not yet released.
///
/// System sinks feed every delivered event through [`HeldKeys::observe`];
/// if delivery fails part way, [`HeldKeys::release_events`] gives the ups
/// that put the keyboard and mouse back to rest.  Characters and wheel
/// ticks never stay held.
#[derive(Debug, Clone, Default)]
pub struct HeldKeys {
    keys: Vec<KeyDescriptor>,
}

impl HeldKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Record one event that reached the system.
    pub fn observe(&mut self, event: &Event) {
        let Target::Key(key) = event.target else {
            return;
        };
        if key.is_stateless() {
            return;
        }
        self.keys.retain(|held| *held != key);
        if event.state == KeyState::Down {
            self.keys.push(key);
        }
    }

    /// Up events for every held key, most recently pressed first.
    pub fn release_events(&self) -> Vec<Event> {
        self.keys
            .iter()
            .rev()
            .map(|&key| Event::key(key, KeyState::Up))
            .collect()
    }
}

/// Sink that keeps every delivered event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything delivered so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Remove and return everything delivered so far.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for RecordingSink {
    fn deliver(&self, events: &[Event]) -> Result<u32, DeskAutoError> {
        let count = delivered_count(events.len())?;
        self.events.lock().extend_from_slice(events);
        Ok(count)
    }
}

/// Compile `text` and hand the result to `sink`.
///
/// Nothing is delivered if compilation fails.
pub fn send_markup(
    text: &str,
    options: CompileOptions,
    sink: &dyn EventSink,
) -> Result<u32, DeskAutoError> {
    let events = sequence::compile_with(text, options)?;
    if events.is_empty() {
        return Ok(0);
    }
    let delivered = sink.deliver(&events)?;
    log::debug!("delivered {delivered}/{} events", events.len());
    Ok(delivered)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CompileError;
    use crate::sequence::KeyState;

    #[test]
    fn test_recording_sink_accumulates() {
        let sink = RecordingSink::new();
        let first = sequence::compile("ab").unwrap();
        let second = sequence::compile("[Tab]").unwrap();
        assert_eq!(sink.deliver(&first).unwrap(), 4);
        assert_eq!(sink.deliver(&second).unwrap(), 2);
        assert_eq!(sink.events(), [first, second].concat());
    }

    #[test]
    fn test_take_clears() {
        let sink = RecordingSink::new();
        send_markup("x", CompileOptions::default(), &sink).unwrap();
        assert_eq!(sink.take().len(), 2);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_send_markup_delivers_in_order() {
        let sink = RecordingSink::new();
        let count = send_markup("[Enter 2]", CompileOptions::default(), &sink).unwrap();
        assert_eq!(count, 4);
        let states: Vec<KeyState> = sink.events().iter().map(|e| e.state).collect();
        assert_eq!(
            states,
            [KeyState::Down, KeyState::Up, KeyState::Down, KeyState::Up]
        );
    }

    #[test]
    fn test_send_markup_delivers_nothing_on_error() {
        let sink = RecordingSink::new();
        let err = send_markup("abc [Nope]", CompileOptions::default(), &sink).unwrap_err();
        assert!(matches!(
            err,
            DeskAutoError::Compile(CompileError::UnknownKeyName { position: 4, .. })
        ));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_game_style_delay() {
        assert_eq!(
            DeliveryMode::game_style(None),
            DeliveryMode::GameStyle {
                delay: DEFAULT_GAME_DELAY
            }
        );
        assert_eq!(
            DeliveryMode::game_style(Some(5)),
            DeliveryMode::GameStyle {
                delay: Duration::from_millis(5)
            }
        );
        assert_eq!(DeliveryMode::default(), DeliveryMode::Injected);
    }

    #[test]
    fn test_held_keys_release_in_reverse() {
        let events = sequence::compile("[^][+][a]").unwrap();
        let mut held = HeldKeys::new();
        // Ctrl down, Shift down, A down reached the system; A up did not.
        for event in &events[..3] {
            held.observe(event);
        }
        let names: Vec<&str> = held
            .release_events()
            .iter()
            .map(|e| {
                assert_eq!(e.state, KeyState::Up);
                e.as_key().unwrap().name
            })
            .collect();
        assert_eq!(names, ["A", "RShiftKey", "RControlKey"]);
    }

    #[test]
    fn test_held_keys_forget_released_and_untracked() {
        let mut held = HeldKeys::new();
        for event in sequence::compile("x[Tab][WheelUp][LShift down]").unwrap() {
            held.observe(&event);
        }
        let release = held.release_events();
        assert_eq!(release.len(), 1);
        assert_eq!(release[0].as_key().unwrap().name, "LShiftKey");

        held.observe(&sequence::compile("[LShift up]").unwrap()[0]);
        assert!(held.is_empty());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_delivered_count_rejects_overflow() {
        assert_eq!(delivered_count(7).unwrap(), 7);
        let too_many = u32::MAX as usize + 1;
        assert!(matches!(
            delivered_count(too_many),
            Err(DeskAutoError::InputError(_))
        ));
    }

    #[test]
    fn test_sink_is_shareable() {
        let sink = RecordingSink::new();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| send_markup("ab", CompileOptions::default(), &sink).unwrap());
            }
        });
        assert_eq!(sink.events().len(), 16);
    }
}
