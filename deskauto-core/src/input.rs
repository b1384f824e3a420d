//! Win32 event delivery: `SendInput` and `PostMessageW`.
//!
//! [`SendInputSink`] feeds the system input queue.  In
//! [`DeliveryMode::Injected`] the whole sequence goes out in one atomic
//! `SendInput` call using virtual-key codes; in [`DeliveryMode::GameStyle`]
//! keys are sent as hardware scan codes, one event per call with a pause
//! between, which games reading raw input tend to require.  Characters are
//! always typed with `KEYEVENTF_UNICODE`.
//!
//! [`PostMessageSink`] bypasses the input queue and posts key, char and
//! mouse messages straight to one window, so the target need not have
//! focus.
//!
//! If delivery fails part way, both sinks send ups for every key they left
//! down (most recent first) before returning the error.
//!
//! Use [`injector`] / [`poster`] to get a sink without `cfg` at the call
//! site; off Windows they return [`DeskAutoError::Unsupported`].

use crate::errors::DeskAutoError;
use crate::sink::{DeliveryMode, EventSink};

/// Boxed [`SendInputSink`] for `mode`.
#[cfg(windows)]
pub fn injector(mode: DeliveryMode) -> Result<Box<dyn EventSink + Send + Sync>, DeskAutoError> {
    Ok(Box::new(SendInputSink::new(mode)))
}

/// Boxed [`PostMessageSink`] targeting window `hwnd`.
#[cfg(windows)]
pub fn poster(hwnd: isize) -> Result<Box<dyn EventSink + Send + Sync>, DeskAutoError> {
    Ok(Box::new(PostMessageSink::new(hwnd)?))
}

#[cfg(not(windows))]
pub fn injector(_mode: DeliveryMode) -> Result<Box<dyn EventSink + Send + Sync>, DeskAutoError> {
    Err(DeskAutoError::Unsupported("input injection requires Windows"))
}

#[cfg(not(windows))]
pub fn poster(_hwnd: isize) -> Result<Box<dyn EventSink + Send + Sync>, DeskAutoError> {
    Err(DeskAutoError::Unsupported("message posting requires Windows"))
}

#[cfg(windows)]
pub use win32::{PostMessageSink, SendInputSink};

#[cfg(windows)]
mod win32 {
    use std::thread;

    use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        MapVirtualKeyW, SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT,
        KEYBD_EVENT_FLAGS, KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, KEYEVENTF_SCANCODE,
        KEYEVENTF_UNICODE, MAPVK_VK_TO_VSC, MOUSEEVENTF_HWHEEL, MOUSEEVENTF_LEFTDOWN,
        MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_RIGHTDOWN,
        MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_WHEEL, MOUSEEVENTF_XDOWN, MOUSEEVENTF_XUP, MOUSEINPUT,
        MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        IsWindow, PostMessageW, WM_CHAR, WM_KEYDOWN, WM_KEYUP, WM_LBUTTONDOWN, WM_LBUTTONUP,
        WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEHWHEEL, WM_MOUSEWHEEL, WM_RBUTTONDOWN,
        WM_RBUTTONUP, WM_XBUTTONDOWN, WM_XBUTTONUP,
    };

    use crate::errors::DeskAutoError;
    use crate::keys::{KeyKind, MouseButton, WheelDirection};
    use crate::sequence::{Event, KeyState, Target};
    use crate::sink::{delivered_count, DeliveryMode, EventSink, HeldKeys};

    /// Pre-computed size of `INPUT` struct for `SendInput` calls.
    const INPUT_SIZE: i32 = std::mem::size_of::<INPUT>() as i32;

    /// One wheel notch.
    const WHEEL_DELTA: i32 = 120;

    const XBUTTON1: u32 = 0x0001;
    const XBUTTON2: u32 = 0x0002;

    // -----------------------------------------------------------------------
    // Helpers: build INPUT structs
    // -----------------------------------------------------------------------

    fn keyboard_input(vk: u16, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(vk),
                    wScan: scan,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }

    fn mouse_input(data: i32, flags: MOUSE_EVENT_FLAGS) -> INPUT {
        INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx: 0,
                    dy: 0,
                    // Signed for WHEEL/HWHEEL; `as u32` keeps the bits.
                    mouseData: data as u32,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }

    fn up_flag(state: KeyState) -> KEYBD_EVENT_FLAGS {
        match state {
            KeyState::Down => KEYBD_EVENT_FLAGS(0),
            KeyState::Up => KEYEVENTF_KEYUP,
        }
    }

    fn scan_code(vk: u16) -> u16 {
        unsafe { MapVirtualKeyW(vk as u32, MAPVK_VK_TO_VSC) as u16 }
    }

    fn button_flags(button: MouseButton, state: KeyState) -> (MOUSE_EVENT_FLAGS, u32) {
        let down = state == KeyState::Down;
        match button {
            MouseButton::Left if down => (MOUSEEVENTF_LEFTDOWN, 0),
            MouseButton::Left => (MOUSEEVENTF_LEFTUP, 0),
            MouseButton::Right if down => (MOUSEEVENTF_RIGHTDOWN, 0),
            MouseButton::Right => (MOUSEEVENTF_RIGHTUP, 0),
            MouseButton::Middle if down => (MOUSEEVENTF_MIDDLEDOWN, 0),
            MouseButton::Middle => (MOUSEEVENTF_MIDDLEUP, 0),
            MouseButton::X1 if down => (MOUSEEVENTF_XDOWN, XBUTTON1),
            MouseButton::X1 => (MOUSEEVENTF_XUP, XBUTTON1),
            MouseButton::X2 if down => (MOUSEEVENTF_XDOWN, XBUTTON2),
            MouseButton::X2 => (MOUSEEVENTF_XUP, XBUTTON2),
        }
    }

    fn wheel_delta(direction: WheelDirection) -> (bool, i32) {
        match direction {
            WheelDirection::Up => (false, WHEEL_DELTA),
            WheelDirection::Down => (false, -WHEEL_DELTA),
            WheelDirection::Right => (true, WHEEL_DELTA),
            WheelDirection::Left => (true, -WHEEL_DELTA),
        }
    }

    /// Append the `INPUT` structs for one event.  A character outside the
    /// BMP needs two UTF-16 units and so two inputs.
    fn push_inputs(event: &Event, scan_codes: bool, out: &mut Vec<INPUT>) {
        match event.target {
            Target::Char(ch) => {
                let mut buf = [0u16; 2];
                for &unit in ch.encode_utf16(&mut buf).iter() {
                    out.push(keyboard_input(0, unit, KEYEVENTF_UNICODE | up_flag(event.state)));
                }
            }
            Target::Key(key) => match key.kind {
                KeyKind::Keyboard { extended } if scan_codes => {
                    let mut flags = KEYEVENTF_SCANCODE | up_flag(event.state);
                    if extended {
                        flags = flags | KEYEVENTF_EXTENDEDKEY;
                    }
                    out.push(keyboard_input(0, scan_code(key.vk), flags));
                }
                KeyKind::Keyboard { .. } => {
                    out.push(keyboard_input(key.vk, 0, up_flag(event.state)));
                }
                KeyKind::Mouse { button } => {
                    let (flags, data) = button_flags(button, event.state);
                    out.push(mouse_input(data as i32, flags));
                }
                KeyKind::Wheel { direction } => {
                    let (horizontal, delta) = wheel_delta(direction);
                    let flag = if horizontal {
                        MOUSEEVENTF_HWHEEL
                    } else {
                        MOUSEEVENTF_WHEEL
                    };
                    out.push(mouse_input(delta, flag));
                }
            },
        }
    }

    /// `SendInput` accepted only the first `sent` inputs.
    struct Partial {
        sent: usize,
        error: DeskAutoError,
    }

    fn send(inputs: &[INPUT]) -> Result<(), Partial> {
        let sent = unsafe { SendInput(inputs, INPUT_SIZE) } as usize;
        if sent != inputs.len() {
            return Err(Partial {
                sent,
                error: DeskAutoError::InputError(format!(
                    "SendInput injected {sent} of {} inputs: {}",
                    inputs.len(),
                    windows::core::Error::from_win32()
                )),
            });
        }
        Ok(())
    }

    /// Keys left down by the events whose inputs all fit in the first
    /// `sent` inputs.  `ends[i]` is the input index just past event `i`.
    fn held_after(events: &[Event], ends: &[usize], sent: usize) -> HeldKeys {
        let mut held = HeldKeys::new();
        for (event, &end) in events.iter().zip(ends) {
            if end > sent {
                break;
            }
            held.observe(event);
        }
        held
    }

    // -----------------------------------------------------------------------
    // SendInput sink
    // -----------------------------------------------------------------------

    /// Delivers events through the system input queue.
    #[derive(Debug, Clone, Copy)]
    pub struct SendInputSink {
        mode: DeliveryMode,
    }

    impl SendInputSink {
        pub fn new(mode: DeliveryMode) -> Self {
            Self { mode }
        }

        /// Best-effort release of keys a failed delivery left down.
        fn roll_back(&self, held: &HeldKeys) {
            if held.is_empty() {
                return;
            }
            let scan_codes = matches!(self.mode, DeliveryMode::GameStyle { .. });
            let release = held.release_events();
            let mut inputs: Vec<INPUT> = Vec::with_capacity(release.len());
            for event in &release {
                push_inputs(event, scan_codes, &mut inputs);
            }
            match send(&inputs) {
                Ok(()) => log::warn!("released {} held keys after failed delivery", release.len()),
                Err(Partial { error, .. }) => log::error!("releasing held keys failed: {error}"),
            }
        }
    }

    impl EventSink for SendInputSink {
        fn deliver(&self, events: &[Event]) -> Result<u32, DeskAutoError> {
            match self.mode {
                DeliveryMode::Injected => {
                    let mut inputs: Vec<INPUT> = Vec::with_capacity(events.len());
                    let mut ends: Vec<usize> = Vec::with_capacity(events.len());
                    for event in events {
                        push_inputs(event, false, &mut inputs);
                        ends.push(inputs.len());
                    }
                    if let Err(Partial { sent, error }) = send(&inputs) {
                        self.roll_back(&held_after(events, &ends, sent));
                        return Err(error);
                    }
                }
                DeliveryMode::GameStyle { delay } => {
                    let mut held = HeldKeys::new();
                    let mut inputs: Vec<INPUT> = Vec::with_capacity(2);
                    for (i, event) in events.iter().enumerate() {
                        if i > 0 && !delay.is_zero() {
                            thread::sleep(delay);
                        }
                        inputs.clear();
                        push_inputs(event, true, &mut inputs);
                        if let Err(Partial { error, .. }) = send(&inputs) {
                            self.roll_back(&held);
                            return Err(error);
                        }
                        held.observe(event);
                    }
                }
            }
            log::debug!("SendInput delivered {} events ({:?})", events.len(), self.mode);
            delivered_count(events.len())
        }
    }

    // -----------------------------------------------------------------------
    // PostMessage sink
    // -----------------------------------------------------------------------

    /// One window message: `(msg, wparam, lparam)`.
    type Message = (u32, usize, isize);

    /// `WM_KEYDOWN` / `WM_KEYUP` lParam: repeat count 1, scan code,
    /// extended flag, and for key-up the previous-state and transition bits.
    fn key_lparam(scan: u16, extended: bool, state: KeyState) -> isize {
        let mut lparam: u32 = 1 | ((scan as u32) << 16);
        if extended {
            lparam |= 1 << 24;
        }
        if state == KeyState::Up {
            lparam |= (1 << 30) | (1 << 31);
        }
        lparam as i32 as isize
    }

    /// Window messages for one event.  Character key-ups post nothing.
    fn messages(event: &Event) -> Vec<Message> {
        let down = event.state == KeyState::Down;
        match event.target {
            Target::Char(ch) if down => {
                let mut buf = [0u16; 2];
                ch.encode_utf16(&mut buf)
                    .iter()
                    .map(|&unit| (WM_CHAR, unit as usize, 1))
                    .collect()
            }
            Target::Char(_) => Vec::new(),
            Target::Key(key) => match key.kind {
                KeyKind::Keyboard { extended } => {
                    let msg = if down { WM_KEYDOWN } else { WM_KEYUP };
                    let lparam = key_lparam(scan_code(key.vk), extended, event.state);
                    vec![(msg, key.vk as usize, lparam)]
                }
                KeyKind::Mouse { button } => {
                    let (msg, wparam) = match button {
                        MouseButton::Left => (if down { WM_LBUTTONDOWN } else { WM_LBUTTONUP }, 0),
                        MouseButton::Right => (if down { WM_RBUTTONDOWN } else { WM_RBUTTONUP }, 0),
                        MouseButton::Middle => (if down { WM_MBUTTONDOWN } else { WM_MBUTTONUP }, 0),
                        MouseButton::X1 => (
                            if down { WM_XBUTTONDOWN } else { WM_XBUTTONUP },
                            (XBUTTON1 as usize) << 16,
                        ),
                        MouseButton::X2 => (
                            if down { WM_XBUTTONDOWN } else { WM_XBUTTONUP },
                            (XBUTTON2 as usize) << 16,
                        ),
                    };
                    vec![(msg, wparam, 0)]
                }
                KeyKind::Wheel { direction } => {
                    let (horizontal, delta) = wheel_delta(direction);
                    let msg = if horizontal { WM_MOUSEHWHEEL } else { WM_MOUSEWHEEL };
                    // Delta lives in the high word of wParam.
                    let wparam = ((delta as i16 as u16) as usize) << 16;
                    vec![(msg, wparam, 0)]
                }
            },
        }
    }

    /// Posts events as window messages to one window.
    #[derive(Debug, Clone, Copy)]
    pub struct PostMessageSink {
        hwnd: isize,
    }

    impl PostMessageSink {
        /// Fails if `hwnd` is not a live window.
        pub fn new(hwnd: isize) -> Result<Self, DeskAutoError> {
            let valid = unsafe { IsWindow(HWND(hwnd as *mut core::ffi::c_void)) }.as_bool();
            if !valid {
                return Err(DeskAutoError::WindowError(format!(
                    "0x{hwnd:X} is not a window"
                )));
            }
            Ok(Self { hwnd })
        }

        fn post(&self, event: &Event) -> Result<(), DeskAutoError> {
            let hwnd = HWND(self.hwnd as *mut core::ffi::c_void);
            for (msg, wparam, lparam) in messages(event) {
                let posted = unsafe { PostMessageW(hwnd, msg, WPARAM(wparam), LPARAM(lparam)) };
                posted?;
            }
            Ok(())
        }

        /// Best-effort release of keys a failed delivery left down.
        fn roll_back(&self, held: &HeldKeys) {
            for event in held.release_events() {
                if let Err(e) = self.post(&event) {
                    log::error!("releasing held keys in 0x{:X} failed: {e}", self.hwnd);
                    return;
                }
            }
        }
    }

    impl EventSink for PostMessageSink {
        fn deliver(&self, events: &[Event]) -> Result<u32, DeskAutoError> {
            let mut held = HeldKeys::new();
            for event in events {
                if let Err(e) = self.post(event) {
                    self.roll_back(&held);
                    return Err(e);
                }
                held.observe(event);
            }
            log::debug!("posted {} events to 0x{:X}", events.len(), self.hwnd);
            delivered_count(events.len())
        }
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    #[cfg(not(windows))]
    #[test]
    fn test_delivery_unsupported_off_windows() {
        use super::*;

        assert!(matches!(
            injector(DeliveryMode::Injected),
            Err(DeskAutoError::Unsupported(_))
        ));
        assert!(matches!(poster(1), Err(DeskAutoError::Unsupported(_))));
    }
}
