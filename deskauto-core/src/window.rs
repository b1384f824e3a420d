//! Top-level window lookup via Win32 `EnumWindows`.
//!
//! Used to pick a target for [`PostMessageSink`](crate::input::PostMessageSink)
//! delivery.  All functions return owned [`WindowInfo`] snapshots, never
//! raw `HWND`s; handles travel as `isize`.
//!
//! Matching ([`WindowQuery`]) is plain Rust and works everywhere.  The
//! enumeration functions return [`DeskAutoError::Unsupported`] off Windows.

use serde::Serialize;

use crate::errors::DeskAutoError;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// Owned snapshot of a visible top-level window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowInfo {
    pub hwnd: isize,
    pub title: String,
    pub class_name: String,
    pub pid: u32,
    pub is_minimized: bool,
    pub is_foreground: bool,
}

/// Criteria for [`find_windows`].  Unset fields match anything.
#[derive(Debug, Clone, Default)]
pub struct WindowQuery {
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    /// Exact class name.
    pub class_name: Option<String>,
    pub pid: Option<u32>,
}

impl WindowQuery {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, window: &WindowInfo) -> bool {
        if let Some(title) = &self.title {
            if !window
                .title
                .to_lowercase()
                .contains(&title.to_lowercase())
            {
                return false;
            }
        }
        if let Some(class_name) = &self.class_name {
            if window.class_name != *class_name {
                return false;
            }
        }
        if let Some(pid) = self.pid {
            if window.pid != pid {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Every window from [`list_windows`] that satisfies `query`, in Z order.
pub fn find_windows(query: &WindowQuery) -> Result<Vec<WindowInfo>, DeskAutoError> {
    Ok(list_windows()?
        .into_iter()
        .filter(|w| query.matches(w))
        .collect())
}

/// First window satisfying `query`.
pub fn find_window(query: &WindowQuery) -> Result<WindowInfo, DeskAutoError> {
    find_windows(query)?
        .into_iter()
        .next()
        .ok_or_else(|| DeskAutoError::WindowError(format!("no window matches {query:?}")))
}

#[cfg(not(windows))]
pub fn list_windows() -> Result<Vec<WindowInfo>, DeskAutoError> {
    Err(DeskAutoError::Unsupported("window enumeration requires Windows"))
}

#[cfg(not(windows))]
pub fn foreground_window() -> Result<isize, DeskAutoError> {
    Err(DeskAutoError::Unsupported("window enumeration requires Windows"))
}

#[cfg(windows)]
pub use win32::{foreground_window, list_windows};

#[cfg(windows)]
mod win32 {
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;

    use windows::Win32::Foundation::{BOOL, HWND, LPARAM, TRUE};
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetClassNameW, GetForegroundWindow, GetWindowLongW, GetWindowTextLengthW,
        GetWindowTextW, GetWindowThreadProcessId, IsIconic, IsWindowVisible, GWL_EXSTYLE,
        WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW,
    };

    use super::WindowInfo;
    use crate::errors::DeskAutoError;

    fn read_title(hwnd: HWND) -> String {
        let len = unsafe { GetWindowTextLengthW(hwnd) };
        if len <= 0 {
            return String::new();
        }
        let mut buf = vec![0u16; (len + 1) as usize];
        let copied = unsafe { GetWindowTextW(hwnd, &mut buf) };
        if copied <= 0 {
            return String::new();
        }
        OsString::from_wide(&buf[..copied as usize])
            .to_string_lossy()
            .into_owned()
    }

    fn read_class_name(hwnd: HWND) -> String {
        let mut buf = [0u16; 256];
        let len = unsafe { GetClassNameW(hwnd, &mut buf) };
        if len <= 0 {
            return String::new();
        }
        OsString::from_wide(&buf[..len as usize])
            .to_string_lossy()
            .into_owned()
    }

    /// Visible, titled, and not a tool or non-activatable window: the
    /// windows a user could switch to and type into.
    fn is_input_target(hwnd: HWND) -> bool {
        if !unsafe { IsWindowVisible(hwnd) }.as_bool() {
            return false;
        }
        let ex_style = unsafe { GetWindowLongW(hwnd, GWL_EXSTYLE) } as u32;
        if ex_style & (WS_EX_TOOLWINDOW.0 | WS_EX_NOACTIVATE.0) != 0 {
            return false;
        }
        let title_len = unsafe { GetWindowTextLengthW(hwnd) };
        title_len > 0
    }

    unsafe extern "system" fn collect(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let handles = unsafe { &mut *(lparam.0 as *mut Vec<HWND>) };
        if is_input_target(hwnd) {
            handles.push(hwnd);
        }
        TRUE
    }

    fn snapshot(hwnd: HWND, foreground: HWND) -> WindowInfo {
        let mut pid: u32 = 0;
        unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
        WindowInfo {
            hwnd: hwnd.0 as isize,
            title: read_title(hwnd),
            class_name: read_class_name(hwnd),
            pid,
            is_minimized: unsafe { IsIconic(hwnd) }.as_bool(),
            is_foreground: hwnd == foreground,
        }
    }

    /// Snapshot every window a user could type into, in Z order.
    pub fn list_windows() -> Result<Vec<WindowInfo>, DeskAutoError> {
        let mut handles: Vec<HWND> = Vec::with_capacity(64);
        let enumerated = unsafe {
            EnumWindows(
                Some(collect),
                LPARAM(&mut handles as *mut Vec<HWND> as isize),
            )
        };
        enumerated.map_err(|e| DeskAutoError::WindowError(format!("EnumWindows failed: {e}")))?;

        let foreground = unsafe { GetForegroundWindow() };
        log::debug!("enumerated {} input-target windows", handles.len());
        Ok(handles
            .into_iter()
            .map(|hwnd| snapshot(hwnd, foreground))
            .collect())
    }

    /// Handle of the foreground window.
    pub fn foreground_window() -> Result<isize, DeskAutoError> {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.0.is_null() {
            return Err(DeskAutoError::WindowError(
                "no foreground window".to_owned(),
            ));
        }
        Ok(hwnd.0 as isize)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
