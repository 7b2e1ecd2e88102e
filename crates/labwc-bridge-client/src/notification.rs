//! Notifications emitted to subscribers of a [`LabwcClient`](crate::LabwcClient)

use std::sync::Arc;

use crate::error::LabwcError;
use crate::protocol::{CursorPosition, Window};

/// Which state event produced a [`Notification::WindowStateChanged`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateChange {
    Minimized,
    Maximized,
    Fullscreen,
}

impl StateChange {
    /// Wire name of the event that produced this change
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimized => "minimized",
            Self::Maximized => "maximized",
            Self::Fullscreen => "fullscreen",
        }
    }
}

impl std::fmt::Display for StateChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened on the compositor connection
///
/// Window notifications carry the decoded event payload, i.e. the fields
/// labwc sent with that event rather than the merged mirror record. Use
/// [`LabwcClient::window`](crate::LabwcClient::window) for the latter.
#[derive(Debug, Clone)]
pub enum Notification {
    Connected,
    Disconnected,
    Error(Arc<LabwcError>),
    Cursor(CursorPosition),
    /// Full mirror contents after a snapshot replaced it
    WindowList(Vec<Window>),
    WindowCreated(Window),
    WindowClosed(Window),
    WindowMoved(Window),
    WindowFocused(Window),
    WindowTitleChanged(Window),
    WindowStateChanged {
        change: StateChange,
        window: Window,
    },
    DecorationsDisabled,
}

impl Notification {
    /// Channel name of this notification
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error(_) => "error",
            Self::Cursor(_) => "cursor",
            Self::WindowList(_) => "window_list",
            Self::WindowCreated(_) => "window_created",
            Self::WindowClosed(_) => "window_closed",
            Self::WindowMoved(_) => "window_moved",
            Self::WindowFocused(_) => "window_focused",
            Self::WindowTitleChanged(_) => "window_title_changed",
            Self::WindowStateChanged { .. } => "window_state_changed",
            Self::DecorationsDisabled => "decorations_disabled",
        }
    }
}
