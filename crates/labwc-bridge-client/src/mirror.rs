//! Local mirror of compositor window state

use std::collections::BTreeMap;

use crate::notification::{Notification, StateChange};
use crate::protocol::{CursorPosition, Event, Window, WindowId};

/// Windows and cursor position as observed from labwc's events
///
/// The mirror is only ever changed through [`StateMirror::apply`]. Mutating
/// events for a window it does not know are ignored: during a reconnect the
/// mirror may legitimately be stale until the next `window_list` arrives.
#[derive(Debug, Default, Clone)]
pub struct StateMirror {
    windows: BTreeMap<WindowId, Window>,
    cursor: CursorPosition,
}

impl StateMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event and return the notification it produces, if any
    pub fn apply(&mut self, event: Event) -> Option<Notification> {
        match event {
            Event::Cursor(position) => {
                self.cursor = position;
                Some(Notification::Cursor(position))
            }
            Event::WindowList { windows } => {
                self.replace(windows);
                Some(Notification::WindowList(self.windows()))
            }
            Event::Mapped(window) => {
                self.windows.insert(window.id.clone(), window.clone());
                Some(Notification::WindowCreated(window))
            }
            Event::Unmapped(window) | Event::Closed(window) => {
                self.windows.remove(&window.id);
                Some(Notification::WindowClosed(window))
            }
            Event::Moved(window) => self
                .merge(&window)
                .then(|| Notification::WindowMoved(window)),
            Event::Focused(window) => Some(Notification::WindowFocused(window)),
            Event::TitleChanged(window) => {
                let existing = self.windows.get_mut(&window.id)?;
                existing.title = window.title.clone();
                Some(Notification::WindowTitleChanged(window))
            }
            Event::Minimized(window) => self.state_changed(StateChange::Minimized, window),
            Event::Maximized(window) => self.state_changed(StateChange::Maximized, window),
            Event::Fullscreen(window) => self.state_changed(StateChange::Fullscreen, window),
            Event::DecorationsDisabled => Some(Notification::DecorationsDisabled),
        }
    }

    /// Snapshot of every known window, ordered by id
    pub fn windows(&self) -> Vec<Window> {
        self.windows.values().cloned().collect()
    }

    pub fn window(&self, id: &WindowId) -> Option<&Window> {
        self.windows.get(id)
    }

    pub fn cursor(&self) -> CursorPosition {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    // A repeated id within one snapshot keeps the last record.
    fn replace(&mut self, windows: Vec<Window>) {
        self.windows = windows
            .into_iter()
            .map(|window| (window.id.clone(), window))
            .collect();
    }

    fn merge(&mut self, update: &Window) -> bool {
        match self.windows.get_mut(&update.id) {
            Some(existing) => {
                existing.merge(update);
                true
            }
            None => {
                tracing::trace!(id = %update.id, "Ignoring update for unknown window");
                false
            }
        }
    }

    fn state_changed(&mut self, change: StateChange, window: Window) -> Option<Notification> {
        self.merge(&window)
            .then(|| Notification::WindowStateChanged { change, window })
    }
}
