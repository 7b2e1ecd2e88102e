//! Inbound labwc protocol records
//!
//! labwc writes one JSON object per line, discriminated by an `event`
//! field. Known events decode into [`Event`]; anything else becomes
//! [`Record::Unrecognized`] so that new compositor events never break the
//! stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;

/// Identifier labwc assigns to a window
///
/// labwc currently sends the view address as a hex string, but the
/// identifier is treated as opaque and plain integers are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WindowId {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for WindowId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl From<String> for WindowId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

impl From<&str> for WindowId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl From<&WindowId> for WindowId {
    fn from(id: &WindowId) -> Self {
        id.clone()
    }
}

/// Maximization state of a window
///
/// labwc reports this either as a boolean or as its view axis
/// (0 = none, 1 = horizontal, 2 = vertical, 3 = both).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "MaximizedRepr", rename_all = "snake_case")]
pub enum Maximized {
    None,
    Horizontal,
    Vertical,
    Both,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MaximizedRepr {
    Flag(bool),
    Axis(u64),
    Name(String),
}

impl TryFrom<MaximizedRepr> for Maximized {
    type Error = String;

    fn try_from(repr: MaximizedRepr) -> Result<Self, Self::Error> {
        match repr {
            MaximizedRepr::Flag(false) | MaximizedRepr::Axis(0) => Ok(Self::None),
            MaximizedRepr::Flag(true) | MaximizedRepr::Axis(3) => Ok(Self::Both),
            MaximizedRepr::Axis(1) => Ok(Self::Horizontal),
            MaximizedRepr::Axis(2) => Ok(Self::Vertical),
            MaximizedRepr::Axis(n) => Err(format!("unknown maximize axis {}", n)),
            MaximizedRepr::Name(name) => match name.as_str() {
                "none" => Ok(Self::None),
                "horizontal" => Ok(Self::Horizontal),
                "vertical" => Ok(Self::Vertical),
                "both" => Ok(Self::Both),
                _ => Err(format!("unknown maximize state {:?}", name)),
            },
        }
    }
}

/// Window state as reported by labwc
///
/// Every attribute except `id` is optional: events only carry what they
/// assert, and a field labwc never reported stays `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub id: WindowId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimized: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximized: Option<Maximized>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullscreen: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focused: Option<bool>,
}

impl Window {
    /// A window with only its identifier known
    pub fn new(id: impl Into<WindowId>) -> Self {
        Self {
            id: id.into(),
            title: None,
            app_id: None,
            x: None,
            y: None,
            width: None,
            height: None,
            minimized: None,
            maximized: None,
            fullscreen: None,
            focused: None,
        }
    }

    /// Overwrite every field `update` asserts, keep the rest
    pub fn merge(&mut self, update: &Window) {
        fn assign<T: Clone>(field: &mut Option<T>, value: &Option<T>) {
            if let Some(value) = value {
                *field = Some(value.clone());
            }
        }

        assign(&mut self.title, &update.title);
        assign(&mut self.app_id, &update.app_id);
        assign(&mut self.x, &update.x);
        assign(&mut self.y, &update.y);
        assign(&mut self.width, &update.width);
        assign(&mut self.height, &update.height);
        assign(&mut self.minimized, &update.minimized);
        assign(&mut self.maximized, &update.maximized);
        assign(&mut self.fullscreen, &update.fullscreen);
        assign(&mut self.focused, &update.focused);
    }
}

/// Pointer position in layout coordinates
///
/// Kept as floating point since labwc formats it with `%.0f`, which
/// yields `-0` for small negative positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

/// A recognized compositor event
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Cursor(CursorPosition),
    WindowList { windows: Vec<Window> },
    Mapped(Window),
    Unmapped(Window),
    Closed(Window),
    Moved(Window),
    Focused(Window),
    TitleChanged(Window),
    Minimized(Window),
    Maximized(Window),
    Fullscreen(Window),
    DecorationsDisabled,
}

impl Event {
    /// Every `event` discriminator decoded into an [`Event`]
    pub const NAMES: &'static [&'static str] = &[
        "cursor",
        "window_list",
        "mapped",
        "unmapped",
        "closed",
        "moved",
        "focused",
        "title_changed",
        "minimized",
        "maximized",
        "fullscreen",
        "decorations_disabled",
    ];

    /// The wire discriminator of this event
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cursor(_) => "cursor",
            Self::WindowList { .. } => "window_list",
            Self::Mapped(_) => "mapped",
            Self::Unmapped(_) => "unmapped",
            Self::Closed(_) => "closed",
            Self::Moved(_) => "moved",
            Self::Focused(_) => "focused",
            Self::TitleChanged(_) => "title_changed",
            Self::Minimized(_) => "minimized",
            Self::Maximized(_) => "maximized",
            Self::Fullscreen(_) => "fullscreen",
            Self::DecorationsDisabled => "decorations_disabled",
        }
    }

    fn check_required(&self, frame: &str) -> Result<(), DecodeError> {
        let missing = |field| DecodeError::MissingField {
            frame: frame.to_string(),
            event: self.name(),
            field,
        };

        match self {
            Self::Moved(window) => {
                let geometry = [
                    ("x", window.x),
                    ("y", window.y),
                    ("width", window.width),
                    ("height", window.height),
                ];
                match geometry.iter().find(|(_, value)| value.is_none()) {
                    Some((field, _)) => Err(missing(*field)),
                    None => Ok(()),
                }
            }
            Self::TitleChanged(window) if window.title.is_none() => Err(missing("title")),
            _ => Ok(()),
        }
    }
}

/// One decoded frame
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Event(Event),
    /// Valid JSON whose `event` is missing or not one of [`Event::NAMES`]
    Unrecognized {
        event: Option<String>,
        payload: Value,
    },
}

/// Decode a single frame
///
/// # Errors
///
/// Returns `DecodeError::Syntax` if the frame is not JSON,
/// `DecodeError::Schema` if a known event has fields of the wrong shape and
/// `DecodeError::MissingField` if a known event lacks a required field.
pub fn decode(frame: &str) -> Result<Record, DecodeError> {
    let value: Value = serde_json::from_str(frame).map_err(|source| DecodeError::Syntax {
        frame: frame.to_string(),
        source,
    })?;

    let name = value.get("event").and_then(Value::as_str).map(str::to_owned);

    match name.as_deref() {
        Some(known) if Event::NAMES.contains(&known) => {
            let event: Event =
                serde_json::from_value(value).map_err(|source| DecodeError::Schema {
                    frame: frame.to_string(),
                    event: known.to_string(),
                    source,
                })?;
            event.check_required(frame)?;
            Ok(Record::Event(event))
        }
        _ => Ok(Record::Unrecognized {
            event: name,
            payload: value,
        }),
    }
}
