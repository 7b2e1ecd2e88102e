//! Outbound commands

use serde::Serialize;

use crate::protocol::WindowId;

/// A request for the compositor, serialized with a `cmd` discriminator
///
/// labwc's command parser expects `cmd` to be the first key and `id` to
/// follow it, which is the order serde emits these fields in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Ask for a full `window_list`
    List,
    /// Ask labwc to drop its server-side decorations
    EnableDecorations,
    Close {
        id: WindowId,
    },
    Minimize {
        id: WindowId,
    },
    Maximize {
        id: WindowId,
    },
    Move {
        id: WindowId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    Focus {
        id: WindowId,
    },
    AlwaysOnTop {
        id: WindowId,
    },
    AlwaysOnBottom {
        id: WindowId,
    },
}

impl Command {
    /// Move/resize command from fractional coordinates, rounded to whole pixels
    pub fn move_to(id: impl Into<WindowId>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::Move {
            id: id.into(),
            x: x.round() as i32,
            y: y.round() as i32,
            width: width.round() as i32,
            height: height.round() as i32,
        }
    }

    /// The wire discriminator of this command
    pub fn name(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::EnableDecorations => "enable_decorations",
            Self::Close { .. } => "close",
            Self::Minimize { .. } => "minimize",
            Self::Maximize { .. } => "maximize",
            Self::Move { .. } => "move",
            Self::Focus { .. } => "focus",
            Self::AlwaysOnTop { .. } => "always_on_top",
            Self::AlwaysOnBottom { .. } => "always_on_bottom",
        }
    }

    /// Serialize to a single newline-terminated line
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
