//! Error types for labwc IPC operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur on the connection to the labwc compositor
///
/// None of these are fatal. Transport failures are reported through the
/// `error` notification and followed by a scheduled reconnect; the rest are
/// returned from sending commands.
#[derive(Debug, Error)]
pub enum LabwcError {
    /// Failed to connect to the labwc socket
    #[error("Failed to connect to labwc socket at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a command to labwc
    #[error("Failed to send command to labwc: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Failed to read from the labwc socket
    #[error("Failed to receive from labwc: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Failed to serialize a command to JSON
    #[error("Failed to serialize command: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    /// No connection is open
    #[error("Not connected to labwc")]
    NotConnected,

    /// The writer has fallen too far behind
    #[error("Outbound command queue is full")]
    QueueFull,

    /// The connection closed before the command was written
    #[error("Connection to labwc closed before the command was written")]
    ConnectionLost,
}

/// A frame that could not be turned into a record
///
/// Decode errors only ever discard the offending frame; the stream and the
/// connection carry on.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame is not valid JSON
    #[error("Malformed frame {frame:?}: {source}")]
    Syntax {
        frame: String,
        #[source]
        source: serde_json::Error,
    },

    /// The frame is JSON but does not fit the shape of its event
    #[error("Invalid `{event}` event {frame:?}: {source}")]
    Schema {
        frame: String,
        event: String,
        #[source]
        source: serde_json::Error,
    },

    /// A known event is missing a field it cannot do without
    #[error("`{event}` event is missing `{field}`: {frame:?}")]
    MissingField {
        frame: String,
        event: &'static str,
        field: &'static str,
    },
}

impl DecodeError {
    /// The text of the discarded frame
    pub fn frame(&self) -> &str {
        match self {
            Self::Syntax { frame, .. }
            | Self::Schema { frame, .. }
            | Self::MissingField { frame, .. } => frame,
        }
    }
}
