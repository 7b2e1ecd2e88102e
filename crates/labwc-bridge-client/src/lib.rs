//! labwc IPC client for compositor integration
//!
//! This crate talks to the labwc compositor over its IPC Unix socket. It
//! enables applications to:
//! - Mirror the compositor's windows and the cursor position locally
//! - Subscribe to window lifecycle, focus and state notifications
//! - Close, minimize, maximize, move, focus and restack windows
//!
//! ## Architecture
//!
//! - `Framer`: Splits the inbound byte stream into newline-delimited frames
//! - `decode`: Turns one frame into an [`Event`] or an unrecognized record
//! - `StateMirror`: Applies events to the local window table
//! - `LabwcClient`: Owns the connection, reconnects, and emits notifications;
//!   commands are written by a per-connection writer task
//! - `Command`: Outbound requests, one JSON object per line
//!
//! ## Protocol
//!
//! labwc listens on a Unix socket (`$LABWC_IPC_SOCKET`, or the configured
//! path). Both directions carry one JSON object per line. Events carry an
//! `event` discriminator, commands a `cmd` discriminator. On every connect
//! the client asks for a full window list and for decorations to be
//! disabled.

mod command;
mod connection;
mod error;
mod framer;
mod mirror;
mod notification;
mod protocol;

pub use command::Command;
pub use connection::{LabwcClient, OUTBOUND_QUEUE_SIZE};
pub use error::{DecodeError, LabwcError};
pub use framer::{Framer, Frames};
pub use mirror::StateMirror;
pub use notification::{Notification, StateChange};
pub use protocol::{decode, CursorPosition, Event, Maximized, Record, Window, WindowId};
