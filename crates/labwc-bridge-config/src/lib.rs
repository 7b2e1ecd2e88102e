//! Configuration parsing for labwc-bridge
//!
//! This crate parses the KDL configuration file shared by the client
//! library and the `labwc-bridge` command-line tool.

mod error;
mod model;
mod parser;

pub use error::ConfigError;
pub use model::*;
pub use parser::{load_config_or_default, parse_config, parse_config_str};
