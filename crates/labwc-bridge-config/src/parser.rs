//! KDL configuration parser

use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::model::*;

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse the configuration file, or fall back to defaults when it does not exist
///
/// Any other failure (unreadable file, bad KDL, invalid value) is still an error.
pub fn load_config_or_default(path: &Path) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "No configuration at {}, using defaults",
                path.display()
            );
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl reports spans with its own miette version
        let span = miette::SourceSpan::from((e.span.offset(), e.span.len()));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "socket-path" => {
                let entry = first_entry(node, content)?;
                let val = entry.value().as_string().ok_or_else(|| {
                    invalid_value(node, entry, content, "expected a string path")
                })?;
                if val.is_empty() {
                    return Err(invalid_value(node, entry, content, "path must not be empty"));
                }
                config.socket_path = Some(shellexpand::tilde(val).into_owned().into());
            }
            "reconnect-delay-ms" => {
                let entry = first_entry(node, content)?;
                let millis = positive_integer(node, entry, content)?;
                config.reconnect_delay = Duration::from_millis(millis);
            }
            "notification-buffer" => {
                let entry = first_entry(node, content)?;
                let size = positive_integer(node, entry, content)?;
                config.notification_buffer = usize::try_from(size).map_err(|_| {
                    invalid_value(node, entry, content, "buffer size is too large")
                })?;
            }
            "log-level" => {
                let entry = first_entry(node, content)?;
                let val = entry.value().as_string().ok_or_else(|| {
                    invalid_value(node, entry, content, "expected a string")
                })?;
                config.log_level = val
                    .parse()
                    .map_err(|e: String| invalid_value(node, entry, content, &e))?;
            }
            name => {
                tracing::warn!("Unknown config option: {}", name);
            }
        }
    }

    Ok(config)
}

fn first_entry<'a>(
    node: &'a kdl::KdlNode,
    source: &str,
) -> Result<&'a kdl::KdlEntry, ConfigError> {
    node.entries().first().ok_or_else(|| {
        let span = node.name().span();
        ConfigError::InvalidValue {
            key: node.name().value().to_string(),
            message: "missing value".to_string(),
            src: source.to_string(),
            span: miette::SourceSpan::from((span.offset(), span.len())),
        }
    })
}

fn positive_integer(
    node: &kdl::KdlNode,
    entry: &kdl::KdlEntry,
    source: &str,
) -> Result<u64, ConfigError> {
    match entry.value().as_i64() {
        Some(n) if n > 0 => Ok(n as u64),
        Some(_) => Err(invalid_value(node, entry, source, "must be greater than zero")),
        None => Err(invalid_value(node, entry, source, "expected an integer")),
    }
}

fn invalid_value(
    node: &kdl::KdlNode,
    entry: &kdl::KdlEntry,
    source: &str,
    message: &str,
) -> ConfigError {
    let span = entry.span();
    ConfigError::InvalidValue {
        key: node.name().value().to_string(),
        message: message.to_string(),
        src: source.to_string(),
        span: miette::SourceSpan::from((span.offset(), span.len())),
    }
}
