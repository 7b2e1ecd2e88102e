//! Configuration data model

use std::path::PathBuf;
use std::time::Duration;

/// Socket the labwc IPC patch listens on when nothing else is configured
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/labwc-nwjs.sock";

/// Environment variable that overrides the default socket path
pub const SOCKET_ENV: &str = "LABWC_IPC_SOCKET";

/// Delay between an unexpected disconnect and the next connection attempt
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Number of notifications a slow subscriber may lag behind before it
/// starts missing them
pub const DEFAULT_NOTIFICATION_BUFFER: usize = 256;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Explicit compositor socket path (tilde-expanded)
    pub socket_path: Option<PathBuf>,
    pub reconnect_delay: Duration,
    pub notification_buffer: usize,
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: None,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            notification_buffer: DEFAULT_NOTIFICATION_BUFFER,
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Determine which socket to connect to
    ///
    /// An explicitly configured path wins, then `$LABWC_IPC_SOCKET`, then
    /// [`DEFAULT_SOCKET_PATH`].
    pub fn resolve_socket_path(&self) -> PathBuf {
        if let Some(path) = &self.socket_path {
            return path.clone();
        }

        match std::env::var(SOCKET_ENV) {
            Ok(path) if !path.is_empty() => shellexpand::tilde(&path).into_owned().into(),
            _ => PathBuf::from(DEFAULT_SOCKET_PATH),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
