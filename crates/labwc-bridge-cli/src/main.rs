//! labwc-bridge CLI
//!
//! Inspect and drive the labwc compositor over its IPC socket.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use labwc_bridge_client::{Command, LabwcClient, Notification, Window};
use labwc_bridge_config::{Config, LogLevel};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing_subscriber::{fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// How long one-shot commands wait for the compositor
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "labwc-bridge")]
#[command(about = "Mirror and control labwc windows over IPC")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/labwc-bridge/config.kdl")]
    config: String,

    /// Path to the labwc IPC socket (overrides config and $LABWC_IPC_SOCKET)
    #[arg(short, long)]
    socket: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration file
    Validate,

    /// Print notifications as they arrive until interrupted
    Watch,

    /// List the compositor's windows
    Windows {
        /// Print the window list as JSON
        #[arg(long)]
        json: bool,
    },

    #[command(flatten)]
    Window(WindowCommand),
}

/// Commands acting on a single window
#[derive(Subcommand, Debug)]
enum WindowCommand {
    /// Close a window
    Close { id: String },

    /// Minimize a window
    Minimize { id: String },

    /// Maximize a window
    Maximize { id: String },

    /// Give a window keyboard focus
    Focus { id: String },

    /// Keep a window above all others
    AlwaysOnTop { id: String },

    /// Keep a window below all others
    AlwaysOnBottom { id: String },

    /// Move and resize a window
    #[command(allow_negative_numbers = true)]
    Move {
        id: String,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

impl WindowCommand {
    fn into_command(self) -> Command {
        match self {
            Self::Close { id } => Command::Close { id: id.into() },
            Self::Minimize { id } => Command::Minimize { id: id.into() },
            Self::Maximize { id } => Command::Maximize { id: id.into() },
            Self::Focus { id } => Command::Focus { id: id.into() },
            Self::AlwaysOnTop { id } => Command::AlwaysOnTop { id: id.into() },
            Self::AlwaysOnBottom { id } => Command::AlwaysOnBottom { id: id.into() },
            Self::Move {
                id,
                x,
                y,
                width,
                height,
            } => Command::move_to(id, x, y, width, height),
        }
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Start at warn so config warnings are visible, then switch to the
    // configured level unless RUST_LOG is set.
    let (filter, filter_handle) = reload::Layer::new(env_filter(LogLevel::Warn));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Expand tilde in config path
    let config_path: PathBuf = shellexpand::tilde(&cli.config).into_owned().into();
    let mut config = labwc_bridge_config::load_config_or_default(&config_path)?;
    if let Some(socket) = &cli.socket {
        config.socket_path = Some(shellexpand::tilde(socket).into_owned().into());
    }

    if let Err(e) = filter_handle.reload(env_filter(config.log_level)) {
        tracing::warn!("Failed to apply log level {}: {}", config.log_level, e);
    }

    let result = match cli.command {
        Commands::Validate => {
            cmd_validate(&config_path, &config);
            Ok(())
        }
        Commands::Watch => cmd_watch(&config).await,
        Commands::Windows { json } => cmd_windows(&config, json).await,
        Commands::Window(command) => cmd_send(&config, command.into_command()).await,
    };

    result.map_err(|e| miette::miette!("{:#}", e))
}

fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

fn cmd_validate(config_path: &Path, config: &Config) {
    println!("Validating configuration: {}", config_path.display());
    if config_path.exists() {
        println!("Configuration is valid!");
    } else {
        println!("No configuration file found, using defaults");
    }
    println!("  Socket: {}", config.resolve_socket_path().display());
    println!("  Reconnect delay: {}ms", config.reconnect_delay.as_millis());
    println!("  Notification buffer: {}", config.notification_buffer);
    println!("  Log level: {}", config.log_level);
}

async fn cmd_watch(config: &Config) -> anyhow::Result<()> {
    let client = LabwcClient::new(config);
    let mut notifications = client.notifications();
    client.connect();

    tracing::info!("Watching {}", client.socket_path().display());

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
            next = notifications.next() => match next {
                Some(Ok(notification)) => println!("{}", describe(&notification)),
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    tracing::warn!(skipped, "Fell behind, some notifications were dropped");
                }
                None => break,
            },
        }
    }

    client.disconnect();
    Ok(())
}

async fn cmd_windows(config: &Config, json: bool) -> anyhow::Result<()> {
    let client = LabwcClient::new(config);
    let mut notifications = client.subscribe();
    client.connect();

    wait_for_connection(&mut notifications).await?;

    let windows = wait_for(&mut notifications, "window list", |notification| {
        match notification {
            Notification::WindowList(windows) => Some(windows),
            _ => None,
        }
    })
    .await?;

    client.disconnect();

    if json {
        let output =
            serde_json::to_string_pretty(&windows).context("Failed to serialize window list")?;
        println!("{}", output);
    } else if windows.is_empty() {
        println!("No windows");
    } else {
        for window in &windows {
            println!("{}", format_window(window));
        }
    }

    Ok(())
}

async fn cmd_send(config: &Config, command: Command) -> anyhow::Result<()> {
    let client = LabwcClient::new(config);
    let mut notifications = client.subscribe();
    client.connect();

    wait_for_connection(&mut notifications).await?;

    tokio::time::timeout(RESPONSE_TIMEOUT, client.send_confirmed(&command))
        .await
        .with_context(|| format!("Timed out sending `{}`", command.name()))?
        .with_context(|| format!("Failed to send `{}`", command.name()))?;

    client.disconnect();
    println!("Sent {}", command.name());
    Ok(())
}

/// Wait for `connected`, failing on the first connection error
async fn wait_for_connection(
    notifications: &mut broadcast::Receiver<Notification>,
) -> anyhow::Result<()> {
    let outcome = wait_for(notifications, "connection", |notification| match notification {
        Notification::Connected => Some(Ok(())),
        Notification::Error(e) => Some(Err(e)),
        _ => None,
    })
    .await?;

    outcome.context("Could not reach labwc")
}

/// Wait until `select` picks a notification, up to [`RESPONSE_TIMEOUT`]
async fn wait_for<T>(
    notifications: &mut broadcast::Receiver<Notification>,
    what: &str,
    mut select: impl FnMut(Notification) -> Option<T>,
) -> anyhow::Result<T> {
    let wait = async {
        loop {
            match notifications.recv().await {
                Ok(notification) => {
                    if let Some(value) = select(notification) {
                        return Ok(value);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Skipped notifications while waiting");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    bail!("Notification channel closed while waiting for {}", what)
                }
            }
        }
    };

    tokio::time::timeout(RESPONSE_TIMEOUT, wait)
        .await
        .with_context(|| format!("Timed out waiting for {}", what))?
}

fn format_window(window: &Window) -> String {
    let mut line = format!(
        "{}  {}  {}",
        window.id,
        window.app_id.as_deref().unwrap_or("-"),
        window.title.as_deref().unwrap_or("<untitled>")
    );

    if let (Some(x), Some(y), Some(width), Some(height)) =
        (window.x, window.y, window.width, window.height)
    {
        line.push_str(&format!("  {}x{}+{}+{}", width, height, x, y));
    }

    let flags: Vec<&str> = [
        (window.focused == Some(true), "focused"),
        (window.minimized == Some(true), "minimized"),
        (window.fullscreen == Some(true), "fullscreen"),
    ]
    .into_iter()
    .filter_map(|(set, flag)| set.then_some(flag))
    .collect();
    if !flags.is_empty() {
        line.push_str(&format!("  [{}]", flags.join(", ")));
    }

    line
}

fn describe(notification: &Notification) -> String {
    match notification {
        Notification::Connected | Notification::Disconnected | Notification::DecorationsDisabled => {
            notification.name().to_string()
        }
        Notification::Error(e) => format!("error: {}", e),
        Notification::Cursor(position) => format!("cursor: {},{}", position.x, position.y),
        Notification::WindowList(windows) => format!("window_list: {} window(s)", windows.len()),
        Notification::WindowCreated(window)
        | Notification::WindowClosed(window)
        | Notification::WindowMoved(window)
        | Notification::WindowFocused(window)
        | Notification::WindowTitleChanged(window) => {
            format!("{}: {}", notification.name(), format_window(window))
        }
        Notification::WindowStateChanged { change, window } => {
            format!("{} ({}): {}", notification.name(), change, format_window(window))
        }
    }
}
