//! Connection management for the labwc IPC socket
//!
//! [`LabwcClient`] is a cheap, cloneable handle. Reading, event dispatch and
//! the reconnect timer run on a single driver task spawned by
//! [`LabwcClient::new`], so inbound chunks are processed one at a time and
//! the mirror never sees concurrent writers. Each connection gets its own
//! writer task fed by a bounded queue; a compositor that stops reading can
//! stall that writer but never the driver.
//!
//! ## Architecture
//!
//! ```text
//! +-------------+  Control   +---------------+  Notification  +-------------+
//! | LabwcClient | ---------> | Driver task   | -------------> | subscribers |
//! | (handles)   |   mpsc     | Framer/decode |   broadcast    |             |
//! +-------------+            +---------------+                +-------------+
//!        |                           | owns
//!        |  Outbound (bounded mpsc)  v
//!        +---------------------> Writer task (one per connection)
//! ```
//!
//! ## Reconnection
//!
//! - Unexpected closure (EOF, read/write error, failed connect) schedules one
//!   reconnect after the configured delay (1 second by default)
//! - At most one reconnect timer is ever pending
//! - `disconnect()` cancels the timer and never schedules a new one
//! - Closing a connection aborts its writer; unwritten commands are dropped

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use labwc_bridge_config::Config;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, trace, warn};

use crate::command::Command;
use crate::error::LabwcError;
use crate::framer::Framer;
use crate::mirror::StateMirror;
use crate::notification::Notification;
use crate::protocol::{decode, CursorPosition, Record, Window, WindowId};

/// Bytes read from the socket per wakeup
const READ_BUFFER_SIZE: usize = 4096;

/// Commands that may wait for the writer before `send` starts failing
pub const OUTBOUND_QUEUE_SIZE: usize = 1024;

/// Lifecycle state of the compositor connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

type ConnectFuture = Pin<Box<dyn Future<Output = io::Result<UnixStream>> + Send>>;

/// The transport together with the state it implies
enum Link {
    Disconnected,
    Connecting(ConnectFuture),
    Connected(Transport),
}

impl Link {
    fn state(&self) -> ConnectionState {
        match self {
            Self::Disconnected => ConnectionState::Disconnected,
            Self::Connecting(_) => ConnectionState::Connecting,
            Self::Connected(_) => ConnectionState::Connected,
        }
    }
}

/// Read half plus the writer task of one open connection
struct Transport {
    reader: OwnedReadHalf,
    writer: JoinHandle<()>,
    /// Receives the error that stopped the writer
    write_failures: mpsc::Receiver<io::Error>,
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.writer.abort();
    }
}

/// One encoded command waiting for the writer
#[derive(Debug)]
struct Outbound {
    command: &'static str,
    line: String,
    /// Signalled once the line has been written and flushed
    written: Option<oneshot::Sender<()>>,
}

/// Requests from client handles to the driver
#[derive(Debug)]
enum Control {
    Connect,
    Disconnect,
}

/// State readable from any handle without going through the driver
#[derive(Debug, Default)]
struct Shared {
    mirror: RwLock<StateMirror>,
    /// Queue of the open connection's writer, `None` while not connected
    outbound: Mutex<Option<mpsc::Sender<Outbound>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn emit(notifications: &broadcast::Sender<Notification>, notification: Notification) {
    trace!(notification = notification.name(), "Emitting notification");
    // Having no subscribers is fine
    let _ = notifications.send(notification);
}

/// Client for the labwc compositor IPC socket
///
/// The client keeps a mirror of the compositor's windows, reconnects on its
/// own after unexpected disconnects and reports everything that happens as
/// [`Notification`]s. No method blocks: effects of `connect`, `disconnect`
/// and `send` surface later as notifications.
///
/// # Example
///
/// ```ignore
/// let client = LabwcClient::new(&Config::default());
/// let mut notifications = client.subscribe();
/// client.connect();
///
/// while let Ok(notification) = notifications.recv().await {
///     if let Notification::WindowCreated(window) = notification {
///         client.focus_window(window.id);
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct LabwcClient {
    control: mpsc::UnboundedSender<Control>,
    shared: Arc<Shared>,
    notifications: broadcast::Sender<Notification>,
    socket_path: PathBuf,
}

impl LabwcClient {
    /// Create a client and spawn its connection driver
    ///
    /// The client starts disconnected; call [`connect`](Self::connect) to
    /// open the socket. The driver stops once every handle is dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &Config) -> Self {
        let socket_path = config.resolve_socket_path();
        let (control, control_rx) = mpsc::unbounded_channel();
        let (notifications, _) = broadcast::channel(config.notification_buffer.max(1));
        let shared = Arc::new(Shared::default());

        let driver = Driver {
            socket_path: socket_path.clone(),
            reconnect_delay: config.reconnect_delay,
            control: control_rx,
            shared: Arc::clone(&shared),
            notifications: notifications.clone(),
            link: Link::Disconnected,
            reconnect: None,
            framer: Framer::new(),
        };
        tokio::spawn(driver.run());

        Self {
            control,
            shared,
            notifications,
            socket_path,
        }
    }

    /// The socket this client connects to
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Open the connection unless it is already open or being opened
    pub fn connect(&self) {
        self.request(Control::Connect);
    }

    /// Close the connection and cancel any pending reconnect
    ///
    /// Commands still waiting for the writer are dropped with the
    /// connection. Use [`send_confirmed`](Self::send_confirmed) to know a
    /// command went out before disconnecting.
    pub fn disconnect(&self) {
        self.request(Control::Disconnect);
    }

    /// Receive every notification emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// [`subscribe`](Self::subscribe) as a `Stream`
    pub fn notifications(&self) -> BroadcastStream<Notification> {
        BroadcastStream::new(self.subscribe())
    }

    /// Queue a command for the open connection
    ///
    /// Returns `false` (and logs a warning) when no connection is open or
    /// its outbound queue is full. A command accepted here is dropped if
    /// that connection closes before it is written; it is never replayed on
    /// a later connection.
    pub fn send(&self, command: &Command) -> bool {
        match self.try_queue(command) {
            Ok(()) => true,
            Err(LabwcError::NotConnected) => {
                warn!(command = command.name(), "Not connected to compositor");
                false
            }
            Err(e) => {
                warn!(command = command.name(), "{}", e);
                false
            }
        }
    }

    /// Send a command and wait until it has been written to the socket
    ///
    /// Waits for room in the outbound queue instead of failing when it is
    /// full.
    ///
    /// # Errors
    ///
    /// Returns `LabwcError::NotConnected` if no connection is open and
    /// `LabwcError::ConnectionLost` if the connection closed before the
    /// command was written.
    pub async fn send_confirmed(&self, command: &Command) -> Result<(), LabwcError> {
        let line = command.encode().map_err(LabwcError::SerializeFailed)?;
        let outbound = lock(&self.shared.outbound)
            .clone()
            .ok_or(LabwcError::NotConnected)?;

        let (written, confirmed) = oneshot::channel();
        outbound
            .send(Outbound {
                command: command.name(),
                line,
                written: Some(written),
            })
            .await
            .map_err(|_| LabwcError::ConnectionLost)?;
        drop(outbound);

        confirmed.await.map_err(|_| LabwcError::ConnectionLost)
    }

    /// Ask labwc to close a window
    pub fn close_window(&self, id: impl Into<WindowId>) -> bool {
        self.send(&Command::Close { id: id.into() })
    }

    /// Ask labwc to minimize a window
    pub fn minimize_window(&self, id: impl Into<WindowId>) -> bool {
        self.send(&Command::Minimize { id: id.into() })
    }

    /// Ask labwc to maximize a window
    pub fn maximize_window(&self, id: impl Into<WindowId>) -> bool {
        self.send(&Command::Maximize { id: id.into() })
    }

    /// Move and resize a window; coordinates are rounded to whole pixels
    pub fn move_window(
        &self,
        id: impl Into<WindowId>,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> bool {
        self.send(&Command::move_to(id, x, y, width, height))
    }

    /// Give a window keyboard focus
    pub fn focus_window(&self, id: impl Into<WindowId>) -> bool {
        self.send(&Command::Focus { id: id.into() })
    }

    /// Keep a window above all others
    pub fn set_always_on_top(&self, id: impl Into<WindowId>) -> bool {
        self.send(&Command::AlwaysOnTop { id: id.into() })
    }

    /// Keep a window below all others
    pub fn set_always_on_bottom(&self, id: impl Into<WindowId>) -> bool {
        self.send(&Command::AlwaysOnBottom { id: id.into() })
    }

    /// Snapshot of every window currently in the mirror
    pub fn windows(&self) -> Vec<Window> {
        read_lock(&self.shared.mirror).windows()
    }

    /// The mirrored record of one window, if known
    pub fn window(&self, id: &WindowId) -> Option<Window> {
        read_lock(&self.shared.mirror).window(id).cloned()
    }

    /// Last cursor position reported by labwc
    pub fn cursor_position(&self) -> CursorPosition {
        read_lock(&self.shared.mirror).cursor()
    }

    fn try_queue(&self, command: &Command) -> Result<(), LabwcError> {
        let line = command.encode().map_err(LabwcError::SerializeFailed)?;
        let outbound = lock(&self.shared.outbound);
        let queue = outbound.as_ref().ok_or(LabwcError::NotConnected)?;

        queue
            .try_send(Outbound {
                command: command.name(),
                line,
                written: None,
            })
            .map_err(|e| match e {
                TrySendError::Full(_) => LabwcError::QueueFull,
                TrySendError::Closed(_) => LabwcError::NotConnected,
            })
    }

    fn request(&self, control: Control) {
        if self.control.send(control).is_err() {
            warn!("labwc connection driver is no longer running");
        }
    }
}

/// What the link produced while the driver was waiting on it
enum Activity {
    Connect(io::Result<UnixStream>),
    Read(io::Result<usize>),
    WriteFailed(io::Error),
}

/// Owns the socket's read side; runs on its own task
struct Driver {
    socket_path: PathBuf,
    reconnect_delay: Duration,
    control: mpsc::UnboundedReceiver<Control>,
    shared: Arc<Shared>,
    notifications: broadcast::Sender<Notification>,
    link: Link,
    /// The single pending reconnect, if any
    reconnect: Option<Pin<Box<Sleep>>>,
    framer: Framer,
}

impl Driver {
    async fn run(mut self) {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            tokio::select! {
                control = self.control.recv() => match control {
                    Some(control) => self.handle_control(control),
                    None => {
                        debug!("All client handles dropped, stopping labwc connection driver");
                        break;
                    }
                },
                activity = link_activity(&mut self.link, &mut buf) => {
                    self.handle_activity(activity, &buf);
                }
                () = reconnect_timer(&mut self.reconnect) => {
                    self.reconnect = None;
                    info!("Reconnecting to labwc compositor");
                    self.start_connect();
                }
            }
        }

        self.close_link();
    }

    fn handle_control(&mut self, control: Control) {
        match control {
            Control::Connect => match self.link.state() {
                ConnectionState::Disconnected => {
                    if self.reconnect.take().is_some() {
                        debug!("Pending reconnect replaced by explicit connect");
                    }
                    self.start_connect();
                }
                state => debug!(?state, "Ignoring connect request"),
            },
            Control::Disconnect => {
                if self.reconnect.take().is_some() {
                    debug!("Cancelled pending reconnect");
                }
                if self.link.state() != ConnectionState::Disconnected {
                    self.close_link();
                    info!("Disconnected from labwc compositor");
                    emit(&self.notifications, Notification::Disconnected);
                }
            }
        }
    }

    fn handle_activity(&mut self, activity: Activity, buf: &[u8]) {
        match activity {
            Activity::Connect(Ok(stream)) => self.on_connected(stream),
            Activity::Connect(Err(source)) => {
                warn!(
                    path = %self.socket_path.display(),
                    error = %source,
                    "Failed to connect to labwc compositor"
                );
                self.fail(LabwcError::ConnectionFailed {
                    path: self.socket_path.clone(),
                    source,
                });
            }
            Activity::Read(Ok(0)) => {
                warn!("labwc closed the IPC connection");
                self.on_closed();
            }
            Activity::Read(Ok(n)) => self.on_data(&buf[..n]),
            Activity::Read(Err(source)) => {
                warn!(error = %source, "Failed to read from labwc");
                self.fail(LabwcError::ReceiveFailed(source));
            }
            Activity::WriteFailed(source) => {
                warn!(error = %source, "Failed to send command to labwc");
                self.fail(LabwcError::SendFailed(source));
            }
        }
    }

    fn start_connect(&mut self) {
        debug!(path = %self.socket_path.display(), "Connecting to labwc compositor");
        let path = self.socket_path.clone();
        self.link = Link::Connecting(Box::pin(UnixStream::connect(path)));
    }

    fn on_connected(&mut self, stream: UnixStream) {
        let (reader, writer) = stream.into_split();
        let (outbound, queue) = mpsc::channel(OUTBOUND_QUEUE_SIZE);
        let (failures, write_failures) = mpsc::channel(1);

        // Queued before the handle can see the connection, so always first
        for command in [Command::List, Command::EnableDecorations] {
            let queued = command.encode().map(|line| {
                outbound.try_send(Outbound {
                    command: command.name(),
                    line,
                    written: None,
                })
            });
            if !matches!(queued, Ok(Ok(()))) {
                warn!(command = command.name(), "Failed to queue bootstrap command");
            }
        }

        self.link = Link::Connected(Transport {
            reader,
            writer: tokio::spawn(write_commands(writer, queue, failures)),
            write_failures,
        });
        self.framer.clear();
        *lock(&self.shared.outbound) = Some(outbound);

        info!(path = %self.socket_path.display(), "Connected to labwc compositor");
        emit(&self.notifications, Notification::Connected);
    }

    fn on_data(&mut self, bytes: &[u8]) {
        trace!(len = bytes.len(), "Received data from labwc");

        for frame in self.framer.feed(bytes) {
            if frame.trim().is_empty() {
                continue;
            }

            match decode(&frame) {
                Ok(Record::Event(event)) => {
                    debug!(event = event.name(), "Received labwc event");
                    let notification = write_lock(&self.shared.mirror).apply(event);
                    if let Some(notification) = notification {
                        emit(&self.notifications, notification);
                    }
                }
                Ok(Record::Unrecognized { event, .. }) => {
                    warn!(
                        event = event.as_deref().unwrap_or("<none>"),
                        "Unknown event from labwc"
                    );
                }
                Err(e) => warn!("Discarding frame: {}", e),
            }
        }
    }

    /// Report a transport error, then handle the closure it implies
    fn fail(&mut self, error: LabwcError) {
        emit(&self.notifications, Notification::Error(Arc::new(error)));
        self.on_closed();
    }

    /// Unexpected closure: tear down and schedule a single reconnect
    fn on_closed(&mut self) {
        self.close_link();
        emit(&self.notifications, Notification::Disconnected);

        if self.reconnect.is_none() {
            info!(
                delay_ms = self.reconnect_delay.as_millis() as u64,
                "Scheduling reconnect to labwc compositor"
            );
            self.reconnect = Some(Box::pin(sleep(self.reconnect_delay)));
        }
    }

    /// Drop the transport, aborting its writer and any unwritten commands
    fn close_link(&mut self) {
        *lock(&self.shared.outbound) = None;
        self.link = Link::Disconnected;
    }
}

/// Writer task of one connection
///
/// Stops at the first write error and hands it to the driver.
async fn write_commands(
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::Receiver<Outbound>,
    failures: mpsc::Sender<io::Error>,
) {
    while let Some(outbound) = queue.recv().await {
        debug!(command = outbound.command, "Sending command to labwc");
        let result = async {
            writer.write_all(outbound.line.as_bytes()).await?;
            writer.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                if let Some(written) = outbound.written {
                    let _ = written.send(());
                }
            }
            Err(e) => {
                let _ = failures.try_send(e);
                return;
            }
        }
    }
}

async fn link_activity(link: &mut Link, buf: &mut [u8]) -> Activity {
    match link {
        Link::Disconnected => std::future::pending().await,
        Link::Connecting(connect) => Activity::Connect(connect.as_mut().await),
        Link::Connected(transport) => tokio::select! {
            read = transport.reader.read(buf) => Activity::Read(read),
            Some(error) = transport.write_failures.recv() => Activity::WriteFailed(error),
        },
    }
}

async fn reconnect_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::StateChange;
    use std::time::Instant;
    use tempfile::TempDir;
    use std::net::Shutdown;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::UnixListener;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    /// A stand-in for labwc's IPC server
    struct FakeCompositor {
        _dir: TempDir,
        path: PathBuf,
        listener: UnixListener,
    }

    impl FakeCompositor {
        fn bind() -> Self {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("labwc.sock");
            let listener = UnixListener::bind(&path).unwrap();
            Self {
                _dir: dir,
                path,
                listener,
            }
        }

        async fn accept(&self) -> Peer {
            let (stream, _addr) = timeout(WAIT, self.listener.accept())
                .await
                .expect("client never connected")
                .unwrap();
            let (reader, writer) = stream.into_split();
            Peer {
                reader: BufReader::new(reader),
                writer,
            }
        }

        async fn expect_no_connection(&self, within: Duration) {
            let result = timeout(within, self.listener.accept()).await;
            assert!(result.is_err(), "unexpected connection attempt");
        }
    }

    struct Peer {
        reader: BufReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
    }

    impl Peer {
        async fn read_line(&mut self) -> String {
            let mut line = String::new();
            timeout(WAIT, self.reader.read_line(&mut line))
                .await
                .expect("timed out reading from client")
                .unwrap();
            line
        }

        async fn expect_bootstrap(&mut self) {
            assert_eq!(self.read_line().await, "{\"cmd\":\"list\"}\n");
            assert_eq!(self.read_line().await, "{\"cmd\":\"enable_decorations\"}\n");
        }

        /// Stop accepting data from the client, so its next write fails
        fn refuse_writes(self) -> std::os::unix::net::UnixStream {
            let stream = self.reader.into_inner().reunite(self.writer).unwrap();
            let stream = stream.into_std().unwrap();
            stream.shutdown(Shutdown::Read).unwrap();
            stream
        }

        async fn write(&mut self, bytes: &[u8]) {
            self.writer.write_all(bytes).await.unwrap();
            self.writer.flush().await.unwrap();
        }
    }

    fn config(path: &Path, reconnect_delay: Duration) -> Config {
        Config {
            socket_path: Some(path.to_path_buf()),
            reconnect_delay,
            ..Config::default()
        }
    }

    async fn next(rx: &mut broadcast::Receiver<Notification>) -> Notification {
        timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for notification")
            .expect("notification channel closed")
    }

    async fn expect(rx: &mut broadcast::Receiver<Notification>, name: &str) -> Notification {
        let notification = next(rx).await;
        assert_eq!(notification.name(), name, "got {:?}", notification);
        notification
    }

    /// Connect a fresh client to `compositor` and consume the handshake
    async fn connected(
        compositor: &FakeCompositor,
        reconnect_delay: Duration,
    ) -> (LabwcClient, broadcast::Receiver<Notification>, Peer) {
        let client = LabwcClient::new(&config(&compositor.path, reconnect_delay));
        let mut rx = client.subscribe();
        client.connect();

        let mut peer = compositor.accept().await;
        expect(&mut rx, "connected").await;
        peer.expect_bootstrap().await;
        (client, rx, peer)
    }

    #[tokio::test]
    async fn test_connect_sends_bootstrap_commands() {
        let compositor = FakeCompositor::bind();
        let (client, _rx, _peer) = connected(&compositor, Duration::from_millis(100)).await;
        assert_eq!(client.socket_path(), compositor.path.as_path());
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let compositor = FakeCompositor::bind();
        let client = LabwcClient::new(&config(&compositor.path, Duration::from_millis(100)));
        let mut rx = client.subscribe();

        client.connect();
        client.connect();
        let mut peer = compositor.accept().await;
        expect(&mut rx, "connected").await;
        peer.expect_bootstrap().await;

        client.connect();
        compositor.expect_no_connection(Duration::from_millis(300)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_events_update_mirror_and_notify_in_order() {
        let compositor = FakeCompositor::bind();
        let (client, mut rx, mut peer) = connected(&compositor, Duration::from_millis(100)).await;

        // A malformed frame between valid ones, with a frame split mid-way
        peer.write(
            b"{\"event\":\"mapped\",\"id\":\"a\",\"title\":\"A\",\"x\":0,\"y\":0,\"width\":100,\"height\":100}\n\
              {not json}\n{\"event\":\"mov",
        )
        .await;
        peer.write(
            b"ed\",\"id\":\"a\",\"x\":10,\"y\":20,\"width\":100,\"height\":100}\n\n\
              {\"event\":\"title_changed\",\"id\":\"a\",\"title\":\"B\"}\n",
        )
        .await;

        expect(&mut rx, "window_created").await;
        expect(&mut rx, "window_moved").await;
        match expect(&mut rx, "window_title_changed").await {
            Notification::WindowTitleChanged(window) => {
                assert_eq!(window.title.as_deref(), Some("B"));
            }
            other => panic!("Expected WindowTitleChanged, got: {:?}", other),
        }

        let windows = client.windows();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].x, Some(10));
        assert_eq!(windows[0].y, Some(20));
        assert_eq!(windows[0].title.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_snapshot_cursor_and_state_events() {
        let compositor = FakeCompositor::bind();
        let (client, mut rx, mut peer) = connected(&compositor, Duration::from_millis(100)).await;

        peer.write(
            b"{\"event\":\"window_list\",\"windows\":[{\"id\":\"a\",\"title\":\"A\"},{\"id\":\"b\",\"title\":\"B\"}]}\n\
              {\"event\":\"workspace_changed\"}\n\
              {\"event\":\"cursor\",\"x\":12,\"y\":34}\n\
              {\"event\":\"maximized\",\"id\":\"b\",\"maximized\":3}\n\
              {\"event\":\"fullscreen\",\"id\":\"ghost\",\"fullscreen\":true}\n\
              {\"event\":\"decorations_disabled\"}\n",
        )
        .await;

        match expect(&mut rx, "window_list").await {
            Notification::WindowList(windows) => assert_eq!(windows.len(), 2),
            other => panic!("Expected WindowList, got: {:?}", other),
        }
        expect(&mut rx, "cursor").await;
        match expect(&mut rx, "window_state_changed").await {
            Notification::WindowStateChanged { change, window } => {
                assert_eq!(change, StateChange::Maximized);
                assert_eq!(window.id, WindowId::from("b"));
            }
            other => panic!("Expected WindowStateChanged, got: {:?}", other),
        }
        // The fullscreen event for an unknown window produces nothing
        expect(&mut rx, "decorations_disabled").await;

        assert_eq!(client.cursor_position(), CursorPosition { x: 12.0, y: 34.0 });
        assert_eq!(client.windows().len(), 2);
        assert_eq!(
            client.window(&WindowId::from("b")).unwrap().maximized,
            Some(crate::protocol::Maximized::Both)
        );
    }

    #[tokio::test]
    async fn test_send_while_disconnected_is_soft_failure() {
        let compositor = FakeCompositor::bind();
        let client = LabwcClient::new(&config(&compositor.path, Duration::from_millis(100)));

        assert!(!client.close_window("a"));
        assert!(!client.send(&Command::List));
    }

    #[tokio::test]
    async fn test_commands_are_written_to_socket() {
        let compositor = FakeCompositor::bind();
        let (client, _rx, mut peer) = connected(&compositor, Duration::from_millis(100)).await;

        assert!(client.move_window("a", 1.4, 2.6, 300.0, 200.0));
        assert!(client.set_always_on_top("a"));

        assert_eq!(
            peer.read_line().await,
            "{\"cmd\":\"move\",\"id\":\"a\",\"x\":1,\"y\":3,\"width\":300,\"height\":200}\n"
        );
        assert_eq!(
            peer.read_line().await,
            "{\"cmd\":\"always_on_top\",\"id\":\"a\"}\n"
        );
    }

    #[tokio::test]
    async fn test_confirmed_command_is_written_before_disconnect() {
        let compositor = FakeCompositor::bind();
        let (client, mut rx, mut peer) = connected(&compositor, Duration::from_millis(100)).await;

        client
            .send_confirmed(&Command::Focus { id: "a".into() })
            .await
            .unwrap();
        client.disconnect();

        assert_eq!(peer.read_line().await, "{\"cmd\":\"focus\",\"id\":\"a\"}\n");
        assert_eq!(peer.read_line().await, "", "socket should be closed");
        expect(&mut rx, "disconnected").await;

        // Explicit disconnect never reconnects
        compositor.expect_no_connection(Duration::from_millis(400)).await;
        assert!(!client.focus_window("a"));
    }

    #[tokio::test]
    async fn test_closure_schedules_exactly_one_reconnect() {
        let delay = Duration::from_millis(100);
        let compositor = FakeCompositor::bind();
        let (_client, mut rx, peer) = connected(&compositor, delay).await;

        let closed_at = Instant::now();
        drop(peer);
        expect(&mut rx, "disconnected").await;

        let mut peer = compositor.accept().await;
        assert!(
            closed_at.elapsed() >= delay,
            "reconnected before the delay: {:?}",
            closed_at.elapsed()
        );
        expect(&mut rx, "connected").await;
        peer.expect_bootstrap().await;

        compositor.expect_no_connection(delay * 4).await;
    }

    #[tokio::test]
    async fn test_disconnect_cancels_pending_reconnect() {
        let delay = Duration::from_millis(300);
        let compositor = FakeCompositor::bind();
        let (client, mut rx, peer) = connected(&compositor, delay).await;

        drop(peer);
        expect(&mut rx, "disconnected").await;
        client.disconnect();

        compositor.expect_no_connection(delay * 3).await;
        // Already disconnected, so no second notification
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_connect_reports_error_and_retries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("labwc.sock");
        let client = LabwcClient::new(&config(&path, Duration::from_millis(100)));
        let mut rx = client.subscribe();
        client.connect();

        match expect(&mut rx, "error").await {
            Notification::Error(error) => {
                assert!(matches!(*error, LabwcError::ConnectionFailed { .. }));
            }
            other => panic!("Expected Error, got: {:?}", other),
        }
        expect(&mut rx, "disconnected").await;

        // The compositor shows up; a later retry must find it
        let listener = UnixListener::bind(&path).unwrap();
        let (stream, _addr) = timeout(WAIT, listener.accept())
            .await
            .expect("client never retried")
            .unwrap();

        loop {
            match next(&mut rx).await {
                Notification::Connected => break,
                Notification::Error(_) | Notification::Disconnected => continue,
                other => panic!("Unexpected notification: {:?}", other),
            }
        }
        drop(stream);
    }

    #[tokio::test]
    async fn test_notification_stream() {
        use tokio_stream::StreamExt;

        let compositor = FakeCompositor::bind();
        let client = LabwcClient::new(&config(&compositor.path, Duration::from_millis(100)));
        let mut stream = client.notifications();
        client.connect();

        let _peer = compositor.accept().await;
        let first = timeout(WAIT, stream.next())
            .await
            .expect("timed out waiting for notification")
            .expect("stream ended")
            .expect("subscriber lagged");
        assert!(matches!(first, Notification::Connected));
    }

    /// Keep topping up the outbound queue until neither it nor the socket
    /// drains any more
    async fn stall_writer(client: &LabwcClient) {
        let mut idle_rounds = 0;
        while idle_rounds < 3 {
            let mut accepted = 0;
            while client.move_window("a", 0.0, 0.0, 640.0, 480.0) {
                accepted += 1;
            }
            idle_rounds = if accepted == 0 { idle_rounds + 1 } else { 0 };
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    #[tokio::test]
    async fn test_stalled_writer_does_not_block_reads_or_disconnect() {
        let compositor = FakeCompositor::bind();
        let (client, mut rx, mut peer) = connected(&compositor, Duration::from_millis(100)).await;

        // The compositor never reads again
        timeout(WAIT, stall_writer(&client))
            .await
            .expect("outbound queue never filled up");
        assert!(!client.focus_window("a"), "a full queue must refuse commands");

        // Inbound events are still dispatched
        peer.write(b"{\"event\":\"mapped\",\"id\":\"a\",\"title\":\"A\"}\n")
            .await;
        expect(&mut rx, "window_created").await;
        assert_eq!(client.windows().len(), 1);

        // A confirmed send waits for queue room that never comes
        let waiting = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .send_confirmed(&Command::Focus { id: "a".into() })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        client.disconnect();
        expect(&mut rx, "disconnected").await;

        let result = timeout(WAIT, waiting)
            .await
            .expect("confirmed send never resolved")
            .unwrap();
        assert!(
            matches!(result, Err(LabwcError::ConnectionLost)),
            "got {:?}",
            result
        );
        assert!(!client.focus_window("a"));
        compositor.expect_no_connection(Duration::from_millis(300)).await;
    }

    #[tokio::test]
    async fn test_confirmed_send_while_disconnected_fails() {
        let compositor = FakeCompositor::bind();
        let client = LabwcClient::new(&config(&compositor.path, Duration::from_millis(100)));

        let result = client.send_confirmed(&Command::List).await;
        assert!(matches!(result, Err(LabwcError::NotConnected)));
    }

    #[tokio::test]
    async fn test_write_failure_reports_error_and_reconnects_once() {
        let delay = Duration::from_millis(100);
        let compositor = FakeCompositor::bind();
        let (client, mut rx, peer) = connected(&compositor, delay).await;

        let _refusing = peer.refuse_writes();
        let result = client
            .send_confirmed(&Command::Focus { id: "a".into() })
            .await;
        assert!(
            matches!(result, Err(LabwcError::ConnectionLost)),
            "got {:?}",
            result
        );

        match expect(&mut rx, "error").await {
            Notification::Error(error) => {
                assert!(matches!(*error, LabwcError::SendFailed(_)), "got {:?}", error);
            }
            other => panic!("Expected Error, got: {:?}", other),
        }
        expect(&mut rx, "disconnected").await;

        let mut peer = compositor.accept().await;
        expect(&mut rx, "connected").await;
        peer.expect_bootstrap().await;

        compositor.expect_no_connection(delay * 4).await;
        assert!(rx.try_recv().is_err(), "closure must be reported once");
    }
}
