//! Long-lived connection to the supervisor process
//!
//! A [`Connection`] is a cheap handle to a supervisor task that owns the
//! socket, the pending queue, the keep-alive timer and reconnection. The
//! receive loop and the writer run as child tasks of the supervisor and
//! report link faults back to it, tagged with the link generation so that
//! reports from a previous socket are ignored.
//!
//! ```text
//!  Connection ──Command──▶ Supervisor ──Outgoing──▶ writer task ──▶ socket
//!                              ▲  │
//!                    LinkEvent │  └── spawns ──▶ reader task ──frames──▶ inbound
//! ```

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::codec::FramedRead;

use crate::common::config::Config;
use crate::common::{Error, Result};

use super::backoff::Backoff;
use super::framing::{FrameCodec, DELIMITER};
use super::keepalive;
use super::queue::{Completion, Pending, PendingQueue};
use super::transport::{self, SocketOptions};

/// Lifecycle of the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, `connect()` not called yet
    Setup,
    /// Connect attempt in flight
    Preparing,
    /// Socket connected; frames flow
    Ready,
    /// The last attempt or the live link failed
    Failed(String),
    /// `disconnect()` was called
    Cancelled,
    /// Reconnect scheduled after a failure
    Waiting(String),
}

impl ConnectionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::Preparing => write!(f, "preparing"),
            Self::Ready => write!(f, "ready"),
            Self::Failed(reason) => write!(f, "failed ({})", reason),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Waiting(reason) => write!(f, "waiting ({})", reason),
        }
    }
}

/// What `send` did with a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Written to the socket
    Sent,
    /// Held until the link is ready
    Queued,
}

/// Shortest keep-alive interval a connection will use
pub const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(10);

/// Tunables for a [`Connection`]
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub socket_path: PathBuf,
    pub socket: SocketOptions,
    pub read_chunk_size: usize,
    pub max_buffer_size: usize,
    pub max_pending: usize,
    pub inbound_capacity: usize,
    pub keepalive_interval: Duration,
    pub backoff: Backoff,
}

impl ConnectionOptions {
    /// Defaults for everything but the socket location
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self::from_config(&Config::default(), socket_path)
    }

    pub fn from_config(config: &Config, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            socket: SocketOptions {
                connect_timeout: Duration::from_millis(config.connection.connect_timeout_ms),
                buffer_size: config.connection.socket_buffer_bytes,
            },
            read_chunk_size: config.connection.read_chunk_bytes.max(1),
            max_buffer_size: config.limits.max_frame_bytes,
            max_pending: config.limits.max_pending,
            inbound_capacity: config.limits.inbound_capacity.max(1),
            keepalive_interval: Duration::from_secs(config.keepalive.interval_secs),
            backoff: Backoff::from_config(&config.reconnect),
        }
    }

    /// Keep-alive interval; clamped to at least [`MIN_KEEPALIVE_INTERVAL`]
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval.max(MIN_KEEPALIVE_INTERVAL);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    pub fn with_max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.max_buffer_size = max_buffer_size;
        self
    }
}

/// Inbound frames in receive order, delimiter stripped
pub type Inbound = mpsc::Receiver<Vec<u8>>;

enum Command {
    Connect,
    Disconnect {
        done: oneshot::Sender<()>,
    },
    Send {
        frame: Vec<u8>,
        reply: Completion,
        /// Reply only once the frame is written, even if it had to queue
        confirm: bool,
    },
}

enum LinkEvent {
    Connected {
        generation: u64,
        result: std::io::Result<UnixStream>,
    },
    Pong {
        generation: u64,
    },
    Lost {
        generation: u64,
        reason: String,
    },
}

struct Outgoing {
    frame: Vec<u8>,
    reply: Option<Completion>,
}

/// Handle to the connection; clones share one socket
#[derive(Clone)]
pub struct Connection {
    socket_path: PathBuf,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    transitions: broadcast::Sender<ConnectionState>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("socket_path", &self.socket_path)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Create the connection and its inbound frame channel
    ///
    /// Nothing is connected until [`Connection::connect`] is called. Must be
    /// called from within a tokio runtime. The supervisor task exits once
    /// every handle has been dropped.
    pub fn new(mut options: ConnectionOptions) -> (Self, Inbound) {
        options.keepalive_interval = options.keepalive_interval.max(MIN_KEEPALIVE_INTERVAL);
        options.inbound_capacity = options.inbound_capacity.max(1);

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(options.inbound_capacity);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Setup);
        let (transitions, _) = broadcast::channel(64);

        let mut keepalive = tokio::time::interval_at(
            Instant::now() + options.keepalive_interval,
            options.keepalive_interval,
        );
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let socket_path = options.socket_path.clone();
        let supervisor = Supervisor {
            pending: PendingQueue::new(options.max_pending),
            backoff: options.backoff.clone(),
            options,
            commands: commands_rx,
            events_tx,
            events_rx,
            inbound: inbound_tx,
            state: state_tx,
            transitions: transitions.clone(),
            generation: 0,
            link: None,
            connecting: None,
            reconnect_enabled: false,
            reconnect_at: None,
            keepalive,
        };
        tokio::spawn(supervisor.run());

        let connection = Self {
            socket_path,
            commands: commands_tx,
            state: state_rx,
            transitions,
        };
        (connection, inbound_rx)
    }

    /// Start connecting; re-arms reconnection and resets the backoff
    ///
    /// Idempotent while connecting or connected.
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// Tear everything down and stop reconnecting
    ///
    /// Returns after the receive loop, writer, keep-alive and reconnect timer
    /// have stopped. Calling it again is a no-op.
    pub async fn disconnect(&self) {
        let (done, wait) = oneshot::channel();
        if self.commands.send(Command::Disconnect { done }).is_ok() {
            let _ = wait.await;
        }
    }

    /// Send one frame; queues it while the link is down
    pub async fn send(&self, frame: Vec<u8>) -> Result<SendOutcome> {
        self.submit(frame, false).await
    }

    /// Send one frame and wait until it is actually written
    pub async fn send_confirmed(&self, frame: Vec<u8>) -> Result<()> {
        self.submit(frame, true).await.map(|_| ())
    }

    async fn submit(&self, frame: Vec<u8>, confirm: bool) -> Result<SendOutcome> {
        if frame.contains(&DELIMITER) {
            return Err(Error::InvalidFrame);
        }
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(Command::Send {
                frame,
                reply,
                confirm,
            })
            .map_err(|_| Error::ConnectionCancelled)?;
        outcome.await.map_err(|_| Error::ConnectionCancelled)?
    }

    /// Location of the supervisor's socket
    pub fn socket_path(&self) -> &std::path::Path {
        &self.socket_path
    }

    /// Current state snapshot
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Every state transition from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionState> {
        self.transitions.subscribe()
    }

    /// Wait until the state is Ready
    ///
    /// Fails with `ConnectionCancelled` once the connection is cancelled.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<()> {
        let mut state = self.state.clone();
        let settled = |s: &ConnectionState| s.is_ready() || *s == ConnectionState::Cancelled;
        let ready = tokio::time::timeout(timeout, state.wait_for(settled))
            .await
            .map(|changed| changed.map(|s| s.is_ready()));
        match ready {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) | Ok(Err(_)) => Err(Error::ConnectionCancelled),
            Err(_) => Err(Error::ConnectTimeout {
                path: self.socket_path.display().to_string(),
                waited: timeout,
            }),
        }
    }
}

/// Live socket and its child tasks
struct Link {
    generation: u64,
    writer: mpsc::UnboundedSender<Outgoing>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
    last_pong: Instant,
}

struct Supervisor {
    options: ConnectionOptions,
    commands: mpsc::UnboundedReceiver<Command>,
    events_tx: mpsc::UnboundedSender<LinkEvent>,
    events_rx: mpsc::UnboundedReceiver<LinkEvent>,
    inbound: mpsc::Sender<Vec<u8>>,
    state: watch::Sender<ConnectionState>,
    transitions: broadcast::Sender<ConnectionState>,
    /// Bumped for every connect attempt
    generation: u64,
    link: Option<Link>,
    connecting: Option<JoinHandle<()>>,
    reconnect_enabled: bool,
    reconnect_at: Option<Instant>,
    pending: PendingQueue,
    backoff: Backoff,
    keepalive: Interval,
}

impl Supervisor {
    async fn run(mut self) {
        loop {
            let link_up = self.link.is_some();
            let reconnect_due = self.reconnect_at;

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                _ = self.keepalive.tick(), if link_up => self.check_liveness(),
                _ = tokio::time::sleep_until(reconnect_due.unwrap_or_else(Instant::now)),
                    if reconnect_due.is_some() =>
                {
                    self.reconnect_at = None;
                    self.begin_connect();
                }
            }
        }

        tracing::debug!("All connection handles dropped, shutting down link");
        self.shutdown().await;
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => {
                self.reconnect_enabled = true;
                self.backoff.reset();
                if self.link.is_some() || self.connecting.is_some() {
                    tracing::trace!("connect() while already connecting or connected");
                    return;
                }
                self.reconnect_at = None;
                self.begin_connect();
            }
            Command::Disconnect { done } => {
                self.shutdown().await;
                let _ = done.send(());
            }
            Command::Send {
                frame,
                reply,
                confirm,
            } => self.handle_send(frame, reply, confirm),
        }
    }

    fn handle_send(&mut self, frame: Vec<u8>, reply: Completion, confirm: bool) {
        if *self.state.borrow() == ConnectionState::Cancelled {
            let _ = reply.send(Err(Error::ConnectionCancelled));
            return;
        }

        if let Some(link) = &self.link {
            let outgoing = Outgoing {
                frame,
                reply: Some(reply),
            };
            // Writer already exited when this fails; its Lost event is on the way
            if let Err(mpsc::error::SendError(Outgoing { frame, reply })) =
                link.writer.send(outgoing)
            {
                if let Some(reply) = reply {
                    self.enqueue(frame, reply, confirm);
                }
            }
            return;
        }

        self.enqueue(frame, reply, confirm);
    }

    fn enqueue(&mut self, frame: Vec<u8>, reply: Completion, confirm: bool) {
        tracing::debug!(bytes = frame.len(), queued = self.pending.len() + 1, "Link down, queueing frame");
        if confirm {
            self.pending.push(Pending::new(frame, Some(reply)));
        } else {
            self.pending.push(Pending::new(frame, None));
            let _ = reply.send(Ok(SendOutcome::Queued));
        }
    }

    fn handle_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected { generation, result } => {
                if generation != self.generation || !self.reconnect_enabled {
                    tracing::trace!(generation, "Ignoring stale connect result");
                    return;
                }
                self.connecting = None;
                match result {
                    Ok(stream) => self.establish(stream),
                    Err(e) => {
                        tracing::warn!(
                            path = %self.options.socket_path.display(),
                            error = %e,
                            "Connect attempt failed"
                        );
                        self.set_state(ConnectionState::Failed(e.to_string()));
                        self.schedule_reconnect(e.to_string());
                    }
                }
            }
            LinkEvent::Pong { generation } => {
                if let Some(link) = self.link.as_mut().filter(|l| l.generation == generation) {
                    link.last_pong = Instant::now();
                    tracing::trace!("Keep-alive pong");
                }
            }
            LinkEvent::Lost { generation, reason } => {
                if self.link.as_ref().map(|l| l.generation) != Some(generation) {
                    return;
                }
                tracing::warn!(reason = %reason, "Control link lost");
                self.fail_link(reason);
            }
        }
    }

    fn begin_connect(&mut self) {
        if self.connecting.is_some() || self.link.is_some() {
            return;
        }
        self.generation += 1;
        let generation = self.generation;
        let path = self.options.socket_path.clone();
        let socket = self.options.socket.clone();
        let events = self.events_tx.clone();

        tracing::debug!(generation, path = %path.display(), "Connecting to control socket");
        self.set_state(ConnectionState::Preparing);

        self.connecting = Some(tokio::spawn(async move {
            let result = transport::open_stream(&path, &socket).await;
            let _ = events.send(LinkEvent::Connected { generation, result });
        }));
    }

    fn establish(&mut self, stream: UnixStream) {
        let generation = self.generation;
        let (read_half, write_half) = stream.into_split();
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();

        let reader_task = tokio::spawn(read_loop(
            generation,
            read_half,
            self.options.read_chunk_size,
            self.options.max_buffer_size,
            self.inbound.clone(),
            self.events_tx.clone(),
        ));
        let writer_task = tokio::spawn(write_loop(
            generation,
            write_half,
            writer_rx,
            self.events_tx.clone(),
        ));

        self.link = Some(Link {
            generation,
            writer: writer_tx,
            reader_task,
            writer_task,
            last_pong: Instant::now(),
        });
        self.backoff.reset();
        self.keepalive.reset();

        tracing::info!(
            path = %self.options.socket_path.display(),
            pending = self.pending.len(),
            "Control link ready"
        );
        self.set_state(ConnectionState::Ready);
        self.flush_pending();
    }

    fn flush_pending(&mut self) {
        let Some(link) = &self.link else {
            return;
        };
        for pending in self.pending.drain() {
            if let Err(mpsc::error::SendError(outgoing)) = link.writer.send(Outgoing {
                frame: pending.frame,
                reply: pending.completion,
            }) {
                if let Some(reply) = outgoing.reply {
                    let _ = reply.send(Err(Error::ConnectionCancelled));
                }
            }
        }
    }

    fn check_liveness(&mut self) {
        let interval = self.options.keepalive_interval;
        let Some(link) = &self.link else {
            return;
        };

        if link.last_pong.elapsed() > interval * 2 {
            tracing::warn!(
                silent_ms = link.last_pong.elapsed().as_millis() as u64,
                "No keep-alive reply, treating link as dead"
            );
            self.fail_link("keep-alive timeout".to_string());
            return;
        }

        match keepalive::ping_frame() {
            Ok(frame) => {
                let _ = link.writer.send(Outgoing { frame, reply: None });
            }
            Err(e) => tracing::error!(error = %e, "Failed to encode keep-alive ping"),
        }
    }

    fn fail_link(&mut self, reason: String) {
        self.drop_link();
        self.set_state(ConnectionState::Failed(reason.clone()));
        self.schedule_reconnect(reason);
    }

    fn schedule_reconnect(&mut self, reason: String) {
        if !self.reconnect_enabled || self.reconnect_at.is_some() || self.connecting.is_some() {
            return;
        }
        let delay = self.backoff.next_delay();
        self.reconnect_at = Some(Instant::now() + delay);
        tracing::info!(delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
        self.set_state(ConnectionState::Waiting(reason));
    }

    /// Abort the child tasks without waiting for them
    fn drop_link(&mut self) {
        if let Some(link) = self.link.take() {
            link.reader_task.abort();
            link.writer_task.abort();
        }
    }

    async fn shutdown(&mut self) {
        self.reconnect_enabled = false;
        self.reconnect_at = None;

        if let Some(task) = self.connecting.take() {
            task.abort();
            let _ = task.await;
        }
        if let Some(link) = self.link.take() {
            link.reader_task.abort();
            link.writer_task.abort();
            let _ = link.reader_task.await;
            let _ = link.writer_task.await;
        }
        self.pending.cancel_all();

        if *self.state.borrow() != ConnectionState::Cancelled {
            tracing::info!("Control link cancelled");
            self.set_state(ConnectionState::Cancelled);
        }
    }

    fn set_state(&self, state: ConnectionState) {
        tracing::debug!(state = %state, "Connection state changed");
        self.state.send_replace(state.clone());
        let _ = self.transitions.send(state);
    }
}

async fn read_loop(
    generation: u64,
    reader: OwnedReadHalf,
    chunk_size: usize,
    max_buffer: usize,
    inbound: mpsc::Sender<Vec<u8>>,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    let mut frames = FramedRead::with_capacity(reader, FrameCodec::new(max_buffer), chunk_size);

    let reason = loop {
        match frames.next().await {
            Some(Ok(frame)) => {
                if keepalive::is_pong(&frame) {
                    let _ = events.send(LinkEvent::Pong { generation });
                    continue;
                }
                if inbound.send(frame).await.is_err() {
                    tracing::trace!("Inbound receiver dropped, discarding frame");
                }
            }
            Some(Err(e)) => break format!("receive failed: {}", e),
            None => break "peer closed the connection".to_string(),
        }
    };
    let _ = events.send(LinkEvent::Lost { generation, reason });
}

async fn write_loop(
    generation: u64,
    mut writer: OwnedWriteHalf,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    while let Some(Outgoing { mut frame, reply }) = outgoing.recv().await {
        frame.push(DELIMITER);

        match writer.write_all(&frame).await {
            Ok(()) => {
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(SendOutcome::Sent));
                }
            }
            Err(e) if transport::is_link_fault(&e) => {
                let reason = format!("send failed: {}", e);
                if let Some(reply) = reply {
                    let _ = reply.send(Err(Error::Send(e)));
                }
                let _ = events.send(LinkEvent::Lost { generation, reason });
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Frame write failed");
                if let Some(reply) = reply {
                    let _ = reply.send(Err(Error::Send(e)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::UnixListener;

    const WAIT: Duration = Duration::from_secs(5);

    fn fast_options(path: PathBuf) -> ConnectionOptions {
        ConnectionOptions::new(path)
            .with_backoff(Backoff::new(
                Duration::from_millis(10),
                Duration::from_millis(40),
                2.0,
            ))
            .with_keepalive_interval(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_initial_state_is_setup() {
        let dir = tempfile::tempdir().unwrap();
        let (connection, _inbound) = Connection::new(fast_options(dir.path().join("c.sock")));
        assert_eq!(connection.state(), ConnectionState::Setup);
    }

    #[tokio::test]
    async fn test_send_before_connect_is_queued() {
        let dir = tempfile::tempdir().unwrap();
        let (connection, _inbound) = Connection::new(fast_options(dir.path().join("c.sock")));
        let outcome = connection.send(b"{}".to_vec()).await.unwrap();
        assert_eq!(outcome, SendOutcome::Queued);
    }

    #[tokio::test]
    async fn test_rejects_embedded_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let (connection, _inbound) = Connection::new(fast_options(dir.path().join("c.sock")));
        let err = connection.send(b"{}\n{}".to_vec()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidFrame));
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let (connection, mut inbound) = Connection::new(fast_options(path));
        connection.connect();

        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        connection.wait_until_ready(WAIT).await.unwrap();
        let outcome = connection.send(br#"{"hello":1}"#.to_vec()).await.unwrap();
        assert_eq!(outcome, SendOutcome::Sent);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), r#"{"hello":1}"#);

        write_half.write_all(b"{\"a\":1}\n{\"type\":\"pong\"}\n{\"b\":").await.unwrap();
        write_half.write_all(b"2}\n").await.unwrap();

        let first = tokio::time::timeout(WAIT, inbound.recv()).await.unwrap().unwrap();
        let second = tokio::time::timeout(WAIT, inbound.recv()).await.unwrap().unwrap();
        assert_eq!(first, b"{\"a\":1}".to_vec());
        assert_eq!(second, b"{\"b\":2}".to_vec());

        connection.disconnect().await;
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (connection, _inbound) = Connection::new(fast_options(dir.path().join("c.sock")));
        connection.connect();

        connection.disconnect().await;
        assert_eq!(connection.state(), ConnectionState::Cancelled);
        connection.disconnect().await;
        assert_eq!(connection.state(), ConnectionState::Cancelled);

        let err = connection.send(b"{}".to_vec()).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionCancelled));
    }

    #[tokio::test]
    async fn test_disconnect_fails_confirmed_sends() {
        let dir = tempfile::tempdir().unwrap();
        let (connection, _inbound) = Connection::new(fast_options(dir.path().join("c.sock")));

        let waiting = {
            let connection = connection.clone();
            tokio::spawn(async move { connection.send_confirmed(b"{}".to_vec()).await })
        };
        // Let the send reach the queue
        tokio::time::sleep(Duration::from_millis(50)).await;
        connection.disconnect().await;

        let result = tokio::time::timeout(WAIT, waiting).await.unwrap().unwrap();
        assert!(matches!(result, Err(Error::ConnectionCancelled)));
    }

    #[tokio::test]
    async fn test_wait_until_ready_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.sock");
        let (connection, _inbound) = Connection::new(fast_options(path.clone()));
        connection.connect();

        let err = connection
            .wait_until_ready(Duration::from_millis(50))
            .await
            .unwrap_err();
        match err {
            Error::ConnectTimeout { path: reported, waited } => {
                assert_eq!(reported, path.display().to_string());
                assert_eq!(waited, Duration::from_millis(50));
            }
            other => panic!("unexpected error: {other}"),
        }

        connection.disconnect().await;
        let err = connection.wait_until_ready(WAIT).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionCancelled));
    }

    #[tokio::test]
    async fn test_zero_keepalive_interval_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let options = fast_options(dir.path().join("c.sock")).with_keepalive_interval(Duration::ZERO);
        assert_eq!(options.keepalive_interval, MIN_KEEPALIVE_INTERVAL);

        let mut options = options;
        options.keepalive_interval = Duration::ZERO;
        options.inbound_capacity = 0;
        let (connection, _inbound) = Connection::new(options);
        assert_eq!(connection.state(), ConnectionState::Setup);
        connection.disconnect().await;
    }
}
