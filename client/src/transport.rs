//! Outbound stream connection to the remote listener.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──ok──▶ Ready ──disconnect──▶ Disconnected
//!                               │    └──err──▶ Failed
//!                               └──disconnect──▶ Cancelled ──▶ Disconnected
//! ```
//!
//! A connect attempt is settled by whichever notification arrives first: the
//! socket finishing its handshake, the handshake failing, or a concurrent
//! [`TcpTransport::disconnect`]. Later notifications for the same attempt are
//! dropped. Once `Ready`, every payload goes through a single writer task so
//! bytes reach the wire in call order.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::error::TransportError;

/// Appended after every payload; the listener splits frames on it.
pub const FRAME_DELIMITER: u8 = b'\n';

pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Ready,
    Failed,
    Cancelled,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Failed => "failed",
            ConnectionState::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn state(&self) -> ConnectionState;

    /// Starts connecting and returns immediately; the returned attempt
    /// resolves exactly once.
    fn connect(&self, host: &str, port: u16) -> ConnectAttempt;

    /// Resolves once the local stack has accepted the payload. There is no
    /// delivery acknowledgement from the peer.
    async fn send(&self, payload: Vec<u8>) -> Result<(), TransportError>;

    async fn disconnect(&self);
}

type ConnectResult = Result<(), TransportError>;

/// Pending outcome of [`Transport::connect`].
pub struct ConnectAttempt {
    outcome: oneshot::Receiver<ConnectResult>,
}

impl ConnectAttempt {
    pub fn resolved(result: ConnectResult) -> Self {
        let (settle, attempt) = Self::pending();
        settle.resolve(result);
        attempt
    }

    fn pending() -> (Settle, Self) {
        let (sender, outcome) = oneshot::channel();
        (
            Settle {
                sender: Mutex::new(Some(sender)),
            },
            Self { outcome },
        )
    }
}

impl Future for ConnectAttempt {
    type Output = ConnectResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped settle means the attempt was torn down without a verdict.
        Pin::new(&mut self.outcome)
            .poll(cx)
            .map(|outcome| outcome.unwrap_or(Err(TransportError::Cancelled)))
    }
}

/// The "already resolved" guard shared by every notification of one attempt.
struct Settle {
    sender: Mutex<Option<oneshot::Sender<ConnectResult>>>,
}

impl Settle {
    fn resolve(&self, result: ConnectResult) -> bool {
        let sender = lock(&self.sender).take();
        match sender {
            Some(sender) => {
                let _ = sender.send(result);
                true
            }
            None => {
                trace!(?result, "connect attempt already settled, dropping notification");
                false
            }
        }
    }
}

struct Attempt {
    generation: u64,
    settle: Arc<Settle>,
    task: JoinHandle<()>,
}

struct WriteRequest {
    frame: Vec<u8>,
    done: oneshot::Sender<io::Result<()>>,
}

struct Writer {
    generation: u64,
    queue: mpsc::UnboundedSender<WriteRequest>,
    task: JoinHandle<()>,
}

impl Writer {
    /// Lets queued frames drain for at most `flush_timeout`, then drops the
    /// socket. Unfinished sends fail with `BrokenPipe`.
    async fn close(mut self, flush_timeout: Duration) {
        drop(self.queue);
        match timeout(flush_timeout, &mut self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => warn!(%error, "writer task ended abnormally"),
            Err(_) => {
                warn!(
                    generation = self.generation,
                    ?flush_timeout,
                    "peer not draining, dropping unflushed frames"
                );
                self.task.abort();
            }
        }
    }
}

#[derive(Default)]
struct Inner {
    generation: u64,
    attempt: Option<Attempt>,
    writer: Option<Writer>,
}

struct Shared {
    inner: Mutex<Inner>,
    state: watch::Sender<ConnectionState>,
    flush_timeout: Duration,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    // Callers hold the inner lock so transitions and settlements stay paired.
    fn publish(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "connection state changed");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// [`Transport`] over a plain TCP stream. Must be driven from inside a Tokio
/// runtime.
#[derive(Clone)]
pub struct TcpTransport {
    shared: Arc<Shared>,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::with_flush_timeout(DEFAULT_FLUSH_TIMEOUT)
    }

    /// `flush_timeout` bounds how long `disconnect` waits for queued frames.
    pub fn with_flush_timeout(flush_timeout: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                state,
                flush_timeout,
            }),
        }
    }

    /// Observes connection state changes, e.g. to drive an indicator.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn state(&self) -> ConnectionState {
        self.shared.current()
    }

    fn connect(&self, host: &str, port: u16) -> ConnectAttempt {
        let mut inner = self.shared.lock();
        if matches!(
            self.shared.current(),
            ConnectionState::Connecting | ConnectionState::Ready
        ) {
            return ConnectAttempt::resolved(Err(TransportError::AlreadyActive));
        }

        inner.generation += 1;
        let generation = inner.generation;
        let (settle, attempt) = ConnectAttempt::pending();
        let settle = Arc::new(settle);
        let task = tokio::spawn(establish(
            Arc::downgrade(&self.shared),
            settle.clone(),
            generation,
            host.to_string(),
            port,
        ));
        inner.attempt = Some(Attempt {
            generation,
            settle,
            task,
        });
        self.shared.publish(ConnectionState::Connecting);
        attempt
    }

    async fn send(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        let done = {
            let inner = self.shared.lock();
            let writer = match inner.writer.as_ref() {
                Some(writer) if self.shared.current() == ConnectionState::Ready => writer,
                _ => return Err(TransportError::NotConnected),
            };
            let mut frame = payload;
            frame.push(FRAME_DELIMITER);
            let (done, completion) = oneshot::channel();
            writer
                .queue
                .send(WriteRequest { frame, done })
                .map_err(|_| TransportError::NotConnected)?;
            completion
        };

        match done.await {
            Ok(result) => result.map_err(TransportError::Send),
            Err(_) => Err(TransportError::Send(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "connection closed before the write completed",
            ))),
        }
    }

    async fn disconnect(&self) {
        let writer = {
            let mut inner = self.shared.lock();
            if let Some(attempt) = inner.attempt.take() {
                attempt.task.abort();
                self.shared.publish(ConnectionState::Cancelled);
                attempt.settle.resolve(Err(TransportError::Cancelled));
                debug!(generation = attempt.generation, "connect attempt cancelled");
            }
            self.shared.publish(ConnectionState::Disconnected);
            inner.writer.take()
        };

        if let Some(writer) = writer {
            let generation = writer.generation;
            writer.close(self.shared.flush_timeout).await;
            info!(generation, "disconnected");
        }
    }
}

async fn establish(
    shared: Weak<Shared>,
    settle: Arc<Settle>,
    generation: u64,
    host: String,
    port: u16,
) {
    let outcome = TcpStream::connect((host.as_str(), port)).await;
    let Some(shared) = shared.upgrade() else {
        settle.resolve(Err(TransportError::Cancelled));
        return;
    };

    let mut inner = shared.lock();
    let current = inner
        .attempt
        .as_ref()
        .is_some_and(|attempt| attempt.generation == generation);
    if !current {
        // Disconnect got here first and already settled the attempt.
        settle.resolve(Err(TransportError::Cancelled));
        return;
    }
    inner.attempt = None;

    match outcome {
        Ok(stream) => {
            if let Err(error) = stream.set_nodelay(true) {
                debug!(%error, "failed to set TCP_NODELAY");
            }
            let (queue, requests) = mpsc::unbounded_channel();
            let task = tokio::spawn(run_writer(
                stream,
                requests,
                Arc::downgrade(&shared),
                generation,
            ));
            inner.writer = Some(Writer {
                generation,
                queue,
                task,
            });
            shared.publish(ConnectionState::Ready);
            info!(%host, port, generation, "connected");
            settle.resolve(Ok(()));
        }
        Err(source) => {
            shared.publish(ConnectionState::Failed);
            warn!(%host, port, error = %source, "connect failed");
            settle.resolve(Err(TransportError::Connect {
                address: format!("{host}:{port}"),
                source,
            }));
        }
    }
}

async fn run_writer(
    mut stream: TcpStream,
    mut requests: mpsc::UnboundedReceiver<WriteRequest>,
    shared: Weak<Shared>,
    generation: u64,
) {
    while let Some(request) = requests.recv().await {
        let result = write_frame(&mut stream, &request.frame).await;
        let failed = match &result {
            Ok(()) => {
                trace!(bytes = request.frame.len(), "frame written");
                false
            }
            Err(error) => {
                warn!(%error, generation, "write failed");
                true
            }
        };
        let _ = request.done.send(result);
        if failed {
            if let Some(shared) = shared.upgrade() {
                let mut inner = shared.lock();
                if inner
                    .writer
                    .as_ref()
                    .is_some_and(|writer| writer.generation == generation)
                {
                    inner.writer = None;
                    shared.publish(ConnectionState::Failed);
                }
            }
            return;
        }
    }

    if let Err(error) = stream.shutdown().await {
        debug!(%error, "socket shutdown failed");
    }
}

async fn write_frame(stream: &mut TcpStream, frame: &[u8]) -> io::Result<()> {
    stream.write_all(frame).await?;
    stream.flush().await
}
