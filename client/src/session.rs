use std::sync::Arc;

use sketch_shared::{encode_message, CanvasSize, OutboundMessage};
use tracing::{debug, info, warn};

use crate::address::parse_address;
use crate::error::SessionError;
use crate::store::StrokeStore;
use crate::transport::{ConnectionState, TcpTransport, Transport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    NothingToSend,
    Sent { strokes: usize },
}

/// Ties the local drawing to one outbound connection. Strokes are sent
/// as a `LINES` batch of everything past the sent watermark; every
/// successful connect is announced with a `RESET`.
pub struct SessionController<T: Transport = TcpTransport> {
    store: StrokeStore,
    transport: Arc<T>,
    canvas: CanvasSize,
    debug_markers: bool,
}

impl SessionController<TcpTransport> {
    pub fn new(canvas: CanvasSize) -> Self {
        Self::with_transport(TcpTransport::new(), canvas)
    }
}

impl<T: Transport> SessionController<T> {
    pub fn with_transport(transport: T, canvas: CanvasSize) -> Self {
        Self {
            store: StrokeStore::new(),
            transport: Arc::new(transport),
            canvas,
            debug_markers: false,
        }
    }

    pub fn store(&self) -> &StrokeStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut StrokeStore {
        &mut self.store
    }

    pub fn transport(&self) -> Arc<T> {
        self.transport.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    pub fn set_canvas(&mut self, canvas: CanvasSize) {
        self.canvas = canvas;
    }

    pub fn debug_markers(&self) -> bool {
        self.debug_markers
    }

    pub fn toggle_debug_markers(&mut self) -> bool {
        self.debug_markers = !self.debug_markers;
        self.debug_markers
    }

    /// Whether undo and send have anything to act on.
    pub fn has_pending(&self) -> bool {
        self.store.has_unsent()
    }

    /// Connects to `host:port` and announces the current canvas size.
    /// Strokes and the sent watermark are left alone on failure.
    pub async fn connect(&mut self, address: &str) -> Result<(), SessionError> {
        let (host, port) = parse_address(address)?;
        if let Err(error) = self.transport.connect(&host, port).await {
            warn!(%address, %error, "connection attempt did not complete");
            return Err(error.into());
        }

        let reset = encode_message(&OutboundMessage::Reset(self.canvas))?;
        self.transport.send(reset).await?;
        info!(
            %address,
            width = self.canvas.width,
            height = self.canvas.height,
            "session reset sent"
        );
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        self.transport.disconnect().await;
    }

    /// Sends every stroke past the watermark as one `LINES` message and
    /// advances the watermark once the transport has taken the bytes.
    pub async fn send_pending(&mut self) -> Result<SendOutcome, SessionError> {
        let pending = self.store.unsent_suffix();
        if pending.is_empty() {
            debug!("nothing to send");
            return Ok(SendOutcome::NothingToSend);
        }

        let strokes = pending.len();
        let payload = encode_message(&OutboundMessage::lines(pending))?;
        self.transport.send(payload).await?;
        self.store.mark_sent();
        info!(strokes, sent = self.store.sent(), "strokes sent");
        Ok(SendOutcome::Sent { strokes })
    }

    pub fn undo(&mut self) -> bool {
        self.store.undo().is_some()
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }
}
