use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use sketch_shared::{CanvasSize, Point};
use tokio::sync::RwLock;
use uuid::Uuid;

pub const MAX_STROKES: usize = 2000;
pub const MAX_POINTS_PER_STROKE: usize = 5000;
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

#[derive(Clone, Default)]
pub struct AppState {
    pub peers: Arc<RwLock<HashMap<Uuid, Arc<RwLock<PeerSession>>>>>,
}

/// What one connected drawing device has told us so far.
pub struct PeerSession {
    pub addr: SocketAddr,
    pub canvas: Option<CanvasSize>,
    pub strokes: Vec<Vec<Point>>,
    pub messages: usize,
}

impl PeerSession {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            canvas: None,
            strokes: Vec::new(),
            messages: 0,
        }
    }
}
