use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use sketch_shared::decode_message;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::logic::{apply_message, normalized_strokes, Applied};
use crate::state::{AppState, PeerSession, MAX_FRAME_BYTES};

#[derive(Debug, PartialEq)]
enum Frame {
    Complete,
    Oversized(usize),
    Closed,
}

/// Reads up to the next newline into `frame`, without the line ending.
/// Frames longer than `limit` are consumed but not kept.
async fn read_frame<R>(reader: &mut R, frame: &mut Vec<u8>, limit: usize) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    frame.clear();
    let mut skipped = 0;
    loop {
        let (used, terminated) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(match (skipped, frame.is_empty()) {
                    (0, true) => Frame::Closed,
                    (0, false) => Frame::Complete,
                    (skipped, _) => Frame::Oversized(skipped),
                });
            }
            let (chunk, terminated) = match available.iter().position(|byte| *byte == b'\n') {
                Some(end) => (&available[..end], true),
                None => (available, false),
            };
            if skipped == 0 && frame.len() + chunk.len() <= limit {
                frame.extend_from_slice(chunk);
            } else {
                skipped += frame.len() + chunk.len();
                frame.clear();
            }
            (chunk.len() + usize::from(terminated), terminated)
        };
        reader.consume(used);
        if terminated {
            if skipped > 0 {
                return Ok(Frame::Oversized(skipped));
            }
            if frame.last() == Some(&b'\r') {
                frame.pop();
            }
            return Ok(Frame::Complete);
        }
    }
}

pub async fn serve(listener: TcpListener, state: AppState) {
    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                let state = state.clone();
                tokio::spawn(handle_client(socket, addr, state));
            }
            Err(error) => warn!(%error, "accept failed"),
        }
    }
}

async fn handle_client(socket: TcpStream, addr: SocketAddr, state: AppState) {
    let connection_id = Uuid::new_v4();
    let session = Arc::new(RwLock::new(PeerSession::new(addr)));
    {
        let mut peers = state.peers.write().await;
        peers.insert(connection_id, session.clone());
        info!(conn = %connection_id, %addr, peers = peers.len(), "peer connected");
    }

    let mut reader = BufReader::new(socket);
    let mut frame = Vec::new();
    loop {
        match read_frame(&mut reader, &mut frame, MAX_FRAME_BYTES).await {
            Ok(Frame::Complete) => {}
            Ok(Frame::Oversized(bytes)) => {
                warn!(conn = %connection_id, bytes, limit = MAX_FRAME_BYTES, "dropping oversized frame");
                continue;
            }
            Ok(Frame::Closed) => break,
            Err(error) => {
                warn!(conn = %connection_id, %error, "read failed");
                break;
            }
        }
        if frame.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let message = match decode_message(&frame) {
            Ok(message) => message,
            Err(error) => {
                let snippet = String::from_utf8_lossy(&frame[..frame.len().min(200)]);
                warn!(conn = %connection_id, %error, payload = ?snippet, "dropping frame");
                continue;
            }
        };

        let mut session = session.write().await;
        match apply_message(&mut session, message) {
            Applied::Reset { canvas } => info!(
                conn = %connection_id,
                width = canvas.width,
                height = canvas.height,
                "canvas reset"
            ),
            Applied::Lines { added, dropped } => {
                info!(
                    conn = %connection_id,
                    added,
                    dropped,
                    total = session.strokes.len(),
                    "strokes received"
                );
                if let Some(normalized) = normalized_strokes(&session) {
                    debug!(conn = %connection_id, strokes = ?normalized, "normalized strokes");
                }
            }
        }
    }

    let session = session.read().await;
    let mut peers = state.peers.write().await;
    peers.remove(&connection_id);
    info!(
        conn = %connection_id,
        addr = %session.addr,
        messages = session.messages,
        strokes = session.strokes.len(),
        peers = peers.len(),
        "peer disconnected"
    );
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sketch_shared::{encode_message, CanvasSize, OutboundMessage, Point};
    use tokio::io::AsyncWriteExt;

    use super::*;

    async fn start() -> (AppState, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = AppState::default();
        tokio::spawn(serve(listener, state.clone()));
        (state, addr)
    }

    async fn wait_for<F>(state: &AppState, mut done: F)
    where
        F: FnMut(&[(usize, Option<CanvasSize>)]) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let mut snapshot = Vec::new();
            for session in state.peers.read().await.values() {
                let session = session.read().await;
                snapshot.push((session.strokes.len(), session.canvas));
            }
            if done(&snapshot) {
                return;
            }
            assert!(tokio::time::Instant::now() < deadline, "timed out");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn applies_frames_and_skips_garbage() {
        let (state, addr) = start().await;
        let mut client = TcpStream::connect(addr).await.unwrap();
        let canvas = CanvasSize {
            width: 300.0,
            height: 200.0,
        };

        let mut frames = encode_message(&OutboundMessage::Reset(canvas)).unwrap();
        frames.extend_from_slice(b"\r\n{\"type\":\"ERASE\",\"data\":1}\n\nnot json\n");
        frames.extend(
            encode_message(&OutboundMessage::Lines(vec![
                vec![Point { x: 1.0, y: 2.0 }],
                vec![Point { x: 3.0, y: 4.0 }],
            ]))
            .unwrap(),
        );
        frames.push(b'\n');
        client.write_all(&frames).await.unwrap();

        wait_for(&state, |peers| peers == [(2, Some(canvas))]).await;

        drop(client);
        wait_for(&state, |peers| peers.is_empty()).await;
    }

    #[tokio::test]
    async fn invalid_utf8_frame_keeps_the_peer() {
        let (state, addr) = start().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let mut frames = b"\xff\xfe garbage\n".to_vec();
        frames.extend(
            encode_message(&OutboundMessage::Lines(vec![vec![Point { x: 1.0, y: 1.0 }]])).unwrap(),
        );
        frames.push(b'\n');
        client.write_all(&frames).await.unwrap();

        wait_for(&state, |peers| peers == [(1, None)]).await;
    }

    #[tokio::test]
    async fn oversized_frame_is_skipped() {
        let (state, addr) = start().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let mut frames = vec![b'x'; MAX_FRAME_BYTES + 1024];
        frames.push(b'\n');
        frames.extend(
            encode_message(&OutboundMessage::Lines(vec![vec![Point { x: 2.0, y: 2.0 }]])).unwrap(),
        );
        frames.push(b'\n');
        client.write_all(&frames).await.unwrap();

        wait_for(&state, |peers| peers == [(1, None)]).await;
    }

    #[tokio::test]
    async fn read_frame_splits_and_limits() {
        let data: &[u8] = b"abcdefghij\nok\r\n\nshort";
        let mut reader = BufReader::with_capacity(4, data);
        let mut frame = Vec::new();

        let mut frames = Vec::new();
        loop {
            let kind = read_frame(&mut reader, &mut frame, 5).await.unwrap();
            let text = String::from_utf8(frame.clone()).unwrap();
            frames.push((kind, text));
            if frames.last().map(|(kind, _)| kind) == Some(&Frame::Closed) {
                break;
            }
        }
        assert_eq!(
            frames,
            vec![
                (Frame::Oversized(10), String::new()),
                (Frame::Complete, "ok".to_string()),
                (Frame::Complete, String::new()),
                (Frame::Complete, "short".to_string()),
                (Frame::Closed, String::new()),
            ]
        );
    }

    #[tokio::test]
    async fn tracks_peers_independently() {
        let (state, addr) = start().await;
        let mut first = TcpStream::connect(addr).await.unwrap();
        let _second = TcpStream::connect(addr).await.unwrap();

        let mut frame =
            encode_message(&OutboundMessage::Lines(vec![vec![Point { x: 0.0, y: 0.0 }]])).unwrap();
        frame.push(b'\n');
        first.write_all(&frame).await.unwrap();

        wait_for(&state, |peers| {
            let mut counts = peers.iter().map(|(strokes, _)| *strokes).collect::<Vec<_>>();
            counts.sort_unstable();
            counts == [0, 1]
        })
        .await;
    }
}
