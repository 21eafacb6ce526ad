use sketch_shared::{CanvasSize, OutboundMessage, Point};

use crate::state::{PeerSession, MAX_POINTS_PER_STROKE, MAX_STROKES};

#[derive(Debug, PartialEq)]
pub enum Applied {
    Reset { canvas: CanvasSize },
    Lines { added: usize, dropped: usize },
}

pub fn apply_message(session: &mut PeerSession, message: OutboundMessage) -> Applied {
    session.messages += 1;
    match message {
        OutboundMessage::Reset(canvas) => {
            session.canvas = Some(canvas);
            session.strokes.clear();
            Applied::Reset { canvas }
        }
        OutboundMessage::Lines(strokes) => {
            let received = strokes.len();
            let strokes = sanitize_strokes(strokes);
            let added = strokes.len();
            session.strokes.extend(strokes);
            let overflow = session.strokes.len().saturating_sub(MAX_STROKES);
            if overflow > 0 {
                session.strokes.drain(0..overflow);
            }
            Applied::Lines {
                added,
                dropped: received - added,
            }
        }
    }
}

/// Received strokes scaled into the unit square by the announced canvas.
pub fn normalized_strokes(session: &PeerSession) -> Option<Vec<Vec<Point>>> {
    let canvas = session.canvas?;
    if !(canvas.width > 0.0 && canvas.height > 0.0) {
        return None;
    }
    Some(
        session
            .strokes
            .iter()
            .map(|stroke| {
                stroke
                    .iter()
                    .map(|point| Point {
                        x: point.x / canvas.width,
                        y: point.y / canvas.height,
                    })
                    .collect()
            })
            .collect(),
    )
}

pub fn sanitize_strokes(strokes: Vec<Vec<Point>>) -> Vec<Vec<Point>> {
    strokes.into_iter().filter_map(sanitize_stroke).collect()
}

fn sanitize_stroke(stroke: Vec<Point>) -> Option<Vec<Point>> {
    let mut points = stroke
        .into_iter()
        .filter(|point| point.is_finite())
        .collect::<Vec<_>>();
    points.truncate(MAX_POINTS_PER_STROKE);
    if points.is_empty() {
        return None;
    }
    Some(points)
}
