use serde::{Deserialize, Serialize};

pub mod codec;
pub mod simplify;

pub use codec::{decode_message, encode_message, CodecError, OutboundMessage};
pub use simplify::simplify;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A raw sample from the canvas, stamped in seconds since the epoch.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct TimedPoint {
    pub x: f64,
    pub y: f64,
    pub timestamp: f64,
}

impl TimedPoint {
    pub fn new(x: f64, y: f64, timestamp: f64) -> Self {
        Self { x, y, timestamp }
    }

    pub fn point(self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stroke {
    pub points: Vec<TimedPoint>,
}

impl Stroke {
    /// Coordinates only; timestamps stay on the device.
    pub fn to_wire(&self) -> Vec<Point> {
        self.points.iter().map(|point| point.point()).collect()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 1024.0,
            height: 768.0,
        }
    }
}
