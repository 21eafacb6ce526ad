//! JSON payloads exchanged with the remote listener.
//!
//! Each call produces one self-contained object of the form
//! `{"type": ..., "data": ...}`. Framing between payloads is left to the
//! transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{CanvasSize, Point, Stroke};

const MESSAGE_TYPES: [&str; 2] = ["RESET", "LINES"];

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum OutboundMessage {
    #[serde(rename = "RESET")]
    Reset(CanvasSize),
    #[serde(rename = "LINES")]
    Lines(Vec<Vec<Point>>),
}

impl OutboundMessage {
    pub fn lines(strokes: &[Stroke]) -> Self {
        Self::Lines(strokes.iter().map(Stroke::to_wire).collect())
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown message type {0:?}")]
    UnknownMessageType(String),
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

pub fn encode_message(message: &OutboundMessage) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(message)?)
}

pub fn decode_message(payload: &[u8]) -> Result<OutboundMessage, CodecError> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|error| CodecError::MalformedMessage(error.to_string()))?;
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return Err(CodecError::MalformedMessage(
            "missing string field \"type\"".into(),
        ));
    };
    if !MESSAGE_TYPES.contains(&kind) {
        return Err(CodecError::UnknownMessageType(kind.to_string()));
    }
    serde_json::from_value(value).map_err(|error| CodecError::MalformedMessage(error.to_string()))
}
