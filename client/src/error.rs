use std::io;

use sketch_shared::CodecError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("no stroke in progress for this handle")]
    InvalidHandle,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("not connected")]
    NotConnected,
    #[error("send failed: {0}")]
    Send(#[source] io::Error),
    #[error("connection attempt cancelled")]
    Cancelled,
    #[error("a connection is already active")]
    AlreadyActive,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid address {0:?}, expected host:port")]
    InvalidAddress(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}
