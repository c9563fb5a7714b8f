//! Domain-specific error types for the flood client.
//!
//! Every failure carries the stage it happened in (connect, handshake,
//! decode, write) so the binary can report it before exiting.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for pxflood.
#[derive(Debug, Error)]
pub enum FloodError {
    // ── Startup Errors ───────────────────────────────────────────
    /// The TCP dial to the canvas server failed.
    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The dial did not complete within the configured deadline.
    #[error("connect to {addr} timed out after {after:?}")]
    ConnectTimeout { addr: String, after: Duration },

    /// The SIZE query failed or its answer was unusable.
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    /// The image could not be turned into a color source.
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    // ── Runtime Errors ───────────────────────────────────────────
    /// Writing to an established socket failed mid-run.
    #[error("connection {index}: write failed: {source}")]
    Write {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    /// A lifecycle transition was attempted from the wrong phase.
    #[error("invalid transition: {0}")]
    InvalidTransition(&'static str),

    /// The tile queue was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// A spawned task panicked or was aborted.
    #[error("task error: {0}")]
    Task(String),
}

impl FloodError {
    /// Short name of the stage that failed, used in the exit diagnostic.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Connect { .. } | Self::ConnectTimeout { .. } => "connect",
            Self::Handshake(_) => "handshake",
            Self::Decode(_) => "decode",
            Self::Write { .. } => "write",
            Self::Config(_) => "config",
            Self::InvalidTransition(_) | Self::ChannelClosed | Self::Task(_) => "runtime",
        }
    }
}

// ── HandshakeError ───────────────────────────────────────────────

/// Failure of the `SIZE` exchange.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The socket failed while writing the query or reading the answer.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The server closed the connection before answering.
    #[error("server closed the connection before answering SIZE")]
    Closed,

    /// The answer did not have the shape `SIZE <w> <h>`.
    #[error("malformed SIZE response: {0:?}")]
    Malformed(String),

    /// One of the dimensions was not an unsigned integer.
    #[error("invalid {field} in SIZE response: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

// ── DecodeError ──────────────────────────────────────────────────

/// Failure to build an image color source.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// No decoder is registered for the file extension.
    #[error("unsupported image format: {0:?}")]
    UnsupportedFormat(String),

    /// The decoder rejected the data.
    #[error("corrupt image: {0}")]
    Corrupt(#[from] image::ImageError),
}

// ── Convenient From implementations ──────────────────────────────

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for FloodError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        FloodError::ChannelClosed
    }
}

impl From<tokio::task::JoinError> for FloodError {
    fn from(e: tokio::task::JoinError) -> Self {
        FloodError::Task(e.to_string())
    }
}
