//! Commands sent to the canvas server and the responses it returns.
//!
//! The protocol is newline-delimited ASCII:
//!
//! | Command               | Response                 |
//! |-----------------------|--------------------------|
//! | `SIZE`                | `SIZE <width> <height>`  |
//! | `PX <x> <y> <RRGGBB>` | none                     |

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::HandshakeError;
use crate::tile::Tile;
use crate::types::{Canvas, Rgb};

// ── Command ──────────────────────────────────────────────────────

/// Everything the client writes to the server.
#[derive(Debug, Clone)]
pub enum Command {
    /// Ask for the canvas dimensions.
    Size,
    /// Set a single pixel.
    Pixel { x: u32, y: u32, color: Rgb },
    /// Every pixel of a tile, written as one message.
    Tile(Arc<Tile>),
    /// Lines that were already encoded, e.g. a flushed
    /// [`PixelBuffer`](crate::codec::PixelBuffer).
    Batch(Bytes),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Size => write!(f, "SIZE"),
            Command::Pixel { x, y, color } => write!(f, "PX {x} {y} {color}"),
            Command::Tile(tile) => write!(f, "TILE {},{} ({} px)", tile.x(), tile.y(), tile.len()),
            Command::Batch(bytes) => write!(f, "BATCH ({} bytes)", bytes.len()),
        }
    }
}

// ── Response ─────────────────────────────────────────────────────

/// A line received from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Answer to [`Command::Size`].
    Size(Canvas),
}

impl Response {
    /// Parse one response line (without its terminator).
    ///
    /// Extra whitespace between fields is tolerated; anything other than
    /// `SIZE <u32> <u32>` is rejected.
    pub fn parse(line: &str) -> Result<Self, HandshakeError> {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some("SIZE"), Some(w), Some(h), None) => {
                let width = parse_dimension("width", w)?;
                let height = parse_dimension("height", h)?;
                Ok(Response::Size(Canvas::new(width, height)))
            }
            _ => Err(HandshakeError::Malformed(line.to_string())),
        }
    }
}

fn parse_dimension(field: &'static str, value: &str) -> Result<u32, HandshakeError> {
    value.parse().map_err(|_| HandshakeError::InvalidField {
        field,
        value: value.to_string(),
    })
}
