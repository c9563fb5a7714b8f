//! Wire codec for the SIZE/PX text protocol.
//!
//! [`PxCodec`] plugs into `tokio_util::codec::Framed`: it encodes
//! [`Command`]s into newline-terminated lines and decodes the server's
//! answers into single lines (terminator and trailing `\r` stripped).

mod buffer;

pub use buffer::{DEFAULT_PIXEL_BUFFER, PixelBuffer};

use std::io;

use bytes::{BufMut, BytesMut};

use crate::message::Command;
use crate::tile::Tile;
use crate::types::{InvisiblePixels, Rgb};

/// Longest response line accepted before the stream is considered broken.
pub const MAX_LINE_LENGTH: usize = 1024;

/// Rough upper bound of one `PX` line, used to pre-size buffers.
const PX_LINE_HINT: usize = 24;

#[derive(Debug, Clone, Default)]
pub struct PxCodec {
    invisible: InvisiblePixels,
    /// Where to resume the newline scan on the next `decode` call.
    next_index: usize,
}

impl PxCodec {
    pub fn new(invisible: InvisiblePixels) -> Self {
        Self {
            invisible,
            next_index: 0,
        }
    }

    pub fn invisible_pixels(&self) -> InvisiblePixels {
        self.invisible
    }
}

impl tokio_util::codec::Decoder for PxCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let newline = src[self.next_index..].iter().position(|b| *b == b'\n');

        let Some(offset) = newline else {
            if src.len() > MAX_LINE_LENGTH {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("response line exceeds {MAX_LINE_LENGTH} bytes"),
                ));
            }
            self.next_index = src.len();
            return Ok(None);
        };

        let end = self.next_index + offset;
        self.next_index = 0;

        let mut line = src.split_to(end + 1);
        line.truncate(end);
        if line.last() == Some(&b'\r') {
            line.truncate(end - 1);
        }

        String::from_utf8(line.to_vec())
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl tokio_util::codec::Encoder<Command> for PxCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Command::Size => dst.extend_from_slice(b"SIZE\n"),
            Command::Pixel { x, y, color } => write_px(dst, x, y, color),
            Command::Tile(tile) => encode_tile(&tile, self.invisible, dst),
            Command::Batch(bytes) => dst.extend_from_slice(&bytes),
        }
        Ok(())
    }
}

// ── Rendering helpers ────────────────────────────────────────────

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Append one `PX <x> <y> <RRGGBB>\n` line.
pub fn write_px(dst: &mut BytesMut, x: u32, y: u32, color: Rgb) {
    dst.put_slice(b"PX ");
    put_decimal(dst, x);
    dst.put_u8(b' ');
    put_decimal(dst, y);
    dst.put_u8(b' ');
    for channel in [color.r, color.g, color.b] {
        dst.put_u8(HEX_DIGITS[(channel >> 4) as usize]);
        dst.put_u8(HEX_DIGITS[(channel & 0x0F) as usize]);
    }
    dst.put_u8(b'\n');
}

fn put_decimal(dst: &mut BytesMut, mut n: u32) {
    // u32::MAX has ten digits.
    let mut digits = [0u8; 10];
    let mut start = digits.len();
    loop {
        start -= 1;
        digits[start] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    dst.put_slice(&digits[start..]);
}

/// Append every pixel of `tile` in row-major order.
pub fn encode_tile(tile: &Tile, invisible: InvisiblePixels, dst: &mut BytesMut) {
    dst.reserve(tile.len() * PX_LINE_HINT);
    for (x, y, color, visible) in tile.pixels() {
        if !visible && invisible == InvisiblePixels::Skip {
            continue;
        }
        write_px(dst, x, y, color);
    }
}

/// Render `tile` to a standalone string, one command per line.
pub fn render_tile(tile: &Tile, invisible: InvisiblePixels) -> String {
    let mut buf = BytesMut::new();
    encode_tile(tile, invisible, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

// ── Tests ────────────────────────────────────────────────────────
