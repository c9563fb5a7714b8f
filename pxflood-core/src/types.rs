//! Shared value types used across tiling, encoding and the network layer.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Rgb ──────────────────────────────────────────────────────────

/// A 24-bit color.
///
/// `Display` renders the wire form used by `PX`: two uppercase hex
/// digits per channel, e.g. `0A141E`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse the six-digit hex form (case-insensitive).
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != 6 || !s.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

// ── Sample ───────────────────────────────────────────────────────

/// One color-source lookup: the color and whether it should be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sample {
    pub color: Rgb,
    pub visible: bool,
}

impl Sample {
    pub const fn visible(color: Rgb) -> Self {
        Self {
            color,
            visible: true,
        }
    }

    /// A transparent sample. Its color is black and only matters if the
    /// surrounding tile is sent with [`InvisiblePixels::Send`].
    pub const fn hidden() -> Self {
        Self {
            color: Rgb::new(0, 0, 0),
            visible: false,
        }
    }
}

// ── Canvas ───────────────────────────────────────────────────────

/// Canvas dimensions as reported by the server's `SIZE` answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of tile columns and rows needed to cover the canvas.
    pub fn tile_grid(&self, tile_size: u32) -> (u32, u32) {
        (
            self.width.div_ceil(tile_size),
            self.height.div_ceil(tile_size),
        )
    }
}

impl fmt::Display for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ── InvisiblePixels ──────────────────────────────────────────────

/// What to do with transparent samples inside a tile that is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvisiblePixels {
    /// Send them with whatever color was sampled (black for images).
    #[default]
    Send,
    /// Leave them out of the wire output.
    Skip,
}
