//! Canvas partitioning into fixed-size square tiles.
//!
//! The canvas is cut into `tile_size × tile_size` tiles. Each tile samples
//! the [`ColorSource`] once for every local coordinate and keeps the
//! colors in **row-major** order (`index = dy * size + dx`). Tiles with no
//! visible sample are dropped, so a small image on a large canvas only
//! costs the tiles it actually covers.
//!
//! Boundary tiles are never clipped: they sample past the canvas edge and
//! rely on the source to report those coordinates as invisible.

use crate::error::FloodError;
use crate::source::ColorSource;
use crate::types::{Canvas, Rgb};

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 64;

// ── Tile ─────────────────────────────────────────────────────────

/// A pre-sampled square region of the canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    x: u32,
    y: u32,
    size: u32,
    colors: Vec<Rgb>,
    visible: Vec<bool>,
}

impl Tile {
    /// Sample `source` over the tile at `(x, y)`.
    ///
    /// Returns `None` when no sample is visible.
    pub fn sample(x: u32, y: u32, size: u32, source: &dyn ColorSource) -> Option<Self> {
        let area = size as usize * size as usize;
        let mut colors = Vec::with_capacity(area);
        let mut visible = Vec::with_capacity(area);
        let mut any_visible = false;

        for dy in 0..size {
            for dx in 0..size {
                let s = source.sample(x.saturating_add(dx), y.saturating_add(dy));
                any_visible |= s.visible;
                colors.push(s.color);
                visible.push(s.visible);
            }
        }

        any_visible.then_some(Self {
            x,
            y,
            size,
            colors,
            visible,
        })
    }

    /// Left edge in canvas coordinates.
    pub fn x(&self) -> u32 {
        self.x
    }

    /// Top edge in canvas coordinates.
    pub fn y(&self) -> u32 {
        self.y
    }

    /// Edge length in pixels.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of sampled pixels (`size * size`).
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Number of samples that were visible.
    pub fn visible_count(&self) -> usize {
        self.visible.iter().filter(|v| **v).count()
    }

    /// Color at local coordinate `(dx, dy)`.
    pub fn color_at(&self, dx: u32, dy: u32) -> Option<Rgb> {
        if dx >= self.size || dy >= self.size {
            return None;
        }
        self.colors.get(self.index(dx, dy)).copied()
    }

    /// Iterate every sample as `(absolute_x, absolute_y, color, visible)`
    /// in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32, Rgb, bool)> + '_ {
        let size = self.size.max(1) as usize;
        self.colors
            .iter()
            .zip(self.visible.iter())
            .enumerate()
            .map(move |(i, (color, visible))| {
                let dx = (i % size) as u32;
                let dy = (i / size) as u32;
                (
                    self.x.saturating_add(dx),
                    self.y.saturating_add(dy),
                    *color,
                    *visible,
                )
            })
    }

    fn index(&self, dx: u32, dy: u32) -> usize {
        dy as usize * self.size as usize + dx as usize
    }
}

// ── Partitioning ─────────────────────────────────────────────────

/// Number of tiles covering `canvas` before visibility filtering.
pub fn candidate_count(canvas: Canvas, tile_size: u32) -> usize {
    if tile_size == 0 {
        return 0;
    }
    let (cols, rows) = canvas.tile_grid(tile_size);
    cols as usize * rows as usize
}

/// Cut `canvas` into tiles and keep those with at least one visible
/// sample. Tiles are returned in grid order (row by row).
pub fn partition(
    canvas: Canvas,
    tile_size: u32,
    source: &dyn ColorSource,
) -> Result<Vec<Tile>, FloodError> {
    if tile_size == 0 {
        return Err(FloodError::Config("tile size must be > 0".into()));
    }

    let (cols, rows) = canvas.tile_grid(tile_size);
    let mut tiles = Vec::new();

    for ty in 0..rows {
        for tx in 0..cols {
            if let Some(tile) = Tile::sample(tx * tile_size, ty * tile_size, tile_size, source) {
                tiles.push(tile);
            }
        }
    }

    tracing::debug!(
        "partitioned {canvas} into {} of {} tiles ({tile_size}px)",
        tiles.len(),
        cols as usize * rows as usize
    );
    Ok(tiles)
}

// ── Tests ────────────────────────────────────────────────────────
