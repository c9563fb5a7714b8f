//! Color sources: pure functions from a canvas coordinate to a [`Sample`].
//!
//! Anything implementing [`ColorSource`] can be tiled. Closures of the
//! right shape implement it automatically; [`ImageSource`] wraps a decoded
//! image file and [`NoisePattern`] is the built-in fallback used when no
//! image is given.

pub mod raster;

pub use self::raster::{BuiltinDecoder, DecoderRegistry, ImageSource, PixelDecoder};

use crate::types::{Rgb, Sample};

// ── ColorSource ──────────────────────────────────────────────────

/// Maps a canvas coordinate to a color and visibility flag.
///
/// Implementations must be pure and thread-safe. Coordinates outside the
/// region they describe return an invisible sample, never a failure.
pub trait ColorSource: Send + Sync {
    fn sample(&self, x: u32, y: u32) -> Sample;
}

impl<F> ColorSource for F
where
    F: Fn(u32, u32) -> Sample + Send + Sync,
{
    fn sample(&self, x: u32, y: u32) -> Sample {
        self(x, y)
    }
}

// ── NoisePattern ─────────────────────────────────────────────────

/// A dark, dithered test pattern covering the whole canvas.
///
/// `r = x*y mod 3`, `g = y mod (x+1)`, `b = x*y / (x*y+1)`, each truncated
/// to eight bits. Every coordinate is visible.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoisePattern;

impl ColorSource for NoisePattern {
    fn sample(&self, x: u32, y: u32) -> Sample {
        let (x, y) = (x as u64, y as u64);
        let xy = x * y;
        Sample::visible(Rgb::new(
            (xy % 3) as u8,
            (y % (x + 1)) as u8,
            (xy / (xy + 1)) as u8,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_color_sources() {
        let src = |x: u32, _y: u32| Sample::visible(Rgb::new(x as u8, 0, 0));
        let dyn_src: &dyn ColorSource = &src;
        assert_eq!(dyn_src.sample(9, 0).color, Rgb::new(9, 0, 0));
    }

    #[test]
    fn noise_pattern_values() {
        let p = NoisePattern;
        assert_eq!(p.sample(0, 0), Sample::visible(Rgb::new(0, 0, 0)));
        // x*y = 6 → r = 0, g = 3 % 3 = 0, b = 6 / 7 = 0
        assert_eq!(p.sample(2, 3).color, Rgb::new(0, 0, 0));
        // x*y = 4 → r = 1, g = 4 % 2 = 0
        assert_eq!(p.sample(1, 4).color, Rgb::new(1, 0, 0));
        // g is truncated to eight bits: 300 % 1000 = 300 → 44
        assert_eq!(p.sample(999, 300).color.g, 44);
        assert!(p.sample(u32::MAX, u32::MAX).visible);
    }
}
