//! Accumulator for individually drawn pixels.

use bytes::{Bytes, BytesMut};

use crate::types::Rgb;

/// Number of pixel commands collected before a flush.
pub const DEFAULT_PIXEL_BUFFER: usize = 10_000;

/// Collects `PX` lines and hands them out in batches.
///
/// [`push`](Self::push) returns the accumulated payload exactly when the
/// threshold is reached; the buffer is empty again afterwards. Commands
/// keep their enqueue order.
#[derive(Debug)]
pub struct PixelBuffer {
    buf: BytesMut,
    count: usize,
    threshold: usize,
}

impl PixelBuffer {
    /// A buffer that flushes every `threshold` pixels (at least one).
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            buf: BytesMut::new(),
            count: 0,
            threshold,
        }
    }

    /// Queue one pixel. Returns the full batch when this push fills it.
    pub fn push(&mut self, x: u32, y: u32, color: Rgb) -> Option<Bytes> {
        super::write_px(&mut self.buf, x, y, color);
        self.count += 1;
        if self.count >= self.threshold {
            self.take()
        } else {
            None
        }
    }

    /// Drain whatever has been queued so far.
    pub fn take(&mut self) -> Option<Bytes> {
        if self.count == 0 {
            return None;
        }
        self.count = 0;
        Some(self.buf.split().freeze())
    }

    /// Pixels currently queued.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

impl Default for PixelBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_PIXEL_BUFFER)
    }
}
