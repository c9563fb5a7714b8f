//! Fan-out of tiles to the drawing connections.
//!
//! The [`Dispatcher`] owns the [`TileDeck`] and is the only code that
//! reorders it. Each pass shuffles the deck, then pushes every tile into
//! the shared [`queue`]; shuffling and pushing never overlap, so no
//! consumer can see a half-permuted deck.

pub mod queue;

pub use queue::{DEFAULT_QUEUE_CAPACITY, TileReceiver, TileSender, tile_queue};

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::tile::Tile;

// ── TileDeck ─────────────────────────────────────────────────────

/// The working set of tiles, in the order of the current pass.
///
/// Tiles themselves are immutable and shared with the connections via
/// `Arc`; only the order belongs to the deck.
#[derive(Debug, Clone, Default)]
pub struct TileDeck {
    tiles: Vec<Arc<Tile>>,
}

impl TileDeck {
    pub fn new(tiles: Vec<Tile>) -> Self {
        Self {
            tiles: tiles.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Total pixel commands in one pass.
    pub fn pixel_count(&self) -> usize {
        self.tiles.iter().map(|t| t.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Tile>> {
        self.tiles.iter()
    }

    /// Uniformly permute the deck in place.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.tiles.shuffle(rng);
    }
}

impl From<Vec<Tile>> for TileDeck {
    fn from(tiles: Vec<Tile>) -> Self {
        Self::new(tiles)
    }
}

// ── DispatchStats ────────────────────────────────────────────────

/// What the dispatcher achieved before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Completed passes over the whole deck.
    pub passes: u64,
    /// Tiles handed to the queue, including those of an unfinished pass.
    pub tiles: u64,
}

// ── Dispatcher ───────────────────────────────────────────────────

/// Single producer that keeps every tile circulating.
pub struct Dispatcher<R = StdRng> {
    deck: TileDeck,
    tx: TileSender,
    rng: R,
    max_passes: Option<u64>,
}

impl Dispatcher<StdRng> {
    /// A dispatcher with an entropy-seeded RNG and no pass limit.
    pub fn new(deck: TileDeck, tx: TileSender) -> Self {
        Self {
            deck,
            tx,
            rng: StdRng::from_entropy(),
            max_passes: None,
        }
    }
}

impl<R: Rng + Send> Dispatcher<R> {
    /// Replace the RNG, e.g. with a seeded one for reproducible order.
    pub fn with_rng<R2: Rng + Send>(self, rng: R2) -> Dispatcher<R2> {
        Dispatcher {
            deck: self.deck,
            tx: self.tx,
            rng,
            max_passes: self.max_passes,
        }
    }

    /// Stop after `passes` full passes. `None` runs until cancelled.
    pub fn with_pass_limit(mut self, passes: Option<u64>) -> Self {
        self.max_passes = passes;
        self
    }

    pub fn deck(&self) -> &TileDeck {
        &self.deck
    }

    /// Shuffle and push until cancelled, until every consumer is gone,
    /// or until the pass limit is reached.
    ///
    /// The queue is closed when this returns, so consumers drain what is
    /// left and then see the end of the stream.
    pub async fn run(mut self, cancel: CancellationToken) -> DispatchStats {
        let mut stats = DispatchStats::default();

        if self.deck.is_empty() {
            warn!("no visible tiles; nothing to dispatch");
            return stats;
        }

        info!(
            "dispatching {} tiles ({} pixels per pass)",
            self.deck.len(),
            self.deck.pixel_count()
        );

        loop {
            if self.max_passes.is_some_and(|max| stats.passes >= max) {
                debug!("pass limit reached after {} passes", stats.passes);
                break;
            }

            self.deck.shuffle(&mut self.rng);

            for tile in self.deck.iter() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("dispatcher cancelled after {} passes", stats.passes);
                        return stats;
                    }
                    sent = self.tx.send(Arc::clone(tile)) => {
                        if sent.is_err() {
                            debug!("all consumers gone after {} passes", stats.passes);
                            return stats;
                        }
                    }
                }
                stats.tiles += 1;
            }

            stats.passes += 1;
            debug!("pass {} complete", stats.passes);
        }

        stats
    }
}

// ── Tests ────────────────────────────────────────────────────────
