//! Bounded multi-consumer tile queue.
//!
//! One producer (the dispatcher) and any number of consumers (the
//! connections). Consumers pull; whichever connection is idle takes the
//! next tile, so faster connections naturally draw more.
//!
//! - `send` suspends while the queue is full.
//! - `recv` suspends while it is empty and returns `None` once the
//!   producer is gone and the queue is drained.
//! - `send` fails once every consumer has been dropped.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::error::FloodError;
use crate::tile::Tile;

/// Default queue depth: a single slot, i.e. a direct hand-off.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;

/// Create a queue holding at most `capacity` tiles (at least one).
pub fn tile_queue(capacity: usize) -> (TileSender, TileReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        TileSender { tx },
        TileReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer half, owned by the dispatcher.
#[derive(Debug)]
pub struct TileSender {
    tx: mpsc::Sender<Arc<Tile>>,
}

impl TileSender {
    /// Push a tile, waiting for room.
    pub async fn send(&self, tile: Arc<Tile>) -> Result<(), FloodError> {
        self.tx.send(tile).await?;
        Ok(())
    }

    /// `true` once every receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Free slots right now.
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}

/// Consumer half. Clone one per connection.
#[derive(Debug, Clone)]
pub struct TileReceiver {
    rx: Arc<Mutex<mpsc::Receiver<Arc<Tile>>>>,
}

impl TileReceiver {
    /// Pull the next tile.
    ///
    /// Waiting consumers are served in FIFO order. Dropping the future
    /// gives up the place in line without losing a tile.
    pub async fn recv(&self) -> Option<Arc<Tile>> {
        self.rx.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Rgb, Sample};

    fn tile(x: u32) -> Arc<Tile> {
        Arc::new(Tile::sample(x, 0, 1, &|_: u32, _: u32| Sample::visible(Rgb::default())).unwrap())
    }

    #[tokio::test]
    async fn fifo_delivery_and_close() {
        let (tx, rx) = tile_queue(4);
        for x in 0..3 {
            tx.send(tile(x)).await.unwrap();
        }
        drop(tx);

        let mut seen = Vec::new();
        while let Some(t) = rx.recv().await {
            seen.push(t.x());
        }
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn send_fails_without_consumers() {
        let (tx, rx) = tile_queue(1);
        let rx2 = rx.clone();
        drop(rx);
        assert!(!tx.is_closed());
        drop(rx2);
        assert!(tx.is_closed());
        assert!(matches!(tx.send(tile(0)).await, Err(FloodError::ChannelClosed)));
    }

    #[tokio::test]
    async fn full_queue_applies_backpressure() {
        let (tx, rx) = tile_queue(1);
        tx.send(tile(0)).await.unwrap();
        assert_eq!(tx.capacity(), 0);

        let blocked = tokio::time::timeout(std::time::Duration::from_millis(50), tx.send(tile(1))).await;
        assert!(blocked.is_err(), "send should wait for a consumer");

        assert_eq!(rx.recv().await.unwrap().x(), 0);
        tx.send(tile(2)).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().x(), 2);
    }

    #[tokio::test]
    async fn consumers_share_one_stream() {
        let (tx, rx) = tile_queue(8);
        let a = rx.clone();
        let b = rx;
        for x in 0..8 {
            tx.send(tile(x)).await.unwrap();
        }
        drop(tx);

        let mut got = Vec::new();
        loop {
            let next = if got.len() % 2 == 0 { a.recv().await } else { b.recv().await };
            match next {
                Some(t) => got.push(t.x()),
                None => break,
            }
        }
        assert_eq!(got, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn idle_consumers_take_more_tiles() {
        const TILES: u32 = 40;
        let (tx, rx) = tile_queue(1);

        let fast = {
            let rx = rx.clone();
            tokio::spawn(async move {
                let mut got = Vec::new();
                while let Some(t) = rx.recv().await {
                    got.push(t.x());
                    tokio::task::yield_now().await;
                }
                got
            })
        };
        let slow = tokio::spawn(async move {
            let mut got = Vec::new();
            while let Some(t) = rx.recv().await {
                got.push(t.x());
                tokio::time::sleep(std::time::Duration::from_millis(25)).await;
            }
            got
        });

        for x in 0..TILES {
            tx.send(tile(x)).await.unwrap();
        }
        drop(tx);

        let fast = fast.await.unwrap();
        let slow = slow.await.unwrap();
        assert!(
            fast.len() >= 30,
            "fast consumer got {} of {TILES}, slow got {}",
            fast.len(),
            slow.len()
        );

        let mut all: Vec<u32> = fast.into_iter().chain(slow).collect();
        all.sort_unstable();
        assert_eq!(all, (0..TILES).collect::<Vec<_>>());
    }
}
