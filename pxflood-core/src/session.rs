//! Session orchestration.
//!
//! A [`Session`] owns the whole drawing pipeline:
//!
//! 1. [`Session::connect`] dials connection 0, reads the canvas size,
//!    then dials the remaining connections.
//! 2. [`Session::partition`] samples a [`ColorSource`] into a [`TileDeck`]
//!    on the blocking pool.
//! 3. [`Session::run`] starts one [`Dispatcher`] and one worker per
//!    connection, and supervises them according to the [`FailurePolicy`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatch::{DEFAULT_QUEUE_CAPACITY, Dispatcher, TileDeck, tile_queue};
use crate::error::FloodError;
use crate::network::{ConnectionSettings, Endpoint, FloodConnection};
use crate::source::ColorSource;
use crate::task::{WorkerEvent, WorkerPool};
use crate::tile::{self, DEFAULT_TILE_SIZE};
use crate::types::Canvas;

/// Number of parallel connections when nothing else is configured.
pub const DEFAULT_CONNECTIONS: usize = 8;

// ── FailurePolicy ────────────────────────────────────────────────

/// What the supervisor does when one connection fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop everything and return the first error.
    #[default]
    Abort,
    /// Drop the failed connection and keep drawing with the rest.
    /// The run only fails once every connection is gone.
    Isolate,
}

// ── SessionConfig ────────────────────────────────────────────────

/// Configuration for [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Canvas server address.
    pub endpoint: Endpoint,
    /// Number of parallel connections (at least one).
    pub connections: usize,
    /// Tile edge length in pixels.
    pub tile_size: u32,
    /// Depth of the shared tile queue.
    pub queue_capacity: usize,
    /// Stop after this many passes. `None` draws forever.
    pub max_passes: Option<u64>,
    /// Reaction to a failed connection.
    pub policy: FailurePolicy,
    /// Settings applied to every connection.
    pub connection: ConnectionSettings,
}

impl SessionConfig {
    /// Defaults for everything but the server address.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            connections: DEFAULT_CONNECTIONS,
            tile_size: DEFAULT_TILE_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_passes: None,
            policy: FailurePolicy::Abort,
            connection: ConnectionSettings::default(),
        }
    }

    fn validate(&self) -> Result<(), FloodError> {
        if self.connections == 0 {
            return Err(FloodError::Config("at least one connection is required".into()));
        }
        if self.tile_size == 0 {
            return Err(FloodError::Config("tile size must be > 0".into()));
        }
        Ok(())
    }
}

// ── RunSummary ───────────────────────────────────────────────────

/// Totals of a finished [`Session::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Completed dispatcher passes.
    pub passes: u64,
    /// Tiles handed to the queue.
    pub tiles_dispatched: u64,
    /// Tiles written by connections that ended cleanly.
    pub tiles_drawn: u64,
    /// Connections that stopped with an error.
    pub failed: usize,
}

// ── Session ──────────────────────────────────────────────────────

pub struct Session {
    canvas: Canvas,
    connections: Vec<FloodConnection>,
    config: SessionConfig,
}

impl Session {
    /// Open every connection. Connection 0 asks for the canvas size
    /// before the others are dialed.
    pub async fn connect(config: SessionConfig) -> Result<Self, FloodError> {
        config.validate()?;

        let settings = &config.connection;
        let mut first = FloodConnection::connect(0, &config.endpoint, settings).await?;
        let canvas = first.query_size().await?;

        let mut connections = Vec::with_capacity(config.connections);
        connections.push(first);
        for index in 1..config.connections {
            connections.push(FloodConnection::connect(index, &config.endpoint, settings).await?);
        }

        info!(
            "{} connections to {} ready, canvas {canvas}",
            connections.len(),
            config.endpoint
        );
        Ok(Self {
            canvas,
            connections,
            config,
        })
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Tile the canvas with `source`. Runs on the blocking pool.
    pub async fn partition(&self, source: Arc<dyn ColorSource>) -> Result<TileDeck, FloodError> {
        let canvas = self.canvas;
        let tile_size = self.config.tile_size;

        let tiles = tokio::task::spawn_blocking(move || {
            tile::partition(canvas, tile_size, source.as_ref())
        })
        .await??;

        info!(
            "{} of {} tiles visible",
            tiles.len(),
            tile::candidate_count(canvas, tile_size)
        );
        Ok(TileDeck::new(tiles))
    }

    /// Draw `deck` until `cancel` fires, the pass limit is reached, or
    /// the failure policy gives up.
    pub async fn run(
        self,
        deck: TileDeck,
        cancel: CancellationToken,
    ) -> Result<RunSummary, FloodError> {
        let Session {
            connections,
            config,
            ..
        } = self;
        let total = connections.len();

        // Cancelling `stop` halts this run without touching the caller's token.
        let stop = cancel.child_token();

        let (tx, rx) = tile_queue(config.queue_capacity);
        let dispatcher = Dispatcher::new(deck, tx).with_pass_limit(config.max_passes);
        let dispatch = tokio::spawn(dispatcher.run(stop.clone()));

        let mut pool = WorkerPool::new();
        for conn in connections {
            let index = conn.index();
            pool.spawn(index, conn.draw_loop(rx.clone(), stop.clone()));
        }
        drop(rx);

        let mut summary = RunSummary::default();
        let mut last_error = None;

        while let Some(event) = pool.recv().await {
            match event {
                WorkerEvent::Finished(index, drawn) => {
                    debug!("connection {index} finished after {drawn} tiles");
                    summary.tiles_drawn += drawn;
                }
                WorkerEvent::Failed(index, err) => {
                    summary.failed += 1;
                    match config.policy {
                        FailurePolicy::Abort => {
                            error!("connection {index} failed; stopping all connections");
                            stop.cancel();
                            pool.join_all().await;
                            let _ = dispatch.await;
                            return Err(err);
                        }
                        FailurePolicy::Isolate => {
                            warn!(
                                "connection {index} failed ({err}); {} still drawing",
                                pool.active()
                            );
                            last_error = Some(err);
                        }
                    }
                }
            }
        }

        stop.cancel();
        let stats = dispatch.await?;
        summary.passes = stats.passes;
        summary.tiles_dispatched = stats.tiles;

        if summary.failed == total {
            if let Some(err) = last_error {
                error!("all {total} connections failed");
                return Err(err);
            }
        }

        info!(
            "run finished: {} passes, {} tiles drawn",
            summary.passes, summary.tiles_drawn
        );
        Ok(summary)
    }
}
