//! # pxflood-core
//!
//! Building blocks for a client that keeps a picture painted on a shared
//! line-based canvas server.
//!
//! This crate contains:
//! - **Types**: `Rgb`, `Sample`, `Canvas`, `InvisiblePixels`
//! - **Sources**: `ColorSource` plus the built-in `ImageSource` and `NoisePattern`
//! - **Tiling**: `Tile` and `partition`, which cut the canvas into square tiles
//! - **Codec**: `PxCodec` and `PixelBuffer` for the `PX x y RRGGBB` wire format
//! - **Dispatch**: `Dispatcher` and the shared tile queue
//! - **Network**: `FloodConnection` with the `SIZE` handshake and draw loop
//! - **Session**: connection pool supervisor with a `FailurePolicy`
//! - **Error**: `FloodError`, a typed `thiserror`-based error hierarchy

pub mod codec;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod network;
pub mod session;
pub mod source;
pub mod state;
pub mod task;
pub mod tile;
pub mod types;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{DEFAULT_PIXEL_BUFFER, PixelBuffer, PxCodec};
pub use dispatch::{DispatchStats, Dispatcher, TileDeck, TileReceiver, TileSender, tile_queue};
pub use error::{DecodeError, FloodError, HandshakeError};
pub use message::{Command, Response};
pub use network::{Connection, ConnectionSettings, Endpoint, FloodConnection};
pub use session::{FailurePolicy, RunSummary, Session, SessionConfig};
pub use source::{ColorSource, DecoderRegistry, ImageSource, NoisePattern, PixelDecoder};
pub use state::ConnectionPhase;
pub use task::{WorkerEvent, WorkerPool};
pub use tile::{DEFAULT_TILE_SIZE, Tile, partition};
pub use types::{Canvas, InvisiblePixels, Rgb, Sample};
