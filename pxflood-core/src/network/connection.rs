use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::codec::{DEFAULT_PIXEL_BUFFER, PixelBuffer, PxCodec};
use crate::dispatch::TileReceiver;
use crate::error::{FloodError, HandshakeError};
use crate::message::{Command, Response};
use crate::state::ConnectionPhase;
use crate::tile::Tile;
use crate::types::{Canvas, InvisiblePixels, Rgb};

pub type Connection = FloodConnection;

/// Per-connection settings shared by every socket of a session.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Give up dialing after this long. `None` waits for the OS.
    pub connect_timeout: Option<Duration>,
    /// Whether transparent samples of a drawn tile go on the wire.
    pub invisible: InvisiblePixels,
    /// Flush threshold of the single-pixel buffer.
    pub pixel_buffer: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            invisible: InvisiblePixels::Send,
            pixel_buffer: DEFAULT_PIXEL_BUFFER,
        }
    }
}

/// A persistent connection to the canvas server.
///
/// Index 0 is the one that asks for the canvas size; every connection
/// can draw. Nothing is ever read back while drawing.
#[derive(Debug)]
pub struct FloodConnection<S = TcpStream> {
    index: usize,
    framed: Framed<S, PxCodec>,
    phase: ConnectionPhase,
    pixels: PixelBuffer,
    tiles_drawn: u64,
}

impl FloodConnection<TcpStream> {
    /// Dial `endpoint`.
    pub async fn connect(
        index: usize,
        endpoint: &Endpoint,
        settings: &ConnectionSettings,
    ) -> Result<Self, FloodError> {
        let addr = endpoint.to_string();
        info!("connection {index}: connecting to {addr}");

        let dial = TcpStream::connect(addr.as_str());
        let stream = match settings.connect_timeout {
            Some(after) => tokio::time::timeout(after, dial).await.map_err(|_| {
                FloodError::ConnectTimeout {
                    addr: addr.clone(),
                    after,
                }
            })?,
            None => dial.await,
        }
        .map_err(|source| FloodError::Connect {
            addr: addr.clone(),
            source,
        })?;
        stream
            .set_nodelay(true)
            .map_err(|source| FloodError::Connect { addr, source })?;

        info!("connection {index}: connected");
        Self::new(index, stream, settings)
    }
}

impl<S> FloodConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already established stream.
    pub fn new(index: usize, stream: S, settings: &ConnectionSettings) -> Result<Self, FloodError> {
        let mut conn = Self {
            index,
            framed: Framed::new(stream, PxCodec::new(settings.invisible)),
            phase: ConnectionPhase::Disconnected,
            pixels: PixelBuffer::new(settings.pixel_buffer),
            tiles_drawn: 0,
        };
        conn.phase.connected()?;
        Ok(conn)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn phase(&self) -> &ConnectionPhase {
        &self.phase
    }

    /// Tiles written so far.
    pub fn tiles_drawn(&self) -> u64 {
        self.tiles_drawn
    }

    /// Ask the server for the canvas dimensions.
    ///
    /// Writes `SIZE`, then reads exactly one line.
    pub async fn query_size(&mut self) -> Result<Canvas, FloodError> {
        self.framed
            .send(Command::Size)
            .await
            .map_err(HandshakeError::Io)?;

        let line = match self.framed.next().await {
            Some(Ok(line)) => line,
            Some(Err(e)) => return Err(HandshakeError::Io(e).into()),
            None => return Err(HandshakeError::Closed.into()),
        };

        let Response::Size(canvas) = Response::parse(&line)?;
        self.phase.handshaken()?;
        info!("connection {}: canvas is {canvas}", self.index);
        Ok(canvas)
    }

    /// Write every pixel of `tile` as one message.
    pub async fn draw_tile(&mut self, tile: Arc<Tile>) -> Result<(), FloodError> {
        trace!(
            "connection {}: tile at {},{}",
            self.index,
            tile.x(),
            tile.y()
        );
        self.write(Command::Tile(tile)).await
    }

    /// Queue a single pixel; the buffer is written once it is full.
    pub async fn pixel(&mut self, x: u32, y: u32, color: Rgb) -> Result<(), FloodError> {
        match self.pixels.push(x, y, color) {
            Some(batch) => self.write(Command::Batch(batch)).await,
            None => Ok(()),
        }
    }

    /// Write whatever single pixels are still queued.
    pub async fn flush_pixels(&mut self) -> Result<(), FloodError> {
        match self.pixels.take() {
            Some(batch) => self.write(Command::Batch(batch)).await,
            None => Ok(()),
        }
    }

    /// Pull tiles from the shared queue and draw them until the queue
    /// closes or `cancel` fires. Returns the number of tiles drawn.
    ///
    /// A failed write ends the loop with [`FloodError::Write`]; what
    /// happens to the other connections is up to the caller. Once
    /// `cancel` fires nothing more is flushed, so a peer that stopped
    /// reading cannot hold the loop open.
    pub async fn draw_loop(
        mut self,
        tiles: TileReceiver,
        cancel: CancellationToken,
    ) -> Result<u64, FloodError> {
        self.phase.start_drawing()?;
        debug!("connection {}: drawing", self.index);

        let result = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                next = tiles.recv() => next,
            };
            let Some(tile) = next else {
                break Ok(());
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                written = self.draw_tile(tile) => {
                    if let Err(e) = written {
                        break Err(e);
                    }
                }
            }
            self.tiles_drawn += 1;
        };

        // Flush the tail only when the queue ended; on cancel it is dropped.
        if result.is_ok() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = SinkExt::<Command>::close(&mut self.framed) => {}
            }
        }

        let elapsed = self.phase.drawing_duration().unwrap_or_default();
        self.phase.terminate();
        debug!(
            "connection {}: stopped after {} tiles in {elapsed:.1?}",
            self.index, self.tiles_drawn
        );
        result.map(|()| self.tiles_drawn)
    }

    async fn write(&mut self, command: Command) -> Result<(), FloodError> {
        let index = self.index;
        self.framed
            .send(command)
            .await
            .map_err(|source| FloodError::Write { index, source })
    }
}

// ── Endpoint ─────────────────────────────────────────────────────

/// Address of the canvas server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::tile_queue;
    use crate::types::Sample;
    use tokio_test::io::Builder;

    fn settings(pixel_buffer: usize) -> ConnectionSettings {
        ConnectionSettings {
            pixel_buffer,
            ..Default::default()
        }
    }

    fn strip(x: u32, color: Rgb) -> Arc<Tile> {
        // 2×2 tile, visible everywhere.
        Arc::new(Tile::sample(x, 0, 2, &move |_: u32, _: u32| Sample::visible(color)).unwrap())
    }

    #[tokio::test]
    async fn query_size_parses_answer() {
        let mock = Builder::new()
            .write(b"SIZE\n")
            .read(b"SIZE 1920 1080\n")
            .build();
        let mut conn = FloodConnection::new(0, mock, &ConnectionSettings::default()).unwrap();

        let canvas = conn.query_size().await.unwrap();
        assert_eq!(canvas, Canvas::new(1920, 1080));
        assert_eq!(conn.phase(), &ConnectionPhase::Handshaken);
    }

    #[tokio::test]
    async fn query_size_rejects_garbage() {
        let mock = Builder::new()
            .write(b"SIZE\n")
            .read(b"SIZE abc 1080\n")
            .build();
        let mut conn = FloodConnection::new(0, mock, &ConnectionSettings::default()).unwrap();

        let err = conn.query_size().await.unwrap_err();
        assert!(matches!(
            err,
            FloodError::Handshake(HandshakeError::InvalidField { field: "width", .. })
        ));
        assert_eq!(err.stage(), "handshake");
    }

    #[tokio::test]
    async fn query_size_on_closed_stream() {
        let mock = Builder::new().write(b"SIZE\n").build();
        let mut conn = FloodConnection::new(0, mock, &ConnectionSettings::default()).unwrap();

        let err = conn.query_size().await.unwrap_err();
        assert!(matches!(err, FloodError::Handshake(HandshakeError::Closed)));
    }

    #[tokio::test]
    async fn draw_tile_writes_one_message() {
        let mock = Builder::new()
            .write(b"PX 4 0 0A141E\nPX 5 0 0A141E\nPX 4 1 0A141E\nPX 5 1 0A141E\n")
            .build();
        let mut conn = FloodConnection::new(1, mock, &ConnectionSettings::default()).unwrap();
        conn.draw_tile(strip(4, Rgb::new(10, 20, 30))).await.unwrap();
    }

    #[tokio::test]
    async fn write_failure_names_the_connection() {
        let mock = Builder::new()
            .write_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let mut conn = FloodConnection::new(5, mock, &ConnectionSettings::default()).unwrap();

        let err = conn.draw_tile(strip(0, Rgb::default())).await.unwrap_err();
        assert!(matches!(err, FloodError::Write { index: 5, .. }));
    }

    #[tokio::test]
    async fn pixels_are_written_in_batches() {
        let mock = Builder::new()
            .write(b"PX 0 0 FF0000\nPX 1 0 00FF00\n")
            .write(b"PX 2 0 0000FF\n")
            .build();
        let mut conn = FloodConnection::new(0, mock, &settings(2)).unwrap();

        conn.pixel(0, 0, Rgb::new(255, 0, 0)).await.unwrap();
        conn.pixel(1, 0, Rgb::new(0, 255, 0)).await.unwrap();
        conn.pixel(2, 0, Rgb::new(0, 0, 255)).await.unwrap();
        conn.flush_pixels().await.unwrap();
        conn.flush_pixels().await.unwrap();
    }

    #[tokio::test]
    async fn draw_loop_drains_queue() {
        let mock = Builder::new()
            .write(b"PX 0 0 010101\nPX 1 0 010101\nPX 0 1 010101\nPX 1 1 010101\n")
            .write(b"PX 2 0 020202\nPX 3 0 020202\nPX 2 1 020202\nPX 3 1 020202\n")
            .build();
        let conn = FloodConnection::new(0, mock, &ConnectionSettings::default()).unwrap();

        let (tx, rx) = tile_queue(2);
        tx.send(strip(0, Rgb::new(1, 1, 1))).await.unwrap();
        tx.send(strip(2, Rgb::new(2, 2, 2))).await.unwrap();
        drop(tx);

        let drawn = conn.draw_loop(rx, CancellationToken::new()).await.unwrap();
        assert_eq!(drawn, 2);
    }

    #[tokio::test]
    async fn draw_loop_stops_on_cancel() {
        let mock = Builder::new().build();
        let conn = FloodConnection::new(0, mock, &ConnectionSettings::default()).unwrap();

        let (_tx, rx) = tile_queue(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let drawn = conn.draw_loop(rx, cancel).await.unwrap();
        assert_eq!(drawn, 0);
    }

    #[tokio::test]
    async fn wrapped_stream_starts_connected() {
        let conn = FloodConnection::new(2, Builder::new().build(), &ConnectionSettings::default())
            .unwrap();
        assert_eq!(conn.phase(), &ConnectionPhase::Connected);
        assert_eq!(conn.index(), 2);
    }

    #[tokio::test]
    async fn cancel_unblocks_a_stalled_peer() {
        // Nobody reads the other half, so writes park once 64 bytes are buffered.
        let (ours, _theirs) = tokio::io::duplex(64);
        let conn = FloodConnection::new(0, ours, &ConnectionSettings::default()).unwrap();

        let (tx, rx) = tile_queue(4);
        for x in 0..4 {
            tx.send(strip(x * 2, Rgb::new(9, 9, 9))).await.unwrap();
        }
        drop(tx);

        let cancel = CancellationToken::new();
        let drawing = tokio::spawn(conn.draw_loop(rx, cancel.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!drawing.is_finished(), "writes should be parked on the full pipe");

        cancel.cancel();
        let drawn = tokio::time::timeout(Duration::from_secs(5), drawing)
            .await
            .expect("draw loop should stop on cancel")
            .unwrap()
            .unwrap();
        assert!(drawn < 4);
    }

    #[test]
    fn endpoint_display() {
        assert_eq!(Endpoint::new("127.0.0.1", 1337).to_string(), "127.0.0.1:1337");
        assert_eq!(Endpoint::new("::1", 1234).to_string(), "[::1]:1234");
    }
}
