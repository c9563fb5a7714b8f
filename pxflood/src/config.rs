//! Configuration for the pxflood client.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pxflood_core::{
    ColorSource, ConnectionSettings, DecoderRegistry, Endpoint, FailurePolicy, FloodError,
    InvisiblePixels, NoisePattern, SessionConfig,
};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodConfig {
    /// Canvas server and connection pool.
    pub network: NetworkConfig,
    /// Tiling and dispatch.
    pub drawing: DrawingConfig,
    /// What to draw.
    pub image: ImageConfig,
    /// Failure handling.
    pub supervisor: SupervisorConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Canvas server host name or address.
    pub host: String,
    /// Canvas server port.
    pub port: u16,
    /// Number of parallel connections.
    pub connections: usize,
    /// Dial timeout in milliseconds (0 = no timeout).
    pub connect_timeout_ms: u64,
}

/// Drawing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawingConfig {
    /// Tile edge length (pixels).
    pub tile_size: u32,
    /// Depth of the shared tile queue.
    pub queue_capacity: usize,
    /// Single-pixel buffer flush threshold.
    pub pixel_buffer: usize,
    /// Transparent pixels of a drawn tile: "send" or "skip".
    pub invisible_pixels: InvisiblePixels,
    /// Stop after this many passes (0 = draw forever).
    pub max_passes: u64,
}

/// Image configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Image file. If empty, a built-in pattern is drawn.
    pub path: PathBuf,
    /// Canvas x of the image's left edge.
    pub offset_x: i64,
    /// Canvas y of the image's top edge.
    pub offset_y: i64,
}

/// Supervisor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// "abort" stops on the first failure, "isolate" drops the failed connection.
    pub policy: FailurePolicy,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1337,
            connections: pxflood_core::session::DEFAULT_CONNECTIONS,
            connect_timeout_ms: 0,
        }
    }
}

impl Default for DrawingConfig {
    fn default() -> Self {
        Self {
            tile_size: pxflood_core::DEFAULT_TILE_SIZE,
            queue_capacity: pxflood_core::dispatch::DEFAULT_QUEUE_CAPACITY,
            pixel_buffer: pxflood_core::DEFAULT_PIXEL_BUFFER,
            invisible_pixels: InvisiblePixels::Send,
            max_passes: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl FloodConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults (`Ok(None)` tells the caller
    /// to mention it). A file that exists but cannot be read or parsed
    /// is a config error.
    pub fn load(path: &Path) -> Result<Option<Self>, FloodError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(FloodError::Config(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };
        toml::from_str(&contents)
            .map(Some)
            .map_err(|e| FloodError::Config(format!("{}: {e}", path.display())))
    }

    /// Convert into a `SessionConfig`. Zero counts are raised to one;
    /// zero timeout and pass limit mean "none".
    pub fn to_session_config(&self) -> Result<SessionConfig, FloodError> {
        if self.network.host.is_empty() {
            return Err(FloodError::Config("no canvas host given".into()));
        }
        if self.network.port == 0 {
            return Err(FloodError::Config("port must be > 0".into()));
        }

        let endpoint = Endpoint::new(self.network.host.clone(), self.network.port);
        let connect_timeout = (self.network.connect_timeout_ms > 0)
            .then(|| Duration::from_millis(self.network.connect_timeout_ms));

        Ok(SessionConfig {
            endpoint,
            connections: self.network.connections.max(1),
            tile_size: self.drawing.tile_size.max(1),
            queue_capacity: self.drawing.queue_capacity.max(1),
            max_passes: (self.drawing.max_passes > 0).then_some(self.drawing.max_passes),
            policy: self.supervisor.policy,
            connection: ConnectionSettings {
                connect_timeout,
                invisible: self.drawing.invisible_pixels,
                pixel_buffer: self.drawing.pixel_buffer.max(1),
            },
        })
    }

    /// Build the color source: the configured image, or the built-in
    /// pattern when no path is set.
    pub fn color_source(&self) -> Result<Arc<dyn ColorSource>, FloodError> {
        if self.image.path.as_os_str().is_empty() {
            tracing::info!("no image given; drawing the built-in pattern");
            return Ok(Arc::new(NoisePattern));
        }

        let registry = DecoderRegistry::with_defaults();
        let source = registry.open(&self.image.path, self.image.offset_x, self.image.offset_y)?;
        Ok(Arc::new(source))
    }
}

// ── Tests ────────────────────────────────────────────────────────
