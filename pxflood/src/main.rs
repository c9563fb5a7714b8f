//! pxflood entry point.
//!
//! ```text
//! pxflood <host> <port>                 Draw the built-in pattern
//! pxflood <host> <port> <image> [x y]   Draw an image at an offset
//! pxflood --config <path>               Load a custom config TOML
//! pxflood --gen-config                  Write default config to stdout
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pxflood::config::FloodConfig;
use pxflood_core::{FailurePolicy, FloodError, InvisiblePixels, RunSummary, Session};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "pxflood",
    version,
    about = "Keep an image painted on a flood-drawing canvas",
    allow_negative_numbers = true
)]
struct Cli {
    /// Canvas server host.
    host: Option<String>,

    /// Canvas server port.
    port: Option<u16>,

    /// Image to draw (png, bmp, webp, jpeg). Omit for a built-in pattern.
    image: Option<PathBuf>,

    /// Canvas x of the image's left edge.
    #[arg(requires = "y")]
    x: Option<i64>,

    /// Canvas y of the image's top edge.
    y: Option<i64>,

    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "pxflood.toml")]
    config: PathBuf,

    /// Number of parallel connections.
    #[arg(short = 'n', long)]
    connections: Option<usize>,

    /// Tile edge length in pixels.
    #[arg(long)]
    tile_size: Option<u32>,

    /// What to do when a connection fails.
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Do not send transparent pixels of a drawn tile.
    #[arg(long)]
    skip_invisible: bool,

    /// Stop after this many passes over the canvas.
    #[arg(long)]
    passes: Option<u64>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Stop everything on the first failure.
    Abort,
    /// Drop the failed connection and keep going.
    Isolate,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Abort => FailurePolicy::Abort,
            PolicyArg::Isolate => FailurePolicy::Isolate,
        }
    }
}

impl Cli {
    /// Command-line values win over the config file.
    fn apply(&self, config: &mut FloodConfig) {
        if let Some(host) = &self.host {
            config.network.host = host.clone();
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(image) = &self.image {
            config.image.path = image.clone();
        }
        if let (Some(x), Some(y)) = (self.x, self.y) {
            config.image.offset_x = x;
            config.image.offset_y = y;
        }
        if let Some(n) = self.connections {
            config.network.connections = n;
        }
        if let Some(size) = self.tile_size {
            config.drawing.tile_size = size;
        }
        if let Some(policy) = self.policy {
            config.supervisor.policy = policy.into();
        }
        if self.skip_invisible {
            config.drawing.invisible_pixels = InvisiblePixels::Skip;
        }
        if let Some(passes) = self.passes {
            config.drawing.max_passes = passes;
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        return match toml::to_string_pretty(&FloodConfig::default()) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("fatal: config failed: {e}");
                ExitCode::FAILURE
            }
        };
    }

    // Load config. A broken file stops here, before anything is dialed.
    let loaded = match FloodConfig::load(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("fatal: {} failed: {e}", e.stage());
            return ExitCode::FAILURE;
        }
    };
    let from_file = loaded.is_some();
    let mut config = loaded.unwrap_or_default();
    cli.apply(&mut config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("pxflood v{}", env!("CARGO_PKG_VERSION"));
    if from_file {
        info!("config loaded from {}", cli.config.display());
    } else {
        info!("no config at {}; using defaults", cli.config.display());
    }

    match run(&config).await {
        Ok(summary) => {
            info!(
                "done: {} passes, {} tiles dispatched, {} connections failed",
                summary.passes, summary.tiles_dispatched, summary.failed
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{} failed: {e}", e.stage());
            eprintln!("fatal: {} failed: {e}", e.stage());
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &FloodConfig) -> Result<RunSummary, FloodError> {
    // Everything that can be checked offline is checked before dialing.
    let session_config = config.to_session_config()?;
    let source = config.color_source()?;

    info!(
        "target {} with {} connections, tile size {}",
        session_config.endpoint, session_config.connections, session_config.tile_size
    );

    let session = Session::connect(session_config).await?;
    let deck = session.partition(source).await?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received; stopping");
        on_ctrl_c.cancel();
    });

    session.run(deck, cancel).await
}
