//! Streamline command-line tool - Main entry point
//!
//! Operator utilities around the adaptive playback controller:
//! - `urls`: print the source URL each playback mode would use for an asset
//! - `probe`: run the proxy diagnostic probe and print what it found
//! - `fetch`: stream one transcode segment through the segment buffer

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use streamline_common::config::{resolve_config_path, TomlConfig};
use streamline_player::buffer::{FeedOutcome, SegmentBuffer};
use streamline_player::net::{
    HttpProber, HttpSchemeGate, HttpSegmentSource, Prober, SegmentSource, StreamItem, UrlGate,
};
use streamline_player::playback::{align_to_keyframe, SourceUrls};
use streamline_player::{PlayerConfig, SegmentSink, SinkError, TimeRange};

/// Command-line arguments for streamline
#[derive(Parser, Debug)]
#[command(name = "streamline")]
#[command(about = "Adaptive playback tools: source URLs, proxy probe, transcode fetch")]
#[command(version)]
struct Args {
    /// Config file (overrides STREAMLINE_CONFIG and the user config directory)
    #[arg(short, long, env = "STREAMLINE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the direct, proxy and transcode URLs for an asset
    Urls {
        /// Remote asset URL
        asset: String,

        /// Absolute start position for the transcode URL, in seconds
        #[arg(long, default_value_t = 0.0)]
        at: f64,

        /// Transcode revision
        #[arg(long, default_value_t = 1)]
        revision: u64,

        /// Audio track index for the transcoder
        #[arg(long)]
        audio_index: Option<u32>,
    },

    /// Probe the proxy endpoint for an asset
    Probe {
        /// Remote asset URL
        asset: String,
    },

    /// Stream a transcode segment through the segment buffer
    Fetch {
        /// Remote asset URL
        asset: String,

        /// Absolute position to start from; aligned to the keyframe grid
        #[arg(long, default_value_t = 0.0)]
        at: f64,

        /// Audio track index for the transcoder
        #[arg(long)]
        audio_index: Option<u32>,

        /// Stop after this many bytes
        #[arg(long)]
        max_bytes: Option<u64>,

        /// Write the segment to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Config decides the default log level, so it is read before tracing starts
    let config_path = resolve_config_path(args.config.as_deref());
    let toml_config = TomlConfig::load(config_path.as_deref());
    let level = toml_config
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("streamline_player={},streamline_common=info", level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &config_path {
        Some(path) => info!("Configuration file: {}", path.display()),
        None => warn!("No configuration file found, using compiled defaults"),
    }
    let toml_config = toml_config.context("Failed to load configuration")?;
    let config = PlayerConfig::from_toml(&toml_config).context("Invalid configuration")?;

    info!(
        "streamline {} ({} {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );

    match args.command {
        Commands::Urls {
            asset,
            at,
            revision,
            audio_index,
        } => print_urls(&config, &asset, at, revision, audio_index),
        Commands::Probe { asset } => probe(&config, &asset).await,
        Commands::Fetch {
            asset,
            at,
            audio_index,
            max_bytes,
            output,
        } => {
            tokio::select! {
                result = fetch(&config, &asset, at, audio_index, max_bytes, output) => result,
                _ = shutdown_signal() => Ok(()),
            }
        }
    }
}

fn parse_asset(asset: &str) -> Result<Url> {
    let url = Url::parse(asset).with_context(|| format!("Invalid asset URL '{}'", asset))?;
    HttpSchemeGate
        .check(&url)
        .context("Asset URL rejected")?;
    Ok(url)
}

fn print_urls(config: &PlayerConfig, asset: &str, at: f64, revision: u64, audio_index: Option<u32>) -> Result<()> {
    let asset = parse_asset(asset)?;
    let urls = SourceUrls::from_config(config);

    println!("direct:    {}", urls.direct(&asset));
    println!("proxy:     {}", urls.proxy(&asset));
    println!("transcode: {}", urls.transcode(&asset, at, revision, audio_index));
    Ok(())
}

async fn probe(config: &PlayerConfig, asset: &str) -> Result<()> {
    let asset = parse_asset(asset)?;
    let url = SourceUrls::from_config(config).proxy(&asset);
    let prober = HttpProber::new().context("Failed to build HTTP client")?;

    let outcome = prober.probe(&url).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    println!("{}", outcome.describe());
    Ok(())
}

async fn fetch(
    config: &PlayerConfig,
    asset: &str,
    at: f64,
    audio_index: Option<u32>,
    max_bytes: Option<u64>,
    output: Option<PathBuf>,
) -> Result<()> {
    let asset = parse_asset(asset)?;
    let aligned = align_to_keyframe(at, config.playback.keyframe_interval_secs);
    let url = SourceUrls::from_config(config).transcode(&asset, aligned.anchor, 1, audio_index);

    let writer = match output {
        Some(path) => Some(BufWriter::new(
            File::create(&path).with_context(|| format!("Cannot create {}", path.display()))?,
        )),
        None => None,
    };

    let source = HttpSegmentSource::new().context("Failed to build HTTP client")?;
    let mut stream = source.open(&url, config.playback.channel_capacity);
    let mut buffer = SegmentBuffer::new(Box::new(WriterSink::new(writer)), &config.playback);

    info!(url = %url, anchor = aligned.anchor, "Fetching transcode segment");

    loop {
        if max_bytes.map_or(false, |max| buffer.stats().bytes_fed >= max) {
            info!("Byte limit reached");
            stream.cancel();
            finish(&mut buffer);
            break;
        }

        match stream.next().await {
            Some(StreamItem::Chunk(chunk)) => {
                let outcome = buffer.append(chunk);
                settle(&mut buffer, outcome)?;
            }
            Some(StreamItem::End) | None => {
                finish(&mut buffer);
                break;
            }
            Some(StreamItem::Failed(reason)) => {
                finish(&mut buffer);
                anyhow::bail!("Segment stream failed: {}", reason);
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(buffer.stats())?);
    Ok(())
}

fn finish(buffer: &mut SegmentBuffer) {
    let outcome = buffer.finish();
    if let Err(e) = settle(buffer, outcome) {
        warn!("Finalizing segment failed: {}", e);
    }
}

/// The writer sink completes every mutation immediately, so keep signalling idle
/// until the buffer has nothing left to hand over
fn settle(buffer: &mut SegmentBuffer, mut outcome: FeedOutcome) -> Result<()> {
    loop {
        match outcome {
            FeedOutcome::Appending | FeedOutcome::Evicting(_) => outcome = buffer.on_idle(),
            FeedOutcome::Failed(reason) => anyhow::bail!("Segment sink failed: {}", reason),
            FeedOutcome::RetryAfter(_) | FeedOutcome::Exhausted => {
                anyhow::bail!("Segment sink out of capacity")
            }
            FeedOutcome::Queued | FeedOutcome::Idle | FeedOutcome::Finished => return Ok(()),
        }
    }
}

/// Segment sink writing straight to an optional file
struct WriterSink {
    writer: Option<BufWriter<File>>,
}

impl WriterSink {
    fn new(writer: Option<BufWriter<File>>) -> Self {
        Self { writer }
    }
}

impl SegmentSink for WriterSink {
    fn append_chunk(&mut self, chunk: &Bytes) -> std::result::Result<(), SinkError> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .write_all(chunk)
                .map_err(|e| SinkError::Other(e.to_string()))?;
        }
        Ok(())
    }

    fn remove_range(&mut self, _start: f64, _end: f64) -> std::result::Result<(), SinkError> {
        Ok(())
    }

    fn buffered(&self) -> Vec<TimeRange> {
        Vec::new()
    }

    fn current_time(&self) -> f64 {
        0.0
    }

    fn end_of_stream(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                warn!("Failed to flush output: {}", e);
            }
        }
    }
}

/// Ctrl+C / SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
