//! Command-line interface

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::{Error, Result};
use crate::server::{EndpointConfig, ServerConfig};
use crate::session::SessionConfig;
use crate::transcode::TranscoderConfig;

/// Relay live feeds to streaming platforms with a live scoreboard overlay
#[derive(Parser, Debug)]
#[command(name = "scorecast", version, about)]
pub struct Cli {
    /// Address the control API listens on
    #[arg(long, env = "SCORECAST_BIND", default_value = "0.0.0.0:1233")]
    pub bind: SocketAddr,

    /// Maximum number of concurrent streams
    #[arg(long, env = "SCORECAST_MAX_STREAMS", default_value_t = 4)]
    pub max_streams: usize,

    /// Maximum stream duration in seconds
    #[arg(long, env = "SCORECAST_MAX_DURATION", default_value_t = 5 * 60 * 60)]
    pub max_duration: u64,

    /// Seconds to wait for each worker when stopping a stream
    #[arg(long, env = "SCORECAST_JOIN_TIMEOUT", default_value_t = 10)]
    pub join_timeout: u64,

    /// Overlay refresh interval in milliseconds
    #[arg(long, env = "SCORECAST_OVERLAY_INTERVAL_MS", default_value_t = 1000)]
    pub overlay_interval_ms: u64,

    /// Directory the transcoder reads overlay images from
    #[arg(long, env = "SCORECAST_OVERLAY_DIR", value_name = "DIR", default_value = ".")]
    pub overlay_dir: PathBuf,

    /// Staging directory for overlay writes (same filesystem as --overlay-dir)
    #[arg(long, env = "SCORECAST_SCRATCH_DIR", value_name = "DIR", default_value = "buffer")]
    pub scratch_dir: PathBuf,

    /// Base location of incoming feeds; the stream name is appended
    #[arg(long, env = "SCORECAST_INPUT_BASE", default_value = "rtmp://localhost:1935/live")]
    pub input_base: String,

    /// Overlay variant requested when monitoring starts
    #[arg(long, env = "SCORECAST_OVERLAY_VARIANT", default_value = "0")]
    pub overlay_variant: String,

    /// Base URL of the match-monitoring API
    #[arg(long, env = "SCORECAST_OVERLAY_API", default_value = "http://localhost:8000")]
    pub overlay_api: String,

    /// Base URL serving overlay images
    #[arg(long, env = "SCORECAST_OVERLAY_IMAGES", default_value = "http://localhost:3000")]
    pub overlay_images: String,

    /// WebSocket base URL of the live score feed
    #[arg(long, env = "SCORECAST_SCORE_FEED")]
    pub score_feed: Option<String>,

    /// URL of the scoreboard renderer
    #[arg(long, env = "SCORECAST_RENDERER")]
    pub renderer: Option<String>,

    /// Timeout for outbound HTTP requests in seconds
    #[arg(long, env = "SCORECAST_REQUEST_TIMEOUT", default_value_t = 10)]
    pub request_timeout: u64,

    /// Transcoder executable
    #[arg(long, env = "SCORECAST_TRANSCODER", value_name = "PROGRAM", default_value = "ffmpeg")]
    pub transcoder: PathBuf,

    /// Seconds the transcoder gets to exit before it is killed
    #[arg(long, env = "SCORECAST_GRACE_PERIOD", default_value_t = 5)]
    pub grace_period: u64,

    /// Append transcoder output to this file
    #[arg(long, env = "SCORECAST_TRANSCODER_LOG", value_name = "FILE")]
    pub transcoder_log: Option<PathBuf>,

    /// Verbose console logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Build the server configuration
    pub fn server_config(&self) -> Result<ServerConfig> {
        if self.max_streams == 0 {
            return Err(Error::Config("--max-streams must be at least 1".to_string()));
        }
        if self.overlay_interval_ms == 0 {
            return Err(Error::Config("--overlay-interval-ms must be at least 1".to_string()));
        }
        if self.score_feed.is_some() != self.renderer.is_some() {
            tracing::warn!("Live scores need both --score-feed and --renderer; score listeners will idle");
        }

        let session = SessionConfig::default()
            .max_duration(Duration::from_secs(self.max_duration))
            .join_timeout(Duration::from_secs(self.join_timeout))
            .overlay_interval(Duration::from_millis(self.overlay_interval_ms))
            .overlay_dirs(self.overlay_dir.clone(), self.scratch_dir.clone())
            .input_base(&self.input_base)
            .overlay_variant(&self.overlay_variant);

        let endpoints = EndpointConfig {
            overlay_api: self.overlay_api.clone(),
            overlay_images: self.overlay_images.clone(),
            score_feed: self.score_feed.clone(),
            renderer: self.renderer.clone(),
            request_timeout: Duration::from_secs(self.request_timeout),
        };

        let transcoder = TranscoderConfig::default()
            .program(self.transcoder.clone())
            .grace_period(Duration::from_secs(self.grace_period));

        Ok(ServerConfig::with_addr(self.bind)
            .max_sessions(self.max_streams)
            .session(session)
            .transcoder(transcoder)
            .endpoints(endpoints))
    }
}
