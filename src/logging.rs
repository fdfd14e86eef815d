//! Tracing subscriber setup

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::transcode::TRANSCODER_LOG_TARGET;

/// Console filter used when `RUST_LOG` is unset
pub fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "scorecast=debug,scorecast::transcoder=info"
    } else {
        "scorecast=info"
    }
}

/// Install the global subscriber.
///
/// The console layer follows `RUST_LOG` (or [`default_directives`]). When
/// `transcoder_log` is set, every line the transcoders print is also appended
/// to that file, whatever the console filter says.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(verbose: bool, transcoder_log: Option<&Path>) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));
    let console = fmt::layer().with_filter(filter);

    let transcoder = match transcoder_log {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
                .with_filter(Targets::new().with_target(TRANSCODER_LOG_TARGET, Level::DEBUG));
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(transcoder)
        .try_init()
        .map_err(io::Error::other)
}
