//! External transcoder supervision
//!
//! One [`TranscodeWorker`] per session launches the transcoder subprocess,
//! drains its diagnostic output into the `scorecast::transcoder` log target,
//! and stops it gracefully (then forcibly) on cancellation. A transcoder that
//! exits on its own is always reported as [`TranscodeError::UnexpectedExit`].

pub mod config;
pub mod worker;

pub use config::{TranscodeJob, TranscoderConfig};
pub use worker::{TranscodeError, TranscodeExit, TranscodeWorker};

/// Tracing target receiving every line the transcoder writes to stderr
pub const TRANSCODER_LOG_TARGET: &str = "scorecast::transcoder";
