//! Session configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::overlay::OverlaySlot;
use crate::registry::SessionId;

/// Per-session lifecycle and layout options
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Hard cap on a session's lifetime
    pub max_duration: Duration,

    /// How long `stop` waits for each worker before aborting it
    pub join_timeout: Duration,

    /// Overlay refresh interval
    pub overlay_interval: Duration,

    /// Directory holding the canonical overlay images
    pub overlay_dir: PathBuf,

    /// Staging directory; must be on the same filesystem as `overlay_dir`
    pub scratch_dir: PathBuf,

    /// Base location of incoming feeds; the session id is appended
    pub input_base: String,

    /// Overlay variant requested from the match-monitoring service
    pub overlay_variant: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(5 * 60 * 60),
            join_timeout: Duration::from_secs(10),
            overlay_interval: Duration::from_secs(1),
            overlay_dir: PathBuf::from("."),
            scratch_dir: PathBuf::from("buffer"),
            input_base: "rtmp://localhost:1935/live".to_string(),
            overlay_variant: "0".to_string(),
        }
    }
}

impl SessionConfig {
    /// Set the session duration cap
    pub fn max_duration(mut self, max: Duration) -> Self {
        self.max_duration = max;
        self
    }

    /// Set the per-worker join timeout
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Set the overlay refresh interval
    pub fn overlay_interval(mut self, interval: Duration) -> Self {
        self.overlay_interval = interval;
        self
    }

    /// Set the overlay and staging directories
    pub fn overlay_dirs(mut self, overlay_dir: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>) -> Self {
        self.overlay_dir = overlay_dir.into();
        self.scratch_dir = scratch_dir.into();
        self
    }

    /// Set the incoming feed base location
    pub fn input_base(mut self, base: impl Into<String>) -> Self {
        self.input_base = base.into();
        self
    }

    /// Set the overlay variant
    pub fn overlay_variant(mut self, variant: impl Into<String>) -> Self {
        self.overlay_variant = variant.into();
        self
    }

    /// Incoming feed location of one session
    pub fn input_for(&self, session: &SessionId) -> String {
        format!("{}/{}", self.input_base.trim_end_matches('/'), session)
    }

    /// Overlay file slot of one session
    pub fn slot_for(&self, session: &SessionId) -> OverlaySlot {
        OverlaySlot::new(&self.overlay_dir, &self.scratch_dir, session)
    }
}
