//! Statistics for broadcast sessions

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live per-session counters
///
/// Updated by the session's workers without locking and read by the list
/// query through [`SessionStats::snapshot`].
#[derive(Debug, Default)]
pub struct SessionStats {
    overlay_publishes: AtomicU64,
    overlay_failures: AtomicU64,
    score_updates: AtomicU64,
    transcoder_lines: AtomicU64,
}

impl SessionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// An overlay image was atomically published
    pub fn record_overlay_publish(&self) {
        self.overlay_publishes.fetch_add(1, Ordering::Relaxed);
    }

    /// An overlay fetch or publish attempt failed
    pub fn record_overlay_failure(&self) {
        self.overlay_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A score update arrived from the feed
    pub fn record_score_update(&self) {
        self.score_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// The transcoder wrote a diagnostic line
    pub fn record_transcoder_line(&self) {
        self.transcoder_lines.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            overlay_publishes: self.overlay_publishes.load(Ordering::Relaxed),
            overlay_failures: self.overlay_failures.load(Ordering::Relaxed),
            score_updates: self.score_updates.load(Ordering::Relaxed),
            transcoder_lines: self.transcoder_lines.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SessionStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Overlay images published to the canonical path
    pub overlay_publishes: u64,
    /// Failed overlay fetches or writes
    pub overlay_failures: u64,
    /// Score updates received
    pub score_updates: u64,
    /// Diagnostic lines drained from the transcoder
    pub transcoder_lines: u64,
}
