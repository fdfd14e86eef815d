//! Session entry types
//!
//! This module defines the per-session state stored in the registry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::session::state::{SessionPhase, TerminalState};
use crate::stats::{SessionStats, StatsSnapshot};

use super::key::SessionId;

/// Shared handle to a registered session
pub type SessionHandle = Arc<SessionEntry>;

/// Entry for a single session in the registry
///
/// The entry carries identity, lifecycle phase, the stop-request signal and
/// counters. Worker handles and their cancellation tokens are not stored here;
/// they belong to the session's supervisor task.
#[derive(Debug)]
pub struct SessionEntry {
    /// Session id (registry key)
    id: SessionId,

    /// Outbound platform URI, passed through untouched
    destination: String,

    /// When the session was admitted
    started_at: Instant,

    /// Current lifecycle phase, observable by stop callers
    phase: watch::Sender<SessionPhase>,

    /// Fired by an explicit stop request
    stop_requested: CancellationToken,

    /// Worker counters
    stats: Arc<SessionStats>,
}

impl SessionEntry {
    /// Create a new entry in the `Starting` phase
    pub(super) fn new(id: SessionId, destination: String) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Starting);

        Self {
            id,
            destination,
            started_at: Instant::now(),
            phase,
            stop_requested: CancellationToken::new(),
            stats: Arc::new(SessionStats::new()),
        }
    }

    /// Session id
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Outbound platform URI
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Admission time
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Time since admission
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// Shared worker counters
    pub fn stats(&self) -> &Arc<SessionStats> {
        &self.stats
    }

    /// Ask the supervisor to stop this session.
    ///
    /// Returns immediately; use [`SessionEntry::terminated`] to wait for teardown.
    pub fn request_stop(&self) {
        self.stop_requested.cancel();
    }

    /// Signal fired by [`SessionEntry::request_stop`]
    pub(crate) fn stop_signal(&self) -> &CancellationToken {
        &self.stop_requested
    }

    /// Wait until the session reaches `Terminated` and return why it ended.
    pub async fn terminated(&self) -> TerminalState {
        let mut rx = self.phase.subscribe();
        let outcome = rx
            .wait_for(SessionPhase::is_terminated)
            .await
            .map(|phase| phase.outcome());

        // The sender lives in `self`, so the channel cannot close while we wait.
        match outcome {
            Ok(Some(outcome)) => outcome,
            _ => TerminalState::StoppedByUser,
        }
    }

    /// Subscribe to phase changes
    pub fn watch_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    pub(crate) fn mark_running(&self) -> bool {
        self.phase.send_if_modified(SessionPhase::start_running)
    }

    pub(crate) fn begin_stopping(&self, reason: TerminalState) -> bool {
        self.phase.send_if_modified(|phase| phase.begin_stopping(reason))
    }

    pub(super) fn mark_terminated(&self, fallback: TerminalState) -> bool {
        self.phase.send_if_modified(|phase| phase.terminate(fallback))
    }

    /// Copy this entry into a summary
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            destination: self.destination.clone(),
            started_at: self.started_at,
            uptime: self.uptime(),
            phase: self.phase(),
            stats: self.stats.snapshot(),
        }
    }
}

/// Point-in-time view of one session, as returned by the snapshot query
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Session id
    pub id: SessionId,
    /// Outbound platform URI
    pub destination: String,
    /// Admission time
    pub started_at: Instant,
    /// Time since admission when the snapshot was taken
    pub uptime: Duration,
    /// Lifecycle phase when the snapshot was taken
    pub phase: SessionPhase,
    /// Worker counters
    pub stats: StatsSnapshot,
}
