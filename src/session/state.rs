//! Session state machine
//!
//! Tracks one broadcast session from admission to teardown:
//! `Starting → Running → Stopping → Terminated`.

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    /// A stop request arrived (HTTP stop or server shutdown)
    StoppedByUser,
    /// The transcoder exited on its own or could not be started
    Failed,
    /// The session ran past the configured maximum duration
    TimedOut,
}

impl TerminalState {
    /// Short lowercase name used in logs and API responses
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalState::StoppedByUser => "stopped_by_user",
            TerminalState::Failed => "failed",
            TerminalState::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for TerminalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Admitted, workers not yet dispatched
    Starting,
    /// All three workers dispatched
    Running,
    /// Teardown in progress
    Stopping(TerminalState),
    /// Workers joined, artifacts removed, entry deleted from the registry
    Terminated(TerminalState),
}

impl SessionPhase {
    /// Move `Starting` to `Running`. Any other phase is left alone.
    pub fn start_running(&mut self) -> bool {
        if *self == SessionPhase::Starting {
            *self = SessionPhase::Running;
            true
        } else {
            false
        }
    }

    /// Enter `Stopping` from `Starting` or `Running`.
    ///
    /// The first caller wins: a session already stopping keeps its original
    /// reason.
    pub fn begin_stopping(&mut self, reason: TerminalState) -> bool {
        match self {
            SessionPhase::Starting | SessionPhase::Running => {
                *self = SessionPhase::Stopping(reason);
                true
            }
            SessionPhase::Stopping(_) | SessionPhase::Terminated(_) => false,
        }
    }

    /// Enter `Terminated`, keeping the reason recorded when stopping began.
    pub fn terminate(&mut self, fallback: TerminalState) -> bool {
        match *self {
            SessionPhase::Terminated(_) => false,
            SessionPhase::Stopping(reason) => {
                *self = SessionPhase::Terminated(reason);
                true
            }
            SessionPhase::Starting | SessionPhase::Running => {
                *self = SessionPhase::Terminated(fallback);
                true
            }
        }
    }

    /// Check if the session reached its final phase
    pub fn is_terminated(&self) -> bool {
        matches!(self, SessionPhase::Terminated(_))
    }

    /// Terminal reason once stopping has begun
    pub fn outcome(&self) -> Option<TerminalState> {
        match self {
            SessionPhase::Stopping(reason) | SessionPhase::Terminated(reason) => Some(*reason),
            SessionPhase::Starting | SessionPhase::Running => None,
        }
    }

    /// Short lowercase name used in logs and API responses
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Starting => "starting",
            SessionPhase::Running => "running",
            SessionPhase::Stopping(_) => "stopping",
            SessionPhase::Terminated(_) => "terminated",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
