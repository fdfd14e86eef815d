//! Session lifecycle management

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;

use crate::monitor::MonitorError;
use crate::registry::{RegistryError, SessionHandle, SessionId, SessionRegistry, SessionSummary};
use crate::transcode::TranscoderConfig;

use super::config::SessionConfig;
use super::state::TerminalState;
use super::supervisor::{SessionServices, Supervisor};

/// Error type for starting a session
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// Invalid id, duplicate id, or no free slot
    #[error(transparent)]
    Admission(#[from] RegistryError),

    /// The match-monitoring service refused the session
    #[error("Failed to start match monitoring: {0}")]
    DownstreamSetup(#[source] MonitorError),

    /// The initial overlay image could not be written
    #[error("Failed to prepare overlay image: {0}")]
    Overlay(#[source] io::Error),
}

/// Error type for stopping a session
#[derive(Debug, thiserror::Error)]
pub enum StopError {
    /// No live session under that id
    #[error(transparent)]
    NotFound(#[from] RegistryError),
}

/// How a stopped session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopOutcome {
    /// Terminal state the session reached
    pub state: TerminalState,
    /// Time between admission and removal
    pub runtime: Duration,
}

/// Starts, stops and lists sessions
///
/// Each started session gets a supervise task that waits for a stop cause,
/// tears the workers down and removes the session from the registry. A stop
/// request only returns once that task has removed the entry.
pub struct SessionManager {
    registry: Arc<SessionRegistry>,
    config: SessionConfig,
    transcoder: TranscoderConfig,
    services: SessionServices,
    tasks: TaskTracker,
}

impl SessionManager {
    pub fn new(
        registry: Arc<SessionRegistry>,
        config: SessionConfig,
        transcoder: TranscoderConfig,
        services: SessionServices,
    ) -> Self {
        Self {
            registry,
            config,
            transcoder,
            services,
            tasks: TaskTracker::new(),
        }
    }

    /// The session registry
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Admit a session and launch its workers.
    ///
    /// On any setup failure the reserved slot is released before returning.
    pub async fn start(&self, id: &str, destination: impl Into<String>) -> Result<SessionHandle, StartError> {
        let id = SessionId::parse(id)?;
        let entry = self.registry.admit(id.clone(), destination.into()).await?;

        if let Err(e) = self
            .services
            .monitor
            .start_monitoring(&id, &self.config.overlay_variant)
            .await
        {
            tracing::error!(session = %id, error = %e, "Failed to start match monitoring");
            self.registry.finish(&entry, TerminalState::Failed).await;
            return Err(StartError::DownstreamSetup(e));
        }

        let supervisor = match Supervisor::start(&entry, &self.config, &self.transcoder, &self.services).await {
            Ok(supervisor) => supervisor,
            Err(e) => {
                tracing::error!(session = %id, error = %e, "Failed to prepare overlay image");
                self.registry.finish(&entry, TerminalState::Failed).await;
                return Err(StartError::Overlay(e));
            }
        };

        entry.mark_running();
        self.tasks.spawn(supervise(
            Arc::clone(&self.registry),
            Arc::clone(&entry),
            supervisor,
            self.config.join_timeout,
        ));

        tracing::info!(session = %id, destination = %entry.destination(), "Session started");
        Ok(entry)
    }

    /// Stop a session and wait until it is torn down and removed.
    ///
    /// A session already stopping for another reason reports that reason.
    pub async fn stop(&self, id: &str) -> Result<StopOutcome, StopError> {
        let entry = self.registry.lookup(id).await?;

        tracing::info!(session = %entry.id(), "Stop requested");
        entry.request_stop();
        let state = entry.terminated().await;

        Ok(StopOutcome {
            state,
            runtime: entry.uptime(),
        })
    }

    /// Snapshot of the live sessions
    pub async fn list(&self) -> Vec<SessionSummary> {
        self.registry.snapshot().await
    }

    /// Stop every live session and wait for all supervise tasks.
    pub async fn shutdown(&self) {
        let live = self.registry.snapshot().await;
        tracing::info!(sessions = live.len(), "Stopping all sessions");

        for summary in &live {
            if let Ok(entry) = self.registry.lookup(summary.id.as_str()).await {
                entry.request_stop();
            }
        }

        self.tasks.close();
        self.tasks.wait().await;
    }
}

async fn supervise(
    registry: Arc<SessionRegistry>,
    entry: SessionHandle,
    mut supervisor: Supervisor,
    join_timeout: Duration,
) {
    let cause = supervisor.wait_for_stop_cause(entry.stop_signal()).await;
    entry.begin_stopping(cause);
    tracing::info!(session = %entry.id(), reason = %cause, "Stopping session");

    supervisor.stop(join_timeout).await;

    let runtime = entry.uptime();
    registry.finish(&entry, cause).await;

    let state = entry.phase().outcome().unwrap_or(cause);
    tracing::info!(
        session = %entry.id(),
        state = %state,
        runtime_secs = runtime.as_secs_f64(),
        "Session stopped"
    );
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::Path;
    use std::time::Instant;

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::monitor::MatchMonitor;
    use crate::overlay::{FetchError, OverlaySource};
    use crate::registry::RegistryConfig;
    use crate::session::state::SessionPhase;

    use super::*;

    struct AcceptAll;

    #[async_trait]
    impl MatchMonitor for AcceptAll {
        async fn start_monitoring(&self, _session: &SessionId, _variant: &str) -> Result<(), MonitorError> {
            Ok(())
        }
    }

    struct RejectAll;

    #[async_trait]
    impl MatchMonitor for RejectAll {
        async fn start_monitoring(&self, _session: &SessionId, _variant: &str) -> Result<(), MonitorError> {
            Err(MonitorError::Rejected {
                status: 503,
                body: "unavailable".to_string(),
            })
        }
    }

    struct StaticImage;

    #[async_trait]
    impl OverlaySource for StaticImage {
        async fn fetch(&self, _session: &SessionId) -> Result<Bytes, FetchError> {
            Ok(Bytes::from_static(b"scoreboard"))
        }
    }

    /// Monitoring call that takes a while before accepting
    struct SlowAccept(Duration);

    #[async_trait]
    impl MatchMonitor for SlowAccept {
        async fn start_monitoring(&self, _session: &SessionId, _variant: &str) -> Result<(), MonitorError> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    fn manager(dir: &Path, monitor: Arc<dyn MatchMonitor>, script: &str, config: SessionConfig) -> SessionManager {
        let transcoder = TranscoderConfig::default()
            .program("sh")
            .args(["-c", script])
            .grace_period(Duration::from_millis(500));
        manager_with(dir, monitor, transcoder, config.join_timeout(Duration::from_secs(3)))
    }

    fn manager_with(
        dir: &Path,
        monitor: Arc<dyn MatchMonitor>,
        transcoder: TranscoderConfig,
        config: SessionConfig,
    ) -> SessionManager {
        let scratch = dir.join("buffer");
        std::fs::create_dir_all(&scratch).unwrap();
        let config = config
            .overlay_dirs(dir, scratch)
            .overlay_interval(Duration::from_millis(50));
        let services = SessionServices {
            monitor,
            overlay: Arc::new(StaticImage),
            feed: None,
            renderer: None,
        };
        let registry = Arc::new(SessionRegistry::with_config(RegistryConfig::default()));
        SessionManager::new(registry, config, transcoder, services)
    }

    /// Whether `pid` is a live, non-zombie process
    #[cfg(target_os = "linux")]
    fn running(pid: i32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .is_some_and(|rest| !rest.trim_start().starts_with('Z')),
            Err(_) => false,
        }
    }

    #[tokio::test]
    async fn test_start_then_stop() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), Arc::new(AcceptAll), "exec sleep 30", SessionConfig::default());

        let entry = manager.start("match42", "rtmp://platform/key").await.unwrap();
        assert_eq!(entry.phase(), SessionPhase::Running);
        assert!(dir.path().join("match42.png").exists());

        let outcome = manager.stop("match42").await.unwrap();
        assert_eq!(outcome.state, TerminalState::StoppedByUser);
        assert!(manager.list().await.is_empty());
        assert!(!dir.path().join("match42.png").exists());
        assert!(!dir.path().join("buffer/match42_temp.png").exists());
    }

    #[tokio::test]
    async fn test_monitor_failure_releases_slot() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), Arc::new(RejectAll), "exec sleep 30", SessionConfig::default());

        let err = manager.start("match42", "rtmp://platform/key").await.unwrap_err();
        assert!(matches!(err, StartError::DownstreamSetup(_)));
        assert!(manager.registry().is_empty().await);
        assert!(!dir.path().join("match42.png").exists());
    }

    #[tokio::test]
    async fn test_invalid_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), Arc::new(AcceptAll), "exec sleep 30", SessionConfig::default());

        let err = manager.start("../etc", "rtmp://platform/key").await.unwrap_err();
        assert!(matches!(err, StartError::Admission(RegistryError::InvalidId(_))));
    }

    #[tokio::test]
    async fn test_transcoder_exit_fails_session() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), Arc::new(AcceptAll), "exit 1", SessionConfig::default());

        let entry = manager.start("match42", "rtmp://platform/key").await.unwrap();
        let state = tokio::time::timeout(Duration::from_secs(5), entry.terminated())
            .await
            .unwrap();

        assert_eq!(state, TerminalState::Failed);
        assert!(manager.registry().is_empty().await);
        assert!(!dir.path().join("match42.png").exists());
    }

    #[tokio::test]
    async fn test_duration_cap_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::default().max_duration(Duration::from_millis(300));
        let manager = manager(dir.path(), Arc::new(AcceptAll), "exec sleep 30", config);

        let entry = manager.start("match42", "rtmp://platform/key").await.unwrap();
        let state = tokio::time::timeout(Duration::from_secs(5), entry.terminated())
            .await
            .unwrap();

        assert_eq!(state, TerminalState::TimedOut);
        assert!(manager.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_shutdown_stops_everything() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), Arc::new(AcceptAll), "exec sleep 30", SessionConfig::default());

        let first = manager.start("match1", "rtmp://platform/a").await.unwrap();
        let second = manager.start("match2", "rtmp://platform/b").await.unwrap();

        manager.shutdown().await;

        assert!(manager.registry().is_empty().await);
        assert_eq!(first.phase(), SessionPhase::Terminated(TerminalState::StoppedByUser));
        assert_eq!(second.phase(), SessionPhase::Terminated(TerminalState::StoppedByUser));
    }

    #[tokio::test]
    #[cfg(target_os = "linux")]
    async fn test_stuck_transcoder_is_killed_after_join_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("transcoder.pid");
        let script = format!(
            "echo $$ > {}; trap '' TERM; while :; do sleep 0.1; done",
            pid_file.display()
        );
        let transcoder = TranscoderConfig::default()
            .program("sh")
            .args(["-c".to_string(), script])
            .grace_period(Duration::from_secs(5));
        let config = SessionConfig::default().join_timeout(Duration::from_millis(300));
        let manager = manager_with(dir.path(), Arc::new(AcceptAll), transcoder, config);

        manager.start("match42", "rtmp://platform/key").await.unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let pid: i32 = loop {
            if let Some(pid) = std::fs::read_to_string(&pid_file)
                .ok()
                .and_then(|text| text.trim().parse().ok())
            {
                break pid;
            }
            assert!(Instant::now() < deadline, "transcoder never started");
            tokio::time::sleep(Duration::from_millis(10)).await;
        };
        assert!(running(pid));

        let stopping = Instant::now();
        let outcome = manager.stop("match42").await.unwrap();
        assert!(stopping.elapsed() < Duration::from_secs(3));
        assert_eq!(outcome.state, TerminalState::StoppedByUser);

        let deadline = Instant::now() + Duration::from_secs(2);
        while running(pid) {
            assert!(Instant::now() < deadline, "transcoder still alive after stop");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!dir.path().join("match42.png").exists());
        assert!(!dir.path().join("buffer/match42_temp.png").exists());
    }

    #[tokio::test]
    async fn test_duration_cap_counts_setup_time() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::default().max_duration(Duration::from_millis(700));
        let monitor = Arc::new(SlowAccept(Duration::from_millis(600)));
        let manager = manager(dir.path(), monitor, "exec sleep 30", config);

        let entry = manager.start("match42", "rtmp://platform/key").await.unwrap();
        let started = Instant::now();
        let state = tokio::time::timeout(Duration::from_secs(5), entry.terminated())
            .await
            .unwrap();

        assert_eq!(state, TerminalState::TimedOut);
        // only the 100ms left on the cap, not the full cap again
        assert!(started.elapsed() < Duration::from_millis(450));
    }
}
