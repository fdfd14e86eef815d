//! Per-session worker supervision

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::monitor::MatchMonitor;
use crate::overlay::{OverlayPublisher, OverlaySlot, OverlaySource};
use crate::registry::{SessionEntry, SessionId};
use crate::score::{ScoreFeed, ScoreListener, ScoreRenderer};
use crate::transcode::{TranscodeJob, TranscodeWorker, TranscoderConfig};

use super::config::SessionConfig;
use super::state::TerminalState;

/// How long an aborted worker gets to unwind
const ABORT_SETTLE: Duration = Duration::from_secs(1);

/// External collaborators shared by every session
#[derive(Clone)]
pub struct SessionServices {
    /// Match-monitoring kick-off
    pub monitor: Arc<dyn MatchMonitor>,
    /// Overlay image source polled by the publisher
    pub overlay: Arc<dyn OverlaySource>,
    /// Live score feed, if configured
    pub feed: Option<Arc<dyn ScoreFeed>>,
    /// Scoreboard renderer, if configured
    pub renderer: Option<Arc<dyn ScoreRenderer>>,
}

/// One supervised task and its own cancellation signal
struct Worker {
    name: &'static str,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn<F, Fut>(name: &'static str, run: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(cancel.clone()));
        Self {
            name,
            cancel,
            handle: Some(handle),
        }
    }

    /// Wait up to `timeout` for the worker to finish, then abort it.
    async fn join(&mut self, session: &SessionId, timeout: Duration) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => {
                tracing::debug!(session = %session, worker = self.name, "Worker finished");
            }
            Ok(Err(e)) => {
                tracing::error!(session = %session, worker = self.name, error = %e, "Worker panicked");
            }
            Err(_) => {
                tracing::warn!(
                    session = %session,
                    worker = self.name,
                    timeout = ?timeout,
                    "Worker did not stop in time, aborting"
                );
                handle.abort();
                let _ = tokio::time::timeout(ABORT_SETTLE, handle).await;
            }
        }
    }
}

/// Resolves when the task behind `handle` ends; never without a task
async fn finished(handle: &mut Option<JoinHandle<()>>) {
    match handle.as_mut() {
        Some(handle) => {
            let _ = handle.await;
        }
        None => std::future::pending().await,
    }
}

/// Owns the transcode, overlay and score-listener workers of one session
pub struct Supervisor {
    session: SessionId,
    slot: OverlaySlot,
    deadline: Instant,
    transcode: Worker,
    overlay: Worker,
    score: Worker,
}

impl Supervisor {
    /// Publish the initial overlay image and launch the three workers.
    ///
    /// Returns once the workers are dispatched, not once they are steady.
    pub async fn start(
        entry: &SessionEntry,
        config: &SessionConfig,
        transcoder: &TranscoderConfig,
        services: &SessionServices,
    ) -> io::Result<Self> {
        let session = entry.id().clone();
        let stats = Arc::clone(entry.stats());
        let slot = config.slot_for(&session);

        let (frames_tx, frames_rx) = watch::channel(None);
        let publisher = OverlayPublisher::new(
            session.clone(),
            slot.clone(),
            Arc::clone(&services.overlay),
            config.overlay_interval,
            Arc::clone(&stats),
        )
        .with_rendered(frames_rx);
        publisher.prepare().await?;

        let listener = ScoreListener::new(
            session.clone(),
            services.feed.clone(),
            services.renderer.clone(),
            frames_tx,
            Arc::clone(&stats),
        );

        let job = TranscodeJob {
            session: session.clone(),
            input: config.input_for(&session),
            overlay: slot.canonical().to_path_buf(),
            destination: entry.destination().to_string(),
        };
        let worker = TranscodeWorker::new(transcoder.clone(), stats);

        let transcode = Worker::spawn("transcode", move |cancel| async move {
            let owner = job.session.clone();
            match worker.run(job, cancel).await {
                Ok(exit) => {
                    tracing::info!(
                        session = %owner,
                        status = %exit.status,
                        forced = exit.forced,
                        "Transcoder shut down"
                    );
                }
                Err(e) => {
                    tracing::error!(session = %owner, error = %e, "Transcoder failed");
                }
            }
        });
        let overlay = Worker::spawn("overlay", move |cancel| publisher.run(cancel));
        let score = Worker::spawn("score", move |cancel| listener.run(cancel));

        tracing::info!(session = %session, "Session workers started");

        Ok(Self {
            session,
            slot,
            deadline: Instant::from_std(entry.started_at()) + config.max_duration,
            transcode,
            overlay,
            score,
        })
    }

    /// Wait for the first reason to stop: a stop request, the duration cap,
    /// or the transcoder ending on its own.
    pub async fn wait_for_stop_cause(&mut self, stop_requested: &CancellationToken) -> TerminalState {
        tokio::select! {
            biased;
            _ = stop_requested.cancelled() => TerminalState::StoppedByUser,
            _ = tokio::time::sleep_until(self.deadline) => {
                tracing::warn!(session = %self.session, "Session reached its maximum duration");
                TerminalState::TimedOut
            }
            _ = finished(&mut self.transcode.handle) => {
                self.transcode.handle = None;
                TerminalState::Failed
            }
        }
    }

    /// Cancel every worker, join them with `join_timeout` each, and remove
    /// the session's overlay files.
    pub async fn stop(mut self, join_timeout: Duration) {
        for worker in [&self.transcode, &self.overlay, &self.score] {
            worker.cancel.cancel();
        }

        let session = &self.session;
        tokio::join!(
            self.transcode.join(session, join_timeout),
            self.overlay.join(session, join_timeout),
            self.score.join(session, join_timeout),
        );

        self.slot.clear(session).await;
    }
}
