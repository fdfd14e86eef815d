//! Overlay publication worker

use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::registry::SessionId;
use crate::stats::SessionStats;

use super::placeholder::{blank_png, PLACEHOLDER_HEIGHT, PLACEHOLDER_WIDTH};
use super::slot::OverlaySlot;
use super::source::OverlaySource;

/// Keeps one session's canonical overlay image current
pub struct OverlayPublisher {
    session: SessionId,
    slot: OverlaySlot,
    source: Arc<dyn OverlaySource>,
    interval: Duration,
    rendered: Option<watch::Receiver<Option<Bytes>>>,
    stats: Arc<SessionStats>,
}

impl OverlayPublisher {
    /// Create a publisher polling `source` every `interval`
    pub fn new(
        session: SessionId,
        slot: OverlaySlot,
        source: Arc<dyn OverlaySource>,
        interval: Duration,
        stats: Arc<SessionStats>,
    ) -> Self {
        Self {
            session,
            slot,
            source,
            interval,
            rendered: None,
            stats,
        }
    }

    /// Also publish frames rendered from live score updates
    pub fn with_rendered(mut self, rendered: watch::Receiver<Option<Bytes>>) -> Self {
        self.rendered = Some(rendered);
        self
    }

    /// The slot this publisher writes
    pub fn slot(&self) -> &OverlaySlot {
        &self.slot
    }

    /// Make sure a canonical image exists before the transcoder starts.
    ///
    /// Tries the source once and falls back to a blank placeholder.
    pub async fn prepare(&self) -> io::Result<()> {
        match self.source.fetch(&self.session).await {
            Ok(image) => {
                if self.slot.publish(&image).await.is_ok() {
                    self.stats.record_overlay_publish();
                    return Ok(());
                }
            }
            Err(e) => {
                tracing::warn!(
                    session = %self.session,
                    error = %e,
                    "No initial overlay image, publishing placeholder"
                );
                self.stats.record_overlay_failure();
            }
        }

        let placeholder = blank_png(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT)?;
        self.slot.publish(&placeholder).await
    }

    /// Refresh the image every interval until `cancel` fires, then remove
    /// the session's files.
    ///
    /// A failed refresh keeps the previous image in place. Once a rendered
    /// frame has been published the source is no longer polled, so the
    /// overlay always shows the latest score event.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut live = false;

        tracing::debug!(session = %self.session, interval = ?self.interval, "Overlay publisher started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick(), if !live => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = self.refresh() => {}
                    }
                }
                frame = next_rendered(&mut self.rendered) => {
                    if let Some(frame) = frame {
                        self.publish(&frame).await;
                        if !live {
                            tracing::debug!(session = %self.session, "Live score frames take over the overlay");
                        }
                        live = true;
                    }
                }
            }
        }

        self.slot.clear(&self.session).await;
        tracing::debug!(session = %self.session, "Overlay publisher stopped");
    }

    async fn refresh(&self) {
        match self.source.fetch(&self.session).await {
            Ok(image) => self.publish(&image).await,
            Err(e) => {
                tracing::warn!(session = %self.session, error = %e, "Failed to get overlay image");
                self.stats.record_overlay_failure();
            }
        }
    }

    async fn publish(&self, image: &[u8]) {
        match self.slot.publish(image).await {
            Ok(()) => self.stats.record_overlay_publish(),
            Err(e) => {
                tracing::error!(session = %self.session, error = %e, "Failed to publish overlay image");
                self.stats.record_overlay_failure();
            }
        }
    }
}

/// Next rendered frame; pends forever once there is no renderer
async fn next_rendered(rendered: &mut Option<watch::Receiver<Option<Bytes>>>) -> Option<Bytes> {
    let Some(rx) = rendered.as_mut() else {
        return std::future::pending().await;
    };

    let changed = rx.changed().await;
    match changed {
        Ok(()) => rx.borrow_and_update().clone(),
        Err(_) => {
            *rendered = None;
            None
        }
    }
}
