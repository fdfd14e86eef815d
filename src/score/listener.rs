//! Score listener worker

use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::registry::SessionId;
use crate::stats::SessionStats;

use super::backoff::Backoff;
use super::feed::ScoreFeed;
use super::render::ScoreRenderer;
use super::update::ScoreUpdate;

/// Follows the score feed of one session and renders each update
pub struct ScoreListener {
    session: SessionId,
    feed: Option<Arc<dyn ScoreFeed>>,
    renderer: Option<Arc<dyn ScoreRenderer>>,
    frames: watch::Sender<Option<Bytes>>,
    stats: Arc<SessionStats>,
    backoff: Backoff,
}

impl ScoreListener {
    /// Create a listener that sends rendered frames into `frames`.
    ///
    /// Without both a feed and a renderer the listener idles until cancelled.
    pub fn new(
        session: SessionId,
        feed: Option<Arc<dyn ScoreFeed>>,
        renderer: Option<Arc<dyn ScoreRenderer>>,
        frames: watch::Sender<Option<Bytes>>,
        stats: Arc<SessionStats>,
    ) -> Self {
        Self {
            session,
            feed,
            renderer,
            frames,
            stats,
            backoff: Backoff::default(),
        }
    }

    /// Use a custom reconnect schedule
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Listen until `cancel` fires. Dropped connections are retried.
    pub async fn run(mut self, cancel: CancellationToken) {
        let (Some(feed), Some(renderer)) = (self.feed.clone(), self.renderer.clone()) else {
            tracing::debug!(session = %self.session, "No score feed configured, listener idle");
            cancel.cancelled().await;
            return;
        };

        'session: loop {
            let subscribed = tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'session,
                subscribed = feed.subscribe(&self.session) => subscribed,
            };

            match subscribed {
                Ok(mut updates) => {
                    tracing::info!(session = %self.session, "Connected to score feed");
                    self.backoff.reset();

                    loop {
                        let next = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break 'session,
                            next = updates.next() => next,
                        };

                        match next {
                            Some(Ok(update)) => {
                                tokio::select! {
                                    biased;
                                    _ = cancel.cancelled() => break 'session,
                                    _ = self.handle(renderer.as_ref(), update) => {}
                                }
                            }
                            Some(Err(e)) => {
                                tracing::warn!(session = %self.session, error = %e, "Score feed error");
                                if matches!(e, super::feed::FeedError::Connection(_)) {
                                    break;
                                }
                            }
                            None => {
                                tracing::info!(session = %self.session, "Score feed closed");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(session = %self.session, error = %e, "Failed to connect to score feed");
                }
            }

            let delay = self.backoff.next_delay();
            tracing::debug!(session = %self.session, delay = ?delay, "Reconnecting to score feed");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'session,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::debug!(session = %self.session, "Score listener stopped");
    }

    async fn handle(&self, renderer: &dyn ScoreRenderer, update: ScoreUpdate) {
        self.stats.record_score_update();

        if let Some(summary) = update.summary() {
            tracing::debug!(
                session = %self.session,
                batting = %summary.batting_team,
                score = %summary.innings_score,
                overs = %summary.overs,
                "Score update"
            );
        }

        match renderer.render(&self.session, &update).await {
            Ok(frame) => {
                self.frames.send_replace(Some(frame));
            }
            Err(e) => {
                tracing::warn!(session = %self.session, error = %e, "Failed to render scoreboard");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    use super::super::feed::{FeedError, UpdateStream};
    use super::super::render::RenderError;
    use super::*;

    /// Hands out queued subscriptions, then never connects again
    struct FakeFeed {
        subscriptions: Mutex<VecDeque<Result<UpdateStream, FeedError>>>,
        attempts: AtomicUsize,
    }

    impl FakeFeed {
        fn new(subscriptions: Vec<Result<UpdateStream, FeedError>>) -> Arc<Self> {
            Arc::new(Self {
                subscriptions: Mutex::new(subscriptions.into()),
                attempts: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ScoreFeed for FakeFeed {
        async fn subscribe(&self, _session: &SessionId) -> Result<UpdateStream, FeedError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let next = self.subscriptions.lock().unwrap().pop_front();
            match next {
                Some(subscription) => subscription,
                None => std::future::pending().await,
            }
        }
    }

    /// Renders the update's `seq` field
    struct FakeRenderer;

    #[async_trait]
    impl ScoreRenderer for FakeRenderer {
        async fn render(&self, _session: &SessionId, update: &ScoreUpdate) -> Result<Bytes, RenderError> {
            match update.raw()["seq"].as_u64() {
                Some(seq) => Ok(Bytes::from(format!("frame-{seq}"))),
                None => Err(RenderError::Empty),
            }
        }
    }

    fn updates(seqs: &[u64]) -> UpdateStream {
        let items: Vec<Result<ScoreUpdate, FeedError>> = seqs
            .iter()
            .map(|seq| Ok(ScoreUpdate::new(json!({ "seq": seq }))))
            .collect();
        tokio_stream::iter(items).boxed()
    }

    fn listener(
        feed: Option<Arc<dyn ScoreFeed>>,
        renderer: Option<Arc<dyn ScoreRenderer>>,
    ) -> (ScoreListener, watch::Receiver<Option<Bytes>>, Arc<SessionStats>) {
        let (tx, rx) = watch::channel(None);
        let stats = Arc::new(SessionStats::new());
        let id = SessionId::parse("match42").unwrap();
        (
            ScoreListener::new(id, feed, renderer, tx, Arc::clone(&stats)),
            rx,
            stats,
        )
    }

    #[tokio::test]
    async fn test_renders_each_update() {
        let feed = FakeFeed::new(vec![Ok(updates(&[1, 2]))]);
        let (listener, mut frames, stats) = listener(Some(feed), Some(Arc::new(FakeRenderer)));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(listener.run(cancel.clone()));

        let frame = frames
            .wait_for(|frame| frame.as_deref() == Some(b"frame-2".as_slice()))
            .await
            .unwrap()
            .clone();
        assert_eq!(frame.unwrap(), Bytes::from_static(b"frame-2"));
        assert_eq!(stats.snapshot().score_updates, 2);

        cancel.cancel();
        tokio_test::assert_ok!(handle.await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_failure_and_close() {
        let refused = FeedError::Decode(serde_json::from_str::<serde_json::Value>("{").unwrap_err());
        let feed = FakeFeed::new(vec![Err(refused), Ok(updates(&[])), Ok(updates(&[7]))]);
        let (listener, mut frames, _) = listener(Some(feed.clone()), Some(Arc::new(FakeRenderer)));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(listener.run(cancel.clone()));

        frames
            .wait_for(|frame| frame.as_deref() == Some(b"frame-7".as_slice()))
            .await
            .unwrap();
        assert_eq!(feed.attempts.load(Ordering::SeqCst), 3);

        cancel.cancel();
        tokio_test::assert_ok!(handle.await);
    }

    #[tokio::test]
    async fn test_render_failure_keeps_listening() {
        let (tx, rx) = mpsc::channel(4);
        let feed = FakeFeed::new(vec![Ok(ReceiverStream::new(rx).boxed())]);
        let (listener, mut frames, stats) = listener(Some(feed), Some(Arc::new(FakeRenderer)));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(listener.run(cancel.clone()));

        tx.send(Ok(ScoreUpdate::new(json!({ "status": "rain delay" }))))
            .await
            .unwrap();
        tx.send(Ok(ScoreUpdate::new(json!({ "seq": 3 })))).await.unwrap();

        frames
            .wait_for(|frame| frame.as_deref() == Some(b"frame-3".as_slice()))
            .await
            .unwrap();
        assert_eq!(stats.snapshot().score_updates, 2);

        // The connection is still open; cancel must not wait for it.
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_idles_without_feed() {
        let (listener, frames, _) = listener(None, Some(Arc::new(FakeRenderer)));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(listener.run(cancel.clone()));

        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        cancel.cancel();
        tokio_test::assert_ok!(handle.await);
        assert!(frames.borrow().is_none());
    }
}
