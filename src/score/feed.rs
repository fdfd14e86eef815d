//! Score feed connections

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::registry::SessionId;

use super::update::ScoreUpdate;

/// Updates of one subscription; ends when the connection closes
pub type UpdateStream = BoxStream<'static, Result<ScoreUpdate, FeedError>>;

/// Error type for score feed connections
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Connecting, joining, or reading failed
    #[error("score feed connection error: {0}")]
    Connection(#[from] tungstenite::Error),
    /// A message could not be decoded
    #[error("malformed score update: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A source of live score updates
#[async_trait]
pub trait ScoreFeed: Send + Sync {
    /// Open a subscription for the match behind `session`
    async fn subscribe(&self, session: &SessionId) -> Result<UpdateStream, FeedError>;
}

/// Score feed over a WebSocket at `{base_url}/{id}`
#[derive(Debug, Clone)]
pub struct WebSocketScoreFeed {
    base_url: String,
    client_id: String,
}

impl WebSocketScoreFeed {
    /// Create a feed rooted at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: "scorecast".to_string(),
        }
    }

    /// Client id announced when joining a match
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Feed URL for one session
    pub fn feed_url(&self, session: &SessionId) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), session)
    }

    fn join_message(&self, session: &SessionId) -> Message {
        let join = json!({
            "event": "joinMatch",
            "data": {
                "matchId": session.as_str(),
                "guestUserClientId": self.client_id,
            }
        });
        Message::text(join.to_string())
    }
}

#[async_trait]
impl ScoreFeed for WebSocketScoreFeed {
    async fn subscribe(&self, session: &SessionId) -> Result<UpdateStream, FeedError> {
        let (mut socket, _) = connect_async(self.feed_url(session)).await?;
        socket.send(self.join_message(session)).await?;

        tracing::debug!(session = %session, "Joined score feed");

        let updates = socket.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(ScoreUpdate::from_message(&text).map_err(FeedError::from)),
                Ok(_) => None,
                Err(e) => Some(Err(FeedError::from(e))),
            }
        });

        Ok(updates.boxed())
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::super::update::tests::sample_payload;
    use super::*;

    #[test]
    fn test_feed_url() {
        let feed = WebSocketScoreFeed::new("ws://scores:8080/matches/");
        let id = SessionId::parse("match42").unwrap();
        assert_eq!(feed.feed_url(&id), "ws://scores:8080/matches/match42");
    }

    #[tokio::test]
    async fn test_subscribe_joins_and_streams_updates() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut socket = tokio_tungstenite::accept_async(tcp).await.unwrap();

            let join = socket.next().await.unwrap().unwrap();
            let join: serde_json::Value = serde_json::from_str(join.to_text().unwrap()).unwrap();

            socket
                .send(Message::text(sample_payload().to_string()))
                .await
                .unwrap();
            socket.send(Message::text("garbage")).await.unwrap();
            socket.close(None).await.unwrap();
            join
        });

        let feed = WebSocketScoreFeed::new(format!("ws://{addr}")).client_id("guest-1");
        let id = SessionId::parse("match42").unwrap();
        let mut updates = feed.subscribe(&id).await.unwrap();

        let first = updates.next().await.unwrap().unwrap();
        assert_eq!(first.raw(), &sample_payload());
        assert!(matches!(updates.next().await, Some(Err(FeedError::Decode(_)))));

        let join = server.await.unwrap();
        assert_eq!(join["event"], "joinMatch");
        assert_eq!(join["data"]["matchId"], "match42");
        assert_eq!(join["data"]["guestUserClientId"], "guest-1");
    }
}
