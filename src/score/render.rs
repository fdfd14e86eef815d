//! Scoreboard rendering

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;

use crate::registry::SessionId;

use super::update::ScoreUpdate;

/// Error type for render requests
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The renderer answered with a non-success status
    #[error("renderer returned status {0}")]
    Status(u16),
    /// The renderer answered with an empty body
    #[error("renderer returned an empty image")]
    Empty,
    /// The request itself failed
    #[error("render request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Turns a score update into scoreboard image bytes
#[async_trait]
pub trait ScoreRenderer: Send + Sync {
    /// Render the scoreboard for `update`
    async fn render(&self, session: &SessionId, update: &ScoreUpdate) -> Result<Bytes, RenderError>;
}

/// Renders through `POST {url}` with `{match_id, score}`
#[derive(Debug, Clone)]
pub struct HttpScoreRenderer {
    client: reqwest::Client,
    url: String,
}

impl HttpScoreRenderer {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ScoreRenderer for HttpScoreRenderer {
    async fn render(&self, session: &SessionId, update: &ScoreUpdate) -> Result<Bytes, RenderError> {
        let body = json!({
            "match_id": session.as_str(),
            "score": update.raw(),
        });

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Status(status.as_u16()));
        }

        let image = response.bytes().await?;
        if image.is_empty() {
            return Err(RenderError::Empty);
        }
        Ok(image)
    }
}
