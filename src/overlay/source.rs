//! Overlay image sources

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;

use crate::registry::SessionId;

/// Error type for overlay fetches. Always transient from the session's view.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The source has no image for this session yet
    #[error("overlay image not found")]
    NotFound,
    /// The source answered with a non-success status
    #[error("overlay source returned status {0}")]
    Status(u16),
    /// The source answered with an empty body
    #[error("overlay source returned an empty image")]
    Empty,
    /// The request itself failed
    #[error("overlay request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Where the current scoreboard image of a session comes from
#[async_trait]
pub trait OverlaySource: Send + Sync {
    /// Fetch the latest image bytes for `session`
    async fn fetch(&self, session: &SessionId) -> Result<Bytes, FetchError>;
}

/// Fetches `GET {base_url}/{id}.png`
#[derive(Debug, Clone)]
pub struct HttpOverlaySource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOverlaySource {
    /// Create a source rooted at `base_url`
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Image URL for one session
    pub fn image_url(&self, session: &SessionId) -> String {
        format!("{}/{}.png", self.base_url.trim_end_matches('/'), session)
    }
}

#[async_trait]
impl OverlaySource for HttpOverlaySource {
    async fn fetch(&self, session: &SessionId) -> Result<Bytes, FetchError> {
        let response = self.client.get(self.image_url(session)).send().await?;

        match response.status() {
            StatusCode::OK => {
                let image = response.bytes().await?;
                if image.is_empty() {
                    Err(FetchError::Empty)
                } else {
                    Ok(image)
                }
            }
            StatusCode::NOT_FOUND => Err(FetchError::NotFound),
            status => Err(FetchError::Status(status.as_u16())),
        }
    }
}
