//! Match-monitoring kick-off
//!
//! Before a session's workers start, the overlay service is told to begin
//! tracking the match so it can produce scoreboard images for it.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

use crate::registry::SessionId;

/// Error type for match-monitoring requests
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The service answered with anything but 200
    #[error("match monitoring rejected with status {status}: {body}")]
    Rejected {
        /// Response status
        status: u16,
        /// Response body, for the log
        body: String,
    },
    /// The request itself failed
    #[error("match monitoring request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Starts monitoring of a match on the overlay service
#[async_trait]
pub trait MatchMonitor: Send + Sync {
    /// Ask the service to start monitoring the match behind `session`,
    /// rendering with the given overlay variant
    async fn start_monitoring(&self, session: &SessionId, overlay_variant: &str) -> Result<(), MonitorError>;
}

#[derive(Serialize)]
struct StartMonitoring<'a> {
    match_id: &'a str,
    overlay_id: &'a str,
}

/// Calls `POST {base_url}/start-match-monitoring`
#[derive(Debug, Clone)]
pub struct HttpMatchMonitor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMatchMonitor {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/start-match-monitoring", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl MatchMonitor for HttpMatchMonitor {
    async fn start_monitoring(&self, session: &SessionId, overlay_variant: &str) -> Result<(), MonitorError> {
        tracing::info!(session = %session, "Starting match monitoring");

        let response = self
            .client
            .post(self.endpoint())
            .json(&StartMonitoring {
                match_id: session.as_str(),
                overlay_id: overlay_variant,
            })
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(MonitorError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(session = %session, "Match monitoring started");
        Ok(())
    }
}
