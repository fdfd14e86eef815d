//! Control server
//!
//! Binds the HTTP control API and owns the session manager behind it.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::error::Result;
use crate::monitor::HttpMatchMonitor;
use crate::overlay::HttpOverlaySource;
use crate::registry::SessionRegistry;
use crate::score::{HttpScoreRenderer, ScoreFeed, ScoreRenderer, WebSocketScoreFeed};
use crate::server::api;
use crate::server::config::ServerConfig;
use crate::session::{SessionManager, SessionServices};

/// Control API server
pub struct ControlServer {
    config: ServerConfig,
    manager: Arc<SessionManager>,
}

impl ControlServer {
    /// Create a server talking to the collaborators named in `config`
    pub fn new(config: ServerConfig) -> Result<Self> {
        let services = Self::http_services(&config)?;
        Ok(Self::with_services(config, services))
    }

    /// Create a server with custom collaborators
    pub fn with_services(config: ServerConfig, services: SessionServices) -> Self {
        let registry = Arc::new(SessionRegistry::with_config(config.registry.clone()));
        let manager = Arc::new(SessionManager::new(
            registry,
            config.session.clone(),
            config.transcoder.clone(),
            services,
        ));

        Self { config, manager }
    }

    fn http_services(config: &ServerConfig) -> Result<SessionServices> {
        let endpoints = &config.endpoints;
        let client = reqwest::Client::builder()
            .timeout(endpoints.request_timeout)
            .build()?;

        let feed = endpoints
            .score_feed
            .as_ref()
            .map(|url| Arc::new(WebSocketScoreFeed::new(url.as_str())) as Arc<dyn ScoreFeed>);
        let renderer = endpoints
            .renderer
            .as_ref()
            .map(|url| Arc::new(HttpScoreRenderer::new(client.clone(), url.as_str())) as Arc<dyn ScoreRenderer>);

        Ok(SessionServices {
            monitor: Arc::new(HttpMatchMonitor::new(client.clone(), endpoints.overlay_api.as_str())),
            overlay: Arc::new(HttpOverlaySource::new(client, endpoints.overlay_images.as_str())),
            feed,
            renderer,
        })
    }

    /// Get a reference to the session manager
    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// The control router, for embedding or in-process testing
    pub fn router(&self) -> Router {
        api::router(Arc::clone(&self.manager))
    }

    /// Run the server with graceful shutdown
    ///
    /// Once `shutdown` resolves, no new requests are accepted and every live
    /// session is stopped before this returns.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.prepare_dirs().await?;

        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Control API listening");

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        self.manager.shutdown().await;
        result.map_err(Into::into)
    }

    async fn prepare_dirs(&self) -> Result<()> {
        let session = &self.config.session;
        for dir in [&session.overlay_dir, &session.scratch_dir] {
            tokio::fs::create_dir_all(dir).await?;
            tracing::debug!(dir = %dir.display(), "Ensured directory exists");
        }
        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
