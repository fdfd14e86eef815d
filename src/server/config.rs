//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::registry::RegistryConfig;
use crate::session::SessionConfig;
use crate::transcode::TranscoderConfig;

/// Addresses of the external collaborators
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Base URL of the match-monitoring API
    pub overlay_api: String,

    /// Base URL serving `{id}.png` overlay images
    pub overlay_images: String,

    /// WebSocket base URL of the live score feed
    pub score_feed: Option<String>,

    /// URL of the scoreboard renderer
    pub renderer: Option<String>,

    /// Timeout applied to every outbound HTTP request
    pub request_timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            overlay_api: "http://localhost:8000".to_string(),
            overlay_images: "http://localhost:3000".to_string(),
            score_feed: None,
            renderer: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl EndpointConfig {
    /// Set the match-monitoring API base
    pub fn overlay_api(mut self, url: impl Into<String>) -> Self {
        self.overlay_api = url.into();
        self
    }

    /// Set the overlay image base
    pub fn overlay_images(mut self, url: impl Into<String>) -> Self {
        self.overlay_images = url.into();
        self
    }

    /// Enable live score updates through `feed`, rendered by `renderer`
    pub fn live_scores(mut self, feed: impl Into<String>, renderer: impl Into<String>) -> Self {
        self.score_feed = Some(feed.into());
        self.renderer = Some(renderer.into());
        self
    }

    /// Set the outbound request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the control API binds to
    pub bind_addr: SocketAddr,

    /// Admission limits
    pub registry: RegistryConfig,

    /// Session lifecycle and file layout
    pub session: SessionConfig,

    /// Transcoder invocation
    pub transcoder: TranscoderConfig,

    /// External collaborators
    pub endpoints: EndpointConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 1233)),
            registry: RegistryConfig::default(),
            session: SessionConfig::default(),
            transcoder: TranscoderConfig::default(),
            endpoints: EndpointConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the maximum number of concurrent sessions
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.registry = self.registry.max_sessions(max);
        self
    }

    /// Replace the session configuration
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Replace the transcoder configuration
    pub fn transcoder(mut self, transcoder: TranscoderConfig) -> Self {
        self.transcoder = transcoder;
        self
    }

    /// Replace the endpoint configuration
    pub fn endpoints(mut self, endpoints: EndpointConfig) -> Self {
        self.endpoints = endpoints;
        self
    }
}
