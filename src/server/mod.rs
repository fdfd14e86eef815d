//! Control server: configuration, HTTP API, and the serve loop

pub mod api;
pub mod config;
pub mod listener;

pub use api::{router, ApiError};
pub use config::{EndpointConfig, ServerConfig};
pub use listener::ControlServer;
