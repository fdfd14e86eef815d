//! Live broadcast relay with a supervised scoreboard overlay per session
//!
//! Each session relays an incoming feed to a streaming platform through an
//! external transcoder while a scoreboard image, refreshed every second and
//! on every live score update, is composited on top of the video.
//!
//! ```text
//!  POST /start_stream ──► SessionManager ──► SessionRegistry (bounded)
//!                              │
//!                              ▼
//!                         Supervisor ──┬── TranscodeWorker  (subprocess)
//!                                      ├── OverlayPublisher (atomic file)
//!                                      └── ScoreListener    (live feed)
//! ```
//!
//! A session ends on an explicit stop, when it reaches its maximum duration,
//! or when the transcoder exits on its own. Every ending runs the same
//! teardown: cancel all three workers, join them with a bounded wait, remove
//! the overlay files, and drop the registry entry.
//!
//! # Example
//!
//! ```no_run
//! use scorecast::server::{ControlServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> scorecast::Result<()> {
//!     let server = ControlServer::new(ServerConfig::default().max_sessions(2))?;
//!     server
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await
//! }
//! ```

pub mod cli;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod overlay;
pub mod registry;
pub mod score;
pub mod server;
pub mod session;
pub mod stats;
pub mod transcode;

pub use error::{Error, Result};
pub use registry::{SessionId, SessionRegistry};
pub use server::{ControlServer, ServerConfig};
pub use session::{SessionManager, SessionServices, TerminalState};
