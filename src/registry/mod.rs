//! Session registry and admission gate
//!
//! The registry is the process-wide store of live broadcast sessions. It owns
//! the map from session id to [`SessionEntry`], enforces id uniqueness and the
//! concurrency cap, and answers list/status queries.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<SessionRegistry>
//!                  ┌──────────────────────────────┐
//!                  │ sessions: RwLock<HashMap<    │
//!                  │   SessionId,                 │
//!                  │   Arc<SessionEntry> {        │
//!                  │     phase: watch::Tx,        │
//!                  │     stop: CancellationToken, │
//!                  │   }                          │
//!                  │ >>                           │
//!                  └──────────────┬───────────────┘
//!                                 │
//!        ┌────────────────────────┼────────────────────────┐
//!        │                        │                        │
//!        ▼                        ▼                        ▼
//!   POST /start_stream       POST /stop_stream        GET /list_streams
//!   registry.admit()         entry.request_stop()     registry.snapshot()
//!        │                        │
//!        └──► Supervisor task ──► registry.finish() (remove + Terminated)
//! ```
//!
//! # Locking
//!
//! Every operation takes the single map lock only for the duration of a
//! `HashMap` access or copy. Worker bodies never run under it.

pub mod config;
pub mod entry;
pub mod error;
pub mod key;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{SessionEntry, SessionHandle, SessionSummary};
pub use error::RegistryError;
pub use key::SessionId;
pub use store::SessionRegistry;
