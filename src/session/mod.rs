//! Session lifecycle
//!
//! [`SessionManager`] is the entry point: it admits a session into the
//! registry, kicks off match monitoring, and hands the session to a
//! [`Supervisor`] owning its three workers. A background supervise task per
//! session turns the first stop cause (request, duration cap, transcoder
//! exit) into a full teardown and removes the entry.

pub mod config;
pub mod manager;
pub mod state;
pub mod supervisor;

pub use config::SessionConfig;
pub use manager::{SessionManager, StartError, StopError, StopOutcome};
pub use state::{SessionPhase, TerminalState};
pub use supervisor::{SessionServices, Supervisor};
