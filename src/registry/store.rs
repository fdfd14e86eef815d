//! Session registry implementation
//!
//! The single owned store of live sessions. Admission, removal, lookup and
//! snapshot all go through one lock around the map.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::session::state::TerminalState;

use super::config::RegistryConfig;
use super::entry::{SessionEntry, SessionHandle, SessionSummary};
use super::error::RegistryError;
use super::key::SessionId;

/// Central registry for all live sessions
pub struct SessionRegistry {
    /// Map of session id to session entry
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,

    /// Configuration
    config: RegistryConfig,
}

impl SessionRegistry {
    /// Create a new session registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new session registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Reserve a slot for a new session.
    ///
    /// The entry is inserted in the `Starting` phase before any worker is
    /// launched, so a concurrent admit of the same id always observes it.
    pub async fn admit(
        &self,
        id: SessionId,
        destination: impl Into<String>,
    ) -> Result<SessionHandle, RegistryError> {
        let mut sessions = self.sessions.write().await;

        if sessions.contains_key(&id) {
            tracing::warn!(session = %id, "Admission rejected: session already active");
            return Err(RegistryError::DuplicateSession(id));
        }

        if sessions.len() >= self.config.max_sessions {
            tracing::warn!(
                session = %id,
                max_sessions = self.config.max_sessions,
                "Admission rejected: concurrency limit reached"
            );
            return Err(RegistryError::CapacityExceeded {
                max: self.config.max_sessions,
            });
        }

        let entry = Arc::new(SessionEntry::new(id.clone(), destination.into()));
        sessions.insert(id.clone(), Arc::clone(&entry));

        tracing::info!(
            session = %id,
            active = sessions.len(),
            "Session admitted"
        );

        Ok(entry)
    }

    /// Remove a session entry.
    ///
    /// Removing an absent id is a no-op, logged as anomalous.
    pub async fn remove(&self, id: &SessionId) -> Option<SessionHandle> {
        let removed = self.sessions.write().await.remove(id);

        if removed.is_none() {
            tracing::warn!(session = %id, "Remove of unknown session ignored");
        }

        removed
    }

    /// Remove a finished session and mark it `Terminated` under the same lock.
    ///
    /// Only the given entry is removed; a different entry registered under the
    /// same id is left in place.
    pub(crate) async fn finish(&self, entry: &SessionHandle, outcome: TerminalState) {
        let mut sessions = self.sessions.write().await;

        match sessions.get(entry.id()) {
            Some(current) if Arc::ptr_eq(current, entry) => {
                sessions.remove(entry.id());
            }
            Some(_) => {
                tracing::warn!(session = %entry.id(), "Registered entry belongs to another session");
            }
            None => {
                tracing::warn!(session = %entry.id(), "Finished session was not registered");
            }
        }

        entry.mark_terminated(outcome);
    }

    /// Look up a live session
    pub async fn lookup(&self, id: &str) -> Result<SessionHandle, RegistryError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Consistent point-in-time copy of all sessions, oldest first
    pub async fn snapshot(&self) -> Vec<SessionSummary> {
        let entries: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();

        let mut summaries: Vec<SessionSummary> = entries.iter().map(|e| e.summary()).collect();
        summaries.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        summaries
    }

    /// Get the number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Check if no session is live
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
