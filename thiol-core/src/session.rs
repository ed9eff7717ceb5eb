use std::convert::Infallible;
use std::fmt;

use chrono::Utc;
use thiol_api::{ApiError, ChatSession, HistoryEntry};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::ChatBackend;
use crate::error::ChatError;
use crate::identity::ChatContext;
use crate::message::Message;
use crate::store::{history_messages, MessageStore};

/// Where the active session id survives restarts.
pub trait SessionPersistence {
    type Error: fmt::Display;

    fn load(&self) -> Result<Option<String>, Self::Error>;

    fn save(&mut self, session_id: &str) -> Result<(), Self::Error>;
}

/// Keeps the active session id in memory only.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    saved: Option<String>,
}

impl MemoryPersistence {
    pub fn with_saved(session_id: impl Into<String>) -> Self {
        Self {
            saved: Some(session_id.into()),
        }
    }

    pub fn saved(&self) -> Option<&str> {
        self.saved.as_deref()
    }
}

impl SessionPersistence for MemoryPersistence {
    type Error = Infallible;

    fn load(&self) -> Result<Option<String>, Infallible> {
        Ok(self.saved.clone())
    }

    fn save(&mut self, session_id: &str) -> Result<(), Infallible> {
        self.saved = Some(session_id.to_string());
        Ok(())
    }
}

/// Handed out when a history load starts; only the newest ticket may apply its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectTicket {
    session_id: String,
    generation: u64,
}

impl SelectTicket {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    Applied,
    /// A newer selection or a new conversation superseded this load.
    Stale,
}

/// Owns the active session id and the list of known sessions.
pub struct SessionManager<P> {
    persistence: P,
    active: Option<String>,
    generation: u64,
    sessions: Vec<ChatSession>,
}

impl<P: SessionPersistence> SessionManager<P> {
    /// Restores the last active session id, if any.
    pub fn new(persistence: P) -> Self {
        let active = match persistence.load() {
            Ok(active) => active,
            Err(e) => {
                warn!(error = %e, "Could not restore active session");
                None
            }
        };

        Self {
            persistence,
            active,
            generation: 0,
            sessions: Vec::new(),
        }
    }

    pub fn active_session(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    fn activate(&mut self, session_id: String) {
        if let Err(e) = self.persistence.save(&session_id) {
            warn!(error = %e, "Could not persist active session");
        }
        self.active = Some(session_id);
    }

    /// Starts a fresh conversation with a random 128-bit id.
    pub fn create_session(&mut self, store: &mut MessageStore) -> String {
        let session_id = Uuid::new_v4().to_string();
        info!(%session_id, "Created session");

        self.generation += 1;
        self.activate(session_id.clone());
        self.sessions.insert(
            0,
            ChatSession {
                session_id: session_id.clone(),
                created_at: Utc::now(),
            },
        );
        store.reset_to_welcome();

        session_id
    }

    /// Returns the active session id, creating one if none is selected yet.
    ///
    /// Unlike [`create_session`](Self::create_session) this leaves the store alone.
    pub fn ensure_active(&mut self) -> String {
        if let Some(active) = &self.active {
            return active.clone();
        }
        let session_id = Uuid::new_v4().to_string();
        debug!(%session_id, "Created session lazily");
        self.activate(session_id.clone());
        session_id
    }

    /// Makes `session_id` active and returns the ticket its history load must present.
    pub fn begin_select(&mut self, session_id: &str) -> SelectTicket {
        self.generation += 1;
        self.activate(session_id.to_string());
        SelectTicket {
            session_id: session_id.to_string(),
            generation: self.generation,
        }
    }

    /// Applies a finished history load.
    ///
    /// Results of superseded loads are discarded. On failure the displayed
    /// messages are left untouched, while the session id stays active.
    pub fn complete_select(
        &mut self,
        ticket: SelectTicket,
        result: Result<Vec<HistoryEntry>, ApiError>,
        store: &mut MessageStore,
    ) -> Result<SelectOutcome, ChatError> {
        if ticket.generation != self.generation {
            debug!(session_id = %ticket.session_id, "Discarding stale history");
            return Ok(SelectOutcome::Stale);
        }

        match result {
            Ok(entries) => {
                debug!(session_id = %ticket.session_id, entries = entries.len(), "Loaded history");
                store.reset(history_messages(&ticket.session_id, entries));
                Ok(SelectOutcome::Applied)
            }
            Err(e) => {
                let err = ChatError::from(e);
                err.log("load chat history");
                Err(err)
            }
        }
    }

    /// Switches to `session_id` and replaces the store with its history.
    pub async fn select_session<B: ChatBackend + ?Sized>(
        &mut self,
        ctx: &ChatContext,
        backend: &B,
        session_id: &str,
        store: &mut MessageStore,
    ) -> Result<Vec<Message>, ChatError> {
        let identity = ctx.require_identity()?;
        let ticket = self.begin_select(session_id);
        let result = backend.fetch_history(session_id, &identity.user_id).await;
        self.complete_select(ticket, result, store)?;
        Ok(store.messages().to_vec())
    }

    /// Replaces the known session list.
    pub fn set_sessions(&mut self, sessions: Vec<ChatSession>) {
        self.sessions = sessions;
    }

    /// Fetches the session list. On failure the previous list is kept.
    pub async fn refresh_sessions<B: ChatBackend + ?Sized>(
        &mut self,
        ctx: &ChatContext,
        backend: &B,
    ) -> Result<&[ChatSession], ChatError> {
        let identity = ctx.require_identity()?;
        match backend.list_sessions(&identity.user_id).await {
            Ok(sessions) => {
                self.set_sessions(sessions);
                Ok(&self.sessions)
            }
            Err(e) => {
                let err = ChatError::from(e);
                err.log("load chats");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiol_api::Role;

    fn entry(role: Role, content: &str) -> HistoryEntry {
        HistoryEntry {
            role,
            content: content.to_string(),
            sources: vec![],
            pdf_path: None,
        }
    }

    #[test]
    fn restores_persisted_session() {
        let manager = SessionManager::new(MemoryPersistence::with_saved("s-9"));
        assert_eq!(manager.active_session(), Some("s-9"));
    }

    #[test]
    fn create_session_ids_are_distinct() {
        let mut manager = SessionManager::new(MemoryPersistence::default());
        let mut store = MessageStore::new();

        let first = manager.create_session(&mut store);
        let second = manager.create_session(&mut store);

        assert_ne!(first, second);
        assert_eq!(manager.active_session(), Some(second.as_str()));
        assert_eq!(manager.persistence().saved(), Some(second.as_str()));
        assert_eq!(manager.sessions()[0].session_id, second);
    }

    #[test]
    fn create_session_keeps_only_welcome() {
        let mut manager = SessionManager::new(MemoryPersistence::default());
        let mut store = MessageStore::new();
        store.append_user_message("hello", "old");

        manager.create_session(&mut store);

        assert_eq!(store.len(), 1);
        assert!(store.messages()[0].is_welcome());
    }

    #[test]
    fn ensure_active_is_lazy_and_sticky() {
        let mut manager = SessionManager::new(MemoryPersistence::default());
        assert!(manager.active_session().is_none());

        let first = manager.ensure_active();
        assert_eq!(manager.ensure_active(), first);
        assert_eq!(manager.persistence().saved(), Some(first.as_str()));
    }

    #[test]
    fn stale_history_is_discarded() {
        let mut manager = SessionManager::new(MemoryPersistence::default());
        let mut store = MessageStore::new();

        let slow = manager.begin_select("a");
        let fast = manager.begin_select("b");

        let outcome = manager
            .complete_select(fast, Ok(vec![entry(Role::User, "from b")]), &mut store)
            .unwrap();
        assert_eq!(outcome, SelectOutcome::Applied);

        let outcome = manager
            .complete_select(slow, Ok(vec![entry(Role::User, "from a")]), &mut store)
            .unwrap();
        assert_eq!(outcome, SelectOutcome::Stale);

        assert_eq!(store.messages()[1].content, "from b");
        assert_eq!(manager.active_session(), Some("b"));
    }

    #[test]
    fn new_conversation_supersedes_pending_load() {
        let mut manager = SessionManager::new(MemoryPersistence::default());
        let mut store = MessageStore::new();

        let pending = manager.begin_select("a");
        manager.create_session(&mut store);

        let outcome = manager
            .complete_select(pending, Ok(vec![entry(Role::User, "late")]), &mut store)
            .unwrap();
        assert_eq!(outcome, SelectOutcome::Stale);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn failed_load_keeps_messages_but_switches_id() {
        let mut manager = SessionManager::new(MemoryPersistence::default());
        let mut store = MessageStore::new();
        store.append_user_message("still here", "old");

        let ticket = manager.begin_select("new");
        let result = manager.complete_select(
            ticket,
            Err(ApiError::Api {
                status: 500,
                message: "down".to_string(),
            }),
            &mut store,
        );

        assert!(matches!(result, Err(ChatError::NetworkFailure(_))));
        assert_eq!(store.len(), 2);
        assert_eq!(manager.active_session(), Some("new"));
    }
}
