use thiol_api::{ApiError, ChatReply};
use tracing::debug;

use crate::backend::ChatBackend;
use crate::error::{ChatError, Notification};
use crate::identity::ChatContext;
use crate::message::MessageId;
use crate::session::{SessionManager, SessionPersistence};
use crate::store::MessageStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Pending,
}

#[derive(Debug)]
pub enum TurnOutcome {
    /// Carries the id of the appended assistant message.
    Success(MessageId),
    Failure(ChatError),
}

/// A turn whose request is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    pub message: String,
    pub user_id: String,
    pub session_id: String,
    pub user_message_id: MessageId,
}

/// Drives one chat turn at a time and keeps the input, typing indicator and
/// notification in step with the request.
#[derive(Debug)]
pub struct RequestCoordinator {
    state: TurnState,
    input: String,
    notification: Option<Notification>,
}

impl Default for RequestCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestCoordinator {
    pub fn new() -> Self {
        Self {
            state: TurnState::Idle,
            input: String::new(),
            notification: None,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_typing(&self) -> bool {
        self.state == TurnState::Pending
    }

    pub fn input_enabled(&self) -> bool {
        self.state == TurnState::Idle
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn notify(&mut self, notification: Notification) {
        self.notification = Some(notification);
    }

    pub fn dismiss_notification(&mut self) {
        self.notification = None;
    }

    /// Starts a turn from the current input.
    ///
    /// Returns `Ok(None)` without touching anything when a turn is already
    /// pending or the input is blank. Otherwise the user message is appended
    /// right away and the request to issue is returned.
    pub fn begin_turn<P: SessionPersistence>(
        &mut self,
        ctx: &ChatContext,
        sessions: &mut SessionManager<P>,
        store: &mut MessageStore,
    ) -> Result<Option<PendingTurn>, ChatError> {
        if self.state == TurnState::Pending {
            return Ok(None);
        }

        // Blank input is not sent, but non-blank text goes out exactly as typed.
        if self.input.trim().is_empty() {
            return Ok(None);
        }
        let message = self.input.clone();

        let user_id = ctx.require_identity()?.user_id.clone();
        let session_id = sessions.ensure_active();
        let user_message_id = store.append_user_message(message.clone(), &session_id);

        debug!(%session_id, %user_message_id, "Turn pending");
        self.state = TurnState::Pending;
        self.notification = None;

        Ok(Some(PendingTurn {
            message,
            user_id,
            session_id,
            user_message_id,
        }))
    }

    /// Completes a turn with the backend's answer.
    ///
    /// The optimistic user message stays in history either way. On failure
    /// the input text is kept so the user can resend it.
    pub fn finish_turn(
        &mut self,
        turn: PendingTurn,
        result: Result<ChatReply, ApiError>,
        store: &mut MessageStore,
    ) -> TurnOutcome {
        self.state = TurnState::Idle;

        match result {
            Ok(reply) => {
                let id = store.append_assistant_message(
                    reply.content,
                    reply.sources,
                    &turn.session_id,
                    reply.pdf_path,
                );
                self.input.clear();
                debug!(session_id = %turn.session_id, message_id = %id, "Turn complete");
                TurnOutcome::Success(id)
            }
            Err(e) => {
                let err = ChatError::from(e);
                err.log("send message");
                self.notification = Some(Notification::failure("send message"));
                TurnOutcome::Failure(err)
            }
        }
    }

    /// Runs a whole turn against `backend`.
    ///
    /// Returns `Ok(None)` when there was nothing to send.
    pub async fn run_turn<B, P>(
        &mut self,
        ctx: &ChatContext,
        sessions: &mut SessionManager<P>,
        store: &mut MessageStore,
        backend: &B,
    ) -> Result<Option<TurnOutcome>, ChatError>
    where
        B: ChatBackend + ?Sized,
        P: SessionPersistence,
    {
        let Some(turn) = self.begin_turn(ctx, sessions, store)? else {
            return Ok(None);
        };
        let result = backend
            .send_chat(&turn.message, &turn.user_id, &turn.session_id)
            .await;
        Ok(Some(self.finish_turn(turn, result, store)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::session::MemoryPersistence;

    fn ctx() -> ChatContext {
        ChatContext::signed_in(Identity {
            user_id: "u1".to_string(),
            bearer_token: "t".to_string(),
        })
    }

    fn reply(content: &str) -> ChatReply {
        ChatReply {
            content: content.to_string(),
            sources: vec![],
            pdf_path: None,
        }
    }

    #[test]
    fn blank_input_is_a_no_op() {
        let mut coordinator = RequestCoordinator::new();
        let mut sessions = SessionManager::new(MemoryPersistence::default());
        let mut store = MessageStore::new();

        coordinator.set_input("   \n\t");
        let turn = coordinator.begin_turn(&ctx(), &mut sessions, &mut store).unwrap();

        assert!(turn.is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(coordinator.state(), TurnState::Idle);
        assert!(sessions.active_session().is_none());
    }

    #[test]
    fn missing_identity_blocks_send() {
        let mut coordinator = RequestCoordinator::new();
        let mut sessions = SessionManager::new(MemoryPersistence::default());
        let mut store = MessageStore::new();

        coordinator.set_input("hello");
        let result = coordinator.begin_turn(&ChatContext::default(), &mut sessions, &mut store);

        assert!(matches!(result, Err(ChatError::AuthRequired)));
        assert_eq!(store.len(), 1);
        assert!(coordinator.notification().is_none());
        assert!(coordinator.input_enabled());
    }

    #[test]
    fn pending_turn_gates_submit() {
        let mut coordinator = RequestCoordinator::new();
        let mut sessions = SessionManager::new(MemoryPersistence::default());
        let mut store = MessageStore::new();

        coordinator.set_input("  first  ");
        let turn = coordinator
            .begin_turn(&ctx(), &mut sessions, &mut store)
            .unwrap()
            .unwrap();
        assert_eq!(turn.message, "  first  ");
        assert!(coordinator.is_typing());
        assert!(!coordinator.input_enabled());

        let second = coordinator.begin_turn(&ctx(), &mut sessions, &mut store).unwrap();
        assert!(second.is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn submitted_text_keeps_its_whitespace() {
        let mut coordinator = RequestCoordinator::new();
        let mut sessions = SessionManager::new(MemoryPersistence::default());
        let mut store = MessageStore::new();

        let code = "    fn main() {\n        x\n    }\n";
        coordinator.set_input(code);
        let turn = coordinator
            .begin_turn(&ctx(), &mut sessions, &mut store)
            .unwrap()
            .unwrap();

        assert_eq!(turn.message, code);
        assert_eq!(store.last().unwrap().content, code);
    }

    #[test]
    fn success_appends_reply_and_clears_input() {
        let mut coordinator = RequestCoordinator::new();
        let mut sessions = SessionManager::new(MemoryPersistence::default());
        let mut store = MessageStore::new();

        coordinator.set_input("question");
        let turn = coordinator
            .begin_turn(&ctx(), &mut sessions, &mut store)
            .unwrap()
            .unwrap();
        let outcome = coordinator.finish_turn(turn.clone(), Ok(reply("answer")), &mut store);

        let TurnOutcome::Success(id) = outcome else {
            panic!("Expected success");
        };
        let message = store.get(&id).unwrap();
        assert_eq!(message.content, "answer");
        assert_eq!(message.session_id, turn.session_id);
        assert_eq!(message.previous_message_content.as_deref(), Some("question"));
        assert_eq!(coordinator.input(), "");
        assert!(!coordinator.is_typing());
    }

    #[test]
    fn failure_keeps_user_message_and_input() {
        let mut coordinator = RequestCoordinator::new();
        let mut sessions = SessionManager::new(MemoryPersistence::default());
        let mut store = MessageStore::new();

        coordinator.set_input("question");
        let turn = coordinator
            .begin_turn(&ctx(), &mut sessions, &mut store)
            .unwrap()
            .unwrap();
        let outcome = coordinator.finish_turn(
            turn,
            Err(ApiError::Api {
                status: 503,
                message: "unavailable".to_string(),
            }),
            &mut store,
        );

        assert!(matches!(outcome, TurnOutcome::Failure(ChatError::NetworkFailure(_))));
        assert_eq!(store.len(), 2);
        assert!(store.last().unwrap().is_user);
        assert_eq!(coordinator.input(), "question");
        assert!(coordinator.input_enabled());
        assert!(!coordinator.is_typing());

        let notification = coordinator.notification().unwrap();
        assert!(!notification.description.contains("unavailable"));

        coordinator.dismiss_notification();
        assert!(coordinator.notification().is_none());
    }
}
