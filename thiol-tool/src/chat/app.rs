use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use thiol_api::{ApiError, ChatReply, ChatSession, Feedback, HistoryEntry, RagClient};
use thiol_core::{
    fetch_pdf, ChatContext, ChatError, Message, MessageId, MessageStore, Notification,
    PdfDocument, PendingTurn, RatingRejected, RatingState, RatingTracker, RequestCoordinator,
    SelectOutcome, SelectTicket, SessionManager, TurnOutcome,
};
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{debug, warn};

use crate::state::FileSessionState;

type Reply<T> = oneshot::Receiver<Result<T, ApiError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Chat,
    SelectSession,
    Rate,
}

/// Outcome of polling a receiver once.
enum Poll<T> {
    Ready(T),
    Waiting,
}

fn poll_reply<T>(rx: &mut Reply<T>) -> Poll<Result<T, ApiError>> {
    match rx.try_recv() {
        Ok(result) => Poll::Ready(result),
        Err(TryRecvError::Empty) => Poll::Waiting,
        Err(TryRecvError::Closed) => Poll::Ready(Err(ApiError::Api {
            status: 0,
            message: "Request task ended".to_string(),
        })),
    }
}

pub struct ChatApp {
    pub mode: AppMode,
    pub should_quit: bool,
    pub ctx: ChatContext,
    pub client: Arc<RagClient>,
    pub store: MessageStore,
    pub sessions: SessionManager<FileSessionState>,
    pub coordinator: RequestCoordinator,
    pub ratings: RatingTracker,
    pub cursor_pos: usize,
    pub messages_scroll: u16,
    /// Assistant message targeted by rating and download.
    pub selected: Option<MessageId>,
    pub download_dir: PathBuf,

    // In-flight requests
    turn: Option<(PendingTurn, Reply<ChatReply>)>,
    history_loads: Vec<(SelectTicket, Reply<Vec<HistoryEntry>>)>,
    session_list: Option<Reply<Vec<ChatSession>>>,
    ratings_in_flight: Vec<(Feedback, MessageId, Reply<()>)>,
    pdf: Option<oneshot::Receiver<Result<PdfDocument, ChatError>>>,

    // Popup state
    pub popup_selected: usize,
}

impl ChatApp {
    pub fn new(
        ctx: ChatContext,
        client: RagClient,
        persistence: FileSessionState,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            mode: AppMode::Chat,
            should_quit: false,
            ctx,
            client: Arc::new(client),
            store: MessageStore::new(),
            sessions: SessionManager::new(persistence),
            coordinator: RequestCoordinator::new(),
            ratings: RatingTracker::new(),
            cursor_pos: 0,
            messages_scroll: 0,
            selected: None,
            download_dir,
            turn: None,
            history_loads: Vec::new(),
            session_list: None,
            ratings_in_flight: Vec::new(),
            pdf: None,
            popup_selected: 0,
        }
    }

    /// Picks the conversation shown at startup.
    pub fn open(&mut self, session: Option<String>, new_conversation: bool) {
        if new_conversation {
            self.new_conversation();
        } else if let Some(session_id) = session {
            self.select_session(&session_id);
        } else if let Some(active) = self.sessions.active_session().map(String::from) {
            self.select_session(&active);
        }
        self.refresh_sessions();
    }

    pub fn is_pending(&self) -> bool {
        self.turn.is_some()
    }

    pub fn is_loading_history(&self) -> bool {
        !self.history_loads.is_empty()
    }

    pub fn send_message(&mut self) {
        let turn = match self
            .coordinator
            .begin_turn(&self.ctx, &mut self.sessions, &mut self.store)
        {
            Ok(Some(turn)) => turn,
            Ok(None) => return,
            Err(e) => {
                // Sending without a user is blocked quietly.
                e.log("send message");
                return;
            }
        };

        let (tx, rx) = oneshot::channel();
        let client = Arc::clone(&self.client);
        let (message, user_id, run_id) = (
            turn.message.clone(),
            turn.user_id.clone(),
            turn.session_id.clone(),
        );

        tokio::spawn(async move {
            let result = client.send_chat(&message, &user_id, &run_id).await;
            let _ = tx.send(result);
        });

        self.turn = Some((turn, rx));
        self.cursor_pos = self.coordinator.input().len();
        self.messages_scroll = 0;
    }

    pub fn select_session(&mut self, session_id: &str) {
        let Some(identity) = self.ctx.identity() else {
            return;
        };
        let user_id = identity.user_id.clone();
        let ticket = self.sessions.begin_select(session_id);
        self.selected = None;

        let (tx, rx) = oneshot::channel();
        let client = Arc::clone(&self.client);
        let chat_id = session_id.to_string();

        tokio::spawn(async move {
            let result = client.fetch_history(&chat_id, &user_id).await;
            let _ = tx.send(result);
        });

        self.history_loads.push((ticket, rx));
    }

    pub fn refresh_sessions(&mut self) {
        if self.session_list.is_some() {
            return;
        }
        let Some(identity) = self.ctx.identity() else {
            return;
        };
        let user_id = identity.user_id.clone();

        let (tx, rx) = oneshot::channel();
        let client = Arc::clone(&self.client);

        tokio::spawn(async move {
            let result = client.list_sessions(&user_id).await;
            let _ = tx.send(result);
        });

        self.session_list = Some(rx);
    }

    pub fn new_conversation(&mut self) {
        let session_id = self.sessions.create_session(&mut self.store);
        debug!(%session_id, "Started new conversation");
        self.selected = None;
        self.messages_scroll = 0;
    }

    pub fn submit_rating(&mut self, rating: u8) {
        self.mode = AppMode::Chat;
        let Some(message_id) = self.selected.clone() else {
            return;
        };

        let feedback = match self.ratings.begin_rating(
            &self.ctx,
            &self.store,
            &message_id,
            rating,
            Utc::now(),
        ) {
            Ok(feedback) => feedback,
            Err(rejected) => {
                debug!(%rejected, "Rating not submitted");
                if let RatingRejected::InFlight | RatingRejected::AlreadyRated(_) = rejected {
                    self.coordinator
                        .notify(Notification::info("Rating", "This answer is already rated."));
                }
                return;
            }
        };

        let (tx, rx) = oneshot::channel();
        let client = Arc::clone(&self.client);
        let body = feedback.clone();

        tokio::spawn(async move {
            let result = client.submit_feedback(&body).await;
            let _ = tx.send(result);
        });

        self.ratings_in_flight.push((feedback, message_id, rx));
    }

    pub fn download_pdf(&mut self) {
        if self.pdf.is_some() {
            return;
        }
        let Some(message) = self.selected_message() else {
            return;
        };
        if message.pdf_path.is_none() {
            self.coordinator.notify(Notification::info(
                "No PDF",
                "This answer has no combined source document.",
            ));
            return;
        }
        let run_id = message.session_id.clone();

        let (tx, rx) = oneshot::channel();
        let client = Arc::clone(&self.client);
        let ctx = self.ctx.clone();

        tokio::spawn(async move {
            let result = fetch_pdf(&ctx, client.as_ref(), &run_id, None).await;
            let _ = tx.send(result);
        });

        self.pdf = Some(rx);
    }

    /// Applies every request that has finished since the last call.
    pub fn poll_responses(&mut self) {
        self.poll_turn();
        self.poll_history();
        self.poll_session_list();
        self.poll_rating();
        self.poll_pdf();
    }

    fn poll_turn(&mut self) {
        let Some((_, rx)) = self.turn.as_mut() else {
            return;
        };
        let Poll::Ready(result) = poll_reply(rx) else {
            return;
        };
        let Some((turn, _)) = self.turn.take() else {
            return;
        };

        match self.coordinator.finish_turn(turn, result, &mut self.store) {
            TurnOutcome::Success(id) => {
                self.selected = Some(id);
                self.cursor_pos = 0;
                self.messages_scroll = 0;
            }
            TurnOutcome::Failure(_) => {
                self.cursor_pos = self.coordinator.input().len();
            }
        }
    }

    fn poll_history(&mut self) {
        let mut waiting = Vec::new();
        for (ticket, mut rx) in std::mem::take(&mut self.history_loads) {
            let result = match poll_reply(&mut rx) {
                Poll::Ready(result) => result,
                Poll::Waiting => {
                    waiting.push((ticket, rx));
                    continue;
                }
            };

            match self.sessions.complete_select(ticket, result, &mut self.store) {
                Ok(SelectOutcome::Applied) => {
                    self.selected = None;
                    self.messages_scroll = 0;
                }
                Ok(SelectOutcome::Stale) => {}
                Err(_) => self
                    .coordinator
                    .notify(Notification::failure("load chat history")),
            }
        }
        self.history_loads = waiting;
    }

    fn poll_session_list(&mut self) {
        let Some(rx) = self.session_list.as_mut() else {
            return;
        };
        let Poll::Ready(result) = poll_reply(rx) else {
            return;
        };
        self.session_list = None;

        match result {
            Ok(sessions) => self.sessions.set_sessions(sessions),
            Err(e) => {
                ChatError::from(e).log("load chats");
                self.coordinator.notify(Notification::failure("load chats"));
            }
        }
    }

    fn poll_rating(&mut self) {
        let mut waiting = Vec::new();
        for (feedback, message_id, mut rx) in std::mem::take(&mut self.ratings_in_flight) {
            let result = match poll_reply(&mut rx) {
                Poll::Ready(result) => result,
                Poll::Waiting => {
                    waiting.push((feedback, message_id, rx));
                    continue;
                }
            };

            match self.ratings.finish_rating(&feedback, &message_id, result) {
                Ok(()) => self.coordinator.notify(Notification::info(
                    "Rating submitted",
                    "Thank you for your feedback!",
                )),
                Err(_) => self
                    .coordinator
                    .notify(Notification::failure("submit rating")),
            }
        }
        self.ratings_in_flight = waiting;
    }

    fn poll_pdf(&mut self) {
        let Some(rx) = self.pdf.as_mut() else {
            return;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Closed) => {
                self.pdf = None;
                self.coordinator.notify(Notification::failure("download PDF"));
                return;
            }
        };
        self.pdf = None;

        let saved = result.map_err(|_| ()).and_then(|pdf| {
            let path = self.download_dir.join(&pdf.file_name);
            std::fs::create_dir_all(&self.download_dir)
                .and_then(|_| std::fs::write(&path, &pdf.bytes))
                .map(|_| path)
                .map_err(|e| warn!(error = %e, "Could not save PDF"))
        });

        match saved {
            Ok(path) => self
                .coordinator
                .notify(Notification::info("PDF saved", path.display().to_string())),
            Err(()) => self.coordinator.notify(Notification::failure("download PDF")),
        }
    }

    pub fn selected_message(&self) -> Option<&Message> {
        self.selected.as_ref().and_then(|id| self.store.get(id))
    }

    pub fn rating_of(&self, message: &Message) -> RatingState {
        self.ratings.state(&message.session_id, &message.message_id)
    }

    /// Moves the selection to the next assistant message that can be rated, wrapping around.
    pub fn select_next_answer(&mut self) {
        let targets: Vec<&MessageId> = self.store.feedback_targets().map(|m| &m.message_id).collect();
        if targets.is_empty() {
            self.selected = None;
            return;
        }
        let next = match &self.selected {
            Some(current) => targets
                .iter()
                .position(|id| *id == current)
                .map(|i| (i + 1) % targets.len())
                .unwrap_or(0),
            None => targets.len() - 1,
        };
        self.selected = Some(targets[next].clone());
    }

    pub fn open_rating(&mut self) {
        if self.selected_message().is_some_and(|m| m.accepts_feedback()) {
            self.mode = AppMode::Rate;
        }
    }

    pub fn open_session_picker(&mut self) {
        self.refresh_sessions();
        self.popup_selected = self
            .sessions
            .sessions()
            .iter()
            .position(|s| Some(s.session_id.as_str()) == self.sessions.active_session())
            .unwrap_or(0);
        self.mode = AppMode::SelectSession;
    }

    pub fn close_popup(&mut self) {
        self.mode = AppMode::Chat;
    }

    pub fn popup_up(&mut self) {
        if self.popup_selected > 0 {
            self.popup_selected -= 1;
        }
    }

    pub fn popup_down(&mut self) {
        let max = self.sessions.sessions().len().saturating_sub(1);
        if self.popup_selected < max {
            self.popup_selected += 1;
        }
    }

    pub fn popup_select(&mut self) {
        let chosen = self
            .sessions
            .sessions()
            .get(self.popup_selected)
            .map(|s| s.session_id.clone());
        self.close_popup();
        if let Some(session_id) = chosen {
            self.select_session(&session_id);
        }
    }

    pub fn scroll_up(&mut self) {
        self.messages_scroll = self.messages_scroll.saturating_add(1);
    }

    pub fn scroll_down(&mut self) {
        self.messages_scroll = self.messages_scroll.saturating_sub(1);
    }

    pub fn input_char(&mut self, c: char) {
        if !self.coordinator.input_enabled() {
            return;
        }
        self.coordinator.input_mut().insert(self.cursor_pos, c);
        self.cursor_pos += c.len_utf8();
    }

    pub fn input_backspace(&mut self) {
        if !self.coordinator.input_enabled() || self.cursor_pos == 0 {
            return;
        }
        let input = self.coordinator.input_mut();
        let prev_char_boundary = input[..self.cursor_pos]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
            .unwrap_or(0);
        input.remove(prev_char_boundary);
        self.cursor_pos = prev_char_boundary;
    }

    pub fn input_delete(&mut self) {
        if !self.coordinator.input_enabled() {
            return;
        }
        let cursor = self.cursor_pos;
        let input = self.coordinator.input_mut();
        if cursor < input.len() {
            input.remove(cursor);
        }
    }

    pub fn input_left(&mut self) {
        if self.cursor_pos > 0 {
            self.cursor_pos = self.coordinator.input()[..self.cursor_pos]
                .char_indices()
                .next_back()
                .map(|(i, _)| i)
                .unwrap_or(0);
        }
    }

    pub fn input_right(&mut self) {
        let input = self.coordinator.input();
        if self.cursor_pos < input.len() {
            self.cursor_pos = input[self.cursor_pos..]
                .char_indices()
                .nth(1)
                .map(|(i, _)| self.cursor_pos + i)
                .unwrap_or(input.len());
        }
    }

    pub fn input_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn input_end(&mut self) {
        self.cursor_pos = self.coordinator.input().len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use thiol_api::StaticToken;
    use thiol_core::Identity;

    fn app_with_answers(dir: &TempDir) -> (ChatApp, MessageId, MessageId) {
        let ctx = ChatContext::signed_in(Identity {
            user_id: "u1".to_string(),
            bearer_token: "t".to_string(),
        });
        // Nothing listens here; requests stay in flight until polled.
        let client = RagClient::with_base_url("http://127.0.0.1:9", StaticToken::new("t"));
        let persistence = FileSessionState::new(dir.path().join("state.toml"));
        let mut app = ChatApp::new(ctx, client, persistence, dir.path().join("downloads"));

        app.store.append_user_message("first question", "s1");
        let a = app
            .store
            .append_assistant_message("first answer", vec![], "s1", None);
        app.store.append_user_message("second question", "s1");
        let b = app
            .store
            .append_assistant_message("second answer", vec![], "s1", None);
        (app, a, b)
    }

    #[tokio::test]
    async fn test_ratings_on_two_answers_both_submit() {
        let dir = TempDir::new().unwrap();
        let (mut app, a, b) = app_with_answers(&dir);

        app.selected = Some(a.clone());
        app.submit_rating(4);
        app.selected = Some(b.clone());
        app.submit_rating(5);

        assert_eq!(app.ratings.state("s1", &a), RatingState::Submitting(4));
        assert_eq!(app.ratings.state("s1", &b), RatingState::Submitting(5));
        assert_eq!(app.ratings_in_flight.len(), 2);
        assert!(app.coordinator.notification().is_none());
    }

    #[tokio::test]
    async fn test_second_rating_on_same_answer_is_refused() {
        let dir = TempDir::new().unwrap();
        let (mut app, a, _) = app_with_answers(&dir);

        app.selected = Some(a.clone());
        app.submit_rating(2);
        app.submit_rating(5);

        assert_eq!(app.ratings.state("s1", &a), RatingState::Submitting(2));
        assert_eq!(app.ratings_in_flight.len(), 1);
        assert!(app.coordinator.notification().is_some());
    }
}
