use thiol_api::{HistoryEntry, Role, Source};

use crate::message::{Message, MessageId};

/// Ordered message history of the conversation on screen.
///
/// Appends are strictly sequential; the store never reorders or
/// deduplicates. The first element is the static welcome message.
#[derive(Debug, Clone)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    pub fn new() -> Self {
        Self {
            messages: vec![Message::welcome()],
        }
    }

    /// Appends the user's message before the backend has seen it.
    pub fn append_user_message(&mut self, content: impl Into<String>, session_id: &str) -> MessageId {
        self.push(content.into(), true, Vec::new(), session_id, None)
    }

    /// Appends an assistant reply after a successful round trip.
    pub fn append_assistant_message(
        &mut self,
        content: impl Into<String>,
        sources: Vec<Source>,
        session_id: &str,
        pdf_path: Option<String>,
    ) -> MessageId {
        self.push(content.into(), false, sources, session_id, pdf_path)
    }

    fn push(
        &mut self,
        content: String,
        is_user: bool,
        sources: Vec<Source>,
        session_id: &str,
        pdf_path: Option<String>,
    ) -> MessageId {
        let message_id = MessageId::at(self.messages.len());
        let previous_message_content = self.messages.last().map(|m| m.content.clone());

        self.messages.push(Message {
            message_id: message_id.clone(),
            session_id: session_id.to_string(),
            content,
            is_user,
            sources,
            pdf_path,
            previous_message_content,
        });

        message_id
    }

    /// Replaces the whole history.
    pub fn reset(&mut self, initial: Vec<Message>) {
        self.messages = initial;
    }

    /// Drops everything except the welcome message.
    pub fn reset_to_welcome(&mut self) {
        self.messages = vec![Message::welcome()];
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn get(&self, message_id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.message_id == message_id)
    }

    /// Messages that can receive a star rating, oldest first.
    pub fn feedback_targets(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.accepts_feedback())
    }
}

/// Maps a fetched history into store messages, welcome message first.
///
/// Message ids depend only on position, so reloading the same history yields the same ids.
pub fn history_messages(session_id: &str, entries: Vec<HistoryEntry>) -> Vec<Message> {
    let mut store = MessageStore::new();
    for entry in entries {
        match entry.role {
            Role::User => {
                store.append_user_message(entry.content, session_id);
            }
            Role::Assistant => {
                store.append_assistant_message(entry.content, entry.sources, session_id, entry.pdf_path);
            }
        }
    }
    store.messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_welcome() {
        let store = MessageStore::new();
        assert_eq!(store.len(), 1);
        assert!(store.messages()[0].is_welcome());
        assert!(!store.messages()[0].accepts_feedback());
        assert_eq!(store.feedback_targets().count(), 0);
    }

    #[test]
    fn appends_keep_submission_order() {
        let mut store = MessageStore::new();
        let first = store.append_user_message("one", "s1");
        let second = store.append_user_message("two", "s1");
        let reply = store.append_assistant_message("reply", vec![], "s1", None);

        let contents: Vec<&str> = store.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(&contents[1..], ["one", "two", "reply"]);
        assert_ne!(first, second);
        assert_eq!(store.get(&reply).unwrap().previous_message_content.as_deref(), Some("two"));
    }

    #[test]
    fn previous_content_of_first_user_message_is_welcome() {
        let mut store = MessageStore::new();
        let id = store.append_user_message("hi", "s1");
        assert_eq!(
            store.get(&id).unwrap().previous_message_content.as_deref(),
            Some(crate::message::WELCOME_MESSAGE)
        );
    }

    #[test]
    fn reset_replaces_contents() {
        let mut store = MessageStore::new();
        store.append_user_message("old", "s1");
        store.reset(vec![Message::welcome()]);
        assert_eq!(store.len(), 1);

        store.append_user_message("again", "s1");
        store.reset_to_welcome();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn history_ids_are_stable() {
        let entries = || {
            vec![
                HistoryEntry {
                    role: Role::User,
                    content: "Q".to_string(),
                    sources: vec![],
                    pdf_path: None,
                },
                HistoryEntry {
                    role: Role::Assistant,
                    content: "A".to_string(),
                    sources: vec![],
                    pdf_path: Some("/a.pdf".to_string()),
                },
            ]
        };

        let first = history_messages("s1", entries());
        let second = history_messages("s1", entries());

        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert!(first[0].is_welcome());
        assert!(first[1].is_user);
        assert_eq!(first[2].previous_message_content.as_deref(), Some("Q"));
        assert_eq!(first[2].session_id, "s1");
        assert!(first[2].accepts_feedback());
    }
}
