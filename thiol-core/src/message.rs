use std::fmt;

use thiol_api::Source;

pub const WELCOME_MESSAGE: &str = "Hello! How can I assist you today?";

const WELCOME_ID: &str = "welcome";

/// Identifies a message within a session. Derived from its position in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(String);

impl MessageId {
    pub fn welcome() -> Self {
        Self(WELCOME_ID.to_string())
    }

    pub fn at(position: usize) -> Self {
        Self(format!("msg-{}", position))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One turn in a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub message_id: MessageId,
    pub session_id: String,
    pub content: String,
    pub is_user: bool,
    /// Always empty for user messages.
    pub sources: Vec<Source>,
    pub pdf_path: Option<String>,
    /// Content of the message right before this one, used as feedback context.
    pub previous_message_content: Option<String>,
}

impl Message {
    /// The static greeting shown at the top of every conversation.
    pub fn welcome() -> Self {
        Self {
            message_id: MessageId::welcome(),
            session_id: String::new(),
            content: WELCOME_MESSAGE.to_string(),
            is_user: false,
            sources: Vec::new(),
            pdf_path: None,
            previous_message_content: None,
        }
    }

    pub fn is_welcome(&self) -> bool {
        self.message_id.as_str() == WELCOME_ID
    }

    pub fn accepts_feedback(&self) -> bool {
        !self.is_user && !self.is_welcome()
    }
}
