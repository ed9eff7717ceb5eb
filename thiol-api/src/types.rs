use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File information attached to a cited document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub file_type: String,
}

impl SourceMetadata {
    /// Metadata used when the backend sends none.
    pub fn fallback(now: DateTime<Utc>) -> Self {
        Self {
            size: 0,
            last_modified: now,
            file_type: "pdf".to_string(),
        }
    }
}

/// A citation supporting an assistant answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub document: String,
    /// Always finite.
    pub page: f64,
    /// Always finite.
    pub paragraph: f64,
    pub text: String,
    pub metadata: SourceMetadata,
}

/// Body of `POST /chat`.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: String,
    pub run_id: String,
}

/// A normalized reply from `POST /chat`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub content: String,
    pub sources: Vec<Source>,
    pub pdf_path: Option<String>,
}

/// A conversation thread as listed by `GET /chats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatSession {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One stored turn from `GET /chats/{id}`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    pub sources: Vec<Source>,
    pub pdf_path: Option<String>,
}

/// Body of `POST /feedback`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feedback {
    pub user_id: String,
    pub session_id: String,
    pub user_message: String,
    pub ai_message: String,
    pub rating: u8,
    pub timestamp: DateTime<Utc>,
}

/// Account details returned by `GET /user`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub disabled: bool,
}
