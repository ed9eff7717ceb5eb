use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::warn;

use crate::error::ApiError;
use crate::sources::{normalize_sources_at, parse_timestamp};
use crate::types::{ChatReply, ChatRequest, ChatSession, Feedback, HistoryEntry, Role};

/// Builds the `POST /chat` body.
pub fn build_chat_body(request: &ChatRequest) -> Value {
    json!({
        "message": request.message,
        "user_id": request.user_id,
        "run_id": request.run_id
    })
}

/// Builds the `POST /feedback` body.
pub fn build_feedback_body(feedback: &Feedback) -> Value {
    json!({
        "user_id": feedback.user_id,
        "session_id": feedback.session_id,
        "user_message": feedback.user_message,
        "ai_message": feedback.ai_message,
        "rating": feedback.rating,
        "timestamp": feedback.timestamp.to_rfc3339()
    })
}

static NULL: Value = Value::Null;

/// Extracts the `sources` list, whether sent flat or wrapped in an object.
fn sources_payload(container: &Value) -> &Value {
    let sources = container.get("sources").unwrap_or(&NULL);
    if sources.is_object() {
        for key in ["sources", "items"] {
            if let Some(inner) = sources.get(key) {
                return inner;
            }
        }
    }
    sources
}

fn pdf_path(container: &Value) -> Option<String> {
    container
        .get("pdf_path")
        .or_else(|| container.get("pdfPath"))
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .map(String::from)
}

/// Parses a `POST /chat` response into a normalized reply.
pub fn parse_chat_reply(response: &Value, now: DateTime<Utc>) -> Result<ChatReply, ApiError> {
    let content = ["response", "content"]
        .iter()
        .find_map(|key| response.get(*key).and_then(Value::as_str))
        .ok_or_else(|| ApiError::Malformed("No response text in chat reply".to_string()))?;

    Ok(ChatReply {
        content: content.to_string(),
        sources: normalize_sources_at(sources_payload(response), now),
        pdf_path: pdf_path(response),
    })
}

/// Parses a `GET /chats` response, newest session first.
pub fn parse_sessions(response: &Value) -> Result<Vec<ChatSession>, ApiError> {
    let chats = response
        .get("chats")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::Malformed("No chats in session list".to_string()))?;

    let mut sessions: Vec<ChatSession> = chats
        .iter()
        .filter_map(|chat| {
            let Some(session_id) = chat.get("session_id").and_then(Value::as_str) else {
                warn!("Skipping chat entry without session_id");
                return None;
            };
            let created_at = chat
                .get("created_at")
                .and_then(Value::as_str)
                .and_then(parse_timestamp)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            Some(ChatSession {
                session_id: session_id.to_string(),
                created_at,
            })
        })
        .collect();

    sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(sessions)
}

/// Parses a `GET /chats/{id}` response, oldest entry first.
pub fn parse_history(response: &Value, now: DateTime<Utc>) -> Result<Vec<HistoryEntry>, ApiError> {
    let entries = ["history", "messages"]
        .iter()
        .find_map(|key| response.get(*key).and_then(Value::as_array))
        .ok_or_else(|| ApiError::Malformed("No history in chat response".to_string()))?;

    entries
        .iter()
        .map(|entry| {
            let role = match entry.get("role").and_then(Value::as_str) {
                Some("user") => Role::User,
                Some("assistant") => Role::Assistant,
                other => {
                    return Err(ApiError::Malformed(format!(
                        "Unknown history role: {}",
                        other.unwrap_or("<missing>")
                    )));
                }
            };
            let content = entry
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            let sources = match role {
                Role::User => Vec::new(),
                Role::Assistant => normalize_sources_at(sources_payload(entry), now),
            };
            Ok(HistoryEntry {
                role,
                content,
                sources,
                pdf_path: pdf_path(entry),
            })
        })
        .collect()
}

/// Reads the `error` field of a failed response body, if any.
pub(crate) fn error_message(body: &Value) -> Option<String> {
    match body.get("error")? {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("message").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}
