use std::sync::Arc;

use chrono::Utc;
use reqwest::{RequestBuilder, Response, Url};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::convert::{
    build_chat_body, build_feedback_body, error_message, parse_chat_reply, parse_history,
    parse_sessions,
};
use crate::credentials::CredentialProvider;
use crate::error::ApiError;
use crate::types::{ChatReply, ChatRequest, ChatSession, Feedback, HistoryEntry, UserProfile};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Client for the chat/RAG backend.
pub struct RagClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl RagClient {
    /// Creates a client for the default local backend.
    pub fn new(credentials: impl CredentialProvider + 'static) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, credentials)
    }

    /// Creates a client with a custom base URL.
    pub fn with_base_url(
        base_url: impl Into<String>,
        credentials: impl CredentialProvider + 'static,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: Arc::new(credentials),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL with `segments` appended, each percent-encoded as a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let authorization = self.credentials.authorization().await?;
        let response = builder
            .header("Authorization", authorization)
            .header("ngrok-skip-browser-warning", "1")
            .send()
            .await?;
        Ok(response)
    }

    /// Turns a non-2xx response into [`ApiError::Api`], using the body's `error` field if present.
    async fn check_status(response: Response, fallback: &str) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        let message = error_message(&body).unwrap_or_else(|| fallback.to_string());
        warn!(status = status.as_u16(), %message, "Backend call failed");

        Err(ApiError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn json(&self, builder: RequestBuilder, fallback: &str) -> Result<Value, ApiError> {
        let response = Self::check_status(self.send(builder).await?, fallback).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Sends one user message and returns the normalized assistant reply.
    #[instrument(skip(self, message))]
    pub async fn send_chat(
        &self,
        message: &str,
        user_id: &str,
        run_id: &str,
    ) -> Result<ChatReply, ApiError> {
        let request = ChatRequest {
            message: message.to_string(),
            user_id: user_id.to_string(),
            run_id: run_id.to_string(),
        };

        debug!("Sending chat message");

        let body = self
            .json(
                self.http
                    .post(format!("{}/chat", self.base_url))
                    .json(&build_chat_body(&request)),
                "Failed to send message",
            )
            .await?;

        let reply = parse_chat_reply(&body, Utc::now())?;
        debug!(sources = reply.sources.len(), "Received chat reply");
        Ok(reply)
    }

    /// Lists the user's sessions, newest first.
    #[instrument(skip(self))]
    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>, ApiError> {
        let body = self
            .json(
                self.http
                    .get(format!("{}/chats", self.base_url))
                    .query(&[("user_id", user_id)]),
                "Failed to get chats",
            )
            .await?;
        parse_sessions(&body)
    }

    /// Fetches the full ordered history of one session.
    #[instrument(skip(self))]
    pub async fn fetch_history(
        &self,
        chat_id: &str,
        user_id: &str,
    ) -> Result<Vec<HistoryEntry>, ApiError> {
        let body = self
            .json(
                self.http
                    .get(self.endpoint(&["chats", chat_id])?)
                    .query(&[("user_id", user_id)]),
                "Failed to get chat history",
            )
            .await?;
        parse_history(&body, Utc::now())
    }

    /// Downloads the combined source PDF for a run, or one document of it.
    #[instrument(skip(self))]
    pub async fn download_pdf(
        &self,
        user_id: &str,
        run_id: &str,
        document: Option<&str>,
    ) -> Result<Vec<u8>, ApiError> {
        let mut query = vec![("user_id", user_id), ("run_id", run_id)];
        if let Some(document) = document {
            query.push(("document", document));
        }

        let response = self
            .send(
                self.http
                    .get(format!("{}/download_pdf", self.base_url))
                    .query(&query),
            )
            .await?;
        let response = Self::check_status(response, "Failed to download PDF").await?;
        let bytes = response.bytes().await?;
        debug!(len = bytes.len(), "Downloaded PDF");
        Ok(bytes.to_vec())
    }

    /// Persists one star rating.
    #[instrument(skip(self, feedback), fields(session_id = %feedback.session_id, rating = feedback.rating))]
    pub async fn submit_feedback(&self, feedback: &Feedback) -> Result<(), ApiError> {
        let response = self
            .send(
                self.http
                    .post(format!("{}/feedback", self.base_url))
                    .json(&build_feedback_body(feedback)),
            )
            .await?;
        Self::check_status(response, "Failed to submit rating").await?;
        Ok(())
    }

    /// Returns the account behind the current credential.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<UserProfile, ApiError> {
        let body = self
            .json(
                self.http.get(format!("{}/user", self.base_url)),
                "Failed to get user info",
            )
            .await?;
        Ok(serde_json::from_value(body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticToken;

    #[test]
    fn test_client_creation() {
        let client = RagClient::new(StaticToken::new("test-key"));
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_client_custom_base_url() {
        let client = RagClient::with_base_url("https://rag.example.com/", StaticToken::new("k"));
        assert_eq!(client.base_url(), "https://rag.example.com");
    }

    #[test]
    fn test_endpoint_encodes_path_segments() {
        let client = RagClient::with_base_url("https://rag.example.com/api", StaticToken::new("k"));
        let url = client.endpoint(&["chats", "a/b?c#d"]).unwrap();
        assert_eq!(url.as_str(), "https://rag.example.com/api/chats/a%2Fb%3Fc%23d");
    }

    #[tokio::test]
    #[ignore = "requires THIOL_API_URL, THIOL_USER_ID and THIOL_TOKEN env vars"]
    async fn test_live_api() {
        let base_url = std::env::var("THIOL_API_URL").expect("THIOL_API_URL not set");
        let user_id = std::env::var("THIOL_USER_ID").expect("THIOL_USER_ID not set");
        let token = std::env::var("THIOL_TOKEN").expect("THIOL_TOKEN not set");
        let client = RagClient::with_base_url(base_url, StaticToken::new(token));

        let reply = client
            .send_chat("Say 'hello' and nothing else.", &user_id, "live-test-run")
            .await;
        assert!(reply.is_ok());
        assert!(!reply.unwrap().content.is_empty());
    }
}
