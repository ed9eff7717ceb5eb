use std::sync::Arc;

use async_trait::async_trait;
use thiol_api::{ApiError, ChatReply, ChatSession, Feedback, HistoryEntry, RagClient};

/// The remote chat service as seen by the core.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send_chat(&self, message: &str, user_id: &str, run_id: &str) -> Result<ChatReply, ApiError>;

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>, ApiError>;

    async fn fetch_history(&self, chat_id: &str, user_id: &str) -> Result<Vec<HistoryEntry>, ApiError>;

    async fn download_pdf(
        &self,
        user_id: &str,
        run_id: &str,
        document: Option<&str>,
    ) -> Result<Vec<u8>, ApiError>;

    async fn submit_feedback(&self, feedback: &Feedback) -> Result<(), ApiError>;
}

#[async_trait]
impl ChatBackend for RagClient {
    async fn send_chat(&self, message: &str, user_id: &str, run_id: &str) -> Result<ChatReply, ApiError> {
        RagClient::send_chat(self, message, user_id, run_id).await
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>, ApiError> {
        RagClient::list_sessions(self, user_id).await
    }

    async fn fetch_history(&self, chat_id: &str, user_id: &str) -> Result<Vec<HistoryEntry>, ApiError> {
        RagClient::fetch_history(self, chat_id, user_id).await
    }

    async fn download_pdf(
        &self,
        user_id: &str,
        run_id: &str,
        document: Option<&str>,
    ) -> Result<Vec<u8>, ApiError> {
        RagClient::download_pdf(self, user_id, run_id, document).await
    }

    async fn submit_feedback(&self, feedback: &Feedback) -> Result<(), ApiError> {
        RagClient::submit_feedback(self, feedback).await
    }
}

#[async_trait]
impl<T: ChatBackend + ?Sized> ChatBackend for Arc<T> {
    async fn send_chat(&self, message: &str, user_id: &str, run_id: &str) -> Result<ChatReply, ApiError> {
        (**self).send_chat(message, user_id, run_id).await
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>, ApiError> {
        (**self).list_sessions(user_id).await
    }

    async fn fetch_history(&self, chat_id: &str, user_id: &str) -> Result<Vec<HistoryEntry>, ApiError> {
        (**self).fetch_history(chat_id, user_id).await
    }

    async fn download_pdf(
        &self,
        user_id: &str,
        run_id: &str,
        document: Option<&str>,
    ) -> Result<Vec<u8>, ApiError> {
        (**self).download_pdf(user_id, run_id, document).await
    }

    async fn submit_feedback(&self, feedback: &Feedback) -> Result<(), ApiError> {
        (**self).submit_feedback(feedback).await
    }
}
