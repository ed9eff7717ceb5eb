use thiol_api::ApiError;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Sign-in required")]
    AuthRequired,

    #[error("Network failure: {0}")]
    NetworkFailure(#[source] ApiError),

    #[error("Malformed response: {0}")]
    MalformedResponse(#[source] ApiError),
}

impl From<ApiError> for ChatError {
    fn from(err: ApiError) -> Self {
        if err.is_malformed() {
            ChatError::MalformedResponse(err)
        } else {
            ChatError::NetworkFailure(err)
        }
    }
}

impl ChatError {
    /// Logs the failure of `action`. Malformed payloads are logged louder than network errors.
    pub fn log(&self, action: &str) {
        match self {
            ChatError::AuthRequired => warn!(action, "Blocked: no signed-in user"),
            ChatError::NetworkFailure(e) => warn!(action, error = %e, "Backend call failed"),
            ChatError::MalformedResponse(e) => error!(action, error = %e, "Backend sent a malformed response"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A dismissible message for the user. Never carries raw error payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            title: title.into(),
            description: description.into(),
        }
    }

    /// Generic failure notice, e.g. `failure("download PDF")`.
    pub fn failure(action: &str) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: "Error".to_string(),
            description: format!("Failed to {}. Please try again.", action),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_errors_are_classified() {
        let malformed = ChatError::from(ApiError::Malformed("no text".to_string()));
        assert!(matches!(malformed, ChatError::MalformedResponse(_)));

        let network = ChatError::from(ApiError::Api {
            status: 502,
            message: "bad gateway".to_string(),
        });
        assert!(matches!(network, ChatError::NetworkFailure(_)));
    }

    #[test]
    fn test_failure_notification_hides_details() {
        let notification = Notification::failure("send message");
        assert_eq!(notification.level, NotificationLevel::Error);
        assert_eq!(notification.description, "Failed to send message. Please try again.");
    }
}
