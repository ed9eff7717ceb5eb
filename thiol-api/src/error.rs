use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Credential error: {0}")]
    Credentials(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// True when the backend answered but the payload did not have the expected shape.
    pub fn is_malformed(&self) -> bool {
        matches!(self, ApiError::Json(_) | ApiError::Malformed(_))
    }
}
