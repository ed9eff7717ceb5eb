//! HTTP client for the retrieval-augmented chat backend.
//!
//! The backend answers questions about a document collection and cites the
//! passages it used. This crate wraps its endpoints and is the one place
//! where its loosely shaped JSON is turned into typed values: reply text,
//! session lists, history and the cited [`Source`] records.
//!
//! # Example
//!
//! ```ignore
//! use thiol_api::{RagClient, StaticToken};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = RagClient::with_base_url("http://localhost:8000", StaticToken::new("token"));
//!
//!     let reply = client
//!         .send_chat("What does the contract say about renewals?", "user-1", "run-1")
//!         .await
//!         .unwrap();
//!
//!     for source in &reply.sources {
//!         println!("{} p.{}", source.document, source.page);
//!     }
//! }
//! ```

mod client;
mod convert;
mod credentials;
mod error;
mod sources;
mod types;

pub use client::{RagClient, DEFAULT_BASE_URL};
pub use convert::{build_chat_body, build_feedback_body, parse_chat_reply, parse_history, parse_sessions};
pub use credentials::{CredentialProvider, StaticToken, TokenEndpoint};
pub use error::ApiError;
pub use sources::{normalize_sources, normalize_sources_at, parse_source, ParsedSource, SkipReason};
pub use types::{
    ChatReply, ChatRequest, ChatSession, Feedback, HistoryEntry, Role, Source, SourceMetadata,
    UserProfile,
};
