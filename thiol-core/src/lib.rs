//! Client-side conversation state for the retrieval-augmented chat backend.
//!
//! The pieces here hold everything the chat screen shows and keep it
//! consistent with the network:
//! - [`MessageStore`]: ordered history with optimistic user messages
//! - [`SessionManager`]: active conversation id, session list, history reloads
//! - [`RequestCoordinator`]: one chat turn at a time, input and typing state
//! - [`RatingTracker`]: write-once star ratings per assistant message
//!
//! All network access goes through [`ChatBackend`], implemented for
//! [`thiol_api::RagClient`].

mod backend;
mod coordinator;
mod error;
mod identity;
mod message;
mod pdf;
mod rating;
mod session;
mod store;

pub use backend::ChatBackend;
pub use coordinator::{PendingTurn, RequestCoordinator, TurnOutcome, TurnState};
pub use error::{ChatError, Notification, NotificationLevel};
pub use identity::{ChatContext, Identity};
pub use message::{Message, MessageId, WELCOME_MESSAGE};
pub use pdf::{fetch_pdf, pdf_file_name, PdfDocument};
pub use rating::{RatingError, RatingRejected, RatingState, RatingTracker, MAX_RATING, MIN_RATING};
pub use session::{MemoryPersistence, SelectOutcome, SelectTicket, SessionManager, SessionPersistence};
pub use store::{history_messages, MessageStore};
