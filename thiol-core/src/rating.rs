use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiol_api::{ApiError, Feedback};
use thiserror::Error;
use tracing::{debug, info};

use crate::backend::ChatBackend;
use crate::error::ChatError;
use crate::identity::ChatContext;
use crate::message::MessageId;
use crate::store::MessageStore;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingState {
    Unrated,
    Submitting(u8),
    Rated(u8),
}

/// Reasons a rating is refused before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RatingRejected {
    #[error("rating {0} is outside 1..=5")]
    OutOfRange(u8),

    #[error("no message {0}")]
    UnknownMessage(MessageId),

    #[error("message {0} does not accept feedback")]
    NotEligible(MessageId),

    #[error("a rating for this message is already being submitted")]
    InFlight,

    #[error("message already rated {0}")]
    AlreadyRated(u8),

    #[error("sign-in required")]
    SignInRequired,
}

#[derive(Debug, Error)]
pub enum RatingError {
    #[error("rating rejected: {0}")]
    Rejected(#[from] RatingRejected),

    #[error(transparent)]
    Chat(#[from] ChatError),
}

/// Star ratings per message. A message can be rated once; a failed
/// submission makes it ratable again.
#[derive(Debug, Default)]
pub struct RatingTracker {
    states: HashMap<(String, MessageId), RatingState>,
}

impl RatingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, session_id: &str, message_id: &MessageId) -> RatingState {
        self.states
            .get(&(session_id.to_string(), message_id.clone()))
            .copied()
            .unwrap_or(RatingState::Unrated)
    }

    /// Validates a click and builds the feedback to submit.
    pub fn begin_rating(
        &mut self,
        ctx: &ChatContext,
        store: &MessageStore,
        message_id: &MessageId,
        rating: u8,
        now: DateTime<Utc>,
    ) -> Result<Feedback, RatingRejected> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(RatingRejected::OutOfRange(rating));
        }
        let message = store
            .get(message_id)
            .ok_or_else(|| RatingRejected::UnknownMessage(message_id.clone()))?;
        if !message.accepts_feedback() {
            return Err(RatingRejected::NotEligible(message_id.clone()));
        }
        let identity = ctx
            .identity()
            .ok_or(RatingRejected::SignInRequired)?;

        let key = (message.session_id.clone(), message_id.clone());
        match self.states.get(&key) {
            Some(RatingState::Submitting(_)) => return Err(RatingRejected::InFlight),
            Some(RatingState::Rated(previous)) => return Err(RatingRejected::AlreadyRated(*previous)),
            Some(RatingState::Unrated) | None => {}
        }

        debug!(%message_id, rating, "Submitting rating");
        self.states.insert(key, RatingState::Submitting(rating));

        Ok(Feedback {
            user_id: identity.user_id.clone(),
            session_id: message.session_id.clone(),
            user_message: message.previous_message_content.clone().unwrap_or_default(),
            ai_message: message.content.clone(),
            rating,
            timestamp: now,
        })
    }

    /// Records the submission result for `feedback`.
    pub fn finish_rating(
        &mut self,
        feedback: &Feedback,
        message_id: &MessageId,
        result: Result<(), ApiError>,
    ) -> Result<(), ChatError> {
        let key = (feedback.session_id.clone(), message_id.clone());
        match result {
            Ok(()) => {
                info!(%message_id, rating = feedback.rating, "Rating submitted");
                self.states.insert(key, RatingState::Rated(feedback.rating));
                Ok(())
            }
            Err(e) => {
                self.states.remove(&key);
                let err = ChatError::from(e);
                err.log("submit rating");
                Err(err)
            }
        }
    }

    /// Validates, submits and records one rating.
    pub async fn rate<B: ChatBackend + ?Sized>(
        &mut self,
        ctx: &ChatContext,
        store: &MessageStore,
        backend: &B,
        message_id: &MessageId,
        rating: u8,
    ) -> Result<(), RatingError> {
        let feedback = self.begin_rating(ctx, store, message_id, rating, Utc::now())?;
        let result = backend.submit_feedback(&feedback).await;
        self.finish_rating(&feedback, message_id, result)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    fn ctx() -> ChatContext {
        ChatContext::signed_in(Identity {
            user_id: "u1".to_string(),
            bearer_token: "t".to_string(),
        })
    }

    fn store_with_reply() -> (MessageStore, MessageId) {
        let mut store = MessageStore::new();
        store.append_user_message("What is due?", "s1");
        let id = store.append_assistant_message("Rent.", vec![], "s1", None);
        (store, id)
    }

    #[test]
    fn feedback_carries_both_messages() {
        let (store, id) = store_with_reply();
        let mut tracker = RatingTracker::new();

        let feedback = tracker
            .begin_rating(&ctx(), &store, &id, 4, Utc::now())
            .unwrap();

        assert_eq!(feedback.user_id, "u1");
        assert_eq!(feedback.session_id, "s1");
        assert_eq!(feedback.user_message, "What is due?");
        assert_eq!(feedback.ai_message, "Rent.");
        assert_eq!(tracker.state("s1", &id), RatingState::Submitting(4));
    }

    #[test]
    fn rejects_invalid_targets() {
        let (store, id) = store_with_reply();
        let mut tracker = RatingTracker::new();

        assert_eq!(
            tracker.begin_rating(&ctx(), &store, &id, 0, Utc::now()),
            Err(RatingRejected::OutOfRange(0))
        );
        assert_eq!(
            tracker.begin_rating(&ctx(), &store, &id, 6, Utc::now()),
            Err(RatingRejected::OutOfRange(6))
        );
        assert_eq!(
            tracker.begin_rating(&ctx(), &store, &MessageId::welcome(), 5, Utc::now()),
            Err(RatingRejected::NotEligible(MessageId::welcome()))
        );
        assert_eq!(
            tracker.begin_rating(&ctx(), &store, &MessageId::at(1), 5, Utc::now()),
            Err(RatingRejected::NotEligible(MessageId::at(1)))
        );
        assert_eq!(
            tracker.begin_rating(&ChatContext::default(), &store, &id, 5, Utc::now()),
            Err(RatingRejected::SignInRequired)
        );
    }

    #[test]
    fn rated_once() {
        let (store, id) = store_with_reply();
        let mut tracker = RatingTracker::new();

        let feedback = tracker
            .begin_rating(&ctx(), &store, &id, 5, Utc::now())
            .unwrap();
        assert_eq!(
            tracker.begin_rating(&ctx(), &store, &id, 3, Utc::now()),
            Err(RatingRejected::InFlight)
        );

        tracker.finish_rating(&feedback, &id, Ok(())).unwrap();
        assert_eq!(tracker.state("s1", &id), RatingState::Rated(5));
        assert_eq!(
            tracker.begin_rating(&ctx(), &store, &id, 3, Utc::now()),
            Err(RatingRejected::AlreadyRated(5))
        );
    }

    #[test]
    fn failure_allows_retry() {
        let (store, id) = store_with_reply();
        let mut tracker = RatingTracker::new();

        let feedback = tracker
            .begin_rating(&ctx(), &store, &id, 2, Utc::now())
            .unwrap();
        let result = tracker.finish_rating(
            &feedback,
            &id,
            Err(ApiError::Api {
                status: 500,
                message: "oops".to_string(),
            }),
        );

        assert!(result.is_err());
        assert_eq!(tracker.state("s1", &id), RatingState::Unrated);
        assert!(tracker.begin_rating(&ctx(), &store, &id, 2, Utc::now()).is_ok());
    }
}
