use crate::error::ChatError;

/// The signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub bearer_token: String,
}

/// Explicit per-client state that would otherwise be global: who is signed in.
#[derive(Debug, Clone, Default)]
pub struct ChatContext {
    identity: Option<Identity>,
}

impl ChatContext {
    pub fn new(identity: Option<Identity>) -> Self {
        Self { identity }
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn require_identity(&self) -> Result<&Identity, ChatError> {
        self.identity.as_ref().ok_or(ChatError::AuthRequired)
    }
}
