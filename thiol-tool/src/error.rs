use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThlError {
    #[error("Not signed in. Set THIOL_USER_ID and THIOL_TOKEN or configure ~/.config/thiol/config.toml")]
    NotSignedIn,

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Failed to encode state: {0}")]
    StateEncode(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] thiol_api::ApiError),

    #[error("Chat error: {0}")]
    Chat(#[from] thiol_core::ChatError),
}
