use std::path::PathBuf;

use serde::Deserialize;
use thiol_api::{RagClient, StaticToken, TokenEndpoint, DEFAULT_BASE_URL};
use thiol_core::Identity;

use crate::error::ThlError;
use crate::state::default_state_path;

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    pub api_url: Option<String>,
    pub user_id: Option<String>,
    pub bearer_token: Option<String>,
    /// Exchange the bearer token for an API secret here before calling the backend.
    pub token_endpoint: Option<String>,
    pub log_filter: Option<String>,
    pub state_path: Option<PathBuf>,
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("thiol").join("config.toml"))
}

pub fn load_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };

    let Ok(content) = std::fs::read_to_string(path) else {
        return Config::default();
    };

    toml::from_str(&content).unwrap_or_default()
}

/// Effective settings after merging CLI flags, environment and config file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub identity: Option<Identity>,
    pub token_endpoint: Option<String>,
    pub log_filter: String,
    pub state_path: PathBuf,
}

impl Settings {
    pub fn require_identity(&self) -> Result<&Identity, ThlError> {
        self.identity.as_ref().ok_or(ThlError::NotSignedIn)
    }

    /// Builds a backend client using the configured credential source.
    pub fn client(&self) -> Result<RagClient, ThlError> {
        let identity = self.require_identity()?;
        let client = match &self.token_endpoint {
            Some(endpoint) => RagClient::with_base_url(
                &self.api_url,
                TokenEndpoint::new(endpoint, &identity.bearer_token),
            ),
            None => RagClient::with_base_url(&self.api_url, StaticToken::new(&identity.bearer_token)),
        };
        Ok(client)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

pub fn resolve_settings(cli_api_url: Option<String>, cli_user_id: Option<String>) -> Settings {
    merge_settings(load_config(), env_var, cli_api_url, cli_user_id)
}

/// Precedence: CLI flag, then environment, then config file, then default.
fn merge_settings(
    config: Config,
    env: impl Fn(&str) -> Option<String>,
    cli_api_url: Option<String>,
    cli_user_id: Option<String>,
) -> Settings {
    let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());

    let api_url = non_empty(cli_api_url)
        .or_else(|| env("THIOL_API_URL"))
        .or(non_empty(config.api_url))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let user_id = non_empty(cli_user_id)
        .or_else(|| env("THIOL_USER_ID"))
        .or(non_empty(config.user_id));
    let bearer_token = env("THIOL_TOKEN").or(non_empty(config.bearer_token));

    let identity = match (user_id, bearer_token) {
        (Some(user_id), Some(bearer_token)) => Some(Identity {
            user_id,
            bearer_token,
        }),
        _ => None,
    };

    Settings {
        api_url,
        identity,
        token_endpoint: non_empty(config.token_endpoint),
        log_filter: non_empty(config.log_filter).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        state_path: config.state_path.unwrap_or_else(default_state_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_without_anything() {
        let settings = merge_settings(Config::default(), no_env, None, None);
        assert_eq!(settings.api_url, DEFAULT_BASE_URL);
        assert!(settings.identity.is_none());
        assert_eq!(settings.log_filter, "info");
        assert!(matches!(settings.require_identity(), Err(ThlError::NotSignedIn)));
    }

    #[test]
    fn cli_beats_env_beats_file() {
        let config: Config = toml::from_str(
            r#"
            api_url = "http://file:8000"
            user_id = "file-user"
            bearer_token = "file-token"
            "#,
        )
        .unwrap();
        let env = |name: &str| match name {
            "THIOL_API_URL" => Some("http://env:8000".to_string()),
            "THIOL_USER_ID" => Some("env-user".to_string()),
            _ => None,
        };

        let settings = merge_settings(config, env, None, Some("cli-user".to_string()));

        assert_eq!(settings.api_url, "http://env:8000");
        let identity = settings.identity.unwrap();
        assert_eq!(identity.user_id, "cli-user");
        assert_eq!(identity.bearer_token, "file-token");
    }

    #[test]
    fn identity_needs_user_and_token() {
        let env = |name: &str| (name == "THIOL_USER_ID").then(|| "u1".to_string());
        let settings = merge_settings(Config::default(), env, None, None);
        assert!(settings.identity.is_none());
    }

    #[test]
    fn client_uses_configured_url() {
        let config = Config {
            api_url: Some("http://rag.internal/".to_string()),
            user_id: Some("u1".to_string()),
            bearer_token: Some("t".to_string()),
            ..Config::default()
        };
        let settings = merge_settings(config, no_env, None, None);
        assert_eq!(settings.client().unwrap().base_url(), "http://rag.internal");
    }
}
