use std::net::SocketAddr;
use std::path::PathBuf;

use crate::completion::DEFAULT_MODEL;

/// Application-level constants
pub const APP_NAME: &str = "Roomchat";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variables read at startup.
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "ROOMCHAT_OPENAI_BASE_URL";
pub const ENV_MODEL: &str = "ROOMCHAT_MODEL";
pub const ENV_BIND: &str = "ROOMCHAT_BIND";
pub const ENV_DB_PATH: &str = "ROOMCHAT_DB_PATH";
pub const ENV_EDGE_URL: &str = "ROOMCHAT_EDGE_URL";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing completion API key: set OPENAI_API_KEY")]
    MissingApiKey,
    #[error("Invalid URL in {var}: {value}")]
    InvalidUrl { var: &'static str, value: String },
    #[error("Invalid bind address {0}")]
    InvalidBind(String),
    #[error("Cannot determine home directory; set ROOMCHAT_DB_PATH")]
    NoDataDir,
}

/// Get the application data directory (~/.roomchat)
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".roomchat"))
}

/// Default filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,roomchat_lib=debug"
}

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub openai_base_url: String,
    pub model: String,
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    /// When set, chat sessions fetch completions from this edge endpoint
    /// (`.../api/response`) instead of calling the remote API in-process.
    pub edge_url: Option<String>,
}

impl AppConfig {
    /// Read configuration from the process environment.
    /// A missing API key is fatal.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through `lookup` (environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get(ENV_API_KEY).ok_or(ConfigError::MissingApiKey)?;

        let openai_base_url = get(ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        validate_url(ENV_BASE_URL, &openai_base_url)?;

        let edge_url = get(ENV_EDGE_URL);
        if let Some(url) = &edge_url {
            validate_url(ENV_EDGE_URL, url)?;
        }

        let bind_text = get(ENV_BIND).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_text
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBind(bind_text.clone()))?;

        let db_path = match get(ENV_DB_PATH) {
            Some(path) => PathBuf::from(path),
            None => app_data_dir()
                .ok_or(ConfigError::NoDataDir)?
                .join("roomchat.db"),
        };

        Ok(Self {
            api_key,
            openai_base_url: openai_base_url.trim_end_matches('/').to_string(),
            model: get(ENV_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            bind,
            db_path,
            edge_url,
        })
    }
}

fn validate_url(var: &'static str, value: &str) -> Result<(), ConfigError> {
    let parsed = reqwest::Url::parse(value).map_err(|_| ConfigError::InvalidUrl {
        var,
        value: value.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(ConfigError::InvalidUrl {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let err = AppConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let err = AppConfig::from_lookup(lookup(&[(ENV_API_KEY, "   ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn defaults_applied() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "sk-1"),
            (ENV_DB_PATH, "/tmp/rc.db"),
        ]))
        .unwrap();
        assert_eq!(config.api_key, "sk-1");
        assert_eq!(config.openai_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.bind, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.db_path, PathBuf::from("/tmp/rc.db"));
        assert!(config.edge_url.is_none());
    }

    #[test]
    fn overrides_applied() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "sk-1"),
            (ENV_BASE_URL, "http://localhost:8080/v1/"),
            (ENV_MODEL, "gpt-4o-mini"),
            (ENV_BIND, "0.0.0.0:9000"),
            (ENV_DB_PATH, "/tmp/x.db"),
            (ENV_EDGE_URL, "http://edge.local/api/response"),
        ]))
        .unwrap();
        assert_eq!(config.openai_base_url, "http://localhost:8080/v1");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(
            config.edge_url.as_deref(),
            Some("http://edge.local/api/response")
        );
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = AppConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "sk-1"),
            (ENV_BASE_URL, "ftp://example.com"),
            (ENV_DB_PATH, "/tmp/x.db"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { var: ENV_BASE_URL, .. }));
    }

    #[test]
    fn rejects_bad_bind() {
        let err = AppConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "sk-1"),
            (ENV_BIND, "localhost"),
            (ENV_DB_PATH, "/tmp/x.db"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBind(_)));
    }

    #[test]
    fn app_data_dir_under_home() {
        if let (Some(dir), Some(home)) = (app_data_dir(), dirs::home_dir()) {
            assert!(dir.starts_with(home));
            assert!(dir.ends_with(".roomchat"));
        }
    }

    #[test]
    fn app_name_is_roomchat() {
        assert_eq!(APP_NAME, "Roomchat");
    }
}
