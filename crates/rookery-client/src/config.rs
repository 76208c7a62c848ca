//! Client configuration from the environment.

use rookery_core::PlayerId;
use thiserror::Error;

pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:5000/ws";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a number below 10000, got '{value}'")]
    InvalidPlayerId { var: &'static str, value: String },

    #[error("{var} must be a ws:// or wss:// URL, got '{value}'")]
    InvalidServerUrl { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// WebSocket endpoint of the game server
    pub server_url: String,
    /// Id sent with every message; random unless pinned
    pub player_id: PlayerId,
    /// `tracing` filter directive
    pub log_filter: String,
}

impl ClientConfig {
    /// Read `ROOKERY_SERVER_URL`, `ROOKERY_PLAYER_ID` and `RUST_LOG`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_url = lookup("ROOKERY_SERVER_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.into());
        if !(server_url.starts_with("ws://") || server_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidServerUrl {
                var: "ROOKERY_SERVER_URL",
                value: server_url,
            });
        }

        let player_id = match lookup("ROOKERY_PLAYER_ID") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|id| *id < 10_000)
                .map(PlayerId)
                .ok_or(ConfigError::InvalidPlayerId {
                    var: "ROOKERY_PLAYER_ID",
                    value,
                })?,
            None => PlayerId::random(),
        };

        let log_filter = lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.into());

        Ok(Self {
            server_url,
            player_id,
            log_filter,
        })
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
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert!(config.player_id.0 < 10_000);
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("ROOKERY_SERVER_URL", "wss://chess.example/ws"),
            ("ROOKERY_PLAYER_ID", "42"),
            ("RUST_LOG", "debug"),
        ]))
        .unwrap();
        assert_eq!(config.server_url, "wss://chess.example/ws");
        assert_eq!(config.player_id, PlayerId(42));
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_bad_player_id() {
        for bad in ["abc", "10000", "-1"] {
            let result = ClientConfig::from_lookup(lookup(&[("ROOKERY_PLAYER_ID", bad)]));
            assert!(
                matches!(result, Err(ConfigError::InvalidPlayerId { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_bad_url() {
        let result =
            ClientConfig::from_lookup(lookup(&[("ROOKERY_SERVER_URL", "http://127.0.0.1")]));
        assert!(matches!(result, Err(ConfigError::InvalidServerUrl { .. })));
    }
}
