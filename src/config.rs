//! Server configuration from environment variables

use crate::state_machine::Pacing;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a number, got {value:?}")]
    NotANumber { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub data_path: PathBuf,
    /// Allowed CORS origin; any origin when unset
    pub frontend_url: Option<String>,
    /// Built widget frontend, served at `/` when set
    pub static_dir: Option<PathBuf>,
    pub pacing: Pacing,
    /// Widget sessions untouched this long are dropped
    pub session_idle: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            data_path: PathBuf::from("data/leads.json"),
            frontend_url: None,
            static_dir: None,
            pacing: Pacing::default(),
            session_idle: Duration::from_secs(30 * 60),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from any variable source. Unset or blank variables
    /// fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = match get("LEADCHAT_PORT") {
            Some(v) => parse_number("LEADCHAT_PORT", &v)?,
            None => defaults.port,
        };
        let bubble = match get("LEADCHAT_BUBBLE_DELAY_MS") {
            Some(v) => Duration::from_millis(parse_number("LEADCHAT_BUBBLE_DELAY_MS", &v)?),
            None => defaults.pacing.bubble,
        };
        let settle = match get("LEADCHAT_SETTLE_DELAY_MS") {
            Some(v) => Duration::from_millis(parse_number("LEADCHAT_SETTLE_DELAY_MS", &v)?),
            None => defaults.pacing.settle,
        };
        let session_idle = match get("LEADCHAT_SESSION_IDLE_SECS") {
            Some(v) => Duration::from_secs(parse_number("LEADCHAT_SESSION_IDLE_SECS", &v)?),
            None => defaults.session_idle,
        };

        Ok(Self {
            port,
            data_path: get("LEADCHAT_DATA_PATH").map_or(defaults.data_path, PathBuf::from),
            frontend_url: get("LEADCHAT_FRONTEND_URL"),
            static_dir: get("LEADCHAT_STATIC_DIR").map(PathBuf::from),
            pacing: Pacing { settle, bubble },
            session_idle,
        })
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::NotANumber {
        var,
        value: value.to_string(),
    })
}
