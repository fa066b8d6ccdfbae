//! Process configuration from the environment

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_DB_PATH: &str = "appointments.db";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Settings for one bot process
#[derive(Clone, PartialEq, Eq)]
pub struct BotConfig {
    /// Telegram bot token; `None` runs the HTTP surface only
    pub bot_token: Option<String>,
    pub db_path: PathBuf,
    pub port: u16,
    /// Long-poll window for `getUpdates`
    pub poll_timeout: Duration,
    pub telegram_api_url: String,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .field("db_path", &self.db_path)
            .field("port", &self.port)
            .field("poll_timeout", &self.poll_timeout)
            .field("telegram_api_url", &self.telegram_api_url)
            .finish()
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match var("INTAKE_PORT") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "INTAKE_PORT",
                expected: "a TCP port number",
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let poll_timeout_secs = match var("INTAKE_POLL_TIMEOUT_SECS") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "INTAKE_POLL_TIMEOUT_SECS",
                expected: "a whole number of seconds",
                value,
            })?,
            None => DEFAULT_POLL_TIMEOUT_SECS,
        };

        Ok(Self {
            bot_token: var("BOT_TOKEN").map(|t| t.trim().to_string()),
            db_path: var("INTAKE_DB_PATH").map_or_else(|| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from),
            port,
            poll_timeout: Duration::from_secs(poll_timeout_secs),
            telegram_api_url: var("TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
        })
    }
}
