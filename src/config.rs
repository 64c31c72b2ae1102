//! Process configuration
//!
//! Everything is read once at startup from the environment and then passed
//! around as an immutable value.

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_MAX_TOKENS: u64 = 80_000;
pub const DEFAULT_MAX_LOOP_CYCLES: u32 = 3;

const DEFAULT_AUTH_URL: &str = "https://ngw.devices.sberbank.ru:9443/api/v2/oauth";
const DEFAULT_API_URL: &str = "https://gigachat.devices.sberbank.ru/api/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Limits for the conversation loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Token budget; a classifier reply at or above it triggers compaction
    pub max_tokens: u64,
    /// Maximum number of classifications per request
    pub max_loop_cycles: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            max_loop_cycles: DEFAULT_MAX_LOOP_CYCLES,
        }
    }
}

/// Settings for the GigaChat classifier client
#[derive(Debug, Clone)]
pub struct GigaChatConfig {
    /// Base64 authorization key
    pub credentials: Option<String>,
    /// File holding the authorization key, used when `credentials` is unset
    pub credentials_file: Option<PathBuf>,
    /// Trust-anchor certificate for the GigaChat endpoints
    pub ca_bundle_path: PathBuf,
    pub scope: String,
    pub model: String,
    pub auth_url: String,
    pub api_url: String,
    pub timeout_secs: u64,
}

impl Default for GigaChatConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            credentials_file: None,
            ca_bundle_path: PathBuf::from("russian_trusted_root_ca.cer"),
            scope: "GIGACHAT_API_PERS".to_string(),
            model: "GigaChat".to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 120,
        }
    }
}

/// HTTP server and storage settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            db_path: PathBuf::from("data/database.db"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub agent: LoopConfig,
    pub gigachat: GigaChatConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |name: &str, default: String| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default)
        };

        let agent = LoopConfig {
            max_tokens: parse_var(&lookup, "AGENT_MAX_TOKENS", defaults.agent.max_tokens)?,
            max_loop_cycles: parse_var(
                &lookup,
                "AGENT_MAX_LOOP_CYCLES",
                defaults.agent.max_loop_cycles,
            )?,
        };

        let gigachat = GigaChatConfig {
            credentials: lookup("GIGACHAT_CREDENTIALS").filter(|v| !v.trim().is_empty()),
            credentials_file: lookup("GIGACHAT_CREDENTIALS_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            ca_bundle_path: lookup("GIGACHAT_CA_BUNDLE")
                .filter(|v| !v.trim().is_empty())
                .map_or(defaults.gigachat.ca_bundle_path, PathBuf::from),
            scope: text("GIGACHAT_SCOPE", defaults.gigachat.scope),
            model: text("GIGACHAT_MODEL", defaults.gigachat.model),
            auth_url: text("GIGACHAT_AUTH_URL", defaults.gigachat.auth_url),
            api_url: text("GIGACHAT_API_URL", defaults.gigachat.api_url),
            timeout_secs: parse_var(
                &lookup,
                "GIGACHAT_TIMEOUT_SECS",
                defaults.gigachat.timeout_secs,
            )?,
        };

        let server = ServerConfig {
            host: text("AGENT_HOST", defaults.server.host),
            port: parse_var(&lookup, "AGENT_PORT", defaults.server.port)?,
            db_path: lookup("AGENT_DB_PATH")
                .filter(|v| !v.trim().is_empty())
                .map_or(defaults.server.db_path, PathBuf::from),
        };

        Ok(Self {
            agent,
            gigachat,
            server,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) if value.trim().is_empty() => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}
