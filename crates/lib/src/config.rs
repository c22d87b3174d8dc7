//! Configuration types and loading.
//!
//! Config is loaded once at startup from a JSON file (e.g. `~/.instarelay/config.json`) and
//! environment; it is immutable afterwards.

use crate::channels::TelegramSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Destination channel settings (Telegram).
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Forwarding behavior.
    #[serde(default)]
    pub forwarding: ForwardingConfig,
}

/// Gateway bind, port, body limit and webhook verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// HTTP port (default 3000). Overridden by PORT env.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1", loopback only). Set "0.0.0.0" or BIND env to accept
    /// webhook deliveries from outside the host.
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Max accepted webhook body size in bytes (default 5 MiB).
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Expected hub.verify_token for the webhook handshake. Overridden by VERIFY_TOKEN env.
    pub verify_token: Option<String>,
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_body_limit() -> usize {
    5 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            body_limit_bytes: default_body_limit(),
            verify_token: None,
        }
    }
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: TelegramChannelConfig,
}

/// Telegram channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramChannelConfig {
    /// Bot token from BotFather. Overridden by TELEGRAM_BOT_TOKEN env when set.
    pub bot_token: Option<String>,
    /// Destination chat id. Overridden by TELEGRAM_CHAT_ID env when set.
    pub chat_id: Option<String>,
    /// Bot API base url (default https://api.telegram.org). Overridden by TELEGRAM_API_BASE env.
    pub api_base: Option<String>,
    /// Per-request timeout in seconds for media downloads and uploads. Unset = no timeout.
    pub request_timeout_secs: Option<u64>,
    /// Directory for temporary media files (default: system temp dir).
    pub temp_dir: Option<PathBuf>,
}

/// Forwarding options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardingConfig {
    /// Also relay every webhook body as a text message (diagnostics).
    #[serde(default)]
    pub relay_raw_payload: bool,
}

/// Non-blank, trimmed env var.
fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Env `key` wins over the config value; blank values on either side count as unset.
fn env_or(key: &str, value: Option<&String>) -> Option<String> {
    env_nonempty(key).or_else(|| {
        value
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Resolve the Telegram bot token: env TELEGRAM_BOT_TOKEN overrides config.
pub fn resolve_telegram_token(config: &Config) -> Option<String> {
    env_or("TELEGRAM_BOT_TOKEN", config.channels.telegram.bot_token.as_ref())
}

/// Resolve the destination chat: env TELEGRAM_CHAT_ID overrides config.
pub fn resolve_telegram_chat_id(config: &Config) -> Option<String> {
    env_or("TELEGRAM_CHAT_ID", config.channels.telegram.chat_id.as_ref())
}

/// Resolve the webhook verify token: env VERIFY_TOKEN overrides config.
pub fn resolve_verify_token(config: &Config) -> Option<String> {
    env_or("VERIFY_TOKEN", config.gateway.verify_token.as_ref())
}

/// Everything the Telegram channel needs, with env overrides applied.
pub fn resolve_telegram_settings(config: &Config) -> TelegramSettings {
    let telegram = &config.channels.telegram;
    TelegramSettings {
        bot_token: resolve_telegram_token(config),
        chat_id: resolve_telegram_chat_id(config),
        api_base: env_or("TELEGRAM_API_BASE", telegram.api_base.as_ref()),
        request_timeout: telegram.request_timeout_secs.map(Duration::from_secs),
        temp_dir: telegram.temp_dir.clone(),
    }
}

/// Apply PORT and BIND env to the gateway. Unparseable ports are ignored with a warning.
pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides_from(config, env_nonempty);
}

fn apply_overrides_from(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(port) = lookup("PORT") {
        match port.parse::<u16>() {
            Ok(p) => config.gateway.port = p,
            Err(_) => log::warn!("ignoring invalid PORT value: {}", port),
        }
    }
    if let Some(bind) = lookup("BIND") {
        config.gateway.bind = bind;
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("INSTARELAY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".instarelay").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, else the default path (or INSTARELAY_CONFIG_PATH).
/// Missing file => default config. Env overrides are applied.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let mut config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    apply_env_overrides(&mut config);
    Ok((config, path))
}
