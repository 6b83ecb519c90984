use std::time::Duration;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use crate::error::{Context, Error, Result};

/// Default interval between reconnect-status checks (seconds).
pub const DEFAULT_RECONNECT_POLL_INTERVAL_SECS: u64 = 30;

/// Which open platform the app is registered on.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeishuDomain {
    /// Feishu (China mainland).
    #[default]
    Feishu,
    /// Lark (international).
    Lark,
}

impl FeishuDomain {
    /// Base URL of the open platform API for this domain.
    pub fn open_api_base(self) -> &'static str {
        match self {
            Self::Feishu => "https://open.feishu.cn",
            Self::Lark => "https://open.larksuite.com",
        }
    }
}

/// How events reach the gateway.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// Long-lived websocket opened by the bot ("long connection" mode).
    #[default]
    Websocket,
    /// HTTP callbacks pushed by the platform. Not handled by the gateway.
    Webhook,
}

impl std::fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Websocket => "websocket",
            Self::Webhook => "webhook",
        })
    }
}

/// Configuration for the Feishu bot account.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeishuAccountConfig {
    /// App ID from the developer console (`cli_...`).
    pub app_id: String,

    /// App secret from the developer console.
    #[serde(serialize_with = "serialize_secret")]
    pub app_secret: Secret<String>,

    pub domain: FeishuDomain,

    pub connection_mode: ConnectionMode,

    /// Event encryption key. Only meaningful for webhook mode.
    #[serde(
        serialize_with = "serialize_opt_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub encrypt_key: Option<Secret<String>>,

    /// Callback verification token. Only meaningful for webhook mode.
    #[serde(
        serialize_with = "serialize_opt_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub verification_token: Option<Secret<String>>,

    /// Seconds between reconnect-status checks while connected.
    pub reconnect_poll_interval_secs: u64,
}

impl FeishuAccountConfig {
    /// Parse an account config from its stored JSON form.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).context("invalid feishu account config")
    }

    /// Check that the credentials needed to open a connection are present.
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(Error::invalid_config("app_id is required"));
        }
        if self.app_secret.expose_secret().trim().is_empty() {
            return Err(Error::invalid_config("app_secret is required"));
        }
        Ok(())
    }

    pub fn reconnect_poll_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_poll_interval_secs.max(1))
    }
}

impl std::fmt::Debug for FeishuAccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeishuAccountConfig")
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("connection_mode", &self.connection_mode)
            .finish_non_exhaustive()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn serialize_opt_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match secret {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

impl Default for FeishuAccountConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: Secret::new(String::new()),
            domain: FeishuDomain::default(),
            connection_mode: ConnectionMode::default(),
            encrypt_key: None,
            verification_token: None,
            reconnect_poll_interval_secs: DEFAULT_RECONNECT_POLL_INTERVAL_SECS,
        }
    }
}
