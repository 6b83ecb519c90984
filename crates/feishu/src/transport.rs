//! Seams to the Feishu SDK: credential probing and the websocket client.

use std::sync::Arc;

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
};

use crate::{config::FeishuAccountConfig, dispatch::EventDispatcher};

/// Outcome of checking the app credentials against the open platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    pub ok: bool,
    /// The bot's own `open_id`, used to filter its own messages.
    pub bot_open_id: Option<String>,
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn connected(bot_open_id: impl Into<String>) -> Self {
        Self {
            ok: true,
            bot_open_id: Some(bot_open_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            bot_open_id: None,
            error: Some(error.into()),
        }
    }
}

/// Resolves the bot identity for a configured app.
#[async_trait]
pub trait ConnectionProber: Send + Sync {
    async fn probe(&self, config: &FeishuAccountConfig) -> ProbeResult;
}

/// When the websocket client plans to reconnect next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectInfo {
    /// Unix epoch milliseconds.
    pub next_connect_time_ms: i64,
}

impl ReconnectInfo {
    pub fn next_connect_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.next_connect_time_ms)
    }
}

/// A live websocket session with the event backend.
#[async_trait]
pub trait FeishuConnection: Send + Sync {
    /// Open the connection and start feeding events into `dispatcher`.
    ///
    /// Returns once the client is running; events keep arriving afterwards
    /// until the connection is dropped.
    async fn start(&self, dispatcher: Arc<EventDispatcher>) -> anyhow::Result<()>;

    /// Pending reconnect, if the client exposes one. Clients that cannot
    /// report this keep the default, which callers treat as non-fatal.
    fn reconnect_info(&self) -> anyhow::Result<Option<ReconnectInfo>> {
        Err(anyhow::anyhow!("reconnect info not supported"))
    }
}

/// Builds websocket clients from account config.
pub trait TransportFactory: Send + Sync {
    fn connect(&self, config: &FeishuAccountConfig) -> anyhow::Result<Arc<dyn FeishuConnection>>;
}
