use std::sync::Arc;

use {async_trait::async_trait, serde_json::Value};

use crate::{config::FeishuAccountConfig, events::MessageReceiveEvent, history::HistoryStore};

/// Everything a message handler gets for one inbound message.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub config: Arc<FeishuAccountConfig>,
    /// Typed view of the payload. Fields that did not match the schema are
    /// defaulted; `raw` has the original.
    pub event: MessageReceiveEvent,
    pub raw: Value,
    /// `None` when the credential probe failed; self-message filtering is
    /// then up to the handler.
    pub bot_open_id: Option<String>,
    pub history: HistoryStore,
}

/// Processes inbound messages (access control, agent call, reply).
///
/// Errors are logged by the gateway and never stop the connection.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, inbound: InboundMessage) -> anyhow::Result<()>;
}
