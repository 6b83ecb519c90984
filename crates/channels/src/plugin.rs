use {anyhow::Result, async_trait::async_trait};

/// Sink for runtime requests from channel plugins. The host provides the
/// concrete implementation.
#[async_trait]
pub trait ChannelEventSink: Send + Sync {
    /// Request disabling a channel account due to a runtime error.
    ///
    /// Used when a plugin's background task ends with an error it cannot
    /// recover from (bad credentials, transport refused to start).
    async fn request_disable_account(&self, channel_type: &str, account_id: &str, reason: &str);
}

/// Core channel plugin trait. Each messaging platform implements this.
#[async_trait]
pub trait ChannelPlugin: Send + Sync {
    /// Channel identifier (e.g. "feishu").
    fn id(&self) -> &str;

    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start an account connection.
    async fn start_account(&mut self, account_id: &str, config: serde_json::Value) -> Result<()>;

    /// Stop an account connection.
    async fn stop_account(&mut self, account_id: &str) -> Result<()>;

    /// Get status adapter for health checks.
    fn status(&self) -> Option<&dyn ChannelStatus>;
}

/// Probe channel account health.
#[async_trait]
pub trait ChannelStatus: Send + Sync {
    async fn probe(&self, account_id: &str) -> Result<ChannelHealthSnapshot>;
}

/// Channel health snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHealthSnapshot {
    pub connected: bool,
    pub account_id: String,
    pub details: Option<String>,
}
