use std::sync::Arc;

use {
    anyhow::Result,
    async_trait::async_trait,
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use moltis_channels::{
    ChannelEventSink, Error as ChannelError,
    plugin::{ChannelHealthSnapshot, ChannelPlugin, ChannelStatus},
};

use crate::{
    config::FeishuAccountConfig,
    gateway::{FeishuGateway, StartOptions},
    handler::MessageHandler,
    state::GatewayPhase,
    transport::{ConnectionProber, TransportFactory},
};

const CHANNEL_ID: &str = "feishu";

/// The account whose gateway session is currently running.
struct ActiveAccount {
    account_id: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Feishu channel plugin.
///
/// Runs a single bot account at a time on top of one [`FeishuGateway`].
pub struct FeishuPlugin {
    gateway: Arc<FeishuGateway>,
    active: Option<ActiveAccount>,
    event_sink: Option<Arc<dyn ChannelEventSink>>,
}

impl FeishuPlugin {
    pub fn new(
        prober: Arc<dyn ConnectionProber>,
        transport: Arc<dyn TransportFactory>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            gateway: Arc::new(FeishuGateway::new(prober, transport, handler)),
            active: None,
            event_sink: None,
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn ChannelEventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn gateway(&self) -> &Arc<FeishuGateway> {
        &self.gateway
    }

    /// The running account, if its session has not ended yet.
    pub fn active_account(&self) -> Option<&str> {
        self.active
            .as_ref()
            .filter(|a| !a.task.is_finished())
            .map(|a| a.account_id.as_str())
    }
}

impl Drop for FeishuPlugin {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(
                account_id = active.account_id,
                "feishu plugin dropped, cancelling session"
            );
            active.cancel.cancel();
        }
    }
}

#[async_trait]
impl ChannelPlugin for FeishuPlugin {
    fn id(&self) -> &str {
        CHANNEL_ID
    }

    fn name(&self) -> &str {
        "Feishu"
    }

    async fn start_account(&mut self, account_id: &str, config: serde_json::Value) -> Result<()> {
        if let Some(running) = self.active_account() {
            return Err(ChannelError::invalid_input(format!(
                "feishu account {running} is already running"
            ))
            .into());
        }

        let config = FeishuAccountConfig::from_json(config)?;
        config.validate()?;

        info!(account_id, app_id = config.app_id, "starting feishu account");

        let cancel = CancellationToken::new();
        let opts = StartOptions::new(config).with_cancel(cancel.clone());
        let gateway = Arc::clone(&self.gateway);
        let event_sink = self.event_sink.clone();
        let aid = account_id.to_string();

        let task = tokio::spawn(async move {
            match gateway.start(opts).await {
                Ok(()) => info!(account_id = aid, "feishu gateway session ended"),
                Err(e) => {
                    error!(account_id = aid, error = %e, "feishu gateway session failed");
                    if let Some(sink) = event_sink {
                        sink.request_disable_account(CHANNEL_ID, &aid, &e.to_string())
                            .await;
                    }
                },
            }
        });

        self.active = Some(ActiveAccount {
            account_id: account_id.to_string(),
            cancel,
            task,
        });
        Ok(())
    }

    async fn stop_account(&mut self, account_id: &str) -> Result<()> {
        match self.active.take_if(|a| a.account_id == account_id) {
            Some(active) => {
                info!(account_id, "stopping feishu account");
                active.cancel.cancel();
                self.gateway.stop();
                if let Err(e) = active.task.await {
                    warn!(account_id, error = %e, "feishu gateway task ended abnormally");
                }
            },
            None => warn!(account_id, "feishu account not found"),
        }
        Ok(())
    }

    fn status(&self) -> Option<&dyn ChannelStatus> {
        Some(self)
    }
}

#[async_trait]
impl ChannelStatus for FeishuPlugin {
    async fn probe(&self, account_id: &str) -> Result<ChannelHealthSnapshot> {
        if self.active.as_ref().map(|a| a.account_id.as_str()) != Some(account_id) {
            return Err(ChannelError::unknown_account(account_id).into());
        }

        let phase = self.gateway.phase();
        let connected = phase == GatewayPhase::Running && self.gateway.state().has_connection();
        let details = match self.gateway.bot_open_id() {
            Some(bot) => format!("{}, bot: {bot}", phase.as_str()),
            None => phase.as_str().to_string(),
        };

        Ok(ChannelHealthSnapshot {
            connected,
            account_id: account_id.to_string(),
            details: Some(details),
        })
    }
}
