use std::{sync::Arc, time::Duration};

use {
    tokio::{task::JoinHandle, time::MissedTickBehavior},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    config::{ConnectionMode, FeishuAccountConfig},
    dispatch::{self, DispatchContext},
    error::{Error, Result},
    handler::MessageHandler,
    history::HistoryStore,
    state::{GatewayPhase, GatewayState},
    transport::{ConnectionProber, FeishuConnection, TransportFactory},
};

/// Arguments for [`FeishuGateway::start`].
#[derive(Debug, Default)]
pub struct StartOptions {
    pub config: Option<FeishuAccountConfig>,
    /// Ends the session when cancelled. Without one, the session only ends
    /// on a start failure.
    pub cancel: Option<CancellationToken>,
}

impl StartOptions {
    pub fn new(config: FeishuAccountConfig) -> Self {
        Self {
            config: Some(config),
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Connection controller for the Feishu event stream.
pub struct FeishuGateway {
    state: Arc<GatewayState>,
    prober: Arc<dyn ConnectionProber>,
    transport: Arc<dyn TransportFactory>,
    handler: Arc<dyn MessageHandler>,
}

impl FeishuGateway {
    pub fn new(
        prober: Arc<dyn ConnectionProber>,
        transport: Arc<dyn TransportFactory>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            state: Arc::new(GatewayState::new()),
            prober,
            transport,
            handler,
        }
    }

    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    /// The bot's `open_id` as resolved by the last successful probe.
    pub fn bot_open_id(&self) -> Option<String> {
        self.state.bot_open_id()
    }

    pub fn phase(&self) -> GatewayPhase {
        self.state.phase()
    }

    pub fn history(&self) -> HistoryStore {
        self.state.history()
    }

    /// Run a gateway session.
    ///
    /// Resolves once `cancel` fires, or right away when the token is already
    /// cancelled or the connection mode is not websocket. Cancellation is
    /// honoured while probing and while the websocket is starting; no client
    /// is created once the token has fired. Fails when no config is given or
    /// the websocket client cannot be started.
    ///
    /// Dropping the returned future releases the connection slot and stops
    /// the reconnect monitor.
    pub async fn start(&self, opts: StartOptions) -> Result<()> {
        let StartOptions { config, cancel } = opts;
        let config = Arc::new(config.ok_or(Error::NotConfigured)?);
        let cancel = cancel.unwrap_or_default();

        if cancel.is_cancelled() {
            info!("feishu gateway cancelled before start");
            self.state.set_phase(GatewayPhase::Stopped);
            return Ok(());
        }

        self.state.set_phase(GatewayPhase::Probing);
        let probe = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            probe = self.prober.probe(&config) => Some(probe),
        };
        let Some(probe) = probe else {
            info!("feishu gateway cancelled while probing");
            self.state.set_phase(GatewayPhase::Stopped);
            return Ok(());
        };
        if probe.ok {
            if let Some(bot_open_id) = probe.bot_open_id {
                info!(bot_open_id, "feishu bot identity resolved");
                self.state.set_bot_open_id(Some(bot_open_id));
            }
        } else {
            warn!(
                error = probe.error.as_deref().unwrap_or("unknown"),
                "feishu probe failed, continuing without bot identity"
            );
        }

        if config.connection_mode != ConnectionMode::Websocket {
            info!(
                mode = %config.connection_mode,
                "feishu gateway only supports websocket mode, not starting"
            );
            self.state.set_phase(GatewayPhase::Stopped);
            return Ok(());
        }

        if cancel.is_cancelled() {
            info!("feishu gateway cancelled before connecting");
            self.state.set_phase(GatewayPhase::Stopped);
            return Ok(());
        }

        self.state.set_phase(GatewayPhase::Connecting);
        let connection = match self.transport.connect(&config) {
            Ok(connection) => connection,
            Err(e) => {
                error!(error = %e, "failed to create feishu websocket client");
                self.state.set_phase(GatewayPhase::Failed);
                return Err(Error::transport("failed to create feishu websocket client", e));
            },
        };

        let dispatcher = Arc::new(dispatch::build_dispatcher(DispatchContext {
            config: Arc::clone(&config),
            state: Arc::clone(&self.state),
            handler: Arc::clone(&self.handler),
        }));

        let session_id = self.state.install_connection(Arc::clone(&connection));
        let mut session = SessionGuard {
            state: Arc::clone(&self.state),
            session_id,
            monitor: None,
        };
        info!(session_id, app_id = config.app_id, "starting feishu websocket");

        let started = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            started = connection.start(dispatcher) => Some(started),
        };
        match started {
            None => {
                info!(session_id, "feishu gateway cancelled while connecting");
                drop(session);
                self.state.set_phase(GatewayPhase::Stopped);
                return Ok(());
            },
            Some(Err(e)) => {
                error!(session_id, error = %e, "feishu websocket failed to start");
                drop(session);
                self.state.set_phase(GatewayPhase::Failed);
                return Err(Error::transport("failed to start feishu websocket", e));
            },
            Some(Ok(())) => {},
        }

        self.state.set_phase(GatewayPhase::Running);
        info!(session_id, "feishu websocket running");

        session.monitor = Some(spawn_reconnect_monitor(
            Arc::clone(&connection),
            config.reconnect_poll_interval(),
            cancel.child_token(),
        ));

        cancel.cancelled().await;

        info!(session_id, "feishu gateway cancelled");
        drop(session);
        self.state.set_phase(GatewayPhase::Stopped);
        Ok(())
    }

    /// Clear connection handle, bot identity, history and dedup cache.
    ///
    /// Does not end a running [`start`](Self::start); cancel its token for
    /// that. Safe to call at any time, any number of times.
    pub fn stop(&self) {
        self.state.reset();
        debug!("feishu gateway state cleared");
    }
}

/// Releases one session's resources when `start` returns or its future is
/// dropped: stops the reconnect monitor and frees the connection slot if the
/// session still owns it.
struct SessionGuard {
    state: Arc<GatewayState>,
    session_id: u64,
    monitor: Option<JoinHandle<()>>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
        if self.state.clear_connection(self.session_id) {
            debug!(session_id = self.session_id, "feishu connection released");
            self.state.set_phase(GatewayPhase::Stopped);
        }
    }
}

/// Periodically log when the client plans its next reconnect.
fn spawn_reconnect_monitor(
    connection: Arc<dyn FeishuConnection>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => log_reconnect_info(connection.as_ref()),
            }
        }
    })
}

fn log_reconnect_info(connection: &dyn FeishuConnection) {
    // Best effort: clients without reconnect info are fine.
    let Ok(Some(info)) = connection.reconnect_info() else {
        return;
    };
    match info.next_connect_at() {
        Some(at) => info!(
            next_connect_at = %at.to_rfc3339(),
            "feishu websocket reconnect scheduled"
        ),
        None => info!(
            next_connect_time_ms = info.next_connect_time_ms,
            "feishu websocket reconnect scheduled"
        ),
    }
}
