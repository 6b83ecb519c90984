//! Test doubles for the gateway's collaborators.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use {async_trait::async_trait, serde_json::Value, tokio::sync::Notify};

use crate::{
    config::FeishuAccountConfig,
    dispatch::EventDispatcher,
    handler::{InboundMessage, MessageHandler},
    history::{Role, Turn},
    transport::{ConnectionProber, FeishuConnection, ProbeResult, ReconnectInfo, TransportFactory},
};

pub(crate) fn receive_payload(message_id: &str) -> Value {
    serde_json::json!({
        "sender": { "sender_id": { "open_id": "ou_user" }, "sender_type": "user" },
        "message": {
            "message_id": message_id,
            "chat_id": "oc_chat",
            "chat_type": "p2p",
            "message_type": "text",
            "content": "{\"text\":\"hello\"}"
        }
    })
}

pub(crate) fn websocket_config() -> FeishuAccountConfig {
    FeishuAccountConfig {
        app_id: "cli_test".into(),
        app_secret: secrecy::Secret::new("secret".into()),
        ..Default::default()
    }
}

/// Records every inbound message; errors or panics on chosen message IDs.
#[derive(Default)]
pub(crate) struct RecordingHandler {
    seen: Mutex<Vec<InboundMessage>>,
    fail_on: Option<String>,
    panic_on: Option<String>,
}

impl RecordingHandler {
    pub fn failing_on(message_id: &str) -> Self {
        Self {
            fail_on: Some(message_id.into()),
            ..Default::default()
        }
    }

    pub fn panicking_on(message_id: &str) -> Self {
        Self {
            panic_on: Some(message_id.into()),
            ..Default::default()
        }
    }

    pub fn message_ids(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|m| m.event.message.message_id.clone())
            .collect()
    }

    pub fn last_inbound(&self) -> Option<InboundMessage> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, inbound: InboundMessage) -> anyhow::Result<()> {
        let message_id = inbound.event.message.message_id.clone();
        inbound.history.push(&inbound.event.message.chat_id, Turn {
            role: Role::User,
            sender: inbound.event.sender.sender_id.open_id.clone(),
            content: inbound.event.text().unwrap_or_default(),
            timestamp_ms: 0,
        });
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(inbound);

        if self.panic_on.as_deref() == Some(message_id.as_str()) {
            panic!("handler blew up on {message_id}");
        }
        if self.fail_on.as_deref() == Some(message_id.as_str()) {
            anyhow::bail!("handler failed on {message_id}");
        }
        Ok(())
    }
}

pub(crate) struct StaticProber {
    result: ProbeResult,
    pub calls: AtomicUsize,
}

impl StaticProber {
    pub fn new(result: ProbeResult) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ConnectionProber for StaticProber {
    async fn probe(&self, _config: &FeishuAccountConfig) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Websocket stand-in. Tests push events through the dispatcher it was
/// started with.
#[derive(Default)]
pub(crate) struct FakeConnection {
    fail_start: Option<String>,
    hang_start: bool,
    reconnect: Option<ReconnectInfo>,
    dispatcher: Mutex<Option<Arc<EventDispatcher>>>,
    pub started: Notify,
    pub reconnect_queries: AtomicUsize,
}

impl FakeConnection {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_start: Some(message.into()),
            ..Default::default()
        }
    }

    /// A client whose `start` never returns. `started` fires on entry.
    pub fn hanging() -> Self {
        Self {
            hang_start: true,
            ..Default::default()
        }
    }

    pub fn with_reconnect(next_connect_time_ms: i64) -> Self {
        Self {
            reconnect: Some(ReconnectInfo {
                next_connect_time_ms,
            }),
            ..Default::default()
        }
    }

    /// Deliver one event the way the SDK would.
    pub async fn deliver(&self, event_type: &str, payload: Value) -> bool {
        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match dispatcher {
            Some(dispatcher) => dispatcher.dispatch(event_type, payload).await,
            None => false,
        }
    }
}

#[async_trait]
impl FeishuConnection for FakeConnection {
    async fn start(&self, dispatcher: Arc<EventDispatcher>) -> anyhow::Result<()> {
        if let Some(message) = &self.fail_start {
            anyhow::bail!("{message}");
        }
        if self.hang_start {
            self.started.notify_one();
            std::future::pending::<()>().await;
        }
        *self.dispatcher.lock().unwrap_or_else(|e| e.into_inner()) = Some(dispatcher);
        self.started.notify_one();
        Ok(())
    }

    fn reconnect_info(&self) -> anyhow::Result<Option<ReconnectInfo>> {
        self.reconnect_queries.fetch_add(1, Ordering::SeqCst);
        match self.reconnect {
            Some(info) => Ok(Some(info)),
            None => anyhow::bail!("reconnect info not supported"),
        }
    }
}

pub(crate) struct FakeTransport {
    connection: Option<Arc<FakeConnection>>,
    pub calls: AtomicUsize,
}

impl FakeTransport {
    pub fn new(connection: Arc<FakeConnection>) -> Self {
        Self {
            connection: Some(connection),
            calls: AtomicUsize::new(0),
        }
    }

    /// A factory whose client construction fails.
    pub fn broken() -> Self {
        Self {
            connection: None,
            calls: AtomicUsize::new(0),
        }
    }
}

impl TransportFactory for FakeTransport {
    fn connect(&self, _config: &FeishuAccountConfig) -> anyhow::Result<Arc<dyn FeishuConnection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.connection {
            Some(connection) => Ok(Arc::clone(connection) as Arc<dyn FeishuConnection>),
            None => anyhow::bail!("missing app credentials"),
        }
    }
}
