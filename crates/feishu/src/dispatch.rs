//! Event-type routing for the Feishu event stream.

use std::{any::Any, collections::HashMap, panic::AssertUnwindSafe, sync::Arc};

use {
    futures::{FutureExt, future::BoxFuture},
    serde_json::Value,
    tokio::task::JoinHandle,
    tracing::{debug, error, info, warn},
};

use crate::{
    config::FeishuAccountConfig,
    events::{self, BotMembershipEvent, MessageReceiveEvent},
    handler::{InboundMessage, MessageHandler},
    state::GatewayState,
};

/// Handler invoked with the raw payload of one event type.
pub type EventHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, ()> + Send + Sync>;

/// Maps event types to handlers.
///
/// A panicking handler is caught and logged, so one bad event never takes
/// down the connection driving the dispatcher.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    handlers: HashMap<String, EventHandler>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(mut self, event_type: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: EventHandler = Arc::new(move |payload| handler(payload).boxed());
        self.handlers.insert(event_type.into(), handler);
        self
    }

    pub fn handles(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Registered event types, sorted.
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Run the handler for `event_type`. Returns `false` when no handler is
    /// registered for it.
    pub async fn dispatch(&self, event_type: &str, payload: Value) -> bool {
        let Some(handler) = self.handlers.get(event_type) else {
            debug!(event_type, "no handler for feishu event");
            return false;
        };
        if let Err(panic) = AssertUnwindSafe(handler(payload)).catch_unwind().await {
            error!(
                event_type,
                panic = panic_message(panic.as_ref()),
                "feishu event handler panicked"
            );
        }
        true
    }

    /// Dispatch on a separate task so a slow handler does not hold up the
    /// caller's read loop.
    pub fn spawn_dispatch(self: &Arc<Self>, event_type: &str, payload: Value) -> JoinHandle<bool> {
        let dispatcher = Arc::clone(self);
        let event_type = event_type.to_string();
        tokio::spawn(async move { dispatcher.dispatch(&event_type, payload).await })
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("event_types", &self.event_types())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// What the gateway's handlers need for one session.
#[derive(Clone)]
pub(crate) struct DispatchContext {
    pub config: Arc<FeishuAccountConfig>,
    pub state: Arc<GatewayState>,
    pub handler: Arc<dyn MessageHandler>,
}

/// Dispatcher for the four event types the gateway subscribes to.
pub(crate) fn build_dispatcher(ctx: DispatchContext) -> EventDispatcher {
    EventDispatcher::new()
        .register(events::MESSAGE_RECEIVE, move |payload| {
            let ctx = ctx.clone();
            async move { on_message_receive(&ctx, payload).await }
        })
        .register(events::MESSAGE_READ, |_payload| async {})
        .register(events::BOT_ADDED, |payload| async move {
            on_bot_membership(payload, true);
        })
        .register(events::BOT_DELETED, |payload| async move {
            on_bot_membership(payload, false);
        })
}

async fn on_message_receive(ctx: &DispatchContext, payload: Value) {
    let message_id = events::message_id(&payload).map(str::to_string);
    if let Some(id) = message_id.as_deref()
        && !ctx.state.record_message(id)
    {
        debug!(message_id = id, "skipping duplicate feishu message");
        return;
    }

    let (event, parse_error) = MessageReceiveEvent::from_payload(&payload);
    if let Some(e) = parse_error {
        warn!(
            message_id = ?message_id,
            error = %e,
            "feishu message event does not match the typed schema, passing it on partially parsed"
        );
    }
    let chat_id = event.message.chat_id.clone();

    let inbound = InboundMessage {
        config: Arc::clone(&ctx.config),
        event,
        raw: payload,
        bot_open_id: ctx.state.bot_open_id(),
        history: ctx.state.history(),
    };

    match AssertUnwindSafe(ctx.handler.handle(inbound))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => {},
        Ok(Err(e)) => {
            error!(
                message_id = ?message_id,
                chat_id,
                error = %e,
                "error handling feishu message"
            );
        },
        Err(panic) => {
            error!(
                message_id = ?message_id,
                chat_id,
                panic = panic_message(panic.as_ref()),
                "feishu message handler panicked"
            );
        },
    }
}

fn on_bot_membership(payload: Value, added: bool) {
    match serde_json::from_value::<BotMembershipEvent>(payload) {
        Ok(event) if added => info!(chat_id = event.chat_id, "feishu bot added to chat"),
        Ok(event) => info!(chat_id = event.chat_id, "feishu bot removed from chat"),
        Err(e) => warn!(added, error = %e, "malformed feishu bot membership event"),
    }
}
