//! Feishu (Lark) channel gateway for moltis.
//!
//! [`FeishuGateway`] owns the websocket connection lifecycle: it probes the
//! bot identity, opens the long connection, dispatches subscribed events to
//! a [`handler::MessageHandler`] with message-ID dedup, and polls reconnect
//! info until cancelled. [`FeishuPlugin`] exposes it as a `ChannelPlugin`.
//!
//! The websocket client and the bot-info probe are supplied by the host
//! through [`transport::TransportFactory`] and [`transport::ConnectionProber`].

pub mod config;
pub mod dedup;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod gateway;
pub mod handler;
pub mod history;
pub mod plugin;
pub mod state;
pub mod transport;

#[cfg(test)]
mod testing;

pub use {
    config::FeishuAccountConfig,
    error::{Error, Result},
    gateway::{FeishuGateway, StartOptions},
    plugin::FeishuPlugin,
};
