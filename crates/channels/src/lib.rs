//! Channel plugin system.
//!
//! Each messaging platform implements the [`ChannelPlugin`] trait and plugs
//! into the [`registry::ChannelRegistry`]. Health checks go through
//! [`ChannelStatus`]; runtime problems a plugin cannot recover from are
//! reported back to the host through [`ChannelEventSink`].

pub mod error;
pub mod plugin;
pub mod registry;

pub use {
    error::{Error, Result},
    plugin::{ChannelEventSink, ChannelHealthSnapshot, ChannelPlugin, ChannelStatus},
};
