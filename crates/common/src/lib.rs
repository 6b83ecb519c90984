//! Small shared helpers used by the moltis channel crates.

pub mod context;

pub use context::FromMessage;
