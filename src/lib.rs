//! Instrumentation and key-naming shim in front of a Redis client.
//!
//! * [`hooks`] — interception chain; [`MetricsHook`] records per-command
//!   latency and errors labelled by a low-cardinality key template.
//! * [`utils::key_template`] — collapses object ids in a rendered command.
//! * [`client::KeyCodec`] — builds prefixed physical keys from templates.
//! * [`ClientRegistry`] — owns the cluster / single / failover clients.

pub mod client;
pub mod config;
pub mod error;
pub mod hooks;
pub mod utils;

pub use client::{ClientKind, ClientRegistry, Connection, KeyCodec, KeyConfig, RedisClient};
pub use config::Config;
pub use error::{Error, Result};
pub use hooks::{Hook, HookOptions, MetricsHook, MetricsRegistry};
