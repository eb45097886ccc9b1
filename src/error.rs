use thiserror::Error;

use crate::client::ClientKind;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug, Error)]
pub enum Error {
    /// Placeholder count in a key template does not match the variables given.
    #[error("insufficient arguments to parse key: template has {expected} placeholder(s), got {got} variable(s)")]
    InsufficientArguments { expected: usize, got: usize },

    #[error("invalid key config: {0}")]
    InvalidKeyConfig(String),

    #[error("{0} client is already initialized")]
    AlreadyInitialized(ClientKind),

    #[error("{0} client is not initialized")]
    NotInitialized(ClientKind),

    #[error("{0} client is not configured")]
    NotConfigured(ClientKind),

    #[error("no sentinel could resolve master '{0}'")]
    NoMaster(String),

    #[error("collector '{name}' is already registered as a {existing}")]
    CollectorTypeMismatch { name: String, existing: &'static str },

    #[error("tracing instrumentation is already attached")]
    TracingAlreadyAttached,

    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
