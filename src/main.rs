use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use redis_instrument::{ClientRegistry, Config, RedisClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod handlers;
mod load_generator;
mod server;

/// Config used when no file is given on the command line.
const DEFAULT_CONFIG: &str = r#"
service = "demo"
sub_service = "cache"

[single]
url = "redis://127.0.0.1:6379/"

[keys]
prefix = "dev"
delimiter = ":"
placeholder = "?"

[metrics]
namespace = "demo"
"#;

pub struct AppState {
    /// Clients, key codec and the metrics they record into.
    pub registry: Arc<ClientRegistry>,

    pub redis: RedisClient,

    /// Set while a load run owns the workers; cleared to stop them.
    pub load_running: Arc<AtomicBool>,

    /// The current or last load run.
    pub load_handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

#[tokio::main]
async fn main() -> redis_instrument::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── 1. Load config ───────────────────────────────────────────
    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!(path = %path, "loading config");
            Config::from_file(path)?
        }
        None => Config::from_toml_str(DEFAULT_CONFIG)?,
    };

    // ── 2. Connect to Redis through the hook chain ───────────────
    let registry = Arc::new(ClientRegistry::new(config)?);
    let redis = registry.init_single().await?;

    // ── 3. Seed a few keys ───────────────────────────────────────
    load_generator::seed(registry.keys(), &redis).await?;

    // ── 4. Build shared state ────────────────────────────────────
    let state = Arc::new(AppState {
        registry,
        redis,
        load_running: Arc::new(AtomicBool::new(false)),
        load_handle: tokio::sync::Mutex::new(None),
    });

    // ── 5. Bind & serve ──────────────────────────────────────────
    let app = server::create_router(state);
    let addr = "0.0.0.0:3000";
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(addr, "metrics at /metrics, load control at /api/load/*");

    axum::serve(listener, app).await?;
    Ok(())
}
