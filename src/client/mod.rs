//! Client handles and the registry that owns them.

pub mod connect;
pub mod keys;

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use redis::aio::ConnectionLike;
use redis::{Cmd, Pipeline, RedisFuture, Value};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::hooks::{
    instrument_tracing, CommandInfo, Hook, Hooks, MetricsHook, MetricsRegistry, PipelineInfo,
    StatsHook, TracingOptions,
};

pub use connect::Connection;
pub use keys::{KeyCodec, KeyConfig};

// ─── ClientKind ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    Cluster,
    Single,
    Failover,
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cluster => "cluster",
            Self::Single => "single",
            Self::Failover => "failover",
        })
    }
}

// ─── RedisClient ─────────────────────────────────────────────────

/// A connection with its hook chain attached.
///
/// Implements [`ConnectionLike`], so `AsyncCommands`, `Cmd::query_async`
/// and `Pipeline::query_async` all go through the hooks. Cheap to clone;
/// clones share the connection and the hooks present at clone time.
#[derive(Clone)]
pub struct RedisClient<C = Connection> {
    kind: ClientKind,
    conn: C,
    hooks: Hooks,
}

impl<C> RedisClient<C> {
    pub fn new(kind: ClientKind, conn: C) -> Self {
        Self::with_hooks(kind, conn, Hooks::new())
    }

    pub fn with_hooks(kind: ClientKind, conn: C, hooks: Hooks) -> Self {
        Self { kind, conn, hooks }
    }

    pub fn kind(&self) -> ClientKind {
        self.kind
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Appends `hook`; it runs inside every hook added before it.
    pub fn add_hook(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.add(hook);
    }

    /// The raw connection, bypassing the hooks.
    pub fn inner(&self) -> &C {
        &self.conn
    }
}

impl<C: ConnectionLike + Send> ConnectionLike for RedisClient<C> {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        let info = CommandInfo::from_cmd(cmd);
        Box::pin(async move {
            let exec = self.conn.req_packed_command(cmd);
            self.hooks.process(&info, exec).await
        })
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        let info = PipelineInfo {
            len: cmd.cmd_iter().count(),
        };
        Box::pin(async move {
            let exec = self.conn.req_packed_commands(cmd, offset, count);
            self.hooks.process_pipeline(&info, exec).await
        })
    }

    fn get_db(&self) -> i64 {
        self.conn.get_db()
    }
}

impl<C> fmt::Debug for RedisClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisClient")
            .field("kind", &self.kind)
            .field("hooks", &self.hooks)
            .finish()
    }
}

// ─── ClientRegistry ──────────────────────────────────────────────

/// Owns the key codec and at most one client of each kind.
///
/// Built once by the application and handed to whatever needs Redis.
/// Each `init_*` succeeds at most once per kind; it must not race with
/// another `init_*` of the same kind.
pub struct ClientRegistry {
    config: Config,
    keys: KeyCodec,
    metrics: Arc<MetricsRegistry>,
    cluster: OnceCell<RedisClient>,
    single: OnceCell<RedisClient>,
    failover: OnceCell<RedisClient>,
}

impl ClientRegistry {
    /// Uses the process-wide metrics registry.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_metrics(config, MetricsRegistry::global())
    }

    pub fn with_metrics(config: Config, metrics: Arc<MetricsRegistry>) -> Result<Self> {
        let keys = KeyCodec::new(config.keys.clone())?;
        Ok(Self {
            config,
            keys,
            metrics,
            cluster: OnceCell::new(),
            single: OnceCell::new(),
            failover: OnceCell::new(),
        })
    }

    pub fn keys(&self) -> &KeyCodec {
        &self.keys
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub async fn init_cluster(&self) -> Result<RedisClient> {
        let opts = self
            .config
            .cluster
            .as_ref()
            .ok_or(Error::NotConfigured(ClientKind::Cluster))?;

        let addr = opts.nodes.join(",");
        self.init(
            ClientKind::Cluster,
            &addr,
            Box::pin(connect::connect_cluster(opts)),
        )
        .await
    }

    pub async fn init_single(&self) -> Result<RedisClient> {
        let opts = self
            .config
            .single
            .as_ref()
            .ok_or(Error::NotConfigured(ClientKind::Single))?;

        self.init(
            ClientKind::Single,
            &opts.url,
            Box::pin(connect::connect_single(opts)),
        )
        .await
    }

    /// Resolves the current master through the configured sentinels and
    /// connects to it.
    pub async fn init_failover(&self) -> Result<RedisClient> {
        let opts = self
            .config
            .failover
            .as_ref()
            .ok_or(Error::NotConfigured(ClientKind::Failover))?;
        self.ensure_free(ClientKind::Failover)?;

        let url = connect::resolve_master(opts).await?;
        let single = crate::config::SingleOptions { url };
        self.init(
            ClientKind::Failover,
            &single.url,
            Box::pin(connect::connect_single(&single)),
        )
        .await
    }

    pub fn cluster(&self) -> Result<RedisClient> {
        self.get(ClientKind::Cluster)
    }

    pub fn single(&self) -> Result<RedisClient> {
        self.get(ClientKind::Single)
    }

    pub fn failover(&self) -> Result<RedisClient> {
        self.get(ClientKind::Failover)
    }

    fn slot(&self, kind: ClientKind) -> &OnceCell<RedisClient> {
        match kind {
            ClientKind::Cluster => &self.cluster,
            ClientKind::Single => &self.single,
            ClientKind::Failover => &self.failover,
        }
    }

    fn get(&self, kind: ClientKind) -> Result<RedisClient> {
        self.slot(kind)
            .get()
            .cloned()
            .ok_or(Error::NotInitialized(kind))
    }

    fn ensure_free(&self, kind: ClientKind) -> Result<()> {
        match self.slot(kind).get() {
            Some(_) => Err(Error::AlreadyInitialized(kind)),
            None => Ok(()),
        }
    }

    /// Stats and metrics hooks, in that order.
    fn base_hooks(&self) -> Result<Hooks> {
        let stats = StatsHook::new(
            &self.metrics,
            &metric_ident(&self.config.service),
            &metric_ident(&self.config.sub_service),
        )?;
        let metrics = MetricsHook::new(&self.metrics, self.config.metrics.clone())?;

        let mut hooks = Hooks::new();
        hooks.add(Arc::new(stats));
        hooks.add(Arc::new(metrics));
        Ok(hooks)
    }

    async fn init(
        &self,
        kind: ClientKind,
        addr: &str,
        connect: RedisFuture<'_, Connection>,
    ) -> Result<RedisClient> {
        self.ensure_free(kind)?;

        let hooks = self.base_hooks()?;
        let conn = hooks.dial(addr, connect).await?;
        let mut client = RedisClient::with_hooks(kind, conn, hooks);

        // Best effort: a client without spans is still a working client.
        if let Err(e) = instrument_tracing(&mut client, TracingOptions::default().with_db_statement(true)) {
            warn!(%kind, error = %e, "tracing instrumentation not attached");
        }

        self.slot(kind)
            .set(client.clone())
            .map_err(|_| Error::AlreadyInitialized(kind))?;

        info!(%kind, addr, "redis client initialized");
        Ok(client)
    }
}

/// Maps a free-form service name onto a valid metric name fragment.
fn metric_ident(s: &str) -> String {
    let mut ident: String = s
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}
