use redis::aio::{ConnectionLike, ConnectionManager};
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use redis::{Cmd, Pipeline, RedisFuture, RedisResult, Value};
use tracing::{debug, warn};

use crate::config::{ClusterOptions, FailoverOptions, SingleOptions};
use crate::error::{Error, Result};

// ─── Connection ──────────────────────────────────────────────────

/// The raw, un-hooked connection behind a client.
///
/// Both variants are cheaply cloneable and share their underlying
/// multiplexed connections across clones.
#[derive(Clone)]
pub enum Connection {
    /// Auto-reconnecting connection to one server (single and failover)
    Single(ConnectionManager),
    Cluster(ClusterConnection),
}

impl ConnectionLike for Connection {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        match self {
            Self::Single(conn) => conn.req_packed_command(cmd),
            Self::Cluster(conn) => conn.req_packed_command(cmd),
        }
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        match self {
            Self::Single(conn) => conn.req_packed_commands(cmd, offset, count),
            Self::Cluster(conn) => conn.req_packed_commands(cmd, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        match self {
            Self::Single(conn) => conn.get_db(),
            Self::Cluster(conn) => conn.get_db(),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(_) => f.write_str("Connection::Single"),
            Self::Cluster(_) => f.write_str("Connection::Cluster"),
        }
    }
}

// ─── Dialers ─────────────────────────────────────────────────────

/// Opens an auto-reconnecting connection to one server.
pub async fn connect_single(opts: &SingleOptions) -> RedisResult<Connection> {
    let client = redis::Client::open(opts.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    Ok(Connection::Single(manager))
}

/// Opens a cluster connection seeded from `opts.nodes`.
pub async fn connect_cluster(opts: &ClusterOptions) -> RedisResult<Connection> {
    let client = ClusterClient::new(opts.nodes.clone())?;
    let conn = client.get_async_connection().await?;
    Ok(Connection::Cluster(conn))
}

/// Asks each sentinel in turn for the current master of
/// `opts.master_name` and returns a URL for it. First answer wins.
pub async fn resolve_master(opts: &FailoverOptions) -> Result<String> {
    for sentinel in &opts.sentinels {
        match query_master(sentinel, &opts.master_name).await {
            Ok((host, port)) => {
                debug!(sentinel = %sentinel, host = %host, port, "sentinel resolved master");
                return Ok(master_url(&host, port, opts));
            }
            Err(e) => warn!(sentinel = %sentinel, error = %e, "sentinel did not resolve master"),
        }
    }

    Err(Error::NoMaster(opts.master_name.clone()))
}

async fn query_master(sentinel: &str, master_name: &str) -> RedisResult<(String, u16)> {
    let client = redis::Client::open(sentinel)?;
    let mut conn = client.get_multiplexed_async_connection().await?;
    redis::cmd("SENTINEL")
        .arg("get-master-addr-by-name")
        .arg(master_name)
        .query_async(&mut conn)
        .await
}

fn master_url(host: &str, port: u16, opts: &FailoverOptions) -> String {
    match &opts.password {
        Some(password) => format!("redis://:{password}@{host}:{port}/{}", opts.db),
        None => format!("redis://{host}:{port}/{}", opts.db),
    }
}
