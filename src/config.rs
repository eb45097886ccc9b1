use std::path::Path;

use serde::Deserialize;

use crate::client::KeyConfig;
use crate::error::Result;
use crate::hooks::HookOptions;

// ─── Connection options ──────────────────────────────────────────

/// A single Redis server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SingleOptions {
    /// e.g. `redis://127.0.0.1:6379/`
    pub url: String,
}

/// A Redis Cluster, reached through any of its seed nodes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClusterOptions {
    pub nodes: Vec<String>,
}

/// A sentinel-monitored master.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FailoverOptions {
    pub master_name: String,
    /// Sentinel URLs, tried in order
    pub sentinels: Vec<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db: i64,
}

// ─── Top-level config ────────────────────────────────────────────

/// Everything needed to bring up the clients and the key codec.
///
/// ```toml
/// service = "billing"
/// sub_service = "cache"
///
/// [single]
/// url = "redis://127.0.0.1:6379/"
///
/// [keys]
/// prefix = "dev"
/// delimiter = ":"
/// placeholder = "?"
///
/// [metrics]
/// namespace = "billing"
/// duration_buckets = [0.001, 0.01, 0.1, 1.0]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub single: Option<SingleOptions>,
    pub cluster: Option<ClusterOptions>,
    pub failover: Option<FailoverOptions>,
    pub keys: KeyConfig,
    /// Namespace of the connection stats collectors
    pub service: String,
    /// Subsystem of the connection stats collectors
    pub sub_service: String,
    pub metrics: HookOptions,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn full_config_parses() {
        let config = Config::from_toml_str(
            r#"
            service = "billing"
            sub_service = "cache"

            [cluster]
            nodes = ["redis://10.0.0.1:7000/", "redis://10.0.0.2:7000/"]

            [failover]
            master_name = "mymaster"
            sentinels = ["redis://10.0.0.9:26379/"]
            db = 2

            [keys]
            prefix = "dev"

            [metrics]
            namespace = "billing"
            duration_buckets = [0.01, 0.1]
            "#,
        )
        .unwrap();

        assert_eq!(config.cluster.unwrap().nodes.len(), 2);
        let failover = config.failover.unwrap();
        assert_eq!(failover.db, 2);
        assert_eq!(failover.password, None);
        assert!(config.single.is_none());

        // unspecified key fields fall back to defaults
        assert_eq!(config.keys.prefix, "dev");
        assert_eq!(config.keys.delimiter, ":");
        assert_eq!(config.keys.placeholder, "?");

        assert_eq!(config.metrics.namespace, "billing");
        assert_eq!(config.metrics.duration_buckets, vec![0.01, 0.1]);
    }

    #[test]
    fn empty_config_is_all_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.metrics, HookOptions::default());
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(Config::from_toml_str("[single]\nurl = 5").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[single]\nurl = \"redis://127.0.0.1:6379/\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.single.unwrap().url, "redis://127.0.0.1:6379/");
    }
}
