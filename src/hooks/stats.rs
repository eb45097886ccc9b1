use prometheus::{IntCounterVec, Opts};
use redis::RedisFuture;
use tracing::{debug, warn};

use super::registry::MetricsRegistry;
use super::Hook;
use crate::client::Connection;
use crate::error::Result;

/// Counts connection dials per address, namespaced by service and
/// sub-service.
#[derive(Clone)]
pub struct StatsHook {
    dials: IntCounterVec,
    dial_errors: IntCounterVec,
}

impl StatsHook {
    pub fn new(registry: &MetricsRegistry, service: &str, sub_service: &str) -> Result<Self> {
        let dials = registry.int_counter_vec(
            Opts::new("redis_dials_total", "Number of connection dials")
                .namespace(service)
                .subsystem(sub_service),
            &["addr"],
        )?;
        let dial_errors = registry.int_counter_vec(
            Opts::new("redis_dial_errors_total", "Number of failed connection dials")
                .namespace(service)
                .subsystem(sub_service),
            &["addr"],
        )?;

        Ok(Self { dials, dial_errors })
    }

    pub fn dials(&self, addr: &str) -> u64 {
        self.dials.with_label_values(&[addr]).get()
    }

    pub fn dial_errors(&self, addr: &str) -> u64 {
        self.dial_errors.with_label_values(&[addr]).get()
    }
}

impl Hook for StatsHook {
    fn dial_hook<'a>(
        &'a self,
        addr: &'a str,
        next: RedisFuture<'a, Connection>,
    ) -> RedisFuture<'a, Connection> {
        Box::pin(async move {
            self.dials.with_label_values(&[addr]).inc();
            let result = next.await;
            match &result {
                Ok(_) => debug!(addr, "dialed"),
                Err(e) => {
                    self.dial_errors.with_label_values(&[addr]).inc();
                    warn!(addr, error = %e, "dial failed");
                }
            }
            result
        })
    }

    fn name(&self) -> &'static str {
        "stats"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::Hooks;
    use std::sync::Arc;

    #[tokio::test]
    async fn failed_dial_is_counted() {
        let registry = MetricsRegistry::new();
        let stats = StatsHook::new(&registry, "svc", "cache").unwrap();

        let mut hooks = Hooks::new();
        hooks.add(Arc::new(stats.clone()));

        let connect: RedisFuture<'_, Connection> = Box::pin(async {
            Err(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            )))
        });
        assert!(hooks.dial("127.0.0.1:1", connect).await.is_err());

        assert_eq!(stats.dials("127.0.0.1:1"), 1);
        assert_eq!(stats.dial_errors("127.0.0.1:1"), 1);
        assert!(registry
            .gather_text()
            .unwrap()
            .contains("svc_cache_redis_dial_errors_total{addr=\"127.0.0.1:1\"} 1"));
    }
}
