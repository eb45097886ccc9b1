use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use prometheus::core::Collector as PromCollector;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Process-wide registry over `prometheus::default_registry()`.
static GLOBAL: Lazy<Arc<MetricsRegistry>> = Lazy::new(|| {
    Arc::new(MetricsRegistry::with_registry(
        prometheus::default_registry().clone(),
    ))
});

#[derive(Clone)]
enum Collector {
    Histogram(HistogramVec),
    Counter(IntCounterVec),
}

impl Collector {
    fn kind(&self) -> &'static str {
        match self {
            Self::Histogram(_) => "histogram",
            Self::Counter(_) => "counter",
        }
    }
}

// ─── MetricsRegistry ─────────────────────────────────────────────

/// Prometheus registry with idempotent registration.
///
/// Asking twice for the same fully-qualified name hands back the
/// collector created the first time, so hooks built repeatedly (tests,
/// re-initialisation) all write into the same series.
///
/// Each backing `prometheus::Registry` has exactly one `MetricsRegistry`
/// in front of it: [`new`](Self::new) owns a fresh one and
/// [`global`](Self::global) is the only wrapper of the default registry.
/// Share it through the `Arc` rather than wrapping a registry twice.
pub struct MetricsRegistry {
    registry: Registry,
    collectors: Mutex<HashMap<String, Collector>>,
}

impl MetricsRegistry {
    /// A private registry, not exported through the default one.
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            collectors: Mutex::new(HashMap::new()),
        }
    }

    /// The wrapper of `prometheus::default_registry()`.
    pub fn global() -> Arc<MetricsRegistry> {
        Arc::clone(&GLOBAL)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn histogram_vec(&self, opts: HistogramOpts, labels: &[&str]) -> Result<HistogramVec> {
        let name = opts.common_opts.fq_name();
        let mut collectors = self.collectors.lock();

        if let Some(existing) = collectors.get(&name) {
            return match existing {
                Collector::Histogram(vec) => Ok(vec.clone()),
                other => Err(Error::CollectorTypeMismatch {
                    name,
                    existing: other.kind(),
                }),
            };
        }

        let vec = HistogramVec::new(opts, labels)?;
        self.register(&name, Box::new(vec.clone()))?;
        collectors.insert(name, Collector::Histogram(vec.clone()));
        Ok(vec)
    }

    pub fn int_counter_vec(&self, opts: Opts, labels: &[&str]) -> Result<IntCounterVec> {
        let name = opts.fq_name();
        let mut collectors = self.collectors.lock();

        if let Some(existing) = collectors.get(&name) {
            return match existing {
                Collector::Counter(vec) => Ok(vec.clone()),
                other => Err(Error::CollectorTypeMismatch {
                    name,
                    existing: other.kind(),
                }),
            };
        }

        let vec = IntCounterVec::new(opts, labels)?;
        self.register(&name, Box::new(vec.clone()))?;
        collectors.insert(name, Collector::Counter(vec.clone()));
        Ok(vec)
    }

    /// Renders every registered family in the text exposition format.
    pub fn gather_text(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn register(&self, name: &str, collector: Box<dyn PromCollector>) -> Result<()> {
        match self.registry.register(collector) {
            Ok(()) => {
                debug!(name, "registered collector");
                Ok(())
            }
            // Registered directly on the prometheus registry by other code.
            // That collector cannot be recovered; ours stays unexported.
            Err(prometheus::Error::AlreadyReg) => {
                warn!(name, "collector already registered outside this registry");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_opts() -> Opts {
        Opts::new("redis_single_errors", "errors").namespace("test")
    }

    #[test]
    fn same_name_returns_same_collector() {
        let registry = MetricsRegistry::new();

        let first = registry.int_counter_vec(counter_opts(), &["key", "command"]).unwrap();
        let second = registry.int_counter_vec(counter_opts(), &["key", "command"]).unwrap();

        first.with_label_values(&["user", "get"]).inc();
        second.with_label_values(&["user", "get"]).inc();

        assert_eq!(first.with_label_values(&["user", "get"]).get(), 2);
        assert_eq!(registry.registry().gather().len(), 1);
    }

    #[test]
    fn histogram_is_exported() {
        let registry = MetricsRegistry::new();
        let opts = HistogramOpts::new("redis_single_commands", "latency")
            .namespace("test")
            .buckets(vec![0.1, 1.0]);

        let vec = registry.histogram_vec(opts, &["key", "command"]).unwrap();
        vec.with_label_values(&["user", "get"]).observe(0.05);

        let text = registry.gather_text().unwrap();
        assert!(text.contains("test_redis_single_commands_count{command=\"get\",key=\"user\"} 1"));
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let registry = MetricsRegistry::new();
        registry.int_counter_vec(counter_opts(), &["key"]).unwrap();

        let opts = HistogramOpts::new("redis_single_errors", "errors").namespace("test");
        let err = registry.histogram_vec(opts, &["key"]).unwrap_err();

        assert!(matches!(
            err,
            Error::CollectorTypeMismatch { existing: "counter", .. }
        ));
    }

    #[test]
    fn global_is_shared() {
        let a = MetricsRegistry::global();
        let b = MetricsRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn global_handles_export_into_one_series() {
        let opts = || {
            HistogramOpts::new("redis_single_commands", "latency")
                .namespace("shared_global")
                .buckets(vec![0.1, 1.0])
        };

        let a = MetricsRegistry::global()
            .histogram_vec(opts(), &["key", "command"])
            .unwrap();
        let b = MetricsRegistry::global()
            .histogram_vec(opts(), &["key", "command"])
            .unwrap();
        a.with_label_values(&["user", "get"]).observe(0.05);
        b.with_label_values(&["user", "get"]).observe(0.05);

        let exported = prometheus::default_registry()
            .gather()
            .into_iter()
            .find(|mf| mf.get_name() == "shared_global_redis_single_commands")
            .unwrap();
        assert_eq!(exported.get_metric()[0].get_histogram().get_sample_count(), 2);
    }

    #[test]
    fn foreign_registration_is_absorbed() {
        let raw = Registry::new();
        let foreign = IntCounterVec::new(counter_opts(), &["key"]).unwrap();
        raw.register(Box::new(foreign)).unwrap();

        let registry = MetricsRegistry::with_registry(raw);
        assert!(registry.int_counter_vec(counter_opts(), &["key"]).is_ok());
    }
}
