use std::time::Instant;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};
use redis::{ErrorKind, RedisError, RedisFuture, RedisResult, Value};
use serde::Deserialize;

use super::registry::MetricsRegistry;
use super::{CommandInfo, Hook, PipelineInfo};
use crate::error::Result;
use crate::utils::key_template;

// ─── Configuration ───────────────────────────────────────────────

const LABEL_NAMES: &[&str] = &["key", "command"];

/// Command name used for every pipeline observation.
pub const PIPELINE_COMMAND: &str = "pipeline";

/// Default latency buckets (seconds).
const DEFAULT_DURATION_BUCKETS: &[f64] = &[
    0.001, 0.002, 0.005, 0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0,
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HookOptions {
    /// Metric name prefix; empty means unprefixed names
    pub namespace: String,
    /// Upper bounds of the latency histogram buckets (seconds)
    pub duration_buckets: Vec<f64>,
}

impl Default for HookOptions {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            duration_buckets: DEFAULT_DURATION_BUCKETS.to_vec(),
        }
    }
}

impl HookOptions {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_duration_buckets(mut self, buckets: Vec<f64>) -> Self {
        self.duration_buckets = buckets;
        self
    }
}

// ─── Outcome classification ──────────────────────────────────────

/// How a finished call is accounted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    /// The key did not exist; a normal negative lookup
    NotFound,
    Failed,
}

impl Outcome {
    pub fn of_value(result: &RedisResult<Value>) -> Self {
        match result {
            Ok(value) => Self::of_reply(value),
            Err(e) => Self::of_error(e),
        }
    }

    pub fn of_reply(value: &Value) -> Self {
        match value {
            Value::Nil => Self::NotFound,
            _ => Self::Ok,
        }
    }

    pub fn of_values(result: &RedisResult<Vec<Value>>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(e) => Self::of_error(e),
        }
    }

    pub fn of_error(err: &RedisError) -> Self {
        if is_nil_error(err) {
            Self::NotFound
        } else {
            Self::Failed
        }
    }

    pub fn is_actual_error(self) -> bool {
        self == Self::Failed
    }
}

/// A nil reply converted into a non-optional type surfaces as a
/// `TypeError` mentioning the nil response.
fn is_nil_error(err: &RedisError) -> bool {
    err.kind() == ErrorKind::TypeError
        && err.detail().is_some_and(|d| d.contains("response was nil"))
}

// ─── MetricsHook ─────────────────────────────────────────────────

/// Records per-command latency and error counts.
///
/// Labels are `(key template, command name)`; pipelines are recorded as a
/// single observation under the command name `"pipeline"`. A call whose
/// execution fails is passed back as-is and not observed; the error
/// counters are fed through [`after_process`](Self::after_process) and
/// [`after_process_pipeline`](Self::after_process_pipeline).
#[derive(Clone)]
pub struct MetricsHook {
    options: HookOptions,
    single_commands: HistogramVec,
    pipelined_commands: IntCounterVec,
    single_errors: IntCounterVec,
    pipelined_errors: IntCounterVec,
}

impl MetricsHook {
    /// Creates the hook, registering its collectors or reusing the ones
    /// already known to `registry` under the same names.
    pub fn new(registry: &MetricsRegistry, options: HookOptions) -> Result<Self> {
        let single_commands = registry.histogram_vec(
            HistogramOpts::new("redis_single_commands", "Histogram of single Redis commands")
                .namespace(options.namespace.clone())
                .buckets(options.duration_buckets.clone()),
            LABEL_NAMES,
        )?;

        let pipelined_commands = registry.int_counter_vec(
            Opts::new("redis_pipelined_commands", "Number of pipelined Redis commands")
                .namespace(options.namespace.clone()),
            LABEL_NAMES,
        )?;

        let single_errors = registry.int_counter_vec(
            Opts::new(
                "redis_single_errors",
                "Number of single Redis commands that have failed",
            )
            .namespace(options.namespace.clone()),
            LABEL_NAMES,
        )?;

        let pipelined_errors = registry.int_counter_vec(
            Opts::new(
                "redis_pipelined_errors",
                "Number of pipelined Redis commands that have failed",
            )
            .namespace(options.namespace.clone()),
            LABEL_NAMES,
        )?;

        Ok(Self {
            options,
            single_commands,
            pipelined_commands,
            single_errors,
            pipelined_errors,
        })
    }

    pub fn options(&self) -> &HookOptions {
        &self.options
    }

    /// Number of latency observations recorded under `(key, command)`.
    pub fn observations(&self, key: &str, command: &str) -> u64 {
        self.single_commands
            .with_label_values(&[key, command])
            .get_sample_count()
    }

    /// Single-command errors recorded under `(key, command)`.
    pub fn errors(&self, key: &str, command: &str) -> u64 {
        self.single_errors.with_label_values(&[key, command]).get()
    }

    /// After-stage of a single command started at `started`.
    pub fn after_process(&self, started: Instant, cmd: &CommandInfo, outcome: Outcome) {
        let key = key_template(&cmd.rendered);
        let labels = [key.as_str(), cmd.name.as_str()];

        self.single_commands
            .with_label_values(&labels)
            .observe(started.elapsed().as_secs_f64());

        if outcome.is_actual_error() {
            self.single_errors.with_label_values(&labels).inc();
        }
    }

    /// After-stage of a pipeline started at `started`.
    pub fn after_process_pipeline(
        &self,
        started: Instant,
        pipeline: &PipelineInfo,
        outcome: Outcome,
    ) {
        let key = key_template(PIPELINE_COMMAND);
        let labels = [key.as_str(), PIPELINE_COMMAND];

        self.single_commands
            .with_label_values(&labels)
            .observe(started.elapsed().as_secs_f64());
        self.pipelined_commands
            .with_label_values(&labels)
            .inc_by(pipeline.len as u64);

        if outcome.is_actual_error() {
            self.single_errors.with_label_values(&labels).inc();
            self.pipelined_errors.with_label_values(&labels).inc();
        }
    }
}

impl Hook for MetricsHook {
    fn process_hook<'a>(
        &'a self,
        cmd: &'a CommandInfo,
        next: RedisFuture<'a, Value>,
    ) -> RedisFuture<'a, Value> {
        Box::pin(async move {
            let started = Instant::now();
            // Errors from the wrapped execution go back untouched and unobserved.
            let value = next.await?;
            self.after_process(started, cmd, Outcome::of_reply(&value));
            Ok(value)
        })
    }

    fn process_pipeline_hook<'a>(
        &'a self,
        pipeline: &'a PipelineInfo,
        next: RedisFuture<'a, Vec<Value>>,
    ) -> RedisFuture<'a, Vec<Value>> {
        Box::pin(async move {
            let started = Instant::now();
            let values = next.await?;
            self.after_process_pipeline(started, pipeline, Outcome::Ok);
            Ok(values)
        })
    }

    fn name(&self) -> &'static str {
        "metrics"
    }
}
