//! Command interception.
//!
//! A [`Hook`] sees every dial, command and pipeline issued through a
//! [`RedisClient`](crate::client::RedisClient). Each stage hands the hook
//! the *next* stage as an unpolled future; the hook returns a future that
//! drives it, so before/after work lives in one wrapping call and the
//! result flows back untouched.

pub mod metrics;
pub mod registry;
pub mod stats;
pub mod trace;

use std::sync::Arc;

use redis::{Arg, Cmd, RedisFuture, Value};

use crate::client::Connection;

pub use metrics::{HookOptions, MetricsHook, Outcome};
pub use registry::MetricsRegistry;
pub use stats::StatsHook;
pub use trace::{instrument_tracing, TracingHook, TracingOptions};

// ─── Hook trait ──────────────────────────────────────────────────

/// Interception points around dialing, single commands and pipelines.
///
/// Every method defaults to a pass-through.
pub trait Hook: Send + Sync {
    fn dial_hook<'a>(
        &'a self,
        _addr: &'a str,
        next: RedisFuture<'a, Connection>,
    ) -> RedisFuture<'a, Connection> {
        next
    }

    fn process_hook<'a>(
        &'a self,
        _cmd: &'a CommandInfo,
        next: RedisFuture<'a, Value>,
    ) -> RedisFuture<'a, Value> {
        next
    }

    fn process_pipeline_hook<'a>(
        &'a self,
        _pipeline: &'a PipelineInfo,
        next: RedisFuture<'a, Vec<Value>>,
    ) -> RedisFuture<'a, Vec<Value>> {
        next
    }

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

// ─── Call descriptions ───────────────────────────────────────────

/// What a hook gets to see of a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    /// Lowercase command name, e.g. `"get"`
    pub name: String,
    /// Name followed by the arguments, single-space separated
    pub rendered: String,
}

impl CommandInfo {
    pub fn from_cmd(cmd: &Cmd) -> Self {
        let mut args = cmd.args_iter().map(|arg| match arg {
            Arg::Simple(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Arg::Cursor => "0".to_owned(),
        });

        let name = args.next().unwrap_or_default().to_lowercase();
        let mut rendered = name.clone();
        for arg in args {
            rendered.push(' ');
            rendered.push_str(&arg);
        }

        Self { name, rendered }
    }

    /// Builds the description directly, mostly for callers and tests that
    /// drive the hook stages without a real `Cmd`.
    pub fn new(name: impl Into<String>, rendered: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rendered: rendered.into(),
        }
    }
}

/// What a hook gets to see of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineInfo {
    /// Number of commands sent in the batch
    pub len: usize,
}

// ─── Hook chain ──────────────────────────────────────────────────

/// Ordered hook list. The first hook added is the outermost wrapper.
#[derive(Clone, Default)]
pub struct Hooks {
    chain: Arc<Vec<Arc<dyn Hook>>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, hook: Arc<dyn Hook>) {
        Arc::make_mut(&mut self.chain).push(hook);
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.chain.iter().any(|h| h.name() == name)
    }

    pub fn dial<'a>(
        &'a self,
        addr: &'a str,
        connect: RedisFuture<'a, Connection>,
    ) -> RedisFuture<'a, Connection> {
        self.chain
            .iter()
            .rev()
            .fold(connect, |next, hook| hook.dial_hook(addr, next))
    }

    pub fn process<'a>(
        &'a self,
        cmd: &'a CommandInfo,
        exec: RedisFuture<'a, Value>,
    ) -> RedisFuture<'a, Value> {
        self.chain
            .iter()
            .rev()
            .fold(exec, |next, hook| hook.process_hook(cmd, next))
    }

    pub fn process_pipeline<'a>(
        &'a self,
        pipeline: &'a PipelineInfo,
        exec: RedisFuture<'a, Vec<Value>>,
    ) -> RedisFuture<'a, Vec<Value>> {
        self.chain
            .iter()
            .rev()
            .fold(exec, |next, hook| hook.process_pipeline_hook(pipeline, next))
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.chain.iter().map(|h| h.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Hook for Recorder {
        fn process_hook<'a>(
            &'a self,
            cmd: &'a CommandInfo,
            next: RedisFuture<'a, Value>,
        ) -> RedisFuture<'a, Value> {
            Box::pin(async move {
                self.log.lock().push(format!("{} before {}", self.tag, cmd.name));
                let result = next.await;
                self.log.lock().push(format!("{} after", self.tag));
                result
            })
        }

        fn name(&self) -> &'static str {
            self.tag
        }
    }

    #[test]
    fn command_info_renders_name_and_args() {
        let mut cmd = redis::cmd("GET");
        cmd.arg("dev:user:42");
        let info = CommandInfo::from_cmd(&cmd);

        assert_eq!(info.name, "get");
        assert_eq!(info.rendered, "get dev:user:42");
    }

    #[test]
    fn command_info_without_args() {
        let info = CommandInfo::from_cmd(&redis::cmd("PING"));
        assert_eq!(info, CommandInfo::new("ping", "ping"));
    }

    #[tokio::test]
    async fn first_hook_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = Hooks::new();
        hooks.add(Arc::new(Recorder { tag: "a", log: log.clone() }));
        hooks.add(Arc::new(Recorder { tag: "b", log: log.clone() }));

        let info = CommandInfo::new("get", "get k");
        let exec: RedisFuture<'_, Value> = Box::pin(async { Ok(Value::Okay) });
        let value = hooks.process(&info, exec).await.unwrap();

        assert_eq!(value, Value::Okay);
        assert_eq!(
            *log.lock(),
            vec!["a before get", "b before get", "b after", "a after"]
        );
        assert!(hooks.contains("a"));
        assert_eq!(hooks.len(), 2);
    }

    #[tokio::test]
    async fn empty_chain_passes_through() {
        let hooks = Hooks::new();
        let info = PipelineInfo { len: 2 };
        let exec: RedisFuture<'_, Vec<Value>> =
            Box::pin(async { Ok(vec![Value::Nil, Value::Int(1)]) });

        let values = hooks.process_pipeline(&info, exec).await.unwrap();
        assert_eq!(values, vec![Value::Nil, Value::Int(1)]);
    }
}
