use std::sync::Arc;

use redis::{RedisFuture, Value};
use tracing::{field, info_span, Instrument};

use super::{CommandInfo, Hook, PipelineInfo};
use crate::client::RedisClient;
use crate::error::{Error, Result};

const HOOK_NAME: &str = "tracing";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TracingOptions {
    /// Record the rendered command as `db.statement`
    pub db_statement: bool,
}

impl TracingOptions {
    pub fn with_db_statement(mut self, on: bool) -> Self {
        self.db_statement = on;
        self
    }
}

/// Wraps every command and pipeline in a `tracing` span.
#[derive(Debug, Clone, Default)]
pub struct TracingHook {
    options: TracingOptions,
}

impl TracingHook {
    pub fn new(options: TracingOptions) -> Self {
        Self { options }
    }
}

impl Hook for TracingHook {
    fn process_hook<'a>(
        &'a self,
        cmd: &'a CommandInfo,
        next: RedisFuture<'a, Value>,
    ) -> RedisFuture<'a, Value> {
        let span = info_span!(
            "redis.command",
            db.system = "redis",
            db.operation = %cmd.name,
            db.statement = field::Empty,
            error = field::Empty,
        );
        if self.options.db_statement {
            span.record("db.statement", cmd.rendered.as_str());
        }

        let recorder = span.clone();
        Box::pin(
            async move {
                let result = next.await;
                if let Err(e) = &result {
                    recorder.record("error", field::display(e));
                }
                result
            }
            .instrument(span),
        )
    }

    fn process_pipeline_hook<'a>(
        &'a self,
        pipeline: &'a PipelineInfo,
        next: RedisFuture<'a, Vec<Value>>,
    ) -> RedisFuture<'a, Vec<Value>> {
        let span = info_span!(
            "redis.pipeline",
            db.system = "redis",
            db.operation = "pipeline",
            db.redis.num_cmd = pipeline.len,
            error = field::Empty,
        );

        let recorder = span.clone();
        Box::pin(
            async move {
                let result = next.await;
                if let Err(e) = &result {
                    recorder.record("error", field::display(e));
                }
                result
            }
            .instrument(span),
        )
    }

    fn name(&self) -> &'static str {
        HOOK_NAME
    }
}

/// Attaches a [`TracingHook`] to `client`. Fails if one is already
/// attached.
pub fn instrument_tracing<C>(client: &mut RedisClient<C>, options: TracingOptions) -> Result<()> {
    if client.hooks().contains(HOOK_NAME) {
        return Err(Error::TracingAlreadyAttached);
    }
    client.add_hook(Arc::new(TracingHook::new(options)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn span_does_not_touch_result() {
        let hook = TracingHook::new(TracingOptions::default().with_db_statement(true));
        let cmd = CommandInfo::new("get", "get dev:user:1");

        let next: RedisFuture<'_, Value> =
            Box::pin(async { Ok(Value::Data(b"bob".to_vec())) });
        let value = hook.process_hook(&cmd, next).await.unwrap();

        assert_eq!(value, Value::Data(b"bob".to_vec()));
    }
}
