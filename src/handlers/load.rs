use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{extract::State, Json};
use redis_instrument::utils::key_template;
use redis_instrument::{KeyCodec, MetricsRegistry};
use serde::{Deserialize, Serialize};

use crate::load_generator;
use crate::AppState;

use super::AppError;

const MAX_WORKERS: u32 = 256;
const MAX_SECONDS: u64 = 600;

// ─── Request / response types ────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoadPlan {
    pub workers: u32,
    pub seconds: u64,
    /// Share of GETs, the rest are SET EX or pipelined INCR
    pub read_pct: u8,
}

impl Default for LoadPlan {
    fn default() -> Self {
        Self {
            workers: 8,
            seconds: 20,
            read_pct: 80,
        }
    }
}

impl LoadPlan {
    fn check(&self) -> Result<(), AppError> {
        if !(1..=MAX_WORKERS).contains(&self.workers) {
            return Err(AppError::BadRequest(format!(
                "workers must be in 1..={MAX_WORKERS}"
            )));
        }
        if !(1..=MAX_SECONDS).contains(&self.seconds) {
            return Err(AppError::BadRequest(format!(
                "seconds must be in 1..={MAX_SECONDS}"
            )));
        }
        if self.read_pct > 100 {
            return Err(AppError::BadRequest("read_pct is a percentage".into()));
        }
        Ok(())
    }
}

/// A logical key template, one physical key built from it and the label
/// its commands are recorded under.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct KeyShape {
    pub template: &'static str,
    pub sample: String,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct LoadStarted {
    pub workers: u32,
    pub seconds: u64,
    pub read_pct: u8,
    pub keys: Vec<KeyShape>,
}

/// Calls and errors recorded for one `(key, command)` label pair.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct Series {
    pub key: String,
    pub command: String,
    pub calls: u64,
    pub errors: u64,
}

#[derive(Debug, Serialize)]
pub struct LoadStatus {
    pub running: bool,
    pub series: Vec<Series>,
}

// ─── POST /api/load/start ────────────────────────────────────────

pub async fn start_load(
    State(state): State<Arc<AppState>>,
    Json(plan): Json<LoadPlan>,
) -> Result<Json<LoadStarted>, AppError> {
    plan.check()?;
    let keys = key_shapes(state.registry.keys())?;

    state
        .load_running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .map_err(|_| AppError::AlreadyRunning)?;

    let handle = tokio::spawn(load_generator::run(
        state.load_running.clone(),
        state.registry.keys().clone(),
        state.redis.clone(),
        plan.workers,
        plan.seconds,
        plan.read_pct,
    ));
    *state.load_handle.lock().await = Some(handle);

    Ok(Json(LoadStarted {
        workers: plan.workers,
        seconds: plan.seconds,
        read_pct: plan.read_pct,
        keys,
    }))
}

// ─── POST /api/load/stop ─────────────────────────────────────────

pub async fn stop_load(State(state): State<Arc<AppState>>) -> Json<LoadStatus> {
    state.load_running.store(false, Ordering::SeqCst);

    if let Some(handle) = state.load_handle.lock().await.take() {
        let _ = handle.await;
    }

    Json(LoadStatus {
        running: false,
        series: series(state.registry.metrics()),
    })
}

// ─── GET /api/load/status ────────────────────────────────────────

pub async fn load_status(State(state): State<Arc<AppState>>) -> Json<LoadStatus> {
    Json(LoadStatus {
        running: state.load_running.load(Ordering::SeqCst),
        series: series(state.registry.metrics()),
    })
}

// ─── Helpers ─────────────────────────────────────────────────────

fn key_shapes(keys: &KeyCodec) -> Result<Vec<KeyShape>, AppError> {
    let id = load_generator::sample_id();
    load_generator::TEMPLATES
        .iter()
        .map(|&template| {
            let sample = keys
                .build(template, &[id.as_str()])
                .map_err(|e| AppError::Internal(e.to_string()))?;
            let label = key_template(&format!("get {sample}"));
            Ok(KeyShape {
                template,
                sample,
                label,
            })
        })
        .collect()
}

/// Folds the single-command histogram and error counter into one row per
/// label pair, whatever namespace the hook was built with.
fn series(metrics: &MetricsRegistry) -> Vec<Series> {
    let mut rows: BTreeMap<(String, String), Series> = BTreeMap::new();

    for family in metrics.registry().gather() {
        let name = family.get_name();
        let is_calls = name.ends_with("redis_single_commands");
        let is_errors = name.ends_with("redis_single_errors");
        if !is_calls && !is_errors {
            continue;
        }

        for metric in family.get_metric() {
            let mut key = String::new();
            let mut command = String::new();
            for pair in metric.get_label() {
                match pair.get_name() {
                    "key" => key = pair.get_value().to_owned(),
                    "command" => command = pair.get_value().to_owned(),
                    _ => {}
                }
            }

            let row = rows
                .entry((key.clone(), command.clone()))
                .or_insert_with(|| Series {
                    key,
                    command,
                    ..Series::default()
                });
            if is_calls {
                row.calls += metric.get_histogram().get_sample_count();
            } else {
                row.errors += metric.get_counter().get_value() as u64;
            }
        }
    }

    rows.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use redis_instrument::hooks::{CommandInfo, Outcome};
    use redis_instrument::{HookOptions, KeyConfig, MetricsHook};
    use std::time::Instant;

    #[test]
    fn plan_bounds() {
        assert!(LoadPlan::default().check().is_ok());
        assert!(LoadPlan { workers: 0, ..LoadPlan::default() }.check().is_err());
        assert!(LoadPlan { seconds: MAX_SECONDS + 1, ..LoadPlan::default() }.check().is_err());
        assert!(LoadPlan { read_pct: 101, ..LoadPlan::default() }.check().is_err());
    }

    #[test]
    fn key_shapes_show_labels() {
        let keys = KeyCodec::new(KeyConfig {
            prefix: "dev".into(),
            ..KeyConfig::default()
        })
        .unwrap();

        let shapes = key_shapes(&keys).unwrap();

        assert_eq!(shapes.len(), load_generator::TEMPLATES.len());
        assert_eq!(
            shapes[0],
            KeyShape {
                template: "user:?:profile",
                sample: format!("dev:user:{}:profile", load_generator::sample_id()),
                label: "user".into(),
            }
        );
        assert_eq!(shapes[1].label, "session");
    }

    #[test]
    fn series_joins_calls_and_errors() {
        let metrics = MetricsRegistry::new();
        let hook = MetricsHook::new(&metrics, HookOptions::default().with_namespace("demo"))
            .unwrap();
        let get = CommandInfo::new("get", "get dev:user:1");
        let set = CommandInfo::new("set", "set dev:session:2 v");

        hook.after_process(Instant::now(), &get, Outcome::Ok);
        hook.after_process(Instant::now(), &get, Outcome::Failed);
        hook.after_process(Instant::now(), &set, Outcome::Ok);

        assert_eq!(
            series(&metrics),
            vec![
                Series {
                    key: "session".into(),
                    command: "set".into(),
                    calls: 1,
                    errors: 0,
                },
                Series {
                    key: "user".into(),
                    command: "get".into(),
                    calls: 2,
                    errors: 1,
                },
            ]
        );
    }
}
