use crate::core::error::ServiceError;
use crate::core::state::{ChainState, Stage};
use log::{info, warn};
use std::collections::BTreeMap;
use std::time::Duration;

/// Receives progress of a generation run. Passed into the orchestrator so
/// runs can be traced or muted per caller.
pub trait PipelineObserver: Send + Sync {
    fn stage_started(&self, _stage: Stage) {}

    fn stage_completed(&self, _stage: Stage, _output: &str, _elapsed: Duration) {}

    fn stage_failed(&self, _stage: Stage, _error: &ServiceError) {}

    fn run_completed(&self, _state: &ChainState) {}
}

/// Discards every event.
pub struct SilentObserver;

impl PipelineObserver for SilentObserver {}

/// Writes stage outputs and a timing summary through the `log` facade.
pub struct LogObserver;

impl PipelineObserver for LogObserver {
    fn stage_started(&self, stage: Stage) {
        log::debug!("Starting stage: {}", stage);
    }

    fn stage_completed(&self, stage: Stage, output: &str, elapsed: Duration) {
        match stage.ordinal() {
            Some(n) => info!("Step {} ({}) done in {:.2}s:\n{}", n, stage, elapsed.as_secs_f64(), output),
            None => info!("{} done in {:.2}s:\n{}", stage, elapsed.as_secs_f64(), output),
        }
    }

    fn stage_failed(&self, stage: Stage, error: &ServiceError) {
        warn!("Stage '{}' failed: {}", stage, error);
    }

    fn run_completed(&self, state: &ChainState) {
        info!("Timing summary (seconds):\n{}", timing_summary(state));
    }
}

/// Per-stage durations as pretty JSON, keyed by stage name.
pub fn timing_summary(state: &ChainState) -> String {
    let timings: BTreeMap<&str, f64> = state
        .timings()
        .iter()
        .map(|(stage, elapsed)| (stage.name(), (elapsed.as_secs_f64() * 1000.0).round() / 1000.0))
        .collect();
    serde_json::to_string_pretty(&timings).unwrap_or_default()
}
