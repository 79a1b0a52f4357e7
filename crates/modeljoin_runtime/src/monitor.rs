//! Run monitor for metrics and stage timing.

use crate::error::Stage;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Run metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    /// Leaves executed
    pub leaves_executed: u64,
    /// Scripts sent to the interpreter
    pub scripts_executed: u64,
    /// Bindings evaluated into a right child
    pub bindings_applied: u64,
    /// Resource files copied
    pub files_copied: u64,
    /// Recoverable warnings recorded
    pub warnings: u64,
}

impl Metrics {
    /// Create new metrics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// One completed stage of a composite node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageEvent {
    /// Composite name
    pub model: String,
    /// Stage
    pub stage: Stage,
    /// Offset from the start of the run
    pub started: Duration,
    /// Time spent in the stage
    pub elapsed: Duration,
}

/// Run monitor
///
/// Tracks metrics and the stage sequence of every composite node.
#[derive(Debug)]
pub struct RunMonitor {
    metrics: Metrics,
    start_time: Instant,
    events: Vec<StageEvent>,
}

impl RunMonitor {
    /// Create a new monitor
    #[must_use]
    pub fn new() -> Self {
        Self {
            metrics: Metrics::new(),
            start_time: Instant::now(),
            events: Vec::new(),
        }
    }

    /// Current metrics
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Mutable metrics
    pub fn metrics_mut(&mut self) -> &mut Metrics {
        &mut self.metrics
    }

    /// Completed stages in order
    #[must_use]
    pub fn events(&self) -> &[StageEvent] {
        &self.events
    }

    /// Record a stage that started at `started`
    pub fn record_stage(&mut self, model: &str, stage: Stage, started: Instant) {
        self.events.push(StageEvent {
            model: model.to_string(),
            stage,
            started: started.saturating_duration_since(self.start_time),
            elapsed: started.elapsed(),
        });
    }

    /// Time since the run started
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Time since the run started in whole milliseconds, saturating
    #[must_use]
    pub fn uptime_ms(&self) -> u64 {
        saturating_millis(self.uptime())
    }

    /// Consume the monitor
    #[must_use]
    pub fn finish(self) -> (Metrics, Vec<StageEvent>) {
        (self.metrics, self.events)
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for RunMonitor {
    fn default() -> Self {
        Self::new()
    }
}
