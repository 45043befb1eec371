//! Named-operation timing.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Aggregate timing for one named operation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OperationStats {
    pub count: u64,
    /// Seconds.
    pub total_time: f64,
    pub min_time: f64,
    pub max_time: f64,
    pub average_time: f64,
}

/// Snapshot of everything the monitor has recorded.
#[derive(Debug, Clone, Serialize, Default)]
pub struct PerformanceSummary {
    pub total_operations: u64,
    pub total_time: f64,
    pub operations: BTreeMap<String, OperationStats>,
}

#[derive(Debug, Default)]
struct Timings {
    count: u64,
    total: Duration,
    min: Option<Duration>,
    max: Duration,
}

/// Records timings for named operations.
#[derive(Debug, Default)]
pub struct PerformanceMonitor {
    timings: Mutex<BTreeMap<String, Timings>>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing `name`; the elapsed time is recorded when the guard drops.
    pub fn measure<'a>(&'a self, name: &str) -> TimingGuard<'a> {
        TimingGuard {
            monitor: self,
            name: name.to_string(),
            start: Instant::now(),
        }
    }

    /// Record one completed operation.
    pub fn record(&self, name: &str, elapsed: Duration) {
        let Ok(mut timings) = self.timings.lock() else {
            return;
        };
        let entry = timings.entry(name.to_string()).or_default();
        entry.count += 1;
        entry.total += elapsed;
        entry.max = entry.max.max(elapsed);
        entry.min = Some(entry.min.map_or(elapsed, |m| m.min(elapsed)));
    }

    pub fn summary(&self) -> PerformanceSummary {
        let Ok(timings) = self.timings.lock() else {
            return PerformanceSummary::default();
        };

        let mut summary = PerformanceSummary::default();
        for (name, t) in timings.iter() {
            let total = t.total.as_secs_f64();
            summary.total_operations += t.count;
            summary.total_time += total;
            summary.operations.insert(
                name.clone(),
                OperationStats {
                    count: t.count,
                    total_time: total,
                    min_time: t.min.unwrap_or_default().as_secs_f64(),
                    max_time: t.max.as_secs_f64(),
                    average_time: if t.count == 0 {
                        0.0
                    } else {
                        total / t.count as f64
                    },
                },
            );
        }
        summary
    }

    pub fn clear(&self) {
        if let Ok(mut timings) = self.timings.lock() {
            timings.clear();
        }
    }
}

/// RAII timer returned by [`PerformanceMonitor::measure`].
pub struct TimingGuard<'a> {
    monitor: &'a PerformanceMonitor,
    name: String,
    start: Instant,
}

impl TimingGuard<'_> {
    /// Time elapsed so far.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for TimingGuard<'_> {
    fn drop(&mut self) {
        self.monitor.record(&self.name, self.start.elapsed());
    }
}
