//! Instrumentation hooks (C10): a contract for span/metric emission at
//! component boundaries. The core never constructs a global sink; callers
//! inject one, or get [`NoopMetricsSink`] by default (spec.md §9: "there is
//! no global state required at the core level").

use std::sync::Arc;

/// Sink for counters and durations emitted at component boundaries. Actual
/// wiring to Prometheus/OTel pipelines is external to the core.
pub trait MetricsSink: Send + Sync {
    fn record_duration(&self, operation: &str, millis: u64);
    fn record_count(&self, operation: &str, count: u64);
}

/// Default sink: discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn record_duration(&self, _operation: &str, _millis: u64) {}
    fn record_count(&self, _operation: &str, _count: u64) {}
}

pub type SharedMetricsSink = Arc<dyn MetricsSink>;

pub fn noop_sink() -> SharedMetricsSink {
    Arc::new(NoopMetricsSink)
}

/// One completed unit of analytics work (C5), surfaced for the
/// instrumentation layer: action name, wall time, and the count it produced.
#[derive(Debug, Clone)]
pub struct TraceStep {
    pub action: &'static str,
    pub duration_millis: u64,
    pub produced: usize,
}

impl TraceStep {
    pub fn emit(&self, sink: &SharedMetricsSink) {
        sink.record_duration(self.action, self.duration_millis);
        sink.record_count(self.action, self.produced as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingSink {
        durations: AtomicU64,
        counts: AtomicU64,
    }

    impl MetricsSink for CountingSink {
        fn record_duration(&self, _operation: &str, millis: u64) {
            self.durations.fetch_add(millis, Ordering::SeqCst);
        }
        fn record_count(&self, _operation: &str, count: u64) {
            self.counts.fetch_add(count, Ordering::SeqCst);
        }
    }

    #[test]
    fn trace_step_emits_to_sink() {
        let concrete = Arc::new(CountingSink {
            durations: AtomicU64::new(0),
            counts: AtomicU64::new(0),
        });
        let sink: SharedMetricsSink = concrete.clone();
        let step = TraceStep {
            action: "pagerank",
            duration_millis: 12,
            produced: 5,
        };
        step.emit(&sink);
        assert_eq!(concrete.durations.load(Ordering::SeqCst), 12);
        assert_eq!(concrete.counts.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn noop_sink_never_panics() {
        let sink = noop_sink();
        sink.record_duration("x", 1);
        sink.record_count("x", 1);
    }
}
