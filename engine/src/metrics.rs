use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility.
///
/// Cloning shares the underlying atomics. Never read by the detector itself.
#[derive(Clone, Default, Debug)]
pub struct Counters {
    pub samples: Arc<AtomicU64>,
    pub samples_rejected: Arc<AtomicU64>,

    pub pulses: Arc<AtomicU64>,
    pub edges_suppressed: Arc<AtomicU64>,

    pub timeouts: Arc<AtomicU64>,
    pub completions: Arc<AtomicU64>,

    // contained side-effect failures
    pub feedback_failures: Arc<AtomicU64>,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CountersSnapshot {
            samples: load(&self.samples),
            samples_rejected: load(&self.samples_rejected),
            pulses: load(&self.pulses),
            edges_suppressed: load(&self.edges_suppressed),
            timeouts: load(&self.timeouts),
            completions: load(&self.completions),
            feedback_failures: load(&self.feedback_failures),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub samples: u64,
    pub samples_rejected: u64,
    pub pulses: u64,
    pub edges_suppressed: u64,
    pub timeouts: u64,
    pub completions: u64,
    pub feedback_failures: u64,
}
