use parking_lot::Mutex;
use std::sync::Arc;

/// Counters collected while a scenario runs.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct ScenarioStats {
    pub produced: u64,
    pub consumed: u64,
    pub bytes_produced: u64,
    pub bytes_consumed: u64,
    /// `try_claim` calls that found the ring too full.
    pub claim_failures: u64,
    /// `try_read` calls that returned an empty grant.
    pub empty_polls: u64,
    pub producer_wraps: u64,
    pub consumer_wraps: u64,
}

impl ScenarioStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Folds another set of counters into this one.
    pub fn merge(&mut self, other: &ScenarioStats) {
        self.produced = self.produced.wrapping_add(other.produced);
        self.consumed = self.consumed.wrapping_add(other.consumed);
        self.bytes_produced = self.bytes_produced.wrapping_add(other.bytes_produced);
        self.bytes_consumed = self.bytes_consumed.wrapping_add(other.bytes_consumed);
        self.claim_failures = self.claim_failures.wrapping_add(other.claim_failures);
        self.empty_polls = self.empty_polls.wrapping_add(other.empty_polls);
        self.producer_wraps = self.producer_wraps.wrapping_add(other.producer_wraps);
        self.consumer_wraps = self.consumer_wraps.wrapping_add(other.consumer_wraps);
    }
}

pub trait StatsSink: Clone + Send + 'static {
    fn with_stats<R>(&self, f: impl FnOnce(&mut ScenarioStats) -> R) -> R;

    fn snapshot(&self) -> ScenarioStats {
        self.with_stats(|stats| *stats)
    }
}

#[derive(Clone, Default)]
pub struct ArcStatsSink(pub Arc<Mutex<ScenarioStats>>);

impl ArcStatsSink {
    pub fn new(stats: Arc<Mutex<ScenarioStats>>) -> Self {
        Self(stats)
    }
}

impl StatsSink for ArcStatsSink {
    fn with_stats<R>(&self, f: impl FnOnce(&mut ScenarioStats) -> R) -> R {
        let mut guard = self.0.lock();
        f(&mut guard)
    }
}

impl StatsSink for Arc<Mutex<ScenarioStats>> {
    fn with_stats<R>(&self, f: impl FnOnce(&mut ScenarioStats) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }
}
