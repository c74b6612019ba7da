use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Samples kept per timing ring; older samples are trimmed.
const TIMING_RING_CAPACITY: usize = 1000;

/// Bounded ring of latency samples in milliseconds.
///
/// Recording uses `try_lock` so the request path never blocks on the ring;
/// a sample dropped under contention is acceptable.
#[derive(Debug, Default)]
struct TimingRing {
    samples: Mutex<VecDeque<f64>>,
}

impl TimingRing {
    fn record(&self, elapsed: Duration) {
        if let Ok(mut samples) = self.samples.try_lock() {
            if samples.len() == TIMING_RING_CAPACITY {
                samples.pop_front();
            }
            samples.push_back(elapsed.as_secs_f64() * 1000.0);
        }
    }

    fn average_ms(&self) -> Option<f64> {
        let samples = self.samples.lock().ok()?;
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.samples.lock().map(|s| s.len()).unwrap_or(0)
    }
}

/// In-process operational counters and latency rings.
///
/// Counters are relaxed atomics: increments are monotonic but a lost update
/// under extreme contention is tolerated.
#[derive(Debug, Default)]
pub struct Metrics {
    webhook_duplicates: AtomicU64,
    deadlock_retries: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    hold_creation: TimingRing,
    webhook_processing: TimingRing,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub webhook_duplicates: u64,
    pub deadlock_retries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub avg_hold_creation_ms: Option<f64>,
    pub avg_webhook_processing_ms: Option<f64>,
}

impl Metrics {
    pub fn record_webhook_duplicate(&self) {
        self.webhook_duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deadlock_retry(&self) {
        self.deadlock_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hold_creation(&self, elapsed: Duration) {
        self.hold_creation.record(elapsed);
    }

    pub fn record_webhook_processing(&self, elapsed: Duration) {
        self.webhook_processing.record(elapsed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            webhook_duplicates: self.webhook_duplicates.load(Ordering::Relaxed),
            deadlock_retries: self.deadlock_retries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            avg_hold_creation_ms: self.hold_creation.average_ms(),
            avg_webhook_processing_ms: self.webhook_processing.average_ms(),
        }
    }
}
