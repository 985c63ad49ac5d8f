use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const LATENCY_BUCKET_COUNT: usize = 12;
const LATENCY_BUCKETS_MS: [u64; LATENCY_BUCKET_COUNT] =
    [1, 2, 5, 10, 25, 50, 100, 250, 500, 1000, 2500, 5000];

#[derive(Clone, Debug, Serialize)]
pub struct LatencySnapshot {
    pub buckets_ms: Vec<u64>,
    pub counts: Vec<u64>,
    pub overflow: u64,
    pub count: u64,
    pub avg_ms: f64,
    pub max_ms: u64,
}

#[derive(Default)]
struct LatencyMetrics {
    buckets: [AtomicU64; LATENCY_BUCKET_COUNT],
    overflow: AtomicU64,
    count: AtomicU64,
    total_ms: AtomicU64,
    max_ms: AtomicU64,
}

impl LatencyMetrics {
    fn record(&self, duration: Duration) {
        let ms = duration.as_millis() as u64;
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ms.fetch_add(ms, Ordering::Relaxed);
        self.update_max(ms);

        match LATENCY_BUCKETS_MS.iter().position(|bucket| ms <= *bucket) {
            Some(idx) => {
                self.buckets[idx].fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.overflow.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn snapshot(&self) -> LatencySnapshot {
        let count = self.count.load(Ordering::Relaxed);
        let total_ms = self.total_ms.load(Ordering::Relaxed);
        let avg_ms = if count > 0 {
            total_ms as f64 / count as f64
        } else {
            0.0
        };

        LatencySnapshot {
            buckets_ms: LATENCY_BUCKETS_MS.to_vec(),
            counts: self
                .buckets
                .iter()
                .map(|bucket| bucket.load(Ordering::Relaxed))
                .collect(),
            overflow: self.overflow.load(Ordering::Relaxed),
            count,
            avg_ms,
            max_ms: self.max_ms.load(Ordering::Relaxed),
        }
    }

    fn update_max(&self, value: u64) {
        let mut current = self.max_ms.load(Ordering::Relaxed);
        while value > current {
            match self.max_ms.compare_exchange_weak(
                current,
                value,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(next) => current = next,
            }
        }
    }
}

/// Route groups with their own latency histogram.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteGroup {
    Storage,
    Admin,
    Registration,
    Tools,
}

#[derive(Clone, Debug, Serialize)]
pub struct HttpMetricsSnapshot {
    pub storage: LatencySnapshot,
    pub admin: LatencySnapshot,
    pub registration: LatencySnapshot,
    pub tools: LatencySnapshot,
    pub reject_origin: u64,
    pub reject_rate_limit: u64,
    pub reject_body_limit: u64,
}

#[derive(Default)]
pub struct HttpMetrics {
    storage: LatencyMetrics,
    admin: LatencyMetrics,
    registration: LatencyMetrics,
    tools: LatencyMetrics,
    reject_origin: AtomicU64,
    reject_rate_limit: AtomicU64,
    reject_body_limit: AtomicU64,
}

impl HttpMetrics {
    pub fn record(&self, group: RouteGroup, duration: Duration) {
        match group {
            RouteGroup::Storage => self.storage.record(duration),
            RouteGroup::Admin => self.admin.record(duration),
            RouteGroup::Registration => self.registration.record(duration),
            RouteGroup::Tools => self.tools.record(duration),
        }
    }

    pub fn inc_reject_origin(&self) {
        self.reject_origin.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reject_rate_limit(&self) {
        self.reject_rate_limit.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reject_body_limit(&self) {
        self.reject_body_limit.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HttpMetricsSnapshot {
        HttpMetricsSnapshot {
            storage: self.storage.snapshot(),
            admin: self.admin.snapshot(),
            registration: self.registration.snapshot(),
            tools: self.tools.snapshot(),
            reject_origin: self.reject_origin.load(Ordering::Relaxed),
            reject_rate_limit: self.reject_rate_limit.load(Ordering::Relaxed),
            reject_body_limit: self.reject_body_limit.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_lands_in_first_matching_bucket() {
        let metrics = LatencyMetrics::default();
        metrics.record(Duration::from_millis(0));
        metrics.record(Duration::from_millis(7));
        metrics.record(Duration::from_millis(9_000));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.count, 3);
        assert_eq!(snapshot.counts[0], 1);
        assert_eq!(snapshot.counts[3], 1);
        assert_eq!(snapshot.overflow, 1);
        assert_eq!(snapshot.max_ms, 9_000);
    }

    #[test]
    fn groups_are_recorded_separately() {
        let metrics = HttpMetrics::default();
        metrics.record(RouteGroup::Storage, Duration::from_millis(3));
        metrics.record(RouteGroup::Storage, Duration::from_millis(5));
        metrics.record(RouteGroup::Admin, Duration::from_millis(1));
        metrics.inc_reject_origin();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.storage.count, 2);
        assert_eq!(snapshot.storage.avg_ms, 4.0);
        assert_eq!(snapshot.admin.count, 1);
        assert_eq!(snapshot.tools.count, 0);
        assert_eq!(snapshot.reject_origin, 1);
        assert_eq!(snapshot.reject_rate_limit, 0);
    }
}
