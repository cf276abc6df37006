use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Application-wide runtime counters.
///
/// All counters use `Relaxed` ordering; they are independent observations
/// and need no cross-variable synchronisation. Share via `Arc<Metrics>`.
pub struct Metrics {
    /// Total deliveries consumed from the queue since startup.
    pub jobs_received: AtomicU64,

    /// Deliveries whose result reached the gateway and were acknowledged.
    pub jobs_succeeded: AtomicU64,

    /// Deliveries routed to the dead-letter queue.
    pub jobs_dead_lettered: AtomicU64,

    /// Deliveries republished to the retry queue. A single job can
    /// contribute several counts across attempts.
    pub jobs_retried: AtomicU64,

    /// Deliveries currently being processed (gauge). With prefetch = 1 this
    /// is 0 or 1; kept as a counter so a misbehaving loop is visible.
    pub jobs_in_flight: AtomicI64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            jobs_received: AtomicU64::new(0),
            jobs_succeeded: AtomicU64::new(0),
            jobs_dead_lettered: AtomicU64::new(0),
            jobs_retried: AtomicU64::new(0),
            jobs_in_flight: AtomicI64::new(0),
        }
    }

    pub fn inc_received(&self) {
        self.jobs_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_succeeded(&self) {
        self.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dead_lettered(&self) {
        self.jobs_dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retried(&self) {
        self.jobs_retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_in_flight(&self) {
        self.jobs_in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_in_flight(&self) {
        self.jobs_in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    /// Point-in-time snapshot of all counters. Reads are `Relaxed`, so the
    /// snapshot is approximate but sufficient for observability.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.jobs_received.load(Ordering::Relaxed),
            succeeded: self.jobs_succeeded.load(Ordering::Relaxed),
            dead_lettered: self.jobs_dead_lettered.load(Ordering::Relaxed),
            retried: self.jobs_retried.load(Ordering::Relaxed),
            in_flight: self.jobs_in_flight.load(Ordering::Relaxed),
        }
    }

    /// Log a summary of all counters via `tracing`.
    pub fn log_summary(&self) {
        let s = self.snapshot();
        tracing::info!(
            received      = s.received,
            succeeded     = s.succeeded,
            dead_lettered = s.dead_lettered,
            retried       = s.retried,
            in_flight     = s.in_flight,
            "📊 metrics summary"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of [`Metrics`] counters.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub succeeded: u64,
    pub dead_lettered: u64,
    pub retried: u64,
    pub in_flight: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::new();
        metrics.inc_received();
        metrics.inc_received();
        metrics.inc_succeeded();
        metrics.inc_retried();
        metrics.inc_in_flight();
        metrics.dec_in_flight();

        let s = metrics.snapshot();
        assert_eq!(s.received, 2);
        assert_eq!(s.succeeded, 1);
        assert_eq!(s.retried, 1);
        assert_eq!(s.dead_lettered, 0);
        assert_eq!(s.in_flight, 0);
    }
}
