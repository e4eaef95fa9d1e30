use crate::types::Namespace;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Log target for operations slower than the configured threshold.
pub const SLOW_TARGET: &str = "docquery::slow";

pub const DEFAULT_SLOW_QUERY_MS: u64 = 500;

#[derive(Default)]
pub struct Metrics {
    pub queries_total: AtomicU64,
    pub queries_slow_total: AtomicU64,
    pub queries_failed_total: AtomicU64,
    pub documents_returned_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queries_total: u64,
    pub queries_slow_total: u64,
    pub queries_failed_total: u64,
    pub documents_returned_total: u64,
}

impl Metrics {
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_total: self.queries_total.load(Ordering::Relaxed),
            queries_slow_total: self.queries_slow_total.load(Ordering::Relaxed),
            queries_failed_total: self.queries_failed_total.load(Ordering::Relaxed),
            documents_returned_total: self.documents_returned_total.load(Ordering::Relaxed),
        }
    }

    /// Records one finished operation; `returned` is `None` when it failed. Slow operations
    /// are also logged on `SLOW_TARGET`.
    pub fn record(&self, op: &str, ns: &Namespace, elapsed: Duration, slow_query_ms: u64, returned: Option<usize>) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        match returned {
            Some(n) => {
                self.documents_returned_total.fetch_add(n as u64, Ordering::Relaxed);
                log::debug!("{op} {ns}: {n} docs in {ms} ms");
            }
            None => {
                self.queries_failed_total.fetch_add(1, Ordering::Relaxed);
                log::debug!("{op} {ns}: failed after {ms} ms");
            }
        }
        if ms >= slow_query_ms {
            self.queries_slow_total.fetch_add(1, Ordering::Relaxed);
            log::warn!(target: SLOW_TARGET, "slow {op} on {ns}: {ms} ms (threshold {slow_query_ms} ms)");
        }
    }
}
