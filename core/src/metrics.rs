// ABOUTME: Global metrics counters for the get-logs path, rendered as Prometheus text
// ABOUTME: Atomic counters incremented by the query engine and read by whatever serves /metrics

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics counters accessible from any crate
pub struct Metrics {
    /// Total get-logs queries started
    pub get_logs_total: AtomicU64,
    /// Queries whose result included logs read from the persistent store
    pub get_logs_store_hits: AtomicU64,
    /// Query attempts discarded because the store processed a reorg mid-query
    pub get_logs_reorg_retries: AtomicU64,
    /// Queries that ran out of time (reorg storm or slow upstream)
    pub get_logs_timeouts: AtomicU64,
}

impl Metrics {
    const fn new() -> Self {
        Self {
            get_logs_total: AtomicU64::new(0),
            get_logs_store_hits: AtomicU64::new(0),
            get_logs_reorg_retries: AtomicU64::new(0),
            get_logs_timeouts: AtomicU64::new(0),
        }
    }

    pub fn inc_get_logs(&self) {
        self.get_logs_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_store_hit(&self) {
        self.get_logs_store_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reorg_retry(&self) {
        self.get_logs_reorg_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_timeout(&self) {
        self.get_logs_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Format all metrics as Prometheus text
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP gateway_get_logs_total Total get-logs queries\n");
        output.push_str("# TYPE gateway_get_logs_total counter\n");
        output.push_str(&format!(
            "gateway_get_logs_total {}\n",
            self.get_logs_total.load(Ordering::Relaxed)
        ));

        output.push_str("\n# HELP gateway_get_logs_store_hits_total Get-logs queries served partly or fully from the log store\n");
        output.push_str("# TYPE gateway_get_logs_store_hits_total counter\n");
        output.push_str(&format!(
            "gateway_get_logs_store_hits_total {}\n",
            self.get_logs_store_hits.load(Ordering::Relaxed)
        ));

        output.push_str("\n# HELP gateway_get_logs_reorg_retries_total Get-logs attempts retried after a reorg\n");
        output.push_str("# TYPE gateway_get_logs_reorg_retries_total counter\n");
        output.push_str(&format!(
            "gateway_get_logs_reorg_retries_total {}\n",
            self.get_logs_reorg_retries.load(Ordering::Relaxed)
        ));

        output.push_str("\n# HELP gateway_get_logs_timeouts_total Get-logs queries that exceeded their deadline\n");
        output.push_str("# TYPE gateway_get_logs_timeouts_total counter\n");
        output.push_str(&format!(
            "gateway_get_logs_timeouts_total {}\n",
            self.get_logs_timeouts.load(Ordering::Relaxed)
        ));

        output
    }
}

pub static METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);
