//! Prometheus metrics (lock-free atomics, zero allocation on hot path).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    // --- Traffic ---
    pub listings_created: AtomicU64,
    pub submissions_total: AtomicU64,

    // --- Confirmation outcomes ---
    pub confirms_total: AtomicU64,
    pub mismatches_total: AtomicU64,
    pub timeouts_total: AtomicU64,
    pub rejects_total: AtomicU64,
    pub double_accepts_total: AtomicU64,

    // --- Confirmation latency (μs, updated via CAS) ---
    pub confirm_duration_us_sum: AtomicU64,
    pub confirm_duration_us_max: AtomicU64,

    // --- Ledger ---
    pub ledger_errors: AtomicU64,
    pub ledger_failovers: AtomicU64,
}

impl Metrics {
    const fn new() -> Self {
        Self {
            listings_created: AtomicU64::new(0),
            submissions_total: AtomicU64::new(0),
            confirms_total: AtomicU64::new(0),
            mismatches_total: AtomicU64::new(0),
            timeouts_total: AtomicU64::new(0),
            rejects_total: AtomicU64::new(0),
            double_accepts_total: AtomicU64::new(0),
            confirm_duration_us_sum: AtomicU64::new(0),
            confirm_duration_us_max: AtomicU64::new(0),
            ledger_errors: AtomicU64::new(0),
            ledger_failovers: AtomicU64::new(0),
        }
    }

    pub fn record_confirm_duration(&self, start: Instant) {
        let us = start.elapsed().as_micros() as u64;
        self.confirm_duration_us_sum.fetch_add(us, Ordering::Relaxed);
        // CAS loop for max tracking
        let mut cur = self.confirm_duration_us_max.load(Ordering::Relaxed);
        while us > cur {
            match self.confirm_duration_us_max.compare_exchange_weak(
                cur,
                us,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self, active_polls: u64) -> String {
        let listings = self.listings_created.load(Ordering::Relaxed);
        let submissions = self.submissions_total.load(Ordering::Relaxed);
        let confirms = self.confirms_total.load(Ordering::Relaxed);
        let mismatches = self.mismatches_total.load(Ordering::Relaxed);
        let timeouts = self.timeouts_total.load(Ordering::Relaxed);
        let rejects = self.rejects_total.load(Ordering::Relaxed);
        let double_accepts = self.double_accepts_total.load(Ordering::Relaxed);
        let dur_sum = self.confirm_duration_us_sum.load(Ordering::Relaxed);
        let dur_max = self.confirm_duration_us_max.swap(0, Ordering::Relaxed);
        let ledger_errors = self.ledger_errors.load(Ordering::Relaxed);
        let ledger_failovers = self.ledger_failovers.load(Ordering::Relaxed);

        // Convert μs to seconds for Prometheus conventions
        let dur_sum_s = dur_sum as f64 / 1_000_000.0;
        let dur_max_s = dur_max as f64 / 1_000_000.0;

        format!(
            "\
# HELP marketd_listings_created_total Listings created.\n\
# TYPE marketd_listings_created_total counter\n\
marketd_listings_created_total {listings}\n\
# HELP marketd_submissions_total Signed-transaction submissions accepted.\n\
# TYPE marketd_submissions_total counter\n\
marketd_submissions_total {submissions}\n\
# HELP marketd_confirms_total Transactions confirmed by the ledger.\n\
# TYPE marketd_confirms_total counter\n\
marketd_confirms_total {confirms}\n\
# HELP marketd_mismatches_total Confirmed transactions rejected for template mismatch.\n\
# TYPE marketd_mismatches_total counter\n\
marketd_mismatches_total {mismatches}\n\
# HELP marketd_timeouts_total Confirmation deadlines exceeded.\n\
# TYPE marketd_timeouts_total counter\n\
marketd_timeouts_total {timeouts}\n\
# HELP marketd_rejects_total Transactions finalized unsuccessfully by the ledger.\n\
# TYPE marketd_rejects_total counter\n\
marketd_rejects_total {rejects}\n\
# HELP marketd_double_accepts_total Late accept confirmations needing manual reconciliation.\n\
# TYPE marketd_double_accepts_total counter\n\
marketd_double_accepts_total {double_accepts}\n\
# HELP marketd_confirm_duration_seconds_sum Total submission-to-resolution time (seconds).\n\
# TYPE marketd_confirm_duration_seconds_sum counter\n\
marketd_confirm_duration_seconds_sum {dur_sum_s:.6}\n\
# HELP marketd_confirm_duration_seconds_max Max resolution time since last scrape (seconds).\n\
# TYPE marketd_confirm_duration_seconds_max gauge\n\
marketd_confirm_duration_seconds_max {dur_max_s:.6}\n\
# HELP marketd_ledger_errors_total Ledger RPC errors.\n\
# TYPE marketd_ledger_errors_total counter\n\
marketd_ledger_errors_total {ledger_errors}\n\
# HELP marketd_ledger_failovers_total Ledger primary-to-fallback failovers.\n\
# TYPE marketd_ledger_failovers_total counter\n\
marketd_ledger_failovers_total {ledger_failovers}\n\
# HELP marketd_confirm_polls_active In-flight confirmation poll tasks.\n\
# TYPE marketd_confirm_polls_active gauge\n\
marketd_confirm_polls_active {active_polls}\n"
        )
    }
}
