use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

const LOGGING_CRATES: &[&str] = &["carbon_api", "carbon_service", "carbon_estimator"];

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    items_total: AtomicU64,
    remote_estimates_total: AtomicU64,
    fallback_total: AtomicU64,
    unresolved_distance_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub items_total: u64,
    pub remote_estimates_total: u64,
    pub fallback_total: u64,
    pub unresolved_distance_total: u64,
    pub avg_latency_millis: f64,
    /// Share of item estimates that used the fallback formula.
    pub fallback_ratio: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_items(&self, items: usize) {
        self.items_total.fetch_add(items as u64, Ordering::Relaxed);
    }

    pub fn inc_remote_estimate(&self) {
        self.remote_estimates_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fallback(&self) {
        self.fallback_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unresolved_distance(&self) {
        self.unresolved_distance_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        let requests = load(&self.requests_total);
        let remote = load(&self.remote_estimates_total);
        let fallback = load(&self.fallback_total);

        MetricsSnapshot {
            requests_total: requests,
            items_total: load(&self.items_total),
            remote_estimates_total: remote,
            fallback_total: fallback,
            unresolved_distance_total: load(&self.unresolved_distance_total),
            avg_latency_millis: ratio(load(&self.total_latency_millis), requests),
            fallback_ratio: ratio(fallback, remote + fallback),
        }
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// `EnvFilter` directives used when `RUST_LOG` is unset: the calling binary
/// first, then every workspace crate that logs, each at `info`.
pub fn default_directives(service_name: &str) -> String {
    std::iter::once(service_name)
        .chain(LOGGING_CRATES.iter().copied().filter(|name| *name != service_name))
        .map(|name| format!("{name}=info"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Installs the JSON subscriber once per process. Later calls, or a
/// subscriber installed elsewhere first, leave the existing one in place.
pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives(service_name)));

        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(false)
            .try_init();
    });
}
