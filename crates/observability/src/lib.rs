use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    scams_detected_total: AtomicU64,
    intel_items_total: AtomicU64,
    reports_sent_total: AtomicU64,
    report_failures_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub scams_detected_total: u64,
    pub intel_items_total: u64,
    pub reports_sent_total: u64,
    pub report_failures_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_scam_detected(&self) {
        self.scams_detected_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_intel_items(&self, items: usize) {
        self.intel_items_total
            .fetch_add(items as u64, Ordering::Relaxed);
    }

    pub fn inc_report_sent(&self) {
        self.reports_sent_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_report_failure(&self) {
        self.report_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            scams_detected_total: self.scams_detected_total.load(Ordering::Relaxed),
            intel_items_total: self.intel_items_total.load(Ordering::Relaxed),
            reports_sent_total: self.reports_sent_total.load(Ordering::Relaxed),
            report_failures_total: self.report_failures_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,mirage_api=info,mirage_agents=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}
