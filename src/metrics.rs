//! Prometheus counters for exports and dispatches.

use std::net::SocketAddr;

pub const ROWS_EXPORTED: &str = "partner_export_rows_total";
pub const EMPTY_EXPORTS: &str = "partner_export_empty_total";
pub const STATS_FALLBACKS: &str = "partner_export_stats_fallback_total";
pub const MESSAGES_SENT: &str = "dispatch_sent_total";
pub const MESSAGES_FAILED: &str = "dispatch_failed_total";

/// Install the Prometheus exporter on `0.0.0.0:<port>`. Failure is logged and
/// otherwise ignored.
pub fn init_metrics(port: u16) {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!("Prometheus exporter listening on http://{}/metrics", addr),
        Err(e) => tracing::warn!("Prometheus exporter install failed: {}", e),
    }
}

pub fn rows_exported(count: usize) {
    ::metrics::counter!(ROWS_EXPORTED).increment(count as u64);
}

pub fn empty_export() {
    ::metrics::counter!(EMPTY_EXPORTS).increment(1);
}

pub fn stats_fallback() {
    ::metrics::counter!(STATS_FALLBACKS).increment(1);
}

pub fn dispatch_finished(sent: usize, failed: usize) {
    ::metrics::counter!(MESSAGES_SENT).increment(sent as u64);
    ::metrics::counter!(MESSAGES_FAILED).increment(failed as u64);
}
