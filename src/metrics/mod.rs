use anyhow::Result;
use log::info;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

// Metrics for monitoring
pub const METRIC_QUOTES: &str = "quotes_total";
pub const METRIC_QUOTE_LATENCY: &str = "quote_latency_seconds";
pub const METRIC_AGGREGATIONS_FAILED: &str = "aggregations_failed_total";
pub const METRIC_LEDGER_APPENDS: &str = "ledger_appends_total";
pub const METRIC_LEDGER_APPEND_FAILURES: &str = "ledger_append_failures_total";
pub const METRIC_REQUESTS: &str = "price_requests_total";

/// Installs the global recorder and serves `/metrics` on `addr`.
pub fn install_exporter(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    info!("Prometheus exporter listening on {}", addr);
    Ok(())
}
