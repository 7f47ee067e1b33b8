//! Prometheus exporter for the ingestion session.
//!
//! Serves the `sysevent_*` series on `GET /metrics`: received and dropped
//! datagram counters (`reason="ring_full"` or `reason="oversized"`),
//! dispatched, filtered, parse-fallback, build-failure and dispatch-failure
//! counters, listener restarts, and the `sysevent_ring_pending` gauge.

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use sysevent_core::config::MetricsConfig;

/// Install the global recorder, start the scrape listener, and register
/// descriptions for every `sysevent_*` series.
///
/// Only one recorder can exist per process; a second call fails.
///
/// # Errors
///
/// - Unsupported endpoint path or unparsable listen address
/// - Socket binding fails
/// - Global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is currently supported",
            config.endpoint
        ));
    }

    let addr: SocketAddr = format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {e}"))?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces; restrict listen_addr in untrusted networks"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {e}"))?;

    sysevent_core::metrics::describe_all();

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}
