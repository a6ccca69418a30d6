use tracing_subscriber::EnvFilter;

// metric names
pub const SNAPSHOTS_APPLIED: &str = "depthx_snapshots_applied_total";
pub const UPDATE_BATCHES_APPLIED: &str = "depthx_update_batches_applied_total";
pub const BATCHES_REJECTED: &str = "depthx_batches_rejected_total";
pub const FEED_RECONNECTS: &str = "depthx_feed_reconnects_total";
pub const CSV_ROWS_WRITTEN: &str = "depthx_csv_rows_written_total";
pub const DEPTH_DUMPS_WRITTEN: &str = "depthx_depth_dumps_written_total";
pub const UP: &str = "depthx_up";

/// RUST_LOG wins over `default_filter` when set.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .try_init();
}

#[cfg(feature = "metrics-exporter")]
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;

    tracing::info!(port, "prometheus exporter listening on /metrics");
    metrics::gauge!(UP).set(1.0);
    Ok(())
}

#[cfg(not(feature = "metrics-exporter"))]
pub fn init_metrics(_port: u16) -> anyhow::Result<()> {
    Ok(())
}
