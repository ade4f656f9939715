use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: successful engine operations. Labels: op.
pub const OPS_TOTAL: &str = "reserba_ops_total";

/// Histogram: engine operation latency in seconds. Labels: op.
pub const OP_DURATION_SECONDS: &str = "reserba_op_duration_seconds";

/// Counter: writes refused because the slot was already held.
pub const CONFLICTS_TOTAL: &str = "reserba_conflicts_total";

/// Counter: operations refused because the schedule lock wait ran out.
pub const BUSY_TOTAL: &str = "reserba_busy_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: reservations currently holding a slot (active-set statuses).
pub const ACTIVE_RESERVATIONS: &str = "reserba_active_reservations";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "reserba_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "reserba_wal_flush_batch_size";

/// Observability bootstrap for the embedding service: installs a fmt tracing
/// subscriber, then the Prometheus metrics exporter when a port is given.
/// Call once at startup.
pub fn init(metrics_port: Option<u16>) {
    tracing_subscriber::fmt::init();
    let Some(port) = metrics_port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
