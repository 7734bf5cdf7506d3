use std::net::SocketAddr;

// ── Request-driven ──────────────────────────────────────────────

/// Counter: engine operations. Labels: op, outcome (`ok` or an error kind).
pub const OPERATIONS_TOTAL: &str = "stayd_operations_total";

/// Histogram: engine operation latency in seconds. Labels: op.
pub const OPERATION_DURATION_SECONDS: &str = "stayd_operation_duration_seconds";

/// Counter: cache lookups. Labels: result (`hit`, `miss`, `error`).
pub const CACHE_LOOKUPS_TOTAL: &str = "stayd_cache_lookups_total";

/// Counter: cache keys removed by pattern invalidation.
pub const CACHE_INVALIDATED_KEYS_TOTAL: &str = "stayd_cache_invalidated_keys_total";

// ── Background work ─────────────────────────────────────────────

/// Counter: notifications dropped because the queue was full or closed.
pub const EFFECTS_DROPPED_TOTAL: &str = "stayd_effects_dropped_total";

/// Counter: side effects that ran and failed. Labels: effect.
pub const EFFECTS_FAILED_TOTAL: &str = "stayd_effects_failed_total";

/// Histogram: records committed per journal fsync.
pub const JOURNAL_BATCH_SIZE: &str = "stayd_journal_batch_size";

/// Histogram: journal write plus fsync duration in seconds.
pub const JOURNAL_SYNC_DURATION_SECONDS: &str = "stayd_journal_sync_duration_seconds";

/// Counter: bookings moved to EXPIRED by the sweeper.
pub const SWEEP_EXPIRED_TOTAL: &str = "stayd_sweep_expired_total";

/// Counter: bookings the sweeper failed to expire.
pub const SWEEP_FAILURES_TOTAL: &str = "stayd_sweep_failures_total";

/// Histogram: sweep duration in seconds.
pub const SWEEP_DURATION_SECONDS: &str = "stayd_sweep_duration_seconds";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
