use std::net::SocketAddr;

use crate::wire::Request;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total requests handled. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "labslot_requests_total";

/// Histogram: request latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "labslot_request_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "labslot_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "labslot_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "labslot_connections_rejected_total";

// ── Schedule outcomes ───────────────────────────────────────────

/// Counter: committed bookings.
pub const BOOKINGS_TOTAL: &str = "labslot_bookings_total";

/// Counter: bookings refused because the slot was taken.
pub const BOOKING_CONFLICTS_TOTAL: &str = "labslot_booking_conflicts_total";

/// Counter: reservation rows removed by cancellation.
pub const CANCELLATIONS_TOTAL: &str = "labslot_cancellations_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a request variant to a short label for metrics.
pub fn request_label(request: &Request) -> &'static str {
    match request {
        Request::Book(_) => "book",
        Request::Cancel(_) => "cancel",
        Request::CancelById { .. } => "cancel_by_id",
        Request::Schedule => "schedule",
        Request::Mine { .. } => "mine",
        Request::Equipment => "equipment",
        Request::Watch { .. } => "watch",
    }
}
