//! Metrics collection and export.
//!
//! Uses the `metrics` crate for instrumentation and exports to
//! Prometheus format. The engine keeps its own counters; the event
//! loop publishes them here after processing each event.

use courier_core::EngineStats;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const SESSIONS_TOTAL: &str = "courier_sessions_total";
    pub const SESSIONS_ACTIVE: &str = "courier_sessions_active";
    pub const FRAMES_RECEIVED: &str = "courier_frames_received_total";
    pub const MESSAGES_ROUTED: &str = "courier_messages_routed_total";
    pub const MESSAGES_DROPPED: &str = "courier_messages_dropped_total";
    pub const OVERSIZE_REJECTED: &str = "courier_oversize_rejected_total";
    pub const PROTOCOL_ERRORS: &str = "courier_protocol_errors_total";
}

/// Register metric descriptions.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::SESSIONS_TOTAL,
        "Total sessions accepted since broker start"
    );
    metrics::describe_gauge!(names::SESSIONS_ACTIVE, "Current number of live sessions");
    metrics::describe_counter!(names::FRAMES_RECEIVED, "Total frames received");
    metrics::describe_counter!(
        names::MESSAGES_ROUTED,
        "MESSAGE frames enqueued to subscribers"
    );
    metrics::describe_counter!(
        names::MESSAGES_DROPPED,
        "MESSAGE frames dropped on full subscriber queues"
    );
    metrics::describe_counter!(
        names::OVERSIZE_REJECTED,
        "Publishes rejected for exceeding the size limit"
    );
    metrics::describe_counter!(names::PROTOCOL_ERRORS, "Framing and payload errors");
}

/// Start the Prometheus exporter.
///
/// # Errors
///
/// Returns an error if the exporter cannot bind its listener.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("metrics exporter listening on {}", addr);
    Ok(())
}

/// Publish the engine's counters.
pub fn sync_engine(stats: &EngineStats, active_sessions: usize) {
    counter!(names::SESSIONS_TOTAL).absolute(stats.sessions_opened);
    gauge!(names::SESSIONS_ACTIVE).set(active_sessions as f64);
    counter!(names::FRAMES_RECEIVED).absolute(stats.frames_received);
    counter!(names::MESSAGES_ROUTED).absolute(stats.messages_routed);
    counter!(names::MESSAGES_DROPPED).absolute(stats.messages_dropped);
    counter!(names::OVERSIZE_REJECTED).absolute(stats.oversize_rejected);
    counter!(names::PROTOCOL_ERRORS).absolute(stats.protocol_errors);
}
