//! Prometheus metrics HTTP server.
//!
//! Exposes relay statistics in Prometheus text format at `/metrics`, the
//! full summary as JSON at `/stats`, and a liveness probe at `/health`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::stats::{HistogramPercentiles, RelayStats, RelaySummary};

/// Start the metrics HTTP server on all interfaces.
///
/// Runs until the process exits. Returns an error if the server fails to
/// bind to the port.
pub async fn start_metrics_server(port: u16, stats: Arc<RelayStats>) -> Result<(), std::io::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Prometheus metrics server listening on http://{}/metrics", addr);
    serve(listener, stats).await
}

/// Serve the metrics endpoints on an already bound listener.
pub async fn serve(listener: TcpListener, stats: Arc<RelayStats>) -> Result<(), std::io::Error> {
    axum::serve(listener, router(stats))
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))
}

/// Routes for the metrics server.
pub fn router(stats: Arc<RelayStats>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .with_state(stats)
}

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Prometheus metrics endpoint.
async fn metrics_handler(State(stats): State<Arc<RelayStats>>) -> impl IntoResponse {
    let output = format_prometheus_metrics(&stats.summary());
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}

/// JSON summary endpoint.
async fn stats_handler(State(stats): State<Arc<RelayStats>>) -> Json<RelaySummary> {
    Json(stats.summary())
}

/// Escape a label value for the Prometheus text format.
fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn push_counter(output: &mut String, name: &str, help: &str, value: u64) {
    output.push_str(&format!("# HELP {} {}\n", name, help));
    output.push_str(&format!("# TYPE {} counter\n", name));
    output.push_str(&format!("{} {}\n", name, value));
}

fn push_labelled(
    output: &mut String,
    name: &str,
    help: &str,
    label: &str,
    counts: &HashMap<String, u64>,
) {
    output.push_str(&format!("# HELP {} {}\n", name, help));
    output.push_str(&format!("# TYPE {} counter\n", name));
    let mut entries: Vec<_> = counts.iter().collect();
    entries.sort();
    for (value, count) in entries {
        output.push_str(&format!(
            "{}{{{}=\"{}\"}} {}\n",
            name,
            label,
            escape_label(value),
            count
        ));
    }
}

fn push_summary(output: &mut String, name: &str, help: &str, p: &HistogramPercentiles, count: u64) {
    output.push_str(&format!("# HELP {} {}\n", name, help));
    output.push_str(&format!("# TYPE {} summary\n", name));
    output.push_str(&format!("{}{{quantile=\"0.5\"}} {}\n", name, p.p50));
    output.push_str(&format!("{}{{quantile=\"0.9\"}} {}\n", name, p.p90));
    output.push_str(&format!("{}{{quantile=\"0.99\"}} {}\n", name, p.p99));
    output.push_str(&format!("{}_count {}\n", name, count));
}

/// Format a statistics summary as Prometheus text format.
pub fn format_prometheus_metrics(summary: &RelaySummary) -> String {
    let mut output = String::with_capacity(4096);

    // Uptime
    output.push_str("# HELP relay_uptime_seconds Time since the relay started\n");
    output.push_str("# TYPE relay_uptime_seconds gauge\n");
    output.push_str(&format!("relay_uptime_seconds {:.3}\n", summary.elapsed_secs));

    push_counter(
        &mut output,
        "relay_datagrams_received_total",
        "Datagrams read from the listen socket",
        summary.datagrams_received,
    );
    push_counter(
        &mut output,
        "relay_bytes_received_total",
        "Payload bytes read from the listen socket",
        summary.bytes_received,
    );
    push_counter(
        &mut output,
        "relay_relayed_total",
        "Contacts forwarded to the target",
        summary.relayed,
    );

    // Drops by reason
    output.push_str("# HELP relay_dropped_total Datagrams dropped, by reason\n");
    output.push_str("# TYPE relay_dropped_total counter\n");
    for (reason, count) in [
        ("source_rejected", summary.source_rejected),
        ("overloaded", summary.overloaded),
        ("parse", summary.parse_failures),
        ("serialize", summary.serialize_failures),
        ("send", summary.send_failures),
    ] {
        output.push_str(&format!(
            "relay_dropped_total{{reason=\"{}\"}} {}\n",
            reason, count
        ));
    }

    // Relay rate
    output.push_str("# HELP relay_contacts_per_second Current relay rate\n");
    output.push_str("# TYPE relay_contacts_per_second gauge\n");
    output.push_str(&format!(
        "relay_contacts_per_second {:.3}\n",
        summary.relayed_per_second
    ));

    push_labelled(
        &mut output,
        "relay_relayed_by_dialect_total",
        "Contacts forwarded, by source dialect",
        "dialect",
        &summary.relayed_by_dialect,
    );
    push_labelled(
        &mut output,
        "relay_relayed_by_band_total",
        "Contacts forwarded, by band",
        "band",
        &summary.relayed_by_band,
    );
    push_labelled(
        &mut output,
        "relay_relayed_by_mode_total",
        "Contacts forwarded, by mode",
        "mode",
        &summary.relayed_by_mode,
    );
    push_labelled(
        &mut output,
        "relay_parse_failures_by_dialect_total",
        "Parse failures, by dialect",
        "dialect",
        &summary.parse_failures_by_dialect,
    );

    if let Some(ref size) = summary.size_percentiles {
        push_summary(
            &mut output,
            "relay_payload_bytes",
            "Inbound payload size distribution",
            size,
            summary.datagrams_received,
        );
    }

    if let Some(ref latency) = summary.latency_percentiles {
        push_summary(
            &mut output,
            "relay_latency_microseconds",
            "Receive-to-send latency distribution",
            latency,
            summary.relayed,
        );
    }

    output
}
