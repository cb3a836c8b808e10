//! Prometheus metrics HTTP server.
//!
//! Exposes decoder statistics in Prometheus text format via HTTP endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use tokio::net::TcpListener;
use tracing::info;

use crate::stats::{DecodeStats, HistogramPercentiles};

/// Start the Prometheus metrics HTTP server.
///
/// Runs in the background and serves metrics at `/metrics`.
/// Returns an error if the server fails to bind to the port.
pub async fn start_metrics_server(
    port: u16,
    stats: Arc<DecodeStats>,
) -> Result<(), std::io::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(stats);

    let listener = TcpListener::bind(addr).await?;
    info!("Prometheus metrics server listening on http://{}/metrics", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))
}

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Prometheus metrics endpoint.
async fn metrics_handler(State(stats): State<Arc<DecodeStats>>) -> impl IntoResponse {
    let output = format_prometheus_metrics(&stats);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}

fn push_counter(output: &mut String, name: &str, help: &str, value: u64) {
    output.push_str(&format!("# HELP {} {}\n", name, help));
    output.push_str(&format!("# TYPE {} counter\n", name));
    output.push_str(&format!("{} {}\n", name, value));
}

fn push_summary(output: &mut String, name: &str, help: &str, p: &HistogramPercentiles) {
    output.push_str(&format!("# HELP {} {}\n", name, help));
    output.push_str(&format!("# TYPE {} summary\n", name));
    output.push_str(&format!("{}{{quantile=\"0.5\"}} {}\n", name, p.p50));
    output.push_str(&format!("{}{{quantile=\"0.9\"}} {}\n", name, p.p90));
    output.push_str(&format!("{}{{quantile=\"0.99\"}} {}\n", name, p.p99));
    output.push_str(&format!("{}_count {}\n", name, p.count));
}

/// Format statistics as Prometheus text format.
fn format_prometheus_metrics(stats: &DecodeStats) -> String {
    let summary = stats.summary();
    let mut output = String::with_capacity(4096);

    // Uptime
    output.push_str("# HELP emwin_uptime_seconds Time since the decoder started\n");
    output.push_str("# TYPE emwin_uptime_seconds gauge\n");
    output.push_str(&format!("emwin_uptime_seconds {:.3}\n", summary.elapsed_secs));

    push_counter(
        &mut output,
        "emwin_transmissions_total",
        "Total number of transmissions decoded",
        summary.transmissions,
    );
    push_counter(
        &mut output,
        "emwin_empty_transmissions_total",
        "Transmissions without bulletin structure",
        summary.empty_transmissions,
    );
    push_counter(
        &mut output,
        "emwin_bulletins_total",
        "Total number of bulletins found",
        summary.bulletins,
    );

    // Segments by event
    output.push_str("# HELP emwin_segments_total Total number of segments decoded\n");
    output.push_str("# TYPE emwin_segments_total counter\n");
    for (event, count) in &summary.segments_by_event {
        output.push_str(&format!(
            "emwin_segments_total{{event=\"{}\"}} {}\n",
            event, count
        ));
    }
    // Segments without VTEC never reach the event map
    if summary.segments_by_event.is_empty() {
        output.push_str(&format!("emwin_segments_total {}\n", summary.segments));
    }

    push_counter(
        &mut output,
        "emwin_decode_failures_total",
        "Number of segments that failed to decode",
        summary.decode_failures,
    );
    push_counter(
        &mut output,
        "emwin_bytes_processed_total",
        "Total bytes of raw input processed",
        summary.bytes_processed,
    );

    // Segments per second rate
    output.push_str("# HELP emwin_segments_per_second Current segment decoding rate\n");
    output.push_str("# TYPE emwin_segments_per_second gauge\n");
    output.push_str(&format!(
        "emwin_segments_per_second {:.3}\n",
        summary.segments_per_second
    ));

    // Segments by action
    output.push_str("# HELP emwin_segments_by_action_total Segments broken down by VTEC action\n");
    output.push_str("# TYPE emwin_segments_by_action_total counter\n");
    for (action, count) in &summary.segments_by_action {
        output.push_str(&format!(
            "emwin_segments_by_action_total{{action=\"{}\"}} {}\n",
            action, count
        ));
    }

    // Filter matches
    output.push_str("# HELP emwin_filter_matches_total Segments selected by each output filter\n");
    output.push_str("# TYPE emwin_filter_matches_total counter\n");
    for (filter, count) in &summary.matches_by_filter {
        output.push_str(&format!(
            "emwin_filter_matches_total{{filter=\"{}\"}} {}\n",
            filter, count
        ));
    }

    if let Some(ref p) = summary.segments_per_transmission {
        push_summary(
            &mut output,
            "emwin_segments_per_transmission",
            "Segments per transmission",
            p,
        );
    }
    if let Some(ref p) = summary.areas_per_segment {
        push_summary(
            &mut output,
            "emwin_areas_per_segment",
            "Zones and counties named per segment",
            p,
        );
    }
    if let Some(ref p) = summary.polygon_vertices {
        push_summary(
            &mut output,
            "emwin_polygon_vertices",
            "Vertices per warning polygon",
            p,
        );
    }

    output
}
