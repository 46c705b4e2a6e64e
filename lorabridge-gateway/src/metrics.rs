// LoRa Bridge Gateway - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for the gateway.
//!
//! Gauges mirror the last [`StatusReport`]; they are refreshed once per
//! status period, not per event.

use lazy_static::lazy_static;
use lorabridge::StatusReport;
use prometheus::{register_gauge, register_gauge_vec, Encoder, Gauge, GaugeVec, TextEncoder};

lazy_static! {
    // ============================================================
    // Connectivity
    // ============================================================

    /// WiFi association (1 = up).
    pub static ref WIFI_CONNECTED: Gauge = register_gauge!(
        "lorabridge_wifi_connected",
        "WiFi station associated (1=up, 0=down)"
    ).unwrap();

    /// Backend persistent link (1 = up).
    pub static ref BACKEND_CONNECTED: Gauge = register_gauge!(
        "lorabridge_backend_connected",
        "Persistent backend link established (1=up, 0=down)"
    ).unwrap();

    /// Station signal strength.
    pub static ref WIFI_RSSI_DBM: Gauge = register_gauge!(
        "lorabridge_wifi_rssi_dbm",
        "WiFi signal strength in dBm"
    ).unwrap();

    /// Uplink health: 0 = healthy, 1 = degraded, 2 = offline.
    pub static ref LINK_HEALTH: Gauge = register_gauge!(
        "lorabridge_link_health",
        "Uplink health (0=Healthy, 1=Degraded, 2=Offline)"
    ).unwrap();

    // ============================================================
    // Runtime
    // ============================================================

    pub static ref FREE_MEMORY_BYTES: Gauge = register_gauge!(
        "lorabridge_free_memory_bytes",
        "Free memory reported by the resource probe"
    ).unwrap();

    pub static ref UPTIME_SECONDS: Gauge = register_gauge!(
        "lorabridge_uptime_seconds",
        "Time since gateway start"
    ).unwrap();

    /// Loop iterations during the last status period.
    pub static ref LOOP_ITERATIONS: Gauge = register_gauge!(
        "lorabridge_loop_iterations",
        "Cooperative loop iterations in the last status period"
    ).unwrap();

    pub static ref PENDING_COMMAND: Gauge = register_gauge!(
        "lorabridge_pending_command",
        "Downlink command waiting for a poll (1=yes)"
    ).unwrap();

    // ============================================================
    // Frames and forwarding
    // ============================================================

    /// Frame totals by outcome.
    pub static ref FRAMES: GaugeVec = register_gauge_vec!(
        "lorabridge_frames",
        "Radio frames since start by outcome",
        &["outcome"]
    ).unwrap();

    /// Forwarding totals by leg and result.
    pub static ref FORWARDED: GaugeVec = register_gauge_vec!(
        "lorabridge_forwarded",
        "Readings offered to the backend since start",
        &["leg", "result"]
    ).unwrap();

    /// Command totals by outcome.
    pub static ref COMMANDS: GaugeVec = register_gauge_vec!(
        "lorabridge_commands",
        "Downlink commands since start by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref HEARTBEATS_SENT: Gauge = register_gauge!(
        "lorabridge_heartbeats_sent",
        "Heartbeats sent since start"
    ).unwrap();
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Refresh every gauge from a status report.
pub fn update_from_report(report: &StatusReport) {
    WIFI_CONNECTED.set(flag(report.wifi_connected));
    BACKEND_CONNECTED.set(flag(report.backend_connected));
    WIFI_RSSI_DBM.set(report.wifi_rssi as f64);
    LINK_HEALTH.set(report.health().as_gauge());

    FREE_MEMORY_BYTES.set(report.free_memory as f64);
    UPTIME_SECONDS.set(report.uptime_millis as f64 / 1000.0);
    LOOP_ITERATIONS.set(report.loop_count as f64);
    PENDING_COMMAND.set(flag(report.pending_command.is_some()));

    let c = &report.counters;
    for (outcome, value) in [
        ("received", c.frames_received),
        ("framing_reject", c.framing_rejects),
        ("address_drop", c.address_drops),
        ("control_poll", c.control_polls),
    ] {
        FRAMES.with_label_values(&[outcome]).set(value as f64);
    }

    for (leg, result, value) in [
        ("request", "ok", c.request_ok),
        ("request", "failed", c.request_failed),
        ("request", "skipped", c.request_skipped),
        ("link", "ok", c.link_ok),
        ("link", "failed", c.link_failed),
        ("link", "skipped", c.link_skipped),
    ] {
        FORWARDED.with_label_values(&[leg, result]).set(value as f64);
    }

    for (outcome, value) in [
        ("delivered", c.commands_delivered),
        ("superseded", c.commands_superseded),
        ("rejected", c.commands_rejected),
    ] {
        COMMANDS.with_label_values(&[outcome]).set(value as f64);
    }

    HEARTBEATS_SENT.set(c.heartbeats_sent as f64);
}

/// Encode all metrics in Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
