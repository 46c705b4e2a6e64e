//! Periodic gateway status
//!
//! A [`StatusReport`] snapshots connectivity, resources and counters. The
//! gateway logs one every status period and the daemon mirrors it into
//! Prometheus gauges.

use crate::context::{GatewayContext, GatewayCounters};
use crate::mailbox::PendingCommand;
use serde::Serialize;
use std::fmt;

/// Overall uplink health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkHealth {
    /// WiFi and backend link both up
    Healthy,
    /// Exactly one of the two up
    Degraded,
    /// Neither up
    #[default]
    Offline,
}

impl LinkHealth {
    /// Classify from the two connection flags
    pub fn from_flags(wifi_connected: bool, backend_connected: bool) -> Self {
        match (wifi_connected, backend_connected) {
            (true, true) => Self::Healthy,
            (false, false) => Self::Offline,
            _ => Self::Degraded,
        }
    }

    /// Whether readings can reach the backend at all
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }

    /// Gauge value (0 healthy, 1 degraded, 2 offline)
    pub fn as_gauge(&self) -> f64 {
        match self {
            Self::Healthy => 0.0,
            Self::Degraded => 1.0,
            Self::Offline => 2.0,
        }
    }
}

impl fmt::Display for LinkHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Snapshot produced every status period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    /// Loop iterations since the previous report
    pub loop_count: u64,
    /// WiFi flag
    pub wifi_connected: bool,
    /// Station signal strength
    pub wifi_rssi: i32,
    /// Backend link flag
    pub backend_connected: bool,
    /// Free memory in bytes
    pub free_memory: u64,
    /// Time since start
    pub uptime_millis: u64,
    /// Command waiting for a poll
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_command: Option<String>,
    /// Totals since start
    pub counters: GatewayCounters,
}

impl StatusReport {
    /// Snapshot the context
    pub fn capture(ctx: &GatewayContext, wifi_rssi: i32, free_memory: u64, uptime_millis: u64) -> Self {
        Self {
            loop_count: ctx.counters.loop_count,
            wifi_connected: ctx.connection.wifi_connected,
            wifi_rssi,
            backend_connected: ctx.connection.backend_connected,
            free_memory,
            uptime_millis,
            pending_command: ctx.mailbox.peek().map(describe),
            counters: ctx.counters.clone(),
        }
    }

    /// Uplink health
    pub fn health(&self) -> LinkHealth {
        LinkHealth::from_flags(self.wifi_connected, self.backend_connected)
    }
}

fn describe(command: &PendingCommand) -> String {
    format!("{} -> {}", command.payload, command.target)
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loops={} wifi={} rssi={}dBm link={} free={}B uptime={}ms frames={} forwarded={}/{}",
            self.loop_count,
            if self.wifi_connected { "up" } else { "down" },
            self.wifi_rssi,
            if self.backend_connected { "up" } else { "down" },
            self.free_memory,
            self.uptime_millis,
            self.counters.frames_received,
            self.counters.request_ok,
            self.counters.link_ok,
        )?;
        if let Some(ref command) = self.pending_command {
            write!(f, " pending=\"{}\"", command)?;
        }
        Ok(())
    }
}
