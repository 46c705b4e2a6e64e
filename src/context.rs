//! Gateway runtime context
//!
//! Connection flags, the command mailbox, counters and the downlink
//! sequence counter live in one [`GatewayContext`] built once at startup
//! and passed by reference into the dispatcher, the transport bridge and
//! the connectivity supervisor.

use crate::mailbox::CommandMailbox;
use crate::protocol::SequenceCounter;
use serde::Serialize;

/// Link state shared by all gating decisions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    /// WiFi station associated
    pub wifi_connected: bool,
    /// Start time of the last WiFi connect attempt
    pub last_wifi_attempt_at: Option<u64>,
    /// Persistent backend link established
    pub backend_connected: bool,
}

/// Running totals since startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GatewayCounters {
    /// Packets read from the radio
    pub frames_received: u64,
    /// Packets dropped by the codec
    pub framing_rejects: u64,
    /// Frames for another address
    pub address_drops: u64,
    /// Control polls handled
    pub control_polls: u64,
    /// Commands transmitted to a node
    pub commands_delivered: u64,
    /// Pending commands replaced before delivery
    pub commands_superseded: u64,
    /// Inbound commands that failed to decode
    pub commands_rejected: u64,
    /// Request leg successes
    pub request_ok: u64,
    /// Request leg failures
    pub request_failed: u64,
    /// Request leg skipped while WiFi was down
    pub request_skipped: u64,
    /// Link leg successes
    pub link_ok: u64,
    /// Link leg failures
    pub link_failed: u64,
    /// Link leg skipped while disconnected
    pub link_skipped: u64,
    /// Heartbeats sent
    pub heartbeats_sent: u64,
    /// Loop iterations since the last status report
    pub loop_count: u64,
}

/// Mutable state of one gateway process
#[derive(Debug, Default)]
pub struct GatewayContext {
    /// Link flags
    pub connection: ConnectionState,
    /// Next downlink command
    pub mailbox: CommandMailbox,
    /// Totals
    pub counters: GatewayCounters,
    /// Downlink sequence numbers
    pub sequence: SequenceCounter,
}

impl GatewayContext {
    /// Fresh context, everything disconnected and empty
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_idle() {
        let ctx = GatewayContext::new();
        assert!(!ctx.connection.wifi_connected);
        assert!(!ctx.connection.backend_connected);
        assert!(ctx.connection.last_wifi_attempt_at.is_none());
        assert!(ctx.mailbox.is_empty());
        assert_eq!(ctx.counters, GatewayCounters::default());
        assert_eq!(ctx.sequence.peek(), 0);
    }
}
