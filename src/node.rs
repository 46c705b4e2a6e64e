// LoRa Bridge - Radio-to-backend gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Sensor node agent
//!
//! A node has no listen window of its own. It transmits one frame per
//! reading interval in a fixed cycle: `readings_per_cycle` data frames,
//! then one control poll, after which the gateway may answer with a queued
//! command. Received frames pass the same codec and address filter as on
//! the gateway; only frames from the configured gateway are applied.

use crate::clock::Clock;
use crate::error::{BridgeError, Result};
use crate::filter::AddressFilter;
use crate::protocol::{Address, Frame, PacketCodec, SequenceCounter, CONTROL_SENTINEL};
use crate::radio::RadioDriver;
use crate::scheduler::{Scheduler, TaskKind};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Node configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Own address
    pub address: Address,
    /// Gateway all frames go to
    pub gateway: Address,
    /// One frame per interval
    pub reading_interval: Duration,
    /// Data frames before each poll
    pub readings_per_cycle: u32,
}

impl NodeConfig {
    /// Defaults for a node address
    pub fn for_address(address: Address) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            address: Address::Node1,
            gateway: Address::Master,
            reading_interval: Duration::from_secs(1),
            readings_per_cycle: 5,
        }
    }
}

/// One sampled measurement pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Primary value, field 0 on the wire
    pub primary: f32,
    /// Secondary value, field 1 on the wire
    pub secondary: f32,
}

impl Measurement {
    /// Data payload text, two decimals per field
    pub fn to_payload(&self) -> String {
        format!("{:.2},{:.2}", self.primary, self.secondary)
    }
}

/// Measurement acquisition
pub trait SensorSource {
    /// Take one measurement in physical units
    fn sample(&mut self) -> Measurement;
}

/// Source returning the same measurement every time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantSource(pub Measurement);

impl SensorSource for ConstantSource {
    fn sample(&mut self) -> Measurement {
        self.0
    }
}

/// Radio parameters set by downlink commands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RadioSettings {
    /// Transmit power
    pub tx_power: Option<i32>,
    /// Spreading factor
    pub spreading_factor: Option<i32>,
    /// Text of the last applied command
    pub last_command: Option<String>,
}

impl RadioSettings {
    /// Apply a command text
    ///
    /// Understands `"<tp>,<sf>"`, `"SF<n>"` and `"TP<n>"`. Any text is kept
    /// as the last command even when no setting changes.
    pub fn apply(&mut self, command: &str) {
        let text = command.trim();
        if let Some(sf) = text.strip_prefix("SF").and_then(|n| n.trim().parse().ok()) {
            self.spreading_factor = Some(sf);
        } else if let Some(tp) = text.strip_prefix("TP").and_then(|n| n.trim().parse().ok()) {
            self.tx_power = Some(tp);
        } else if let Some((tp, sf)) = text.split_once(',') {
            if let (Ok(tp), Ok(sf)) = (tp.trim().parse(), sf.trim().parse()) {
                self.tx_power = Some(tp);
                self.spreading_factor = Some(sf);
            }
        }
        self.last_command = Some(command.to_string());
    }
}

/// Frame sent during one tick
#[derive(Debug, Clone, PartialEq)]
pub enum Uplink {
    /// Data frame
    Reading(Measurement),
    /// Control poll
    Poll,
}

/// What one node tick did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeTick {
    /// Frame transmitted
    pub sent: Option<Uplink>,
    /// Command received and applied
    pub command: Option<String>,
}

/// Sensor-side counterpart of the gateway
#[derive(Debug)]
pub struct NodeAgent<R, S, C> {
    config: NodeConfig,
    radio: R,
    source: S,
    clock: C,
    filter: AddressFilter,
    scheduler: Scheduler,
    sequence: SequenceCounter,
    slot: u32,
    settings: RadioSettings,
}

impl<R: RadioDriver, S: SensorSource, C: Clock> NodeAgent<R, S, C> {
    /// Create an agent. Nothing is sent until [`NodeAgent::start`].
    pub fn new(config: NodeConfig, radio: R, source: S, clock: C) -> Self {
        Self {
            filter: AddressFilter::new(config.address),
            config,
            radio,
            source,
            clock,
            scheduler: Scheduler::new(),
            sequence: SequenceCounter::new(),
            slot: 0,
            settings: RadioSettings::default(),
        }
    }

    /// Bring the radio up and arm the measurement timer
    pub fn start(&mut self) -> Result<()> {
        self.radio.init().map_err(BridgeError::RadioInit)?;
        self.scheduler.register(
            TaskKind::Measurement,
            self.config.reading_interval,
            self.clock.now_millis(),
        );
        info!("Node {} started", self.config.address);
        Ok(())
    }

    /// Send the frame of the current slot if due, then read one packet
    ///
    /// A failed transmit is logged and uses up its slot; the receive step
    /// still runs.
    pub fn tick(&mut self) -> Result<NodeTick> {
        let mut tick = NodeTick::default();
        if self
            .scheduler
            .due(self.clock.now_millis())
            .contains(&TaskKind::Measurement)
        {
            match self.send_slot() {
                Ok(uplink) => tick.sent = Some(uplink),
                Err(e) => warn!("Node {} transmit failed: {}", self.config.address, e),
            }
        }
        if let Some(packet) = self.radio.receive()? {
            tick.command = self.on_receive(&packet.bytes);
        }
        Ok(tick)
    }

    fn send_slot(&mut self) -> Result<Uplink> {
        let uplink = if self.slot < self.config.readings_per_cycle {
            Uplink::Reading(self.source.sample())
        } else {
            Uplink::Poll
        };
        let cycle_len = self.config.readings_per_cycle.saturating_add(1);
        self.slot = (self.slot + 1) % cycle_len;

        let payload = match &uplink {
            Uplink::Reading(m) => m.to_payload().into_bytes(),
            Uplink::Poll => CONTROL_SENTINEL.to_vec(),
        };
        let frame = Frame::between(
            self.config.gateway,
            self.config.address,
            self.sequence.next(),
            payload,
        )?;
        self.radio.transmit(&PacketCodec::encode(&frame))?;
        debug!("Node {} sent {:?}", self.config.address, uplink);
        Ok(uplink)
    }

    /// Handle one received packet; returns the applied command text
    pub fn on_receive(&mut self, bytes: &[u8]) -> Option<String> {
        let frame = PacketCodec::decode(bytes).ok()?;
        if !self.filter.accepts(&frame) || frame.sender() != self.config.gateway.as_u8() {
            return None;
        }

        let command = frame.payload_text();
        self.settings.apply(&command);
        info!("Node {} applied command: {}", self.config.address, command);
        Some(command)
    }

    /// Current radio settings
    pub fn settings(&self) -> &RadioSettings {
        &self.settings
    }

    /// Node configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Radio driver
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Mutable radio driver
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::radio::MemoryRadio;

    fn agent() -> (NodeAgent<MemoryRadio, ConstantSource, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let source = ConstantSource(Measurement {
            primary: 3.7,
            secondary: 1.2,
        });
        let mut agent = NodeAgent::new(NodeConfig::default(), MemoryRadio::new(), source, clock.clone());
        agent.start().unwrap();
        (agent, clock)
    }

    #[test]
    fn test_cycle_five_readings_then_poll() {
        let (mut agent, clock) = agent();
        assert_eq!(agent.tick().unwrap().sent, None);

        let mut payloads = Vec::new();
        for _ in 0..12 {
            clock.advance(Duration::from_secs(1));
            agent.tick().unwrap();
            let bytes = agent.radio_mut().pop_outgoing().unwrap();
            let frame = PacketCodec::decode(&bytes).unwrap();
            assert_eq!(frame.recipient(), 0xFF);
            assert_eq!(frame.sender(), 0xBB);
            payloads.push(frame.payload_text());
        }

        let reading = "3.70,1.20".to_string();
        let poll = "20".to_string();
        let mut expected = vec![reading.clone(); 5];
        expected.push(poll.clone());
        expected.extend(vec![reading; 5]);
        expected.push(poll);
        assert_eq!(payloads, expected);
    }

    #[test]
    fn test_uplink_sequence_increments() {
        let (mut agent, clock) = agent();
        for expected in 0..3u8 {
            clock.advance(Duration::from_secs(1));
            agent.tick().unwrap();
            let frame = PacketCodec::decode(&agent.radio_mut().pop_outgoing().unwrap()).unwrap();
            assert_eq!(frame.sequence(), expected);
        }
    }

    #[test]
    fn test_applies_command_from_gateway() {
        let (mut agent, _clock) = agent();
        let frame = Frame::between(Address::Node1, Address::Master, 0, "SF7").unwrap();
        agent.radio_mut().deliver(PacketCodec::encode(&frame));

        let tick = agent.tick().unwrap();
        assert_eq!(tick.command.as_deref(), Some("SF7"));
        assert_eq!(agent.settings().spreading_factor, Some(7));
    }

    #[test]
    fn test_ignores_foreign_and_malformed_frames() {
        let (mut agent, _clock) = agent();
        let to_other = Frame::between(Address::Node2, Address::Master, 0, "SF9").unwrap();
        let from_peer = Frame::between(Address::Node1, Address::Node2, 0, "SF9").unwrap();
        assert!(agent.on_receive(&PacketCodec::encode(&to_other)).is_none());
        assert!(agent.on_receive(&PacketCodec::encode(&from_peer)).is_none());
        assert!(agent.on_receive(&[0xBB, 0xFF, 0, 9, b'S']).is_none());
        assert_eq!(agent.settings(), &RadioSettings::default());
    }

    #[test]
    fn test_radio_settings_parse() {
        let mut settings = RadioSettings::default();
        settings.apply("14,9");
        assert_eq!(settings.tx_power, Some(14));
        assert_eq!(settings.spreading_factor, Some(9));

        settings.apply("TP17");
        assert_eq!(settings.tx_power, Some(17));
        assert_eq!(settings.spreading_factor, Some(9));

        settings.apply("reboot");
        assert_eq!(settings.tx_power, Some(17));
        assert_eq!(settings.last_command.as_deref(), Some("reboot"));
    }

    #[test]
    fn test_failed_radio_init() {
        let mut agent = NodeAgent::new(
            NodeConfig::default(),
            MemoryRadio::failing(),
            ConstantSource(Measurement {
                primary: 0.0,
                secondary: 0.0,
            }),
            ManualClock::new(),
        );
        let err = agent.start().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_transmit_fault_still_reads_downlink() {
        let (mut agent, clock) = agent();
        let frame = Frame::between(Address::Node1, Address::Master, 0, "TP14").unwrap();
        agent.radio_mut().deliver(PacketCodec::encode(&frame));
        agent.radio_mut().set_fail_transmit(true);

        clock.advance(Duration::from_secs(1));
        let tick = agent.tick().unwrap();
        assert_eq!(tick.sent, None);
        assert_eq!(tick.command.as_deref(), Some("TP14"));
        assert_eq!(agent.settings().tx_power, Some(14));
    }

    #[test]
    fn test_unbounded_cycle_never_panics() {
        let clock = ManualClock::new();
        let config = NodeConfig {
            readings_per_cycle: u32::MAX,
            ..NodeConfig::default()
        };
        let source = ConstantSource(Measurement {
            primary: 1.0,
            secondary: 2.0,
        });
        let mut agent = NodeAgent::new(config, MemoryRadio::new(), source, clock.clone());
        agent.start().unwrap();

        for _ in 0..3 {
            clock.advance(Duration::from_secs(1));
            let tick = agent.tick().unwrap();
            assert!(matches!(tick.sent, Some(Uplink::Reading(_))));
        }
    }
}
