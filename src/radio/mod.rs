// LoRa Bridge - Radio-to-backend gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Radio driver abstraction
//!
//! The transceiver is a black box that sends and receives raw packets and
//! reports link quality of the last received packet. This module provides
//! the trait the gateway and nodes drive, plus an in-memory radio for tests
//! and a UDP-backed medium for host runs.

pub mod udp;

pub use udp::{UdpRadio, UdpRadioConfig};

use crate::error::RadioError;
use std::collections::VecDeque;

/// Driver receive queue depth used when none is given
pub const DEFAULT_RX_DEPTH: usize = 8;

/// One received physical packet with link quality sampled on arrival
#[derive(Debug, Clone, PartialEq)]
pub struct RadioPacket {
    /// Raw packet bytes
    pub bytes: Vec<u8>,
    /// Received signal strength in dBm
    pub rssi: i16,
    /// Signal-to-noise ratio in dB
    pub snr: f32,
}

impl RadioPacket {
    /// Create a packet with explicit link quality
    pub fn new(bytes: Vec<u8>, rssi: i16, snr: f32) -> Self {
        Self { bytes, rssi, snr }
    }
}

/// Statistics about radio usage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadioMetrics {
    /// Packets handed to the transmitter
    pub packets_sent: u64,
    /// Packets read from the receiver
    pub packets_received: u64,
    /// Bytes handed to the transmitter
    pub bytes_sent: u64,
    /// Bytes read from the receiver
    pub bytes_received: u64,
    /// Packets lost because the receive queue was full
    pub overflow_drops: u64,
}

/// Trait for radio transceivers
pub trait RadioDriver {
    /// Bring the hardware up. Failure is unrecoverable for the caller.
    fn init(&mut self) -> Result<(), RadioError>;

    /// Send one packet
    fn transmit(&mut self, packet: &[u8]) -> Result<(), RadioError>;

    /// Take the next received packet, if any. Never blocks.
    fn receive(&mut self) -> Result<Option<RadioPacket>, RadioError>;

    /// Get radio metrics
    fn metrics(&self) -> RadioMetrics;
}

/// In-memory radio with a finite receive queue
#[derive(Debug)]
pub struct MemoryRadio {
    tx_buffer: VecDeque<Vec<u8>>,
    rx_buffer: VecDeque<RadioPacket>,
    rx_depth: usize,
    fail_init: bool,
    fail_transmit: bool,
    fail_receive: bool,
    initialized: bool,
    rssi: i16,
    snr: f32,
    metrics: RadioMetrics,
}

impl MemoryRadio {
    /// Create a new memory radio
    pub fn new() -> Self {
        Self::with_rx_depth(DEFAULT_RX_DEPTH)
    }

    /// Create with a custom receive queue depth
    pub fn with_rx_depth(rx_depth: usize) -> Self {
        Self {
            tx_buffer: VecDeque::new(),
            rx_buffer: VecDeque::with_capacity(rx_depth),
            rx_depth,
            fail_init: false,
            fail_transmit: false,
            fail_receive: false,
            initialized: false,
            rssi: -60,
            snr: 9.5,
            metrics: RadioMetrics::default(),
        }
    }

    /// A radio whose hardware never comes up
    pub fn failing() -> Self {
        Self {
            fail_init: true,
            ..Self::new()
        }
    }

    /// Link quality stamped on packets delivered with [`MemoryRadio::deliver`]
    pub fn with_link_quality(mut self, rssi: i16, snr: f32) -> Self {
        self.rssi = rssi;
        self.snr = snr;
        self
    }

    /// Make every transmit fail, or stop failing
    pub fn set_fail_transmit(&mut self, fail: bool) {
        self.fail_transmit = fail;
    }

    /// Make every receive fail, or stop failing. Queued packets stay queued.
    pub fn set_fail_receive(&mut self, fail: bool) {
        self.fail_receive = fail;
    }

    /// Whether `init` succeeded
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Put raw bytes on the air towards this radio
    pub fn deliver(&mut self, bytes: impl Into<Vec<u8>>) -> bool {
        let packet = RadioPacket::new(bytes.into(), self.rssi, self.snr);
        self.push_incoming(packet)
    }

    /// Queue a received packet. Returns false if the queue was full.
    pub fn push_incoming(&mut self, packet: RadioPacket) -> bool {
        if self.rx_buffer.len() >= self.rx_depth {
            self.metrics.overflow_drops += 1;
            return false;
        }
        self.rx_buffer.push_back(packet);
        true
    }

    /// Pop a transmitted packet
    pub fn pop_outgoing(&mut self) -> Option<Vec<u8>> {
        self.tx_buffer.pop_front()
    }

    /// Get number of transmitted packets not yet collected
    pub fn pending_outgoing(&self) -> usize {
        self.tx_buffer.len()
    }

    /// Get number of received packets not yet read
    pub fn pending_incoming(&self) -> usize {
        self.rx_buffer.len()
    }

    /// Move all transmitted packets into another radio's receive queue
    pub fn transfer_to(&mut self, other: &mut MemoryRadio) {
        while let Some(bytes) = self.tx_buffer.pop_front() {
            other.deliver(bytes);
        }
    }
}

impl Default for MemoryRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioDriver for MemoryRadio {
    fn init(&mut self) -> Result<(), RadioError> {
        if self.fail_init {
            return Err(RadioError::Init("transceiver not responding".to_string()));
        }
        self.initialized = true;
        Ok(())
    }

    fn transmit(&mut self, packet: &[u8]) -> Result<(), RadioError> {
        if self.fail_transmit {
            return Err(RadioError::Transmit("channel busy".to_string()));
        }
        self.metrics.packets_sent += 1;
        self.metrics.bytes_sent += packet.len() as u64;
        self.tx_buffer.push_back(packet.to_vec());
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<RadioPacket>, RadioError> {
        if self.fail_receive {
            return Err(RadioError::Receive("FIFO read error".to_string()));
        }
        let packet = self.rx_buffer.pop_front();
        if let Some(ref p) = packet {
            self.metrics.packets_received += 1;
            self.metrics.bytes_received += p.bytes.len() as u64;
        }
        Ok(packet)
    }

    fn metrics(&self) -> RadioMetrics {
        self.metrics.clone()
    }
}
