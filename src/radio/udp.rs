// LoRa Bridge - Radio-to-backend gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! UDP radio medium for host runs
//!
//! Every participant binds one UDP port and sends each packet to all
//! configured peers, which stands in for the shared half-duplex channel.
//! One datagram carries exactly one packet. Link quality is not measurable
//! over UDP, so configured nominal values are reported.

use crate::error::RadioError;
use crate::radio::{RadioDriver, RadioMetrics, RadioPacket};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

/// Largest datagram read: header plus the largest payload
const MAX_DATAGRAM: usize = crate::protocol::HEADER_LEN + crate::protocol::MAX_PAYLOAD_LEN;

/// Configuration for [`UdpRadio`]
#[derive(Debug, Clone)]
pub struct UdpRadioConfig {
    /// Local bind address
    pub bind: SocketAddr,
    /// Every other participant on the medium
    pub peers: Vec<SocketAddr>,
    /// RSSI reported for every received packet
    pub nominal_rssi: i16,
    /// SNR reported for every received packet
    pub nominal_snr: f32,
}

impl UdpRadioConfig {
    /// Configuration with nominal link quality
    pub fn new(bind: SocketAddr, peers: Vec<SocketAddr>) -> Self {
        Self {
            bind,
            peers,
            nominal_rssi: -60,
            nominal_snr: 9.5,
        }
    }
}

/// Radio driver over a non-blocking UDP socket
#[derive(Debug)]
pub struct UdpRadio {
    config: UdpRadioConfig,
    socket: Option<UdpSocket>,
    metrics: RadioMetrics,
}

impl UdpRadio {
    /// Create an unbound radio. The socket is opened by `init`.
    pub fn new(config: UdpRadioConfig) -> Self {
        Self {
            config,
            socket: None,
            metrics: RadioMetrics::default(),
        }
    }

    /// Address the socket is bound to, once initialized
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    fn socket(&self) -> Result<&UdpSocket, RadioError> {
        self.socket
            .as_ref()
            .ok_or_else(|| RadioError::Transmit("radio not initialized".to_string()))
    }
}

impl RadioDriver for UdpRadio {
    fn init(&mut self) -> Result<(), RadioError> {
        let socket =
            UdpSocket::bind(self.config.bind).map_err(|e| RadioError::Init(e.to_string()))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| RadioError::Init(e.to_string()))?;
        self.socket = Some(socket);
        Ok(())
    }

    fn transmit(&mut self, packet: &[u8]) -> Result<(), RadioError> {
        let socket = self.socket()?;
        for peer in &self.config.peers {
            socket
                .send_to(packet, peer)
                .map_err(|e| RadioError::Transmit(format!("{}: {}", peer, e)))?;
        }
        self.metrics.packets_sent += 1;
        self.metrics.bytes_sent += packet.len() as u64;
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<RadioPacket>, RadioError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| RadioError::Receive("radio not initialized".to_string()))?;

        // One byte of slack so an oversized datagram is seen as such
        let mut buf = [0u8; MAX_DATAGRAM + 1];
        match socket.recv_from(&mut buf) {
            Ok((size, _from)) => {
                self.metrics.packets_received += 1;
                self.metrics.bytes_received += size as u64;
                Ok(Some(RadioPacket::new(
                    buf[..size].to_vec(),
                    self.config.nominal_rssi,
                    self.config.nominal_snr,
                )))
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(RadioError::Receive(e.to_string())),
        }
    }

    fn metrics(&self) -> RadioMetrics {
        self.metrics.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    fn receive_within(radio: &mut UdpRadio, limit: Duration) -> Option<RadioPacket> {
        let start = Instant::now();
        while start.elapsed() < limit {
            if let Some(packet) = radio.receive().unwrap() {
                return Some(packet);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn test_udp_radio_delivers_one_packet_per_datagram() {
        let mut gateway = UdpRadio::new(UdpRadioConfig::new(loopback(), Vec::new()));
        gateway.init().unwrap();
        let gateway_addr = gateway.local_addr().unwrap();

        let mut node = UdpRadio::new(UdpRadioConfig::new(loopback(), vec![gateway_addr]));
        node.init().unwrap();

        node.transmit(&[0xFF, 0xBB, 0, 2, b'2', b'0']).unwrap();
        let packet = receive_within(&mut gateway, Duration::from_secs(2)).unwrap();
        assert_eq!(packet.bytes, vec![0xFF, 0xBB, 0, 2, b'2', b'0']);
        assert_eq!(packet.rssi, -60);
        assert_eq!(node.metrics().packets_sent, 1);
    }

    #[test]
    fn test_udp_radio_empty_receive() {
        let mut radio = UdpRadio::new(UdpRadioConfig::new(loopback(), Vec::new()));
        radio.init().unwrap();
        assert!(radio.receive().unwrap().is_none());
    }

    #[test]
    fn test_transmit_before_init_fails() {
        let mut radio = UdpRadio::new(UdpRadioConfig::new(loopback(), Vec::new()));
        assert!(matches!(
            radio.transmit(&[1, 2, 3]),
            Err(RadioError::Transmit(_))
        ));
    }
}
