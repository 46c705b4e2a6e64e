// LoRa Bridge - Radio-to-backend gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Radio frame protocol
//!
//! This module defines the addressing scheme and the fixed-header frame
//! carried by one physical radio packet.
//!
//! # Frame Format
//!
//! ```text
//! [recipient: 1] [sender: 1] [sequence: 1] [length: 1] [payload: length]
//! ```
//!
//! There is no delimiter and no checksum: the radio delivers exactly one
//! packet per frame, so every byte after the header is payload.

use crate::error::FramingError;
use std::fmt;

/// Size of the fixed header in bytes
pub const HEADER_LEN: usize = 4;

/// Largest payload the one-byte length field can describe
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// Control payload sent by a node to poll for a pending downlink command
pub const CONTROL_SENTINEL: &[u8] = b"20";

/// Logical addresses of the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Address {
    /// The gateway, also used as broadcast
    Master = 0xFF,
    /// First sensor node
    Node1 = 0xBB,
    /// Second sensor node
    Node2 = 0xCC,
}

impl Address {
    /// All known addresses
    pub const ALL: [Address; 3] = [Address::Master, Address::Node1, Address::Node2];

    /// Convert from the wire byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0xFF => Some(Address::Master),
            0xBB => Some(Address::Node1),
            0xCC => Some(Address::Node2),
            _ => None,
        }
    }

    /// Wire byte of this address
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether this address belongs to a sensor node
    pub fn is_node(self) -> bool {
        !matches!(self, Address::Master)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Master => write!(f, "Master(0xFF)"),
            Address::Node1 => write!(f, "Node1(0xBB)"),
            Address::Node2 => write!(f, "Node2(0xCC)"),
        }
    }
}

/// One logical radio message
///
/// Addresses are kept as raw bytes: a frame for an address outside the
/// network is still well-formed and is left to the address filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    recipient: u8,
    sender: u8,
    sequence: u8,
    payload: Vec<u8>,
}

impl Frame {
    /// Build a frame, rejecting payloads the length field cannot describe
    pub fn new(
        recipient: u8,
        sender: u8,
        sequence: u8,
        payload: impl Into<Vec<u8>>,
    ) -> Result<Self, FramingError> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(FramingError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        Ok(Self {
            recipient,
            sender,
            sequence,
            payload,
        })
    }

    /// Build a frame between two known addresses
    pub fn between(
        recipient: Address,
        sender: Address,
        sequence: u8,
        payload: impl Into<Vec<u8>>,
    ) -> Result<Self, FramingError> {
        Self::new(recipient.as_u8(), sender.as_u8(), sequence, payload)
    }

    /// Destination byte
    pub fn recipient(&self) -> u8 {
        self.recipient
    }

    /// Source byte
    pub fn sender(&self) -> u8 {
        self.sender
    }

    /// Per-sender sequence number
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Value carried in the length field
    pub fn declared_length(&self) -> u8 {
        // Bounded by construction
        self.payload.len() as u8
    }

    /// Payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload as text, replacing invalid UTF-8
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Sender as a known address, if it is one
    pub fn sender_address(&self) -> Option<Address> {
        Address::from_u8(self.sender)
    }

    /// Whether this is the control poll
    pub fn is_control_poll(&self) -> bool {
        self.payload == CONTROL_SENTINEL
    }

    /// Size of the encoded frame in bytes
    pub fn size(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }
}

/// Stateless encoder/decoder for [`Frame`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketCodec;

impl PacketCodec {
    /// Serialize header fields then payload, in that fixed order
    pub fn encode(frame: &Frame) -> Vec<u8> {
        let mut buf = Vec::with_capacity(frame.size());
        buf.push(frame.recipient);
        buf.push(frame.sender);
        buf.push(frame.sequence);
        buf.push(frame.declared_length());
        buf.extend_from_slice(&frame.payload);
        buf
    }

    /// Parse one packet. All bytes after the header are payload.
    pub fn decode(bytes: &[u8]) -> Result<Frame, FramingError> {
        if bytes.len() < HEADER_LEN {
            return Err(FramingError::TooShort {
                needed: HEADER_LEN,
                available: bytes.len(),
            });
        }

        let declared = bytes[3];
        let payload = &bytes[HEADER_LEN..];
        if declared as usize != payload.len() {
            return Err(FramingError::LengthMismatch {
                declared,
                actual: payload.len(),
            });
        }

        Ok(Frame {
            recipient: bytes[0],
            sender: bytes[1],
            sequence: bytes[2],
            payload: payload.to_vec(),
        })
    }
}

/// Outgoing message counter of one sender, wrapping at 256
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceCounter {
    next: u8,
}

impl SequenceCounter {
    /// Counter starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current number and advance
    pub fn next(&mut self) -> u8 {
        let current = self.next;
        self.next = self.next.wrapping_add(1);
        current
    }

    /// Number the next frame will carry
    pub fn peek(&self) -> u8 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_from_u8() {
        assert_eq!(Address::from_u8(0xFF), Some(Address::Master));
        assert_eq!(Address::from_u8(0xBB), Some(Address::Node1));
        assert_eq!(Address::from_u8(0xCC), Some(Address::Node2));
        assert_eq!(Address::from_u8(0x01), None);
        assert!(!Address::Master.is_node());
        assert!(Address::Node2.is_node());
    }

    #[test]
    fn test_encode_layout() {
        let frame = Frame::between(Address::Master, Address::Node1, 7, "3.70,1.2").unwrap();
        let bytes = PacketCodec::encode(&frame);
        assert_eq!(&bytes[..HEADER_LEN], &[0xFF, 0xBB, 7, 8]);
        assert_eq!(&bytes[HEADER_LEN..], b"3.70,1.2");
        assert_eq!(bytes.len(), frame.size());
    }

    #[test]
    fn test_roundtrip() {
        let frame = Frame::between(Address::Node1, Address::Master, 255, "SF7").unwrap();
        let restored = PacketCodec::decode(&PacketCodec::encode(&frame)).unwrap();
        assert_eq!(frame, restored);
    }

    #[test]
    fn test_empty_payload() {
        let frame = Frame::new(0xFF, 0xCC, 0, Vec::new()).unwrap();
        let bytes = PacketCodec::encode(&frame);
        assert_eq!(bytes, vec![0xFF, 0xCC, 0, 0]);
        assert_eq!(PacketCodec::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_decode_length_mismatch() {
        // Declares 5, carries 3
        let result = PacketCodec::decode(&[0xFF, 0xBB, 1, 5, b'a', b'b', b'c']);
        assert_eq!(
            result,
            Err(FramingError::LengthMismatch {
                declared: 5,
                actual: 3
            })
        );

        // Declares 1, carries 2
        let result = PacketCodec::decode(&[0xFF, 0xBB, 1, 1, b'2', b'0']);
        assert!(matches!(result, Err(FramingError::LengthMismatch { .. })));
    }

    #[test]
    fn test_decode_too_short() {
        let result = PacketCodec::decode(&[0xFF, 0xBB]);
        assert!(matches!(result, Err(FramingError::TooShort { available: 2, .. })));
    }

    #[test]
    fn test_payload_limit() {
        assert!(Frame::new(0xFF, 0xBB, 0, vec![b'x'; MAX_PAYLOAD_LEN]).is_ok());
        let result = Frame::new(0xFF, 0xBB, 0, vec![b'x'; MAX_PAYLOAD_LEN + 1]);
        assert_eq!(
            result,
            Err(FramingError::PayloadTooLarge {
                size: 256,
                max: 255
            })
        );
    }

    #[test]
    fn test_control_poll_detection() {
        let poll = Frame::between(Address::Master, Address::Node1, 0, "20").unwrap();
        assert!(poll.is_control_poll());
        let data = Frame::between(Address::Master, Address::Node1, 0, "20,1").unwrap();
        assert!(!data.is_control_poll());
    }

    #[test]
    fn test_sequence_wraps() {
        let mut seq = SequenceCounter::new();
        for expected in 0..=255u8 {
            assert_eq!(seq.next(), expected);
        }
        assert_eq!(seq.next(), 0);
        assert_eq!(seq.peek(), 1);
    }
}
