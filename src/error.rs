//! Error types for LoRa Bridge
//!
//! This module defines all error types used throughout the library.

use crate::protocol::Address;
use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Main error type for bridge operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// Radio frame could not be built or parsed
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    /// Inbound backend command was malformed
    #[error("Command decode error: {0}")]
    Command(#[from] CommandDecodeError),

    /// Backend transport failed
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Radio fault during normal operation
    #[error("Radio error: {0}")]
    Radio(#[from] RadioError),

    /// Radio hardware could not be brought up. Unrecoverable.
    #[error("Radio initialization failed: {0}")]
    RadioInit(RadioError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl BridgeError {
    /// Whether the process must halt on this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::RadioInit(_))
    }
}

/// Errors while building or parsing radio frames
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Fewer bytes than the fixed header
    #[error("Frame too short: need {needed} header bytes, got {available}")]
    TooShort { needed: usize, available: usize },

    /// Header length field disagrees with the trailing byte count
    #[error("Length mismatch: header declares {declared} bytes, {actual} follow")]
    LengthMismatch { declared: u8, actual: usize },

    /// Payload does not fit the one-byte length field
    #[error("Payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Errors while decoding an inbound backend message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandDecodeError {
    /// Not a valid JSON record of a known shape
    #[error("Malformed message: {0}")]
    Json(String),

    /// Node id outside the address set
    #[error("Unknown node id: {0}")]
    UnknownNode(i64),

    /// Address exists but is not a sensor node
    #[error("Address {0} is not a sensor node")]
    NotANode(Address),

    /// Command text does not fit in one frame
    #[error("Command too long: {len} bytes exceeds maximum {max}")]
    MessageTooLong { len: usize, max: usize },

    /// Command text is empty
    #[error("Empty command text")]
    EmptyMessage,
}

/// Errors on the backend transports
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Send attempted while the transport is down
    #[error("Not connected")]
    NotConnected,

    /// Backend answered with a non-success status
    #[error("Backend returned status {0}")]
    Status(u16),

    /// Request could not be completed
    #[error("Request failed: {0}")]
    Request(String),

    /// Persistent link failure
    #[error("Link error: {0}")]
    Link(String),
}

/// Errors reported by the radio driver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    /// Hardware did not come up
    #[error("init: {0}")]
    Init(String),

    /// Packet could not be sent
    #[error("transmit: {0}")]
    Transmit(String),

    /// Packet could not be read
    #[error("receive: {0}")]
    Receive(String),
}
