//! Sensor readings built from data frames
//!
//! A data payload is ASCII, comma-separated, with the primary measurement
//! in field 0. A payload without a separator is still a valid reading: it is
//! classified `unknown` with a primary value of zero.

use crate::protocol::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field separator of data payloads
pub const FIELD_SEPARATOR: char = ',';

/// Classification of a data payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    /// Comma-separated reading with a primary value
    #[serde(rename = "voltage_reading")]
    VoltageReading,
    /// No separator found
    #[serde(rename = "unknown")]
    Unknown,
}

impl Classification {
    /// Name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::VoltageReading => "voltage_reading",
            Classification::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reading, forwarded then discarded
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    /// Sender byte of the data frame
    pub source: u8,
    /// Primary measurement
    pub primary_value: f32,
    /// Payload classification
    pub classification: Classification,
    /// Gateway uptime when the frame was dispatched
    pub captured_at_millis: u64,
    /// RSSI of the carrying packet
    pub rssi: i16,
    /// SNR of the carrying packet
    pub snr: f32,
}

impl SensorReading {
    /// Build a reading from a data payload and the packet's link quality
    pub fn from_payload(
        source: u8,
        payload: &str,
        captured_at_millis: u64,
        rssi: i16,
        snr: f32,
    ) -> Self {
        let (primary_value, classification) = classify(payload);
        Self {
            source,
            primary_value,
            classification,
            captured_at_millis,
            rssi,
            snr,
        }
    }

    /// Source as a known address, if it is one
    pub fn source_address(&self) -> Option<Address> {
        Address::from_u8(self.source)
    }
}

/// Split a data payload into its primary value and classification
///
/// A separator at position zero leaves no primary field and counts as
/// no separator.
pub fn classify(payload: &str) -> (f32, Classification) {
    match payload.find(FIELD_SEPARATOR) {
        Some(idx) if idx > 0 => (
            parse_leading_float(&payload[..idx]),
            Classification::VoltageReading,
        ),
        _ => (0.0, Classification::Unknown),
    }
}

/// Parse the longest numeric prefix, or zero if there is none
///
/// Leading whitespace and anything after the number are ignored
/// (`"12.5V"` is 12.5, `"V12"` is 0, `"1.2e2"` is 120). A value outside
/// the `f32` range reads as zero.
pub fn parse_leading_float(field: &str) -> f32 {
    let field = field.trim_start();
    let bytes = field.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }

    if !seen_digit {
        return 0.0;
    }

    // Exponent only counts with at least one digit after it
    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }

    match field[..end].parse::<f32>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}
