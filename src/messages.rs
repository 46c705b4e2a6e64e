//! Backend message records
//!
//! JSON shapes exchanged with the backend. Outbound records are built from
//! gateway state; inbound text is decoded into at most one
//! [`PendingCommand`].

use crate::error::CommandDecodeError;
use crate::mailbox::PendingCommand;
use crate::protocol::Address;
use crate::reading::{Classification, SensorReading};
use serde::{Deserialize, Serialize};

/// Liveness record sent on the persistent link
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "heartbeat")]
pub struct Heartbeat {
    pub gateway_id: String,
    pub timestamp: u64,
    pub wifi_rssi: i32,
    pub free_heap: u64,
}

/// One-time notice after the link handshake
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "gateway_connected")]
pub struct GatewayConnected {
    pub gateway_id: String,
    pub timestamp: u64,
}

/// Sensor record posted on the request leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorDataRecord {
    pub node_id: u8,
    pub voltage: f32,
    pub message_type: Classification,
    pub timestamp: u64,
    pub rssi: i16,
    pub snr: f32,
    pub gateway_id: String,
}

impl SensorDataRecord {
    /// Record for a reading relayed by `gateway_id`
    pub fn from_reading(reading: &SensorReading, gateway_id: &str) -> Self {
        Self {
            node_id: reading.source,
            voltage: reading.primary_value,
            message_type: reading.classification,
            timestamp: reading.captured_at_millis,
            rssi: reading.rssi,
            snr: reading.snr,
            gateway_id: gateway_id.to_string(),
        }
    }
}

/// Sensor record sent on the persistent link, tagged `sensor_data`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "sensor_data")]
pub struct SensorDataMessage {
    #[serde(flatten)]
    pub record: SensorDataRecord,
}

impl From<SensorDataRecord> for SensorDataMessage {
    fn from(record: SensorDataRecord) -> Self {
        Self { record }
    }
}

/// Messages the backend may push over the link
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Queue a command for a node
    SendToNode {
        #[serde(rename = "nodeId")]
        node_id: i64,
        message: String,
    },
    /// Any other message type
    #[serde(other)]
    Other,
}

/// Decode inbound link text into a command
///
/// Returns `Ok(None)` for well-formed messages of other types.
pub fn parse_inbound(bytes: &[u8]) -> Result<Option<PendingCommand>, CommandDecodeError> {
    let message: InboundMessage =
        serde_json::from_slice(bytes).map_err(|e| CommandDecodeError::Json(e.to_string()))?;

    match message {
        InboundMessage::SendToNode { node_id, message } => {
            let target = u8::try_from(node_id)
                .ok()
                .and_then(Address::from_u8)
                .ok_or(CommandDecodeError::UnknownNode(node_id))?;
            PendingCommand::new(target, message).map(Some)
        }
        InboundMessage::Other => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn reading() -> SensorReading {
        SensorReading::from_payload(0xBB, "3.70,1.2", 5000, -71, 7.5)
    }

    #[test]
    fn test_heartbeat_fields() {
        let hb = Heartbeat {
            gateway_id: "LORA_GATEWAY_01".into(),
            timestamp: 30_000,
            wifi_rssi: -55,
            free_heap: 41_000,
        };
        let value: Value = serde_json::to_value(&hb).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "heartbeat",
                "gateway_id": "LORA_GATEWAY_01",
                "timestamp": 30000,
                "wifi_rssi": -55,
                "free_heap": 41000
            })
        );
    }

    #[test]
    fn test_connect_notice_fields() {
        let notice = GatewayConnected {
            gateway_id: "GW".into(),
            timestamp: 12,
        };
        let value: Value = serde_json::to_value(&notice).unwrap();
        assert_eq!(
            value,
            json!({"type": "gateway_connected", "gateway_id": "GW", "timestamp": 12})
        );
    }

    #[test]
    fn test_sensor_record_fields() {
        let record = SensorDataRecord::from_reading(&reading(), "LORA_GATEWAY_01");
        let value: Value = serde_json::to_value(&record).unwrap();
        assert!(value.get("type").is_none());
        assert_eq!(value["nodeId"], 187);
        assert_eq!(value["messageType"], "voltage_reading");
        assert_eq!(value["timestamp"], 5000);
        assert_eq!(value["rssi"], -71);
        assert_eq!(value["snr"], 7.5);
        assert_eq!(value["gatewayId"], "LORA_GATEWAY_01");
        assert!((value["voltage"].as_f64().unwrap() - 3.7).abs() < 1e-6);
    }

    #[test]
    fn test_link_message_is_tagged() {
        let record = SensorDataRecord::from_reading(&reading(), "GW");
        let value: Value = serde_json::to_value(SensorDataMessage::from(record)).unwrap();
        assert_eq!(value["type"], "sensor_data");
        assert_eq!(value["nodeId"], 187);
        assert_eq!(value["gatewayId"], "GW");
    }

    #[test]
    fn test_parse_send_to_node() {
        let cmd = parse_inbound(br#"{"type":"send_to_node","nodeId":187,"message":"SF7"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(cmd.target, Address::Node1);
        assert_eq!(cmd.payload, "SF7");
    }

    #[test]
    fn test_parse_other_types_ignored() {
        assert_eq!(
            parse_inbound(br#"{"type":"connection_established","message":"hi"}"#),
            Ok(None)
        );
        assert_eq!(parse_inbound(br#"{"type":"gateway_ack"}"#), Ok(None));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_inbound(b"not json"),
            Err(CommandDecodeError::Json(_))
        ));
        assert!(matches!(
            parse_inbound(br#"{"type":"send_to_node","message":"SF7"}"#),
            Err(CommandDecodeError::Json(_))
        ));
        assert_eq!(
            parse_inbound(br#"{"type":"send_to_node","nodeId":1,"message":"SF7"}"#),
            Err(CommandDecodeError::UnknownNode(1))
        );
        assert_eq!(
            parse_inbound(br#"{"type":"send_to_node","nodeId":255,"message":"SF7"}"#),
            Err(CommandDecodeError::NotANode(Address::Master))
        );
        assert_eq!(
            parse_inbound(br#"{"type":"send_to_node","nodeId":204,"message":""}"#),
            Err(CommandDecodeError::EmptyMessage)
        );
    }
}
