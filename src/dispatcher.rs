// LoRa Bridge - Radio-to-backend gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Gateway frame dispatch
//!
//! Every received packet runs through the same pipeline:
//!
//! ```text
//! decode -> address filter -> control poll?  -> mailbox -> downlink
//!                                     \-> data -> SensorReading
//! ```
//!
//! Malformed and foreign frames stop early and leave no trace beyond a
//! counter. Control polls are answered here and never reach the backend.
//! Data frames come back to the caller as a [`SensorReading`] for the
//! transport bridge.

use crate::context::GatewayContext;
use crate::error::{BridgeError, FramingError};
use crate::filter::AddressFilter;
use crate::mailbox::PendingCommand;
use crate::protocol::{Address, Frame, PacketCodec};
use crate::radio::{RadioDriver, RadioPacket};
use crate::reading::SensorReading;
use tracing::{debug, error, info};

/// What happened to one packet
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Malformed, dropped
    Rejected(FramingError),
    /// Addressed elsewhere, dropped
    NotForUs {
        /// Recipient byte of the frame
        recipient: u8,
    },
    /// Control poll answered with the pending command
    CommandSent(PendingCommand),
    /// Control poll with nothing to send
    NoCommand,
    /// Control poll whose answer could not be transmitted
    DownlinkFailed(BridgeError),
    /// Data frame turned into a reading
    Reading(SensorReading),
}

/// Routes accepted frames to the mailbox or the backend path
#[derive(Debug, Clone, Copy)]
pub struct GatewayDispatcher {
    filter: AddressFilter,
}

impl GatewayDispatcher {
    /// Dispatcher for a gateway listening on `own`
    pub fn new(own: Address) -> Self {
        Self {
            filter: AddressFilter::new(own),
        }
    }

    /// Address frames must carry to be handled
    pub fn own_address(&self) -> Address {
        self.filter.own_address()
    }

    /// Handle one received packet
    pub fn dispatch<R: RadioDriver>(
        &self,
        ctx: &mut GatewayContext,
        radio: &mut R,
        packet: &RadioPacket,
        now_millis: u64,
    ) -> DispatchOutcome {
        ctx.counters.frames_received += 1;

        let frame = match PacketCodec::decode(&packet.bytes) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Dropping packet: {}", e);
                ctx.counters.framing_rejects += 1;
                return DispatchOutcome::Rejected(e);
            }
        };

        if !self.filter.accepts(&frame) {
            debug!("Dropping frame for {:#04x}", frame.recipient());
            ctx.counters.address_drops += 1;
            return DispatchOutcome::NotForUs {
                recipient: frame.recipient(),
            };
        }

        if frame.is_control_poll() {
            return self.answer_poll(ctx, radio, &frame);
        }

        let reading = SensorReading::from_payload(
            frame.sender(),
            &frame.payload_text(),
            now_millis,
            packet.rssi,
            packet.snr,
        );
        debug!(
            "Reading from {:#04x}: {} {:.2} (RSSI {} dBm, SNR {:.2} dB)",
            reading.source, reading.classification, reading.primary_value, reading.rssi, reading.snr
        );
        DispatchOutcome::Reading(reading)
    }

    fn answer_poll<R: RadioDriver>(
        &self,
        ctx: &mut GatewayContext,
        radio: &mut R,
        poll: &Frame,
    ) -> DispatchOutcome {
        ctx.counters.control_polls += 1;

        let command = match poll.sender_address().and_then(|a| ctx.mailbox.take_for(a)) {
            Some(command) => command,
            None => {
                debug!("Control poll from {:#04x}, no command queued", poll.sender());
                return DispatchOutcome::NoCommand;
            }
        };

        // The command leaves the mailbox here, whatever the radio does next
        let frame = match Frame::between(
            command.target,
            self.filter.own_address(),
            ctx.sequence.next(),
            command.payload.as_bytes(),
        ) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Command for {} not encodable: {}", command.target, e);
                return DispatchOutcome::DownlinkFailed(e.into());
            }
        };

        match radio.transmit(&PacketCodec::encode(&frame)) {
            Ok(()) => {
                info!("Command sent to {}: {}", command.target, command.payload);
                ctx.counters.commands_delivered += 1;
                DispatchOutcome::CommandSent(command)
            }
            Err(e) => {
                error!("Command for {} lost: {}", command.target, e);
                DispatchOutcome::DownlinkFailed(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Classification;
    use approx::assert_relative_eq;

    fn packet(frame: &Frame) -> RadioPacket {
        RadioPacket::new(PacketCodec::encode(frame), -72, 8.25)
    }

    fn poll_from(node: Address) -> RadioPacket {
        packet(&Frame::between(Address::Master, node, 3, "20").unwrap())
    }

    fn setup() -> (GatewayDispatcher, GatewayContext, crate::radio::MemoryRadio) {
        (
            GatewayDispatcher::new(Address::Master),
            GatewayContext::new(),
            crate::radio::MemoryRadio::new(),
        )
    }

    #[test]
    fn test_data_frame_becomes_reading() {
        let (dispatcher, mut ctx, mut radio) = setup();
        let frame = Frame::between(Address::Master, Address::Node1, 0, "12.50,0.30").unwrap();

        match dispatcher.dispatch(&mut ctx, &mut radio, &packet(&frame), 777) {
            DispatchOutcome::Reading(reading) => {
                assert_eq!(reading.source, 0xBB);
                assert_relative_eq!(reading.primary_value, 12.5);
                assert_eq!(reading.classification, Classification::VoltageReading);
                assert_eq!(reading.captured_at_millis, 777);
                assert_eq!(reading.rssi, -72);
                assert_relative_eq!(reading.snr, 8.25);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(radio.pending_outgoing(), 0);
    }

    #[test]
    fn test_unknown_payload_is_still_a_reading() {
        let (dispatcher, mut ctx, mut radio) = setup();
        let frame = Frame::between(Address::Master, Address::Node2, 0, "abc").unwrap();
        match dispatcher.dispatch(&mut ctx, &mut radio, &packet(&frame), 0) {
            DispatchOutcome::Reading(reading) => {
                assert_eq!(reading.primary_value, 0.0);
                assert_eq!(reading.classification, Classification::Unknown);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_poll_sends_pending_command_once() {
        let (dispatcher, mut ctx, mut radio) = setup();
        ctx.mailbox
            .set(PendingCommand::new(Address::Node1, "SF7").unwrap());

        let outcome = dispatcher.dispatch(&mut ctx, &mut radio, &poll_from(Address::Node1), 0);
        assert!(matches!(outcome, DispatchOutcome::CommandSent(_)));
        assert!(ctx.mailbox.is_empty());
        assert_eq!(radio.pending_outgoing(), 1);

        let sent = PacketCodec::decode(&radio.pop_outgoing().unwrap()).unwrap();
        assert_eq!(sent.recipient(), 0xBB);
        assert_eq!(sent.sender(), 0xFF);
        assert_eq!(sent.sequence(), 0);
        assert_eq!(sent.payload(), b"SF7");

        // Second poll finds nothing
        let outcome = dispatcher.dispatch(&mut ctx, &mut radio, &poll_from(Address::Node1), 0);
        assert_eq!(outcome, DispatchOutcome::NoCommand);
        assert_eq!(radio.pending_outgoing(), 0);
        assert_eq!(ctx.counters.control_polls, 2);
        assert_eq!(ctx.counters.commands_delivered, 1);
    }

    #[test]
    fn test_poll_with_empty_mailbox() {
        let (dispatcher, mut ctx, mut radio) = setup();
        let outcome = dispatcher.dispatch(&mut ctx, &mut radio, &poll_from(Address::Node2), 0);
        assert_eq!(outcome, DispatchOutcome::NoCommand);
        assert_eq!(radio.pending_outgoing(), 0);
    }

    #[test]
    fn test_poll_from_other_node_keeps_command() {
        let (dispatcher, mut ctx, mut radio) = setup();
        ctx.mailbox
            .set(PendingCommand::new(Address::Node2, "TP14").unwrap());

        let outcome = dispatcher.dispatch(&mut ctx, &mut radio, &poll_from(Address::Node1), 0);
        assert_eq!(outcome, DispatchOutcome::NoCommand);
        assert_eq!(ctx.mailbox.peek().unwrap().target, Address::Node2);
    }

    #[test]
    fn test_downlink_sequence_advances() {
        let (dispatcher, mut ctx, mut radio) = setup();
        for text in ["A", "B"] {
            ctx.mailbox
                .set(PendingCommand::new(Address::Node1, text).unwrap());
            dispatcher.dispatch(&mut ctx, &mut radio, &poll_from(Address::Node1), 0);
        }
        let first = PacketCodec::decode(&radio.pop_outgoing().unwrap()).unwrap();
        let second = PacketCodec::decode(&radio.pop_outgoing().unwrap()).unwrap();
        assert_eq!((first.sequence(), second.sequence()), (0, 1));
    }

    #[test]
    fn test_failed_downlink_loses_command() {
        let (dispatcher, mut ctx, mut radio) = setup();
        ctx.mailbox
            .set(PendingCommand::new(Address::Node1, "SF7").unwrap());
        radio.set_fail_transmit(true);

        let outcome = dispatcher.dispatch(&mut ctx, &mut radio, &poll_from(Address::Node1), 0);
        assert!(matches!(
            outcome,
            DispatchOutcome::DownlinkFailed(BridgeError::Radio(_))
        ));
        assert!(ctx.mailbox.is_empty());
        assert_eq!(ctx.counters.commands_delivered, 0);
        assert_eq!(radio.pending_outgoing(), 0);

        // A second poll finds nothing to send
        radio.set_fail_transmit(false);
        let outcome = dispatcher.dispatch(&mut ctx, &mut radio, &poll_from(Address::Node1), 0);
        assert_eq!(outcome, DispatchOutcome::NoCommand);
    }

    #[test]
    fn test_malformed_packet_has_no_effect() {
        let (dispatcher, mut ctx, mut radio) = setup();
        ctx.mailbox
            .set(PendingCommand::new(Address::Node1, "SF7").unwrap());

        // Valid poll header with a wrong declared length
        let bytes = vec![0xFF, 0xBB, 0, 3, b'2', b'0'];
        let outcome =
            dispatcher.dispatch(&mut ctx, &mut radio, &RadioPacket::new(bytes, -50, 5.0), 0);
        assert!(matches!(
            outcome,
            DispatchOutcome::Rejected(FramingError::LengthMismatch { .. })
        ));
        assert!(!ctx.mailbox.is_empty());
        assert_eq!(radio.pending_outgoing(), 0);
        assert_eq!(ctx.counters.framing_rejects, 1);
        assert_eq!(ctx.counters.control_polls, 0);
    }

    #[test]
    fn test_foreign_frame_has_no_effect() {
        let (dispatcher, mut ctx, mut radio) = setup();
        ctx.mailbox
            .set(PendingCommand::new(Address::Node1, "SF7").unwrap());

        let poll_to_node = Frame::between(Address::Node2, Address::Node1, 0, "20").unwrap();
        let outcome = dispatcher.dispatch(&mut ctx, &mut radio, &packet(&poll_to_node), 0);
        assert_eq!(outcome, DispatchOutcome::NotForUs { recipient: 0xCC });
        assert!(!ctx.mailbox.is_empty());
        assert_eq!(radio.pending_outgoing(), 0);
        assert_eq!(ctx.counters.address_drops, 1);
    }
}
