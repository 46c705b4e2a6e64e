// LoRa Bridge - Radio-to-backend gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Backend transport bridge
//!
//! Every reading is offered to two independent legs:
//!
//! - the request leg, one blocking POST per reading, gated on WiFi
//! - the link leg, one text message per reading on the persistent link,
//!   sent only while the link is up
//!
//! Neither leg retries, queues or persists. The persistent link also
//! carries the connect notice, heartbeats and inbound commands. Link
//! activity arrives as [`LinkEvent`]s drained once per tick through
//! [`TransportBridge::poll_link`].

use crate::context::GatewayContext;
use crate::error::TransportError;
use crate::messages::{
    parse_inbound, GatewayConnected, Heartbeat, SensorDataMessage, SensorDataRecord,
};
use crate::reading::SensorReading;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Path of the sensor-data endpoint below the backend base URL
pub const SENSOR_DATA_PATH: &str = "/api/sensor-data";

/// Gateway identifier used when none is configured
pub const DEFAULT_GATEWAY_ID: &str = "LORA_GATEWAY_01";

/// Response of a one-shot request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response body
    pub body: String,
}

impl HttpResponse {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One-shot request client
pub trait RequestClient {
    /// POST a JSON body and wait for the response
    fn post_json(&mut self, url: &str, body: &str) -> Result<HttpResponse, TransportError>;
}

/// Events raised by the persistent link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Handshake completed
    Connected,
    /// Link lost
    Disconnected,
    /// Text frame from the backend
    MessageReceived(Vec<u8>),
    /// Link-level error, informational
    ErrorOccurred(String),
}

/// Persistent bidirectional link client
///
/// Implementations reconnect on their own schedule and report every
/// transition as an event.
pub trait LinkClient {
    /// Next pending event, if any. Never blocks.
    fn poll_event(&mut self) -> Option<LinkEvent>;

    /// Send one text frame
    fn send_text(&mut self, text: &str) -> Result<(), TransportError>;
}

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Identifier stamped on every outbound record
    pub gateway_id: String,
    /// Full URL of the sensor-data endpoint
    pub endpoint: String,
}

impl BridgeConfig {
    /// Configuration for a backend base URL such as `http://host:3000`
    pub fn for_backend(base_url: &str) -> Self {
        Self {
            gateway_id: DEFAULT_GATEWAY_ID.to_string(),
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), SENSOR_DATA_PATH),
        }
    }

    /// Override the gateway identifier
    pub fn with_gateway_id(mut self, gateway_id: impl Into<String>) -> Self {
        self.gateway_id = gateway_id.into();
        self
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::for_backend("http://127.0.0.1:3000")
    }
}

/// Result of one forwarding leg
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegOutcome {
    /// Handed to the backend
    Delivered,
    /// Not attempted, transport down
    Skipped,
    /// Attempted and failed
    Failed(TransportError),
}

impl LegOutcome {
    /// Whether the leg delivered
    pub fn is_delivered(&self) -> bool {
        matches!(self, LegOutcome::Delivered)
    }
}

/// Outcome of forwarding one reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardReport {
    /// Request leg
    pub request: LegOutcome,
    /// Persistent link leg
    pub link: LegOutcome,
}

/// Resource telemetry carried by heartbeats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatTelemetry {
    /// Station signal strength in dBm
    pub wifi_rssi: i32,
    /// Free memory in bytes
    pub free_heap: u64,
}

/// Forwards readings and handles the persistent link
#[derive(Debug)]
pub struct TransportBridge<H, L> {
    config: BridgeConfig,
    request: H,
    link: L,
}

impl<H: RequestClient, L: LinkClient> TransportBridge<H, L> {
    /// Create a bridge over two transports
    pub fn new(config: BridgeConfig, request: H, link: L) -> Self {
        Self {
            config,
            request,
            link,
        }
    }

    /// Bridge configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Request client
    pub fn request_client(&self) -> &H {
        &self.request
    }

    /// Link client
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Mutable link client
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Offer a reading to both legs
    ///
    /// The request leg blocks for the whole round trip.
    pub fn forward(&mut self, ctx: &mut GatewayContext, reading: &SensorReading) -> ForwardReport {
        let record = SensorDataRecord::from_reading(reading, &self.config.gateway_id);
        let request = self.forward_request(ctx, &record);
        let link = self.forward_link(ctx, record);
        ForwardReport { request, link }
    }

    fn forward_request(&mut self, ctx: &mut GatewayContext, record: &SensorDataRecord) -> LegOutcome {
        if !ctx.connection.wifi_connected {
            debug!("Request leg skipped for node {:#04x}: WiFi down", record.node_id);
            ctx.counters.request_skipped += 1;
            return LegOutcome::Skipped;
        }

        let outcome = match encode(record) {
            Ok(body) => match self.request.post_json(&self.config.endpoint, &body) {
                Ok(response) if response.is_success() => {
                    debug!("Request leg: {} {}", response.status, response.body);
                    LegOutcome::Delivered
                }
                Ok(response) => LegOutcome::Failed(TransportError::Status(response.status)),
                Err(e) => LegOutcome::Failed(e),
            },
            Err(e) => LegOutcome::Failed(e),
        };

        match &outcome {
            LegOutcome::Delivered => ctx.counters.request_ok += 1,
            LegOutcome::Failed(e) => {
                warn!("Request leg failed for node {:#04x}: {}", record.node_id, e);
                ctx.counters.request_failed += 1;
            }
            LegOutcome::Skipped => {}
        }
        outcome
    }

    fn forward_link(&mut self, ctx: &mut GatewayContext, record: SensorDataRecord) -> LegOutcome {
        if !ctx.connection.backend_connected {
            debug!("Link leg skipped for node {:#04x}: not connected", record.node_id);
            ctx.counters.link_skipped += 1;
            return LegOutcome::Skipped;
        }

        let node_id = record.node_id;
        match self.send(&SensorDataMessage::from(record)) {
            Ok(()) => {
                ctx.counters.link_ok += 1;
                LegOutcome::Delivered
            }
            Err(e) => {
                warn!("Link leg failed for node {:#04x}: {}", node_id, e);
                ctx.counters.link_failed += 1;
                LegOutcome::Failed(e)
            }
        }
    }

    /// Drain and handle every pending link event. Returns how many were handled.
    pub fn poll_link(&mut self, ctx: &mut GatewayContext, now_millis: u64) -> usize {
        let mut handled = 0;
        while let Some(event) = self.link.poll_event() {
            self.handle_event(ctx, event, now_millis);
            handled += 1;
        }
        handled
    }

    /// Apply one link event to the context
    pub fn handle_event(&mut self, ctx: &mut GatewayContext, event: LinkEvent, now_millis: u64) {
        match event {
            LinkEvent::Connected => {
                info!("Backend link connected");
                ctx.connection.backend_connected = true;
                let notice = GatewayConnected {
                    gateway_id: self.config.gateway_id.clone(),
                    timestamp: now_millis,
                };
                if let Err(e) = self.send(&notice) {
                    warn!("Connect notice not sent: {}", e);
                }
            }
            LinkEvent::Disconnected => {
                if ctx.connection.backend_connected {
                    info!("Backend link disconnected");
                }
                ctx.connection.backend_connected = false;
            }
            LinkEvent::MessageReceived(bytes) => self.handle_message(ctx, &bytes),
            LinkEvent::ErrorOccurred(message) => warn!("Backend link error: {}", message),
        }
    }

    fn handle_message(&mut self, ctx: &mut GatewayContext, bytes: &[u8]) {
        match parse_inbound(bytes) {
            Ok(Some(command)) => {
                info!("Command queued for {}: {}", command.target, command.payload);
                if let Some(old) = ctx.mailbox.set(command) {
                    warn!(
                        "Pending command for {} superseded before delivery: {}",
                        old.target, old.payload
                    );
                    ctx.counters.commands_superseded += 1;
                }
            }
            Ok(None) => debug!("Ignoring backend message: {}", String::from_utf8_lossy(bytes)),
            Err(e) => {
                warn!("Rejected backend command: {}", e);
                ctx.counters.commands_rejected += 1;
            }
        }
    }

    /// Send a heartbeat if the link is up
    pub fn send_heartbeat(
        &mut self,
        ctx: &mut GatewayContext,
        telemetry: HeartbeatTelemetry,
        now_millis: u64,
    ) -> LegOutcome {
        if !ctx.connection.backend_connected {
            return LegOutcome::Skipped;
        }

        let heartbeat = Heartbeat {
            gateway_id: self.config.gateway_id.clone(),
            timestamp: now_millis,
            wifi_rssi: telemetry.wifi_rssi,
            free_heap: telemetry.free_heap,
        };
        match self.send(&heartbeat) {
            Ok(()) => {
                debug!("Heartbeat sent");
                ctx.counters.heartbeats_sent += 1;
                LegOutcome::Delivered
            }
            Err(e) => {
                warn!("Heartbeat failed: {}", e);
                LegOutcome::Failed(e)
            }
        }
    }

    fn send<T: Serialize>(&mut self, message: &T) -> Result<(), TransportError> {
        let text = encode(message)?;
        self.link.send_text(&text)
    }
}

fn encode<T: Serialize>(message: &T) -> Result<String, TransportError> {
    serde_json::to_string(message).map_err(|e| TransportError::Request(e.to_string()))
}

// ============================================================================
// In-memory transports
// ============================================================================

#[derive(Debug, Default)]
struct LinkState {
    connected: bool,
    fail_sends: bool,
    events: VecDeque<LinkEvent>,
    sent: Vec<String>,
}

/// In-memory persistent link
///
/// Clones share state, so a test keeps a handle after moving one into a
/// bridge.
#[derive(Debug, Clone, Default)]
pub struct MemoryLink {
    state: Rc<RefCell<LinkState>>,
}

impl MemoryLink {
    /// Disconnected link with no events
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete the handshake and raise `Connected`
    pub fn connect(&self) {
        let mut state = self.state.borrow_mut();
        state.connected = true;
        state.events.push_back(LinkEvent::Connected);
    }

    /// Drop the link and raise `Disconnected`
    pub fn disconnect(&self) {
        let mut state = self.state.borrow_mut();
        state.connected = false;
        state.events.push_back(LinkEvent::Disconnected);
    }

    /// Deliver a text frame from the backend
    pub fn push_message(&self, text: &str) {
        self.push_event(LinkEvent::MessageReceived(text.as_bytes().to_vec()));
    }

    /// Queue an arbitrary event
    pub fn push_event(&self, event: LinkEvent) {
        self.state.borrow_mut().events.push_back(event);
    }

    /// Make every send fail while connected
    pub fn set_fail_sends(&self, fail: bool) {
        self.state.borrow_mut().fail_sends = fail;
    }

    /// Whether the handshake is complete
    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    /// Events not yet polled
    pub fn pending_events(&self) -> usize {
        self.state.borrow().events.len()
    }

    /// Every frame sent so far
    pub fn sent(&self) -> Vec<String> {
        self.state.borrow().sent.clone()
    }

    /// Take and clear the sent frames
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut self.state.borrow_mut().sent)
    }
}

impl LinkClient for MemoryLink {
    fn poll_event(&mut self) -> Option<LinkEvent> {
        self.state.borrow_mut().events.pop_front()
    }

    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if state.fail_sends {
            return Err(TransportError::Link("send rejected".to_string()));
        }
        state.sent.push(text.to_string());
        Ok(())
    }
}

#[derive(Debug)]
struct RequestState {
    reply: Result<HttpResponse, TransportError>,
    requests: Vec<(String, String)>,
}

/// In-memory request client that records requests and answers with a fixed reply
#[derive(Debug, Clone)]
pub struct MemoryRequestClient {
    state: Rc<RefCell<RequestState>>,
}

impl MemoryRequestClient {
    /// Client answering `200 OK`
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(RequestState {
                reply: Ok(HttpResponse {
                    status: 200,
                    body: "{\"success\":true}".to_string(),
                }),
                requests: Vec::new(),
            })),
        }
    }

    /// Answer every later request with `status`
    pub fn respond_with(&self, status: u16) {
        self.state.borrow_mut().reply = Ok(HttpResponse {
            status,
            body: String::new(),
        });
    }

    /// Fail every later request
    pub fn fail_with(&self, error: TransportError) {
        self.state.borrow_mut().reply = Err(error);
    }

    /// `(url, body)` of every request so far
    pub fn requests(&self) -> Vec<(String, String)> {
        self.state.borrow().requests.clone()
    }
}

impl Default for MemoryRequestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestClient for MemoryRequestClient {
    fn post_json(&mut self, url: &str, body: &str) -> Result<HttpResponse, TransportError> {
        let mut state = self.state.borrow_mut();
        state.requests.push((url.to_string(), body.to_string()));
        state.reply.clone()
    }
}
