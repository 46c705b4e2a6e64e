// LoRa Bridge - Radio-to-backend gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Gateway runtime
//!
//! The [`Gateway`] owns every collaborator and runs the cooperative loop.
//! One tick does, in order:
//!
//! 1. one radio receive, dispatched and forwarded in the same step
//! 2. drain of persistent link events
//! 3. due periodic tasks (status report, heartbeat)
//! 4. WiFi supervision
//!
//! Nothing runs concurrently. A blocking request or reconnect window
//! stalls the whole loop, radio reception included; packets arriving
//! meanwhile rely on the radio driver's own queue.
//!
//! # Example
//!
//! ```rust
//! use lorabridge::{
//!     BridgeConfig, FixedProbe, Gateway, GatewayConfig, ManualClock, MemoryLink,
//!     MemoryRadio, MemoryRequestClient, MemoryStation, TransportBridge,
//! };
//!
//! let bridge = TransportBridge::new(
//!     BridgeConfig::default(),
//!     MemoryRequestClient::new(),
//!     MemoryLink::new(),
//! );
//! let mut gateway = Gateway::new(
//!     GatewayConfig::default(),
//!     MemoryRadio::new(),
//!     MemoryStation::new(),
//!     bridge,
//!     ManualClock::new(),
//!     FixedProbe(40_000),
//! );
//!
//! gateway.start().unwrap();
//! let report = gateway.tick();
//! assert!(report.dispatch.is_none());
//! ```

use crate::clock::Clock;
use crate::connectivity::{ConnectivitySupervisor, Supervision, SupervisorConfig, WifiStation};
use crate::context::GatewayContext;
use crate::dispatcher::{DispatchOutcome, GatewayDispatcher};
use crate::error::{BridgeError, Result};
use crate::protocol::Address;
use crate::scheduler::{Scheduler, TaskKind};
use crate::status::StatusReport;
use crate::transport::{
    ForwardReport, HeartbeatTelemetry, LegOutcome, LinkClient, RequestClient, TransportBridge,
    DEFAULT_GATEWAY_ID,
};
use std::time::Duration;
use tracing::{error, info};

/// Gateway configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Identifier used in logs
    pub gateway_id: String,
    /// Address the gateway listens on
    pub own_address: Address,
    /// Pause between ticks
    pub tick_interval: Duration,
    /// Status report period
    pub status_period: Duration,
    /// Heartbeat period
    pub heartbeat_period: Duration,
    /// WiFi reconnection policy
    pub supervisor: SupervisorConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateway_id: DEFAULT_GATEWAY_ID.to_string(),
            own_address: Address::Master,
            tick_interval: Duration::from_millis(10),
            status_period: Duration::from_secs(10),
            heartbeat_period: Duration::from_secs(30),
            supervisor: SupervisorConfig::default(),
        }
    }
}

/// Free memory source for heartbeats and status reports
pub trait ResourceProbe {
    /// Free memory in bytes
    fn free_memory(&self) -> u64;
}

/// Probe reporting a fixed value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedProbe(pub u64);

impl ResourceProbe for FixedProbe {
    fn free_memory(&self) -> u64 {
        self.0
    }
}

/// What one tick did
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Outcome of the packet received this tick
    pub dispatch: Option<DispatchOutcome>,
    /// Forwarding result when the packet was a reading
    pub forward: Option<ForwardReport>,
    /// Link events handled
    pub link_events: usize,
    /// Status report, when due
    pub status: Option<StatusReport>,
    /// Heartbeat result, when due
    pub heartbeat: Option<LegOutcome>,
    /// WiFi supervision result
    pub supervision: Supervision,
}

/// The radio-to-backend gateway
pub struct Gateway<R, W, H, L, C, P> {
    config: GatewayConfig,
    radio: R,
    station: W,
    bridge: TransportBridge<H, L>,
    clock: C,
    probe: P,
    dispatcher: GatewayDispatcher,
    supervisor: ConnectivitySupervisor,
    scheduler: Scheduler,
    ctx: GatewayContext,
}

impl<R, W, H, L, C, P> Gateway<R, W, H, L, C, P>
where
    R: crate::radio::RadioDriver,
    W: WifiStation,
    H: RequestClient,
    L: LinkClient,
    C: Clock,
    P: ResourceProbe,
{
    /// Assemble a gateway. Nothing touches hardware until [`Gateway::start`].
    pub fn new(
        config: GatewayConfig,
        radio: R,
        station: W,
        bridge: TransportBridge<H, L>,
        clock: C,
        probe: P,
    ) -> Self {
        Self {
            dispatcher: GatewayDispatcher::new(config.own_address),
            supervisor: ConnectivitySupervisor::new(config.supervisor.clone()),
            config,
            radio,
            station,
            bridge,
            clock,
            probe,
            scheduler: Scheduler::new(),
            ctx: GatewayContext::new(),
        }
    }

    /// Bring the radio up, connect WiFi and arm the timers
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::RadioInit`] if the radio does not come up.
    /// That error is fatal.
    pub fn start(&mut self) -> Result<()> {
        info!("Gateway {} starting", self.config.gateway_id);
        self.radio.init().map_err(BridgeError::RadioInit)?;
        info!("Radio initialized");

        self.supervisor
            .connect_initial(&mut self.ctx, &mut self.station, &self.clock);

        let now = self.clock.now_millis();
        self.scheduler
            .register(TaskKind::StatusReport, self.config.status_period, now);
        self.scheduler
            .register(TaskKind::Heartbeat, self.config.heartbeat_period, now);
        info!("Gateway {} ready", self.config.gateway_id);
        Ok(())
    }

    /// Run one cooperative tick
    pub fn tick(&mut self) -> TickReport {
        self.ctx.counters.loop_count += 1;

        let (dispatch, forward) = self.receive_one();
        let link_events = self.bridge.poll_link(&mut self.ctx, self.clock.now_millis());

        let mut status = None;
        let mut heartbeat = None;
        for task in self.scheduler.due(self.clock.now_millis()) {
            match task {
                TaskKind::StatusReport => status = Some(self.report_status()),
                TaskKind::Heartbeat => heartbeat = Some(self.heartbeat()),
                TaskKind::Measurement => {}
            }
        }

        let supervision = self
            .supervisor
            .supervise(&mut self.ctx, &mut self.station, &self.clock);

        TickReport {
            dispatch,
            forward,
            link_events,
            status,
            heartbeat,
            supervision,
        }
    }

    /// Tick forever, sleeping the tick interval between ticks
    pub fn run<F: FnMut(&TickReport)>(&mut self, mut observer: F) -> ! {
        loop {
            let report = self.tick();
            observer(&report);
            self.clock.sleep(self.config.tick_interval);
        }
    }

    fn receive_one(&mut self) -> (Option<DispatchOutcome>, Option<ForwardReport>) {
        let packet = match self.radio.receive() {
            Ok(Some(packet)) => packet,
            Ok(None) => return (None, None),
            Err(e) => {
                error!("Radio receive failed: {}", e);
                return (None, None);
            }
        };

        let outcome = self.dispatcher.dispatch(
            &mut self.ctx,
            &mut self.radio,
            &packet,
            self.clock.now_millis(),
        );
        let forward = match &outcome {
            DispatchOutcome::Reading(reading) => Some(self.bridge.forward(&mut self.ctx, reading)),
            _ => None,
        };
        (Some(outcome), forward)
    }

    fn report_status(&mut self) -> StatusReport {
        let report = StatusReport::capture(
            &self.ctx,
            self.station.rssi(),
            self.probe.free_memory(),
            self.clock.now_millis(),
        );
        info!("Gateway status: {} ({})", report, report.health());
        self.ctx.counters.loop_count = 0;
        report
    }

    fn heartbeat(&mut self) -> LegOutcome {
        let telemetry = HeartbeatTelemetry {
            wifi_rssi: self.station.rssi(),
            free_heap: self.probe.free_memory(),
        };
        self.bridge
            .send_heartbeat(&mut self.ctx, telemetry, self.clock.now_millis())
    }

    /// Gateway configuration
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Runtime context
    pub fn context(&self) -> &GatewayContext {
        &self.ctx
    }

    /// Mutable runtime context
    pub fn context_mut(&mut self) -> &mut GatewayContext {
        &mut self.ctx
    }

    /// Radio driver
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Mutable radio driver
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Transport bridge
    pub fn bridge(&self) -> &TransportBridge<H, L> {
        &self.bridge
    }

    /// Clock
    pub fn clock(&self) -> &C {
        &self.clock
    }
}
