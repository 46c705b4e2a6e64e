// LoRa Bridge - Radio-to-backend gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! WiFi connectivity supervision
//!
//! Tracks station association and rate-limits reconnection. Each attempt
//! blocks the caller for a bounded window; attempts are spaced by a fixed
//! cooldown with no backoff. The persistent backend link reconnects on its
//! own and is not coordinated from here.

use crate::clock::Clock;
use crate::context::GatewayContext;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::{info, warn};

/// WiFi station driver
pub trait WifiStation {
    /// Start associating with the configured network
    fn begin(&mut self);

    /// Drop the current association
    fn disconnect(&mut self);

    /// Whether the station is associated
    fn is_connected(&mut self) -> bool;

    /// Signal strength in dBm
    fn rssi(&self) -> i32;
}

/// Timing of the reconnection policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Blocking window of the startup connect
    pub initial_window: Duration,
    /// Minimum spacing between attempts
    pub reconnect_cooldown: Duration,
    /// Blocking window of each reconnect
    pub reconnect_window: Duration,
    /// Interval between association checks inside a window
    pub poll_step: Duration,
    /// Pause between disconnect and begin
    pub settle_delay: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            initial_window: Duration::from_secs(30),
            reconnect_cooldown: Duration::from_secs(30),
            reconnect_window: Duration::from_secs(15),
            poll_step: Duration::from_secs(1),
            settle_delay: Duration::from_secs(1),
        }
    }
}

/// Result of one supervision pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Supervision {
    /// Station associated
    Up,
    /// Down, next attempt not yet allowed
    CoolingDown,
    /// Attempt made and succeeded
    Reconnected,
    /// Attempt made and timed out
    ReconnectFailed,
}

/// Rate-limited WiFi reconnection
#[derive(Debug, Clone, Default)]
pub struct ConnectivitySupervisor {
    config: SupervisorConfig,
}

impl ConnectivitySupervisor {
    /// Create a supervisor
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }

    /// Policy timings
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Startup connect, blocking for up to the initial window
    ///
    /// Counts as an attempt for cooldown purposes.
    pub fn connect_initial<W, C>(&self, ctx: &mut GatewayContext, station: &mut W, clock: &C) -> bool
    where
        W: WifiStation,
        C: Clock,
    {
        info!("Connecting to WiFi...");
        ctx.connection.last_wifi_attempt_at = Some(clock.now_millis());
        station.begin();

        let connected = self.wait_for_association(station, clock, self.config.initial_window);
        ctx.connection.wifi_connected = connected;
        if connected {
            info!("WiFi connected, RSSI {} dBm", station.rssi());
        } else {
            warn!(
                "WiFi connection failed after {}s",
                self.config.initial_window.as_secs()
            );
        }
        connected
    }

    /// Check the station and reconnect if allowed
    pub fn supervise<W, C>(&self, ctx: &mut GatewayContext, station: &mut W, clock: &C) -> Supervision
    where
        W: WifiStation,
        C: Clock,
    {
        if station.is_connected() {
            if !ctx.connection.wifi_connected {
                info!("WiFi association restored");
                ctx.connection.wifi_connected = true;
            }
            return Supervision::Up;
        }

        if ctx.connection.wifi_connected {
            warn!("WiFi connection lost");
            ctx.connection.wifi_connected = false;
        }

        let now = clock.now_millis();
        if let Some(last) = ctx.connection.last_wifi_attempt_at {
            if now.saturating_sub(last) < self.config.reconnect_cooldown.as_millis() as u64 {
                return Supervision::CoolingDown;
            }
        }

        info!("Attempting WiFi reconnection");
        ctx.connection.last_wifi_attempt_at = Some(now);
        station.disconnect();
        clock.sleep(self.config.settle_delay);
        station.begin();

        if self.wait_for_association(station, clock, self.config.reconnect_window) {
            info!("WiFi reconnected, RSSI {} dBm", station.rssi());
            ctx.connection.wifi_connected = true;
            Supervision::Reconnected
        } else {
            warn!("WiFi reconnection failed");
            Supervision::ReconnectFailed
        }
    }

    fn wait_for_association<W, C>(&self, station: &mut W, clock: &C, window: Duration) -> bool
    where
        W: WifiStation,
        C: Clock,
    {
        let step = self.config.poll_step.max(Duration::from_millis(1));
        let steps = window.as_millis() / step.as_millis();
        for _ in 0..steps {
            if station.is_connected() {
                return true;
            }
            clock.sleep(step);
        }
        station.is_connected()
    }
}

#[derive(Debug)]
struct StationState {
    reachable: bool,
    associated: bool,
    rssi: i32,
    begins: u32,
    disconnects: u32,
}

/// In-memory WiFi station
///
/// `begin` associates immediately when the network is reachable. Clones
/// share state.
#[derive(Debug, Clone)]
pub struct MemoryStation {
    state: Rc<RefCell<StationState>>,
}

impl MemoryStation {
    /// Station whose network is reachable
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(StationState {
                reachable: true,
                associated: false,
                rssi: -55,
                begins: 0,
                disconnects: 0,
            })),
        }
    }

    /// Make the network reachable or not
    pub fn set_reachable(&self, reachable: bool) {
        self.state.borrow_mut().reachable = reachable;
    }

    /// Lose the association without a disconnect call
    pub fn drop_association(&self) {
        self.state.borrow_mut().associated = false;
    }

    /// Associate without a begin call
    pub fn reassociate(&self) {
        self.state.borrow_mut().associated = true;
    }

    /// Number of begin calls
    pub fn begins(&self) -> u32 {
        self.state.borrow().begins
    }

    /// Number of disconnect calls
    pub fn disconnects(&self) -> u32 {
        self.state.borrow().disconnects
    }
}

impl Default for MemoryStation {
    fn default() -> Self {
        Self::new()
    }
}

impl WifiStation for MemoryStation {
    fn begin(&mut self) {
        let mut state = self.state.borrow_mut();
        state.begins += 1;
        if state.reachable {
            state.associated = true;
        }
    }

    fn disconnect(&mut self) {
        let mut state = self.state.borrow_mut();
        state.disconnects += 1;
        state.associated = false;
    }

    fn is_connected(&mut self) -> bool {
        let state = self.state.borrow();
        state.associated && state.reachable
    }

    fn rssi(&self) -> i32 {
        self.state.borrow().rssi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn setup() -> (ConnectivitySupervisor, MemoryStation, ManualClock, GatewayContext) {
        (
            ConnectivitySupervisor::default(),
            MemoryStation::new(),
            ManualClock::new(),
            GatewayContext::new(),
        )
    }

    #[test]
    fn test_initial_connect() {
        let (supervisor, mut station, clock, mut ctx) = setup();
        assert!(supervisor.connect_initial(&mut ctx, &mut station, &clock));
        assert!(ctx.connection.wifi_connected);
        assert_eq!(ctx.connection.last_wifi_attempt_at, Some(0));
        assert_eq!(clock.now_millis(), 0);
    }

    #[test]
    fn test_initial_connect_times_out() {
        let (supervisor, mut station, clock, mut ctx) = setup();
        station.set_reachable(false);
        assert!(!supervisor.connect_initial(&mut ctx, &mut station, &clock));
        assert!(!ctx.connection.wifi_connected);
        assert_eq!(clock.now_millis(), 30_000);
    }

    #[test]
    fn test_loss_then_cooldown() {
        let (supervisor, mut station, clock, mut ctx) = setup();
        supervisor.connect_initial(&mut ctx, &mut station, &clock);
        station.set_reachable(false);

        clock.set(10_000);
        assert_eq!(
            supervisor.supervise(&mut ctx, &mut station, &clock),
            Supervision::CoolingDown
        );
        assert!(!ctx.connection.wifi_connected);
        assert_eq!(station.begins(), 1);
    }

    #[test]
    fn test_reconnect_blocks_for_window() {
        let (supervisor, mut station, clock, mut ctx) = setup();
        supervisor.connect_initial(&mut ctx, &mut station, &clock);
        station.set_reachable(false);

        clock.set(30_000);
        assert_eq!(
            supervisor.supervise(&mut ctx, &mut station, &clock),
            Supervision::ReconnectFailed
        );
        // Settle delay plus the full window
        assert_eq!(clock.now_millis(), 30_000 + 1_000 + 15_000);
        assert_eq!(ctx.connection.last_wifi_attempt_at, Some(30_000));
        assert_eq!(station.disconnects(), 1);

        // Next attempt waits a full cooldown from the last start
        clock.set(59_999);
        assert_eq!(
            supervisor.supervise(&mut ctx, &mut station, &clock),
            Supervision::CoolingDown
        );

        station.set_reachable(true);
        clock.set(60_000);
        assert_eq!(
            supervisor.supervise(&mut ctx, &mut station, &clock),
            Supervision::Reconnected
        );
        assert!(ctx.connection.wifi_connected);
        assert_eq!(clock.now_millis(), 61_000);
    }

    #[test]
    fn test_spontaneous_reassociation_restores_flag() {
        let (supervisor, mut station, clock, mut ctx) = setup();
        supervisor.connect_initial(&mut ctx, &mut station, &clock);
        station.drop_association();

        clock.set(5_000);
        supervisor.supervise(&mut ctx, &mut station, &clock);
        assert!(!ctx.connection.wifi_connected);

        station.reassociate();
        assert_eq!(
            supervisor.supervise(&mut ctx, &mut station, &clock),
            Supervision::Up
        );
        assert!(ctx.connection.wifi_connected);
    }
}
