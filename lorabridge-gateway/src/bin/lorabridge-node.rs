// LoRa Bridge Gateway - Sensor node simulator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Simulated sensor node on the UDP radio medium.
//!
//! ```bash
//! lorabridge-node --address node1 --bind 127.0.0.1:7001 --gateway 127.0.0.1:7000
//! ```

use clap::{Parser, ValueEnum};
use lorabridge::{
    Address, Measurement, NodeAgent, NodeConfig, SensorSource, SystemClock, UdpRadio,
    UdpRadioConfig,
};
use rand::Rng;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum NodeAddress {
    Node1,
    Node2,
}

impl From<NodeAddress> for Address {
    fn from(node: NodeAddress) -> Self {
        match node {
            NodeAddress::Node1 => Address::Node1,
            NodeAddress::Node2 => Address::Node2,
        }
    }
}

/// LoRa Bridge sensor node simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Node address
    #[arg(long, value_enum, default_value = "node1")]
    address: NodeAddress,

    /// UDP address this node listens on
    #[arg(long, default_value = "127.0.0.1:7001")]
    bind: SocketAddr,

    /// UDP address of the gateway
    #[arg(long, default_value = "127.0.0.1:7000")]
    gateway: SocketAddr,

    /// Milliseconds between frames
    #[arg(long, default_value = "1000")]
    interval_ms: u64,

    /// Data frames before each control poll
    #[arg(long, default_value = "5")]
    readings_per_cycle: u32,

    /// Nominal mains voltage
    #[arg(long, default_value = "230.0")]
    voltage: f32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Voltage and current wandering around a nominal operating point
struct SimulatedMeter {
    voltage: f32,
    current: f32,
    nominal_voltage: f32,
}

impl SensorSource for SimulatedMeter {
    fn sample(&mut self) -> Measurement {
        let mut rng = rand::thread_rng();
        self.voltage += rng.gen_range(-1.5..1.5);
        self.voltage += (self.nominal_voltage - self.voltage) * 0.1;
        self.current = (self.current + rng.gen_range(-0.05..0.05)).clamp(0.0, 5.0);
        Measurement {
            primary: self.voltage,
            secondary: self.current,
        }
    }
}

fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = NodeConfig {
        address: args.address.into(),
        reading_interval: Duration::from_millis(args.interval_ms),
        readings_per_cycle: args.readings_per_cycle,
        ..NodeConfig::default()
    };
    let radio = UdpRadio::new(UdpRadioConfig::new(args.bind, vec![args.gateway]));
    let meter = SimulatedMeter {
        voltage: args.voltage,
        current: 1.5,
        nominal_voltage: args.voltage,
    };

    let mut agent = NodeAgent::new(config, radio, meter, SystemClock::new());
    if let Err(e) = agent.start() {
        loop {
            error!("{} - node halted", e);
            std::thread::sleep(Duration::from_secs(1));
        }
    }
    info!(
        "Node {} sending to {} every {}ms",
        agent.config().address,
        args.gateway,
        args.interval_ms
    );

    loop {
        match agent.tick() {
            Ok(tick) => {
                if let Some(command) = tick.command {
                    info!("Settings now {:?} after \"{}\"", agent.settings(), command);
                }
            }
            Err(e) => warn!("Node tick failed: {}", e),
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}
