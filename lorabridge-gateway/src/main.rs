// LoRa Bridge Gateway - Host daemon
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # LoRa Bridge Gateway
//!
//! Runs the gateway loop on the main thread with a UDP radio medium, an
//! HTTP request leg and a WebSocket link, and serves Prometheus metrics
//! from a side thread.
//!
//! ## Usage
//!
//! ```bash
//! # Backend on localhost:3000, nodes sending to UDP 7000
//! lorabridge-gateway --node-peer 127.0.0.1:7001
//!
//! # Custom backend and metrics port
//! lorabridge-gateway --backend-host 192.168.56.1 --metrics-port 9200
//! ```

mod adapters;
mod metrics;

use adapters::{HostStation, HttpSensorClient, ProcProbe, WsLink, WsLinkConfig};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use clap::Parser;
use lorabridge::{
    BridgeConfig, BridgeError, Gateway, GatewayConfig, StatusReport, SystemClock,
    TransportBridge, UdpRadio, UdpRadioConfig,
};
use metrics::{encode_metrics, update_from_report};
use serde::Serialize;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// LoRa Bridge gateway daemon
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// UDP address the radio medium listens on
    #[arg(long, env = "LORABRIDGE_RADIO_BIND", default_value = "0.0.0.0:7000")]
    radio_bind: SocketAddr,

    /// UDP address of a sensor node (repeatable)
    #[arg(long = "node-peer", env = "LORABRIDGE_NODE_PEERS", value_delimiter = ',')]
    node_peers: Vec<SocketAddr>,

    /// Backend host
    #[arg(long, env = "LORABRIDGE_BACKEND_HOST", default_value = "127.0.0.1")]
    backend_host: String,

    /// Backend port (HTTP and WebSocket)
    #[arg(long, env = "LORABRIDGE_BACKEND_PORT", default_value = "3000")]
    backend_port: u16,

    /// Gateway identifier sent to the backend
    #[arg(long, env = "LORABRIDGE_GATEWAY_ID", default_value = lorabridge::DEFAULT_GATEWAY_ID)]
    gateway_id: String,

    /// HTTP request timeout in milliseconds
    #[arg(long, default_value = "5000")]
    http_timeout_ms: u64,

    /// WebSocket reconnect interval in seconds
    #[arg(long, default_value = "5")]
    ws_reconnect_secs: u64,

    /// Port of the metrics endpoint
    #[arg(long, env = "LORABRIDGE_METRICS_PORT", default_value = "9100")]
    metrics_port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Last status report, shared with the metrics server.
type SharedStatus = Arc<RwLock<Option<StatusReport>>>;

fn main() {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("LoRa Bridge Gateway v{}", env!("CARGO_PKG_VERSION"));

    let status: SharedStatus = Arc::new(RwLock::new(None));
    spawn_metrics_server(args.metrics_port, Arc::clone(&status));

    if let Err(e) = run(&args, status) {
        if e.is_fatal() {
            halt(&e);
        }
        error!("Gateway failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args, status: SharedStatus) -> Result<(), BridgeError> {
    let backend = (args.backend_host.as_str(), args.backend_port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| {
            BridgeError::Config(
                adapters::AdapterError::Resolve(args.backend_host.clone()).to_string(),
            )
        })?;

    let radio = UdpRadio::new(UdpRadioConfig::new(args.radio_bind, args.node_peers.clone()));
    let station = HostStation::new(backend, Duration::from_secs(1), Duration::from_secs(5));
    let http = HttpSensorClient::new(Duration::from_millis(args.http_timeout_ms))
        .map_err(|e| BridgeError::Config(e.to_string()))?;
    let link = WsLink::new(
        WsLinkConfig::new(args.backend_host.clone(), args.backend_port)
            .with_reconnect_interval(Duration::from_secs(args.ws_reconnect_secs)),
    );

    let base_url = format!("http://{}:{}", args.backend_host, args.backend_port);
    let bridge = TransportBridge::new(
        BridgeConfig::for_backend(&base_url).with_gateway_id(args.gateway_id.clone()),
        http,
        link,
    );
    let config = GatewayConfig {
        gateway_id: args.gateway_id.clone(),
        ..GatewayConfig::default()
    };

    let mut gateway = Gateway::new(
        config,
        radio,
        station,
        bridge,
        SystemClock::new(),
        ProcProbe::new(),
    );
    gateway.start()?;
    info!("Forwarding to {}", gateway.bridge().config().endpoint);

    gateway.run(|report| {
        if let Some(ref snapshot) = report.status {
            update_from_report(snapshot);
            if let Ok(mut last) = status.write() {
                *last = Some(snapshot.clone());
            }
        }
    })
}

/// Unrecoverable hardware fault: stay up and say so once a second.
fn halt(e: &BridgeError) -> ! {
    loop {
        error!("{} - system halted", e);
        std::thread::sleep(Duration::from_secs(1));
    }
}

fn spawn_metrics_server(port: u16, status: SharedStatus) {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Metrics runtime failed: {}", e);
                return;
            }
        };
        runtime.block_on(serve_metrics(port, status));
    });
}

async fn serve_metrics(port: u16, status: SharedStatus) {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .with_state(status);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Metrics endpoint: http://{}/metrics", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Cannot bind metrics endpoint {}: {}", addr, e);
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("Metrics server stopped: {}", e);
    }
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        encode_metrics(),
    )
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Status information response.
#[derive(Serialize)]
struct StatusResponse {
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_report: Option<StatusReport>,
}

/// Status handler - returns the last status report as JSON.
async fn status_handler(State(status): State<SharedStatus>) -> Json<StatusResponse> {
    let last_report = status.read().ok().and_then(|last| last.clone());
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        last_report,
    })
}
