//! # LoRa Bridge - Radio-to-backend gateway
//!
//! Core of a single-hop sensor network: battery nodes send short readings
//! over a shared half-duplex radio to one gateway, which relays them to a
//! backend over HTTP and a persistent link, and relays backend commands
//! back to nodes through a poll-and-answer handshake.
//!
//! ## Key Features
//!
//! - **Fixed-header frames**: 4-byte header, length-checked, no checksum
//! - **Silent drops**: malformed and foreign frames never cause side effects
//! - **Single-slot mailbox**: the freshest downlink command wins
//! - **Dual transport**: best-effort request leg plus persistent link leg
//! - **Deterministic timing**: every timer and window reads an injectable clock
//!
//! ## Quick Start
//!
//! ```rust
//! use lorabridge::{Address, Frame, PacketCodec};
//!
//! let frame = Frame::between(Address::Master, Address::Node1, 0, "3.70,1.2").unwrap();
//! let bytes = PacketCodec::encode(&frame);
//! assert_eq!(&bytes[..4], &[0xFF, 0xBB, 0, 8]);
//!
//! let decoded = PacketCodec::decode(&bytes).unwrap();
//! assert_eq!(decoded, frame);
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Addresses, frames and the packet codec
//! - [`filter`]: Destination address filtering
//! - [`dispatcher`]: Control/data routing of received frames
//! - [`mailbox`]: Single-slot downlink command holder
//! - [`transport`]: Backend forwarding and link event handling
//! - [`connectivity`]: WiFi supervision and reconnection
//! - [`gateway`]: The cooperative gateway loop
//! - [`node`]: Sensor node agent
//! - [`radio`]: Radio driver trait, in-memory and UDP radios

// Modules
pub mod clock;
pub mod connectivity;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod mailbox;
pub mod messages;
pub mod node;
pub mod protocol;
pub mod radio;
pub mod reading;
pub mod scheduler;
pub mod status;
pub mod transport;

// Re-exports for convenient access
pub use clock::{Clock, ManualClock, SystemClock};
pub use connectivity::{
    ConnectivitySupervisor, MemoryStation, Supervision, SupervisorConfig, WifiStation,
};
pub use context::{ConnectionState, GatewayContext, GatewayCounters};
pub use dispatcher::{DispatchOutcome, GatewayDispatcher};
pub use error::{
    BridgeError, CommandDecodeError, FramingError, RadioError, Result, TransportError,
};
pub use filter::AddressFilter;
pub use gateway::{FixedProbe, Gateway, GatewayConfig, ResourceProbe, TickReport};
pub use mailbox::{CommandMailbox, PendingCommand};
pub use messages::{
    parse_inbound, GatewayConnected, Heartbeat, InboundMessage, SensorDataMessage,
    SensorDataRecord,
};
pub use node::{
    ConstantSource, Measurement, NodeAgent, NodeConfig, NodeTick, RadioSettings, SensorSource,
    Uplink,
};
pub use protocol::{
    Address, Frame, PacketCodec, SequenceCounter, CONTROL_SENTINEL, HEADER_LEN, MAX_PAYLOAD_LEN,
};
pub use radio::{MemoryRadio, RadioDriver, RadioMetrics, RadioPacket, UdpRadio, UdpRadioConfig};
pub use reading::{Classification, SensorReading};
pub use scheduler::{PeriodicTask, Scheduler, TaskKind};
pub use status::{LinkHealth, StatusReport};
pub use transport::{
    BridgeConfig, ForwardReport, HeartbeatTelemetry, HttpResponse, LegOutcome, LinkClient,
    LinkEvent, MemoryLink, MemoryRequestClient, RequestClient, TransportBridge,
    DEFAULT_GATEWAY_ID, SENSOR_DATA_PATH,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
