// LoRa Bridge Gateway - Host daemon
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Host implementations of the gateway collaborators.

pub mod http;
pub mod probe;
pub mod station;
pub mod websocket;

pub use http::HttpSensorClient;
pub use probe::ProcProbe;
pub use station::HostStation;
pub use websocket::{WsLink, WsLinkConfig};

use thiserror::Error;

/// Errors while setting up host adapters
#[derive(Error, Debug)]
pub enum AdapterError {
    /// HTTP client could not be built
    #[error("HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend host did not resolve
    #[error("Cannot resolve {0}")]
    Resolve(String),
}
