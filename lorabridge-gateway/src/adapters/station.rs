//! WiFi stand-in for hosts
//!
//! A host has no station to associate, so "connected" means the backend
//! accepts TCP connections. Probes are cached for an interval to keep the
//! per-tick check cheap.

use lorabridge::WifiStation;
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};
use tracing::debug;

/// Station whose association is backend reachability
#[derive(Debug)]
pub struct HostStation {
    target: SocketAddr,
    probe_timeout: Duration,
    probe_interval: Duration,
    nominal_rssi: i32,
    enabled: bool,
    last_probe: Option<(Instant, bool)>,
}

impl HostStation {
    /// Station probing `target`
    pub fn new(target: SocketAddr, probe_timeout: Duration, probe_interval: Duration) -> Self {
        Self {
            target,
            probe_timeout,
            probe_interval,
            nominal_rssi: -50,
            enabled: false,
            last_probe: None,
        }
    }

    fn reachable(&mut self) -> bool {
        if let Some((at, up)) = self.last_probe {
            if at.elapsed() < self.probe_interval {
                return up;
            }
        }
        let up = TcpStream::connect_timeout(&self.target, self.probe_timeout).is_ok();
        debug!("Probe {}: {}", self.target, if up { "up" } else { "down" });
        self.last_probe = Some((Instant::now(), up));
        up
    }
}

impl WifiStation for HostStation {
    fn begin(&mut self) {
        self.enabled = true;
        self.last_probe = None;
    }

    fn disconnect(&mut self) {
        self.enabled = false;
    }

    fn is_connected(&mut self) -> bool {
        self.enabled && self.reachable()
    }

    fn rssi(&self) -> i32 {
        match self.last_probe {
            Some((_, true)) if self.enabled => self.nominal_rssi,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_reachable_backend_is_connected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut station = HostStation::new(addr, Duration::from_secs(1), Duration::from_secs(5));

        assert!(!station.is_connected());
        station.begin();
        assert!(station.is_connected());
        assert_eq!(station.rssi(), -50);

        station.disconnect();
        assert!(!station.is_connected());
        assert_eq!(station.rssi(), 0);
    }

    #[test]
    fn test_unreachable_backend() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let mut station = HostStation::new(addr, Duration::from_millis(200), Duration::ZERO);
        station.begin();
        assert!(!station.is_connected());
    }
}
