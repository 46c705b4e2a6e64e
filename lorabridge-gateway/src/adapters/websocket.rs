// LoRa Bridge Gateway - Host daemon
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Persistent backend link over WebSocket
//!
//! A blocking handshake with a bounded timeout, then a non-blocking socket
//! read once per poll. While down, a new connection is tried every
//! reconnect interval. Every transition is reported as a [`LinkEvent`].

use lorabridge::{LinkClient, LinkEvent, TransportError};
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tungstenite::{Error as WsError, Message, WebSocket};

/// WebSocket link configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsLinkConfig {
    /// Backend host
    pub host: String,
    /// Backend port
    pub port: u16,
    /// Request path
    pub path: String,
    /// TCP connect and handshake timeout
    pub connect_timeout: Duration,
    /// Minimum spacing between connection attempts
    pub reconnect_interval: Duration,
}

impl WsLinkConfig {
    /// Link to `ws://host:port/`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            path: "/".to_string(),
            connect_timeout: Duration::from_secs(3),
            reconnect_interval: Duration::from_secs(5),
        }
    }

    /// Override the reconnect interval
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Handshake URL
    pub fn url(&self) -> String {
        format!("ws://{}:{}{}", self.host, self.port, self.path)
    }
}

/// Self-reconnecting WebSocket client
pub struct WsLink {
    config: WsLinkConfig,
    socket: Option<WebSocket<TcpStream>>,
    last_attempt: Option<Instant>,
    events: VecDeque<LinkEvent>,
}

impl WsLink {
    /// Create a link. The first connection is tried on the first poll.
    pub fn new(config: WsLinkConfig) -> Self {
        Self {
            config,
            socket: None,
            last_attempt: None,
            events: VecDeque::new(),
        }
    }

    /// Whether the handshake completed and the socket is open
    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn maybe_reconnect(&mut self) {
        let due = self
            .last_attempt
            .map_or(true, |at| at.elapsed() >= self.config.reconnect_interval);
        if !due {
            return;
        }

        self.last_attempt = Some(Instant::now());
        match self.connect() {
            Ok(socket) => {
                info!("WebSocket connected to {}", self.config.url());
                self.socket = Some(socket);
                self.events.push_back(LinkEvent::Connected);
            }
            Err(e) => debug!("WebSocket connect to {} failed: {}", self.config.url(), e),
        }
    }

    fn connect(&self) -> Result<WebSocket<TcpStream>, String> {
        let addr = (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(|e| e.to_string())?
            .next()
            .ok_or_else(|| format!("cannot resolve {}", self.config.host))?;

        let stream = TcpStream::connect_timeout(&addr, self.config.connect_timeout)
            .map_err(|e| e.to_string())?;
        stream
            .set_read_timeout(Some(self.config.connect_timeout))
            .map_err(|e| e.to_string())?;
        stream
            .set_write_timeout(Some(self.config.connect_timeout))
            .map_err(|e| e.to_string())?;

        let (socket, _response) =
            tungstenite::client(self.config.url(), stream).map_err(|e| e.to_string())?;
        socket
            .get_ref()
            .set_nonblocking(true)
            .map_err(|e| e.to_string())?;
        Ok(socket)
    }

    fn close(&mut self) {
        self.socket = None;
        self.last_attempt = Some(Instant::now());
    }
}

impl LinkClient for WsLink {
    fn poll_event(&mut self) -> Option<LinkEvent> {
        if let Some(event) = self.events.pop_front() {
            return Some(event);
        }

        loop {
            let result = match self.socket.as_mut() {
                Some(socket) => socket.read(),
                None => {
                    self.maybe_reconnect();
                    return self.events.pop_front();
                }
            };

            return match result {
                Ok(Message::Text(text)) => Some(LinkEvent::MessageReceived(text.into_bytes())),
                Ok(Message::Binary(data)) => Some(LinkEvent::MessageReceived(data)),
                Ok(Message::Close(_)) => {
                    self.close();
                    Some(LinkEvent::Disconnected)
                }
                // Ping, pong and raw frames are answered by tungstenite; keep reading
                Ok(_) => continue,
                Err(WsError::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => None,
                Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => {
                    self.close();
                    Some(LinkEvent::Disconnected)
                }
                Err(e) => {
                    self.close();
                    self.events.push_back(LinkEvent::Disconnected);
                    Some(LinkEvent::ErrorOccurred(e.to_string()))
                }
            };
        }
    }

    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        let socket = self.socket.as_mut().ok_or(TransportError::NotConnected)?;
        match socket.send(Message::Text(text.to_string())) {
            Ok(()) => Ok(()),
            // Queued in the write buffer, flushed on a later read
            Err(WsError::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(e) => {
                let message = e.to_string();
                self.close();
                self.events.push_back(LinkEvent::Disconnected);
                Err(TransportError::Link(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn poll_until(link: &mut WsLink, limit: Duration) -> Option<LinkEvent> {
        let start = Instant::now();
        while start.elapsed() < limit {
            if let Some(event) = link.poll_event() {
                return Some(event);
            }
            thread::sleep(Duration::from_millis(10));
        }
        None
    }

    #[test]
    fn test_connect_receive_send() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut ws = match tungstenite::accept(stream) {
                Ok(ws) => ws,
                Err(e) => panic!("server handshake failed: {}", e),
            };
            ws.send(Message::Text(
                r#"{"type":"send_to_node","nodeId":187,"message":"SF7"}"#.to_string(),
            ))
            .unwrap();
            loop {
                if let Message::Text(text) = ws.read().unwrap() {
                    return text;
                }
            }
        });

        let mut link = WsLink::new(WsLinkConfig::new("127.0.0.1", port));
        assert_eq!(
            poll_until(&mut link, Duration::from_secs(5)),
            Some(LinkEvent::Connected)
        );
        assert!(link.is_connected());

        match poll_until(&mut link, Duration::from_secs(5)) {
            Some(LinkEvent::MessageReceived(bytes)) => {
                assert!(String::from_utf8(bytes).unwrap().contains("SF7"));
            }
            other => panic!("unexpected event {:?}", other),
        }

        link.send_text("{\"type\":\"heartbeat\"}").unwrap();
        // Drive the socket until the frame is flushed
        let _ = poll_until(&mut link, Duration::from_millis(100));
        assert_eq!(server.join().unwrap(), "{\"type\":\"heartbeat\"}");
    }

    #[test]
    fn test_control_frames_do_not_end_drain() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut ws = match tungstenite::accept(stream) {
                Ok(ws) => ws,
                Err(e) => panic!("server handshake failed: {}", e),
            };
            ws.send(Message::Ping(vec![1])).unwrap();
            ws.send(Message::Pong(vec![2])).unwrap();
            ws.send(Message::Text("after-ping".to_string())).unwrap();
            // Hold the socket open until the client has read everything
            let _ = ws.read();
        });

        let mut link = WsLink::new(WsLinkConfig::new("127.0.0.1", port));
        assert_eq!(
            poll_until(&mut link, Duration::from_secs(5)),
            Some(LinkEvent::Connected)
        );

        // Wait until all three frames are buffered, then one poll must reach the text
        thread::sleep(Duration::from_millis(200));
        assert_eq!(
            link.poll_event(),
            Some(LinkEvent::MessageReceived(b"after-ping".to_vec()))
        );

        drop(link);
        server.join().unwrap();
    }

    #[test]
    fn test_send_while_down() {
        let mut link = WsLink::new(WsLinkConfig::new("127.0.0.1", 9));
        assert_eq!(link.send_text("x"), Err(TransportError::NotConnected));
    }

    #[test]
    fn test_reconnect_is_rate_limited() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut link = WsLink::new(
            WsLinkConfig::new("127.0.0.1", port).with_reconnect_interval(Duration::from_secs(60)),
        );
        assert!(link.poll_event().is_none());
        let first = link.last_attempt;
        assert!(first.is_some());

        assert!(link.poll_event().is_none());
        assert_eq!(link.last_attempt, first);
    }
}
