//! Request leg over `reqwest::blocking`.

use super::AdapterError;
use lorabridge::{HttpResponse, RequestClient, TransportError};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// Blocking JSON POST client with a bounded timeout
#[derive(Debug, Clone)]
pub struct HttpSensorClient {
    client: Client,
}

impl HttpSensorClient {
    /// Build a client whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl RequestClient for HttpSensorClient {
    fn post_json(&mut self, url: &str, body: &str) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        Ok(HttpResponse { status, body })
    }
}
