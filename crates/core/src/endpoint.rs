//! Print-server address shared by the REST client and the push transport.

use std::fmt;
use std::net::Ipv4Addr;

use crate::error::CoreError;

/// Path and query of the Socket.IO websocket endpoint (Engine.IO v4).
const SOCKET_PATH: &str = "/socket.io/?EIO=4&transport=websocket";

/// IPv4 address and port of the print server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::LOCALHOST,
            port: 8000,
        }
    }
}

impl Endpoint {
    /// Build an endpoint from user-supplied strings.
    pub fn parse(ip: &str, port: &str) -> Result<Self, CoreError> {
        Ok(Self {
            ip: parse_ip(ip)?,
            port: parse_port(port)?,
        })
    }

    /// Copy of this endpoint with a new IP. Rejects anything that is not four
    /// dot-separated octets in 0..=255.
    pub fn with_ip(&self, ip: &str) -> Result<Self, CoreError> {
        Ok(Self {
            ip: parse_ip(ip)?,
            ..*self
        })
    }

    /// Copy of this endpoint with a new port in 1..=65535.
    pub fn with_port(&self, port: &str) -> Result<Self, CoreError> {
        Ok(Self {
            port: parse_port(port)?,
            ..*self
        })
    }

    /// Base URL for REST calls, e.g. `http://192.168.1.20:8000`.
    pub fn api_root(&self) -> String {
        format!("http://{}:{}", self.ip, self.port)
    }

    /// Websocket URL for the push channel.
    pub fn socket_url(&self) -> String {
        format!("ws://{}:{}{SOCKET_PATH}", self.ip, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

// ---- private helpers ----

fn parse_ip(raw: &str) -> Result<Ipv4Addr, CoreError> {
    let raw = raw.trim();
    let octets: Vec<&str> = raw.split('.').collect();
    if octets.len() != 4 {
        return Err(CoreError::Validation(format!(
            "invalid IP address '{raw}': expected four octets"
        )));
    }

    let mut parsed = [0u8; 4];
    for (slot, octet) in parsed.iter_mut().zip(&octets) {
        if octet.is_empty() || !octet.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::Validation(format!(
                "invalid IP address '{raw}': '{octet}' is not a number"
            )));
        }
        *slot = octet.parse::<u8>().map_err(|_| {
            CoreError::Validation(format!(
                "invalid IP address '{raw}': octet '{octet}' out of range"
            ))
        })?;
    }

    Ok(Ipv4Addr::from(parsed))
}

fn parse_port(raw: &str) -> Result<u16, CoreError> {
    let raw = raw.trim();
    match raw.parse::<u16>() {
        Ok(0) | Err(_) => Err(CoreError::Validation(format!(
            "invalid port '{raw}': expected 1-65535"
        ))),
        Ok(port) => Ok(port),
    }
}
