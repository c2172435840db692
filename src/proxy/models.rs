//! Proxy data models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Protocol a proxy is advertised (or resolved) to speak
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum ProtocolKind {
    #[default]
    Http,
    Socks4,
    Socks5,
    Unknown,
}

impl ProtocolKind {
    /// Protocols that have a probe and a validated output partition
    pub const PROBED: [ProtocolKind; 3] =
        [ProtocolKind::Http, ProtocolKind::Socks4, ProtocolKind::Socks5];
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolKind::Http => write!(f, "http"),
            ProtocolKind::Socks4 => write!(f, "socks4"),
            ProtocolKind::Socks5 => write!(f, "socks5"),
            ProtocolKind::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for ProtocolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            // listing sites label forward proxies that tunnel TLS as "https"
            "http" | "https" => Ok(ProtocolKind::Http),
            "socks4" => Ok(ProtocolKind::Socks4),
            "socks5" => Ok(ProtocolKind::Socks5),
            "unknown" => Ok(ProtocolKind::Unknown),
            _ => Err(format!(
                "Invalid proxy type: {}. Use: http, socks4, socks5, unknown",
                s
            )),
        }
    }
}

/// A proxy address in `host:port` form
///
/// Equality and ordering are plain string comparisons, so `1.2.3.4:80` and
/// `1.2.3.4:080` are different addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Parse a trimmed `host:port` string
    ///
    /// Returns `None` when there is no separator or either side is empty.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (host, port) = s.rsplit_once(':')?;
        if host.is_empty() || port.is_empty() {
            return None;
        }
        Some(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn host(&self) -> &str {
        self.0.rsplit_once(':').map_or("", |(host, _)| host)
    }

    /// The port part, if it is a valid port number
    pub fn port(&self) -> Option<u16> {
        self.0.rsplit_once(':').and_then(|(_, port)| port.parse().ok())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid proxy address: {}", s))
    }
}

/// One unit of validation work: an address and the protocol to probe it with
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Candidate {
    pub address: Address,
    pub protocol: ProtocolKind,
}

impl Candidate {
    pub fn new(address: Address, protocol: ProtocolKind) -> Self {
        Self { address, protocol }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.address)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationVerdict {
    Valid,
    Invalid,
}

/// Outcome of probing a single candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub address: Address,
    pub protocol: ProtocolKind,
    pub verdict: ValidationVerdict,
    /// Probe duration, only recorded for valid proxies
    pub response_time_ms: Option<u64>,
    /// Why the probe failed
    pub reason: Option<String>,
}

impl ValidationResult {
    pub fn valid(candidate: Candidate, response_time_ms: u64) -> Self {
        Self {
            address: candidate.address,
            protocol: candidate.protocol,
            verdict: ValidationVerdict::Valid,
            response_time_ms: Some(response_time_ms),
            reason: None,
        }
    }

    pub fn invalid(candidate: Candidate, reason: String) -> Self {
        Self {
            address: candidate.address,
            protocol: candidate.protocol,
            verdict: ValidationVerdict::Invalid,
            response_time_ms: None,
            reason: Some(reason),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.verdict == ValidationVerdict::Valid
    }
}
