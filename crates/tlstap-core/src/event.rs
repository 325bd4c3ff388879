//! Normalized TLS handshake events
//!
//! One `TlsHandshakeEvent` is produced per raw kernel record. It is a
//! transient, immutable message: created by the decoder, annotated once by
//! the enrichers, then handed to the sink.

use serde::{Deserialize, Serialize};

/// One endpoint of an observed TLS session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Dotted-decimal IPv4 address.
    pub ip: String,
    /// Port in host byte order.
    pub port: u16,
    /// Optional name attached by an enricher (hostname, pod name, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Address {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
            name: None,
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}:{} ({})", self.ip, self.port, name),
            None => write!(f, "{}:{}", self.ip, self.port),
        }
    }
}

/// Normalized representation of one observed TLS negotiation.
///
/// `tls_versions` always contains at least one entry: if the kernel record
/// carried an empty offered-versions list, the legacy scalar version field
/// is used as the single entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsHandshakeEvent {
    /// Connection initiator.
    pub client: Address,
    /// Connection responder.
    pub server: Address,
    /// TLS versions offered by the client, in wire order.
    pub tls_versions: Vec<u16>,
    /// Cipher suites offered by the client, in wire order.
    pub ciphers: Vec<u16>,
    /// SNI server name, empty if the client sent none.
    pub server_name: String,
    /// Version the peers settled on.
    pub used_tls_version: u16,
    /// Cipher suite the peers settled on.
    pub used_cipher: u16,
}

/// Human-readable name for a TLS version scalar, if it is a known one.
pub fn tls_version_name(version: u16) -> Option<&'static str> {
    match version {
        0x0300 => Some("SSL 3.0"),
        0x0301 => Some("TLS 1.0"),
        0x0302 => Some("TLS 1.1"),
        0x0303 => Some("TLS 1.2"),
        0x0304 => Some("TLS 1.3"),
        _ => None,
    }
}

/// `tls_version_name` with a hex fallback for GREASE and unknown values.
pub fn describe_tls_version(version: u16) -> String {
    match tls_version_name(version) {
        Some(name) => name.to_string(),
        None => format!("0x{version:04x}"),
    }
}
