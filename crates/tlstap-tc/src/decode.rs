//! Handshake record decoding
//!
//! The kernel classifier emits one fixed-size record per observed TLS
//! handshake. The layout below is the wire contract with the producer:
//! big-endian, fixed field order, fixed array capacities. Declared length
//! fields may legitimately exceed the array capacity (the producer reports
//! the on-wire length, not the captured length), so every variable-length
//! field is clamped, never trusted.
//!
//! Decoding is a pure function of the input bytes: no clocks, no state.

use bytes::Buf;
use std::net::Ipv4Addr;
use thiserror::Error;
use tlstap_core::{Address, TlsHandshakeEvent};

/// Capacity of the offered-versions array, in entries.
pub const TLS_VERSIONS_CAP: usize = 32;
/// Capacity of the offered-ciphers array, in entries.
pub const CIPHERS_CAP: usize = 32;
/// Capacity of the server name buffer, in bytes.
pub const SERVER_NAME_CAP: usize = 128;

/// Total record size on the wire.
pub const RECORD_LEN: usize = 4 // saddr
    + 4 // daddr
    + 2 // sport
    + 2 // dport
    + 2 // legacy tls_version
    + 2 // tls_versions_len
    + 2 * TLS_VERSIONS_CAP
    + 2 // ciphers_len
    + 2 * CIPHERS_CAP
    + 2 // server_name_len
    + SERVER_NAME_CAP
    + 2 // used_tls_version
    + 2; // used_cipher

const _: () = assert!(RECORD_LEN == 280);

/// Decode error type
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("record too short: {len} bytes, layout requires {expected}")]
    Truncated { len: usize, expected: usize },
}

/// Usable entry count for a variable-length field.
///
/// The versions and ciphers length fields count bytes with 2-byte entries;
/// the server name length counts bytes directly (unit 1). That asymmetry
/// comes from the producer's native field widths and is part of the
/// contract.
fn clamped_entries(declared: u16, unit: usize, capacity: usize) -> usize {
    (declared as usize / unit).min(capacity)
}

/// Parse one raw kernel record into a normalized handshake event.
///
/// Out-of-range declared lengths are clamped silently; only a buffer
/// shorter than the fixed layout is an error.
pub fn decode_record(raw: &[u8]) -> Result<TlsHandshakeEvent, DecodeError> {
    if raw.len() < RECORD_LEN {
        return Err(DecodeError::Truncated {
            len: raw.len(),
            expected: RECORD_LEN,
        });
    }

    let mut buf = &raw[..RECORD_LEN];
    let saddr = buf.get_u32();
    let daddr = buf.get_u32();
    let sport = buf.get_u16();
    let dport = buf.get_u16();
    let legacy_version = buf.get_u16();

    let versions_declared = buf.get_u16();
    let mut versions = [0u16; TLS_VERSIONS_CAP];
    for entry in versions.iter_mut() {
        *entry = buf.get_u16();
    }

    let ciphers_declared = buf.get_u16();
    let mut ciphers = [0u16; CIPHERS_CAP];
    for entry in ciphers.iter_mut() {
        *entry = buf.get_u16();
    }

    let name_declared = buf.get_u16();
    let mut server_name = [0u8; SERVER_NAME_CAP];
    buf.copy_to_slice(&mut server_name);

    let used_tls_version = buf.get_u16();
    let used_cipher = buf.get_u16();

    let versions_used = clamped_entries(versions_declared, 2, TLS_VERSIONS_CAP);
    let ciphers_used = clamped_entries(ciphers_declared, 2, CIPHERS_CAP);
    let name_used = clamped_entries(name_declared, 1, SERVER_NAME_CAP);

    let mut tls_versions = versions[..versions_used].to_vec();
    if tls_versions.is_empty() {
        // Pre-ClientHello-parsing producers only fill the scalar field;
        // the event still has to carry at least one offered version.
        tls_versions.push(legacy_version);
    }

    Ok(TlsHandshakeEvent {
        client: Address::new(ipv4_to_string(saddr), sport),
        server: Address::new(ipv4_to_string(daddr), dport),
        tls_versions,
        ciphers: ciphers[..ciphers_used].to_vec(),
        server_name: String::from_utf8_lossy(&server_name[..name_used]).into_owned(),
        used_tls_version,
        used_cipher,
    })
}

/// Network-order 32-bit address to dotted-decimal text.
fn ipv4_to_string(addr: u32) -> String {
    Ipv4Addr::from(addr).to_string()
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use bytes::BufMut;

    /// Builder for raw records in tests. Defaults to a plausible TLS 1.3
    /// handshake between two loopback endpoints.
    pub(crate) struct SampleRecord {
        pub saddr: u32,
        pub sport: u16,
        pub daddr: u32,
        pub dport: u16,
        pub legacy_version: u16,
        pub versions_declared: u16,
        pub versions: Vec<u16>,
        pub ciphers_declared: u16,
        pub ciphers: Vec<u16>,
        pub name_declared: u16,
        pub server_name: Vec<u8>,
        pub used_tls_version: u16,
        pub used_cipher: u16,
    }

    impl Default for SampleRecord {
        fn default() -> Self {
            Self {
                saddr: 0x0A000002, // 10.0.0.2
                sport: 43210,
                daddr: 0x0A000001, // 10.0.0.1
                dport: 443,
                legacy_version: 0x0301,
                versions_declared: 4,
                versions: vec![0x0303, 0x0304],
                ciphers_declared: 4,
                ciphers: vec![0x1301, 0x1302],
                name_declared: 11,
                server_name: b"example.com".to_vec(),
                used_tls_version: 0x0304,
                used_cipher: 0x1301,
            }
        }
    }

    impl SampleRecord {
        pub(crate) fn encode(&self) -> Vec<u8> {
            let mut buf = Vec::with_capacity(RECORD_LEN);
            buf.put_u32(self.saddr);
            buf.put_u32(self.daddr);
            buf.put_u16(self.sport);
            buf.put_u16(self.dport);
            buf.put_u16(self.legacy_version);
            buf.put_u16(self.versions_declared);
            put_u16_array(&mut buf, &self.versions, TLS_VERSIONS_CAP);
            buf.put_u16(self.ciphers_declared);
            put_u16_array(&mut buf, &self.ciphers, CIPHERS_CAP);
            buf.put_u16(self.name_declared);
            put_bytes(&mut buf, &self.server_name, SERVER_NAME_CAP);
            buf.put_u16(self.used_tls_version);
            buf.put_u16(self.used_cipher);
            assert_eq!(buf.len(), RECORD_LEN);
            buf
        }
    }

    fn put_u16_array(buf: &mut Vec<u8>, values: &[u16], capacity: usize) {
        assert!(values.len() <= capacity);
        for &value in values {
            buf.put_u16(value);
        }
        for _ in values.len()..capacity {
            buf.put_u16(0);
        }
    }

    fn put_bytes(buf: &mut Vec<u8>, values: &[u8], capacity: usize) {
        assert!(values.len() <= capacity);
        buf.put_slice(values);
        buf.put_bytes(0, capacity - values.len());
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::SampleRecord;
    use super::*;

    #[test]
    fn decodes_full_record() {
        let raw = SampleRecord::default().encode();
        let event = decode_record(&raw).unwrap();

        assert_eq!(event.client.ip, "10.0.0.2");
        assert_eq!(event.client.port, 43210);
        assert_eq!(event.server.ip, "10.0.0.1");
        assert_eq!(event.server.port, 443);
        assert_eq!(event.tls_versions, vec![0x0303, 0x0304]);
        assert_eq!(event.ciphers, vec![0x1301, 0x1302]);
        assert_eq!(event.server_name, "example.com");
        assert_eq!(event.used_tls_version, 0x0304);
        assert_eq!(event.used_cipher, 0x1301);
    }

    #[test]
    fn truncated_buffer_is_an_error_not_a_partial_event() {
        for len in [0, 1, 100, RECORD_LEN - 1] {
            let raw = vec![0u8; len];
            assert_eq!(
                decode_record(&raw),
                Err(DecodeError::Truncated {
                    len,
                    expected: RECORD_LEN
                })
            );
        }
    }

    #[test]
    fn trailing_bytes_beyond_the_layout_are_ignored() {
        let mut raw = SampleRecord::default().encode();
        raw.extend_from_slice(&[0xAA; 16]);
        assert!(decode_record(&raw).is_ok());
    }

    #[test]
    fn clamp_rule_is_min_of_declared_over_unit_and_capacity() {
        assert_eq!(clamped_entries(0, 2, 32), 0);
        assert_eq!(clamped_entries(3, 2, 32), 1);
        assert_eq!(clamped_entries(64, 2, 32), 32);
        assert_eq!(clamped_entries(65535, 2, 32), 32);
        assert_eq!(clamped_entries(500, 1, 128), 128);
        assert_eq!(clamped_entries(128, 1, 128), 128);
        assert_eq!(clamped_entries(11, 1, 128), 11);
    }

    #[test]
    fn declared_versions_length_counts_bytes_not_entries() {
        // 4 bytes declared == 2 entries.
        let raw = SampleRecord {
            versions_declared: 4,
            versions: vec![0x0303, 0x0304, 0xDEAD],
            ..Default::default()
        }
        .encode();

        let event = decode_record(&raw).unwrap();
        assert_eq!(event.tls_versions, vec![0x0303, 0x0304]);
    }

    #[test]
    fn oversized_declared_lengths_clamp_to_capacity() {
        let raw = SampleRecord {
            versions_declared: 1000,
            ciphers_declared: 1000,
            name_declared: 500,
            server_name: vec![b'x'; SERVER_NAME_CAP],
            ..Default::default()
        }
        .encode();

        let event = decode_record(&raw).unwrap();
        assert_eq!(event.tls_versions.len(), TLS_VERSIONS_CAP);
        assert_eq!(event.ciphers.len(), CIPHERS_CAP);
        assert_eq!(event.server_name.len(), SERVER_NAME_CAP);
    }

    #[test]
    fn empty_versions_fall_back_to_the_legacy_scalar() {
        let raw = SampleRecord {
            versions_declared: 0,
            versions: Vec::new(),
            legacy_version: 0x0302,
            ..Default::default()
        }
        .encode();

        let event = decode_record(&raw).unwrap();
        assert_eq!(event.tls_versions, vec![0x0302]);
    }

    #[test]
    fn fallback_only_applies_when_the_clamped_array_is_empty() {
        // Declared 1 byte / unit 2 == 0 entries, so the fallback kicks in
        // even though the array itself carries data.
        let raw = SampleRecord {
            versions_declared: 1,
            versions: vec![0x0303],
            legacy_version: 0x0301,
            ..Default::default()
        }
        .encode();

        let event = decode_record(&raw).unwrap();
        assert_eq!(event.tls_versions, vec![0x0301]);
    }

    #[test]
    fn address_conversion_canonical_cases() {
        assert_eq!(ipv4_to_string(0x7F000001), "127.0.0.1");
        assert_eq!(ipv4_to_string(0x00000000), "0.0.0.0");
        assert_eq!(ipv4_to_string(0xFFFFFFFF), "255.255.255.255");
    }

    #[test]
    fn decoding_is_pure() {
        let raw = SampleRecord::default().encode();
        assert_eq!(decode_record(&raw).unwrap(), decode_record(&raw).unwrap());
    }

    #[test]
    fn empty_ciphers_stay_empty() {
        // The fallback rule is versions-only; ciphers have no scalar twin.
        let raw = SampleRecord {
            ciphers_declared: 0,
            ciphers: Vec::new(),
            ..Default::default()
        }
        .encode();

        let event = decode_record(&raw).unwrap();
        assert!(event.ciphers.is_empty());
    }
}
