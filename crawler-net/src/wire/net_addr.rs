//! `Endpoint` (the crawler's identity key for a peer) and `NetAddr` (the
//! wire network-address structure), per §3.
//!
//! Grounded in `parse_net_addr`/`append_net_addr` (which used
//! `Ipv4Addr::to_ipv6_mapped` for encoding), generalized with explicit
//! canonicalization on the decode side so that `::ffff:1.2.3.4` and
//! `1.2.3.4` collapse to the same `Endpoint` (testable property #7).

use super::buffer::{ByteBufferComposer, ByteBufferParser};
use crate::error::CodecError;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// The identity of a peer: a canonical `(ip, port)` pair.
///
/// Two endpoints are equal iff both components match post-canonicalization.
/// IPv6 addresses in the `::ffff:0:0/96` range are folded down to their
/// embedded IPv4 address before comparison or storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub ip: IpAddr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Endpoint {
            ip: canonicalize_ip(ip),
            port,
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint::new(addr.ip(), addr.port())
    }
}

impl From<Endpoint> for SocketAddr {
    fn from(e: Endpoint) -> Self {
        SocketAddr::new(e.ip, e.port)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Folds an IPv4-mapped IPv6 address (`::ffff:a.b.c.d`) down to `Ipv4Addr`.
/// Native IPv4 and native (non-mapped) IPv6 addresses pass through unchanged.
pub fn canonicalize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(_) => ip,
        IpAddr::V6(v6) => match mapped_ipv4(&v6) {
            Some(v4) => IpAddr::V4(v4),
            None => ip,
        },
    }
}

/// Returns the embedded IPv4 address if `ip` lies in `::ffff:0:0/96`.
fn mapped_ipv4(ip: &Ipv6Addr) -> Option<Ipv4Addr> {
    let segments = ip.segments();
    if segments[0..5] == [0, 0, 0, 0, 0] && segments[5] == 0xffff {
        let o = ip.octets();
        Some(Ipv4Addr::new(o[12], o[13], o[14], o[15]))
    } else {
        None
    }
}

/// True if `ip` is the native-IPv6 wire encoding of a mapped IPv4 address.
/// Retained purely for metrics (Open Question (b) in §9): canonicalization
/// collapses the distinction for identity, but callers may want to know how
/// many peers advertised themselves as mapped-IPv6 vs. native IPv6.
pub fn is_mapped_ipv6(ip: IpAddr) -> bool {
    matches!(ip, IpAddr::V6(v6) if mapped_ipv4(&v6).is_some())
}

/// A network address: an `Endpoint` plus advertised services and an
/// optional timestamp. The timestamp is present in `addr` payloads and
/// absent in version-message `addr_recv`/`addr_from` fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetAddr {
    pub endpoint: Endpoint,
    pub services: u64,
    pub timestamp: Option<u32>,
    /// Whether the wire encoding used the mapped-IPv4 form (see
    /// `is_mapped_ipv6`). Purely informational.
    pub was_mapped_ipv6: bool,
}

impl NetAddr {
    pub fn new(endpoint: Endpoint, services: u64, timestamp: Option<u32>) -> Self {
        NetAddr {
            endpoint,
            services,
            timestamp,
            was_mapped_ipv6: false,
        }
    }
}

fn ipv6_wire_octets(ip: IpAddr) -> [u8; 16] {
    match ip {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    }
}

/// Encodes the 26-byte net_addr structure used inside `version` messages
/// (no timestamp prefix).
pub(crate) fn encode_no_timestamp(composer: &mut ByteBufferComposer, addr: &NetAddr) {
    composer.append(&addr.services.to_le_bytes());
    composer.append(&ipv6_wire_octets(addr.endpoint.ip));
    composer.append(&addr.endpoint.port.to_be_bytes());
}

/// Decodes the 26-byte net_addr structure (no timestamp).
pub(crate) fn decode_no_timestamp(parser: &mut ByteBufferParser) -> Result<NetAddr, CodecError> {
    let services = parser.read_u64_le()?;
    let ip_bytes: [u8; 16] = parser.read(16)?.try_into().unwrap();
    let ip = IpAddr::from(ip_bytes);
    let port = parser.read_u16_be()?;
    Ok(NetAddr {
        endpoint: Endpoint::new(ip, port),
        services,
        timestamp: None,
        was_mapped_ipv6: is_mapped_ipv6(ip),
    })
}

/// Encodes the 30-byte net_addr structure used inside `addr` payloads
/// (4-byte little-endian timestamp prefix, then the 26-byte structure).
pub(crate) fn encode_with_timestamp(composer: &mut ByteBufferComposer, addr: &NetAddr) {
    composer.append(&addr.timestamp.unwrap_or(0).to_le_bytes());
    encode_no_timestamp(composer, addr);
}

/// Decodes the 30-byte net_addr structure (required timestamp).
pub(crate) fn decode_with_timestamp(parser: &mut ByteBufferParser) -> Result<NetAddr, CodecError> {
    let timestamp = parser.read_u32_le()?;
    let mut addr = decode_no_timestamp(parser)?;
    addr.timestamp = Some(timestamp);
    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_ipv4_canonicalizes_to_v4() {
        let mapped: IpAddr = "::ffff:1.2.3.4".parse().unwrap();
        let native: IpAddr = "1.2.3.4".parse().unwrap();
        assert_eq!(
            Endpoint::new(mapped, 8333),
            Endpoint::new(native, 8333)
        );
    }

    #[test]
    fn native_ipv6_is_not_mapped() {
        let addr: IpAddr = "2001:db8::1".parse().unwrap();
        assert!(!is_mapped_ipv6(addr));
        assert!(is_mapped_ipv6("::ffff:1.2.3.4".parse().unwrap()));
    }

    #[test]
    fn net_addr_round_trips_without_timestamp() {
        let addr = NetAddr::new(Endpoint::new("1.2.3.4".parse().unwrap(), 8333), 1, None);
        let mut composer = ByteBufferComposer::new();
        encode_no_timestamp(&mut composer, &addr);
        let bytes = composer.result();
        assert_eq!(bytes.len(), 26);
        let mut parser = ByteBufferParser::new(&bytes);
        let decoded = decode_no_timestamp(&mut parser).unwrap();
        assert_eq!(decoded.endpoint, addr.endpoint);
        assert_eq!(decoded.services, addr.services);
        assert_eq!(decoded.timestamp, None);
    }

    #[test]
    fn net_addr_round_trips_with_timestamp() {
        let addr = NetAddr::new(
            Endpoint::new("5.6.7.8".parse().unwrap(), 18333),
            9,
            Some(1_700_000_000),
        );
        let mut composer = ByteBufferComposer::new();
        encode_with_timestamp(&mut composer, &addr);
        let bytes = composer.result();
        assert_eq!(bytes.len(), 30);
        let mut parser = ByteBufferParser::new(&bytes);
        let decoded = decode_with_timestamp(&mut parser).unwrap();
        assert_eq!(decoded.endpoint, addr.endpoint);
        assert_eq!(decoded.services, addr.services);
        assert_eq!(decoded.timestamp, addr.timestamp);
    }
}
