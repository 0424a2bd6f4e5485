//! The six message kinds this crawler speaks, per §4.1, plus a tolerant
//! `Unknown` variant for anything else received on the wire.
//!
//! Grounded in `wire_protocol::messages`' `VersionMessage`, `VerackMessage`,
//! `PingMessage`, and `PongMessage`, completed where that code left
//! `TODO`s: `user_agent`/`start_height` are fully read and written here
//! (length-prefixed var_string, per §3's `VersionPayload`), `addr_from` is
//! decoded rather than skipped, and `getaddr`/`addr` are new.

use super::buffer::{ByteBufferComposer, ByteBufferParser};
use super::net_addr::{self, Endpoint, NetAddr};
use super::varint;
use crate::error::CodecError;
use std::net::SocketAddr;

/// Protocol versions below this stopped sending the trailing `relay` byte.
/// Per §4.1: "the `relay` byte is emitted for protocol_version >= 70001;
/// parsers tolerate its absence."
const RELAY_BYTE_MIN_VERSION: i32 = 70001;

/// Longest `user_agent` this parser accepts, per §3.
const MAX_USER_AGENT_LEN: u64 = 256;

#[derive(Clone, Debug, PartialEq)]
pub struct VersionPayload {
    pub protocol_version: i32,
    pub services: u64,
    pub timestamp: i64,
    pub addr_recv: NetAddr,
    pub addr_from: NetAddr,
    pub nonce: u64,
    pub user_agent: String,
    pub start_height: i32,
    pub relay: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProtocolMessage {
    Version(VersionPayload),
    Verack,
    GetAddr,
    Addr(Vec<NetAddr>),
    Ping(u64),
    Pong(u64),
    /// A recognized frame whose command this crawler does not act on. The
    /// command name is kept for logging.
    Unknown(String),
}

impl ProtocolMessage {
    pub fn command(&self) -> &str {
        match self {
            ProtocolMessage::Version(_) => "version",
            ProtocolMessage::Verack => "verack",
            ProtocolMessage::GetAddr => "getaddr",
            ProtocolMessage::Addr(_) => "addr",
            ProtocolMessage::Ping(_) => "ping",
            ProtocolMessage::Pong(_) => "pong",
            ProtocolMessage::Unknown(command) => command,
        }
    }

    pub(crate) fn encode_payload(&self) -> Vec<u8> {
        let mut composer = ByteBufferComposer::new();
        match self {
            ProtocolMessage::Version(v) => encode_version(&mut composer, v),
            ProtocolMessage::Verack | ProtocolMessage::GetAddr | ProtocolMessage::Unknown(_) => {}
            ProtocolMessage::Addr(addrs) => encode_addr(&mut composer, addrs),
            ProtocolMessage::Ping(nonce) | ProtocolMessage::Pong(nonce) => {
                composer.append(&nonce.to_le_bytes())
            }
        }
        composer.result()
    }

    pub(crate) fn decode(command: &str, payload: &[u8]) -> Result<Self, CodecError> {
        let mut parser = ByteBufferParser::new(payload);
        match command {
            "version" => Ok(ProtocolMessage::Version(decode_version(&mut parser)?)),
            "verack" => Ok(ProtocolMessage::Verack),
            "getaddr" => Ok(ProtocolMessage::GetAddr),
            "addr" => Ok(ProtocolMessage::Addr(decode_addr(&mut parser)?)),
            "ping" => Ok(ProtocolMessage::Ping(parser.read_u64_le()?)),
            "pong" => Ok(ProtocolMessage::Pong(parser.read_u64_le()?)),
            other => Ok(ProtocolMessage::Unknown(other.to_string())),
        }
    }
}

fn write_var_string(composer: &mut ByteBufferComposer, s: &str) {
    let bytes = s.as_bytes();
    varint::encode(composer, bytes.len() as u64);
    composer.append(bytes);
}

fn read_var_string(parser: &mut ByteBufferParser, max_len: u64) -> Result<String, CodecError> {
    let len = varint::decode(parser)?;
    if len > max_len {
        return Err(CodecError::OversizePayload { len: len as u32 });
    }
    let bytes = parser.read(len as usize)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn encode_version(composer: &mut ByteBufferComposer, v: &VersionPayload) {
    composer.append(&v.protocol_version.to_le_bytes());
    composer.append(&v.services.to_le_bytes());
    composer.append(&v.timestamp.to_le_bytes());
    net_addr::encode_no_timestamp(composer, &v.addr_recv);
    net_addr::encode_no_timestamp(composer, &v.addr_from);
    composer.append(&v.nonce.to_le_bytes());
    write_var_string(composer, &v.user_agent);
    composer.append(&v.start_height.to_le_bytes());
    if v.protocol_version >= RELAY_BYTE_MIN_VERSION {
        composer.append_u8(v.relay as u8);
    }
}

fn decode_version(parser: &mut ByteBufferParser) -> Result<VersionPayload, CodecError> {
    let protocol_version = parser.read_i32_le()?;
    let services = parser.read_u64_le()?;
    let timestamp = parser.read_i64_le()?;
    let addr_recv = net_addr::decode_no_timestamp(parser)?;
    let addr_from = net_addr::decode_no_timestamp(parser)?;
    let nonce = parser.read_u64_le()?;
    let user_agent = read_var_string(parser, MAX_USER_AGENT_LEN)?;
    let start_height = parser.read_i32_le()?;
    let relay = if parser.remaining() > 0 {
        parser.read_u8()? != 0
    } else {
        true
    };

    Ok(VersionPayload {
        protocol_version,
        services,
        timestamp,
        addr_recv,
        addr_from,
        nonce,
        user_agent,
        start_height,
        relay,
    })
}

fn encode_addr(composer: &mut ByteBufferComposer, addrs: &[NetAddr]) {
    varint::encode(composer, addrs.len() as u64);
    for addr in addrs {
        net_addr::encode_with_timestamp(composer, addr);
    }
}

fn decode_addr(parser: &mut ByteBufferParser) -> Result<Vec<NetAddr>, CodecError> {
    let count = varint::decode(parser)?;
    let mut addrs = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        addrs.push(net_addr::decode_with_timestamp(parser)?);
    }
    Ok(addrs)
}

/// Convenience for building the `addr_recv`/`addr_from` fields of an
/// outgoing `version` message: the crawler never advertises services or a
/// timestamp for these, writing a zeroed `addr_from` the way most simple
/// clients do.
pub fn net_addr_for(socket_addr: SocketAddr) -> NetAddr {
    NetAddr::new(Endpoint::from(socket_addr), 0, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn sample_version(protocol_version: i32) -> VersionPayload {
        VersionPayload {
            protocol_version,
            services: 1,
            timestamp: 1_700_000_000,
            addr_recv: net_addr_for(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)), 8333)),
            addr_from: net_addr_for(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 0)),
            nonce: 0xdead_beef_0000_0001,
            user_agent: "/crawler:0.1/".to_string(),
            start_height: 800_000,
            relay: true,
        }
    }

    #[test]
    fn version_round_trips_with_relay_byte() {
        let original = sample_version(70016);
        let message = ProtocolMessage::Version(original.clone());
        let payload = message.encode_payload();
        let decoded = ProtocolMessage::decode("version", &payload).unwrap();
        assert_eq!(decoded, ProtocolMessage::Version(original));
    }

    #[test]
    fn version_below_70001_omits_relay_byte_and_defaults_true() {
        let mut original = sample_version(60001);
        original.relay = false; // encoder never writes this below the threshold
        let message = ProtocolMessage::Version(original.clone());
        let payload = message.encode_payload();
        let decoded = ProtocolMessage::decode("version", &payload).unwrap();
        match decoded {
            ProtocolMessage::Version(v) => assert!(v.relay, "absent relay byte must default to true"),
            other => panic!("expected Version, got {other:?}"),
        }
    }

    #[test]
    fn getaddr_and_verack_have_empty_payloads() {
        assert!(ProtocolMessage::Verack.encode_payload().is_empty());
        assert!(ProtocolMessage::GetAddr.encode_payload().is_empty());
        assert_eq!(ProtocolMessage::decode("verack", &[]).unwrap(), ProtocolMessage::Verack);
        assert_eq!(ProtocolMessage::decode("getaddr", &[]).unwrap(), ProtocolMessage::GetAddr);
    }

    #[test]
    fn ping_pong_round_trip_the_nonce() {
        let ping = ProtocolMessage::Ping(424242);
        let payload = ping.encode_payload();
        assert_eq!(ProtocolMessage::decode("ping", &payload).unwrap(), ping);

        let pong = ProtocolMessage::Pong(424242);
        assert_eq!(
            ProtocolMessage::decode("pong", &pong.encode_payload()).unwrap(),
            pong
        );
    }

    #[test]
    fn addr_round_trips_multiple_entries() {
        let addrs = vec![
            NetAddr::new(Endpoint::new("1.1.1.1".parse().unwrap(), 8333), 1, Some(100)),
            NetAddr::new(Endpoint::new("2.2.2.2".parse().unwrap(), 8333), 5, Some(200)),
        ];
        let message = ProtocolMessage::Addr(addrs.clone());
        let decoded = ProtocolMessage::decode("addr", &message.encode_payload()).unwrap();
        assert_eq!(decoded, ProtocolMessage::Addr(addrs));
    }

    #[test]
    fn unrecognized_command_decodes_as_unknown() {
        let decoded = ProtocolMessage::decode("feefilter", &[1, 2, 3]).unwrap();
        assert_eq!(decoded, ProtocolMessage::Unknown("feefilter".to_string()));
    }

    #[test]
    fn oversize_user_agent_is_rejected() {
        let mut composer = ByteBufferComposer::new();
        composer.append(&70016_i32.to_le_bytes());
        composer.append(&0u64.to_le_bytes());
        composer.append(&0i64.to_le_bytes());
        net_addr::encode_no_timestamp(&mut composer, &sample_version(70016).addr_recv);
        net_addr::encode_no_timestamp(&mut composer, &sample_version(70016).addr_from);
        composer.append(&0u64.to_le_bytes());
        varint::encode(&mut composer, MAX_USER_AGENT_LEN + 1);
        let payload = composer.result();
        let mut parser = ByteBufferParser::new(&payload);
        assert!(matches!(
            decode_version(&mut parser),
            Err(CodecError::OversizePayload { .. })
        ));
    }
}
