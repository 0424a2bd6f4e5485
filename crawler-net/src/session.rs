//! `PeerSession`: drives one probe to completion, per §4.2.
//!
//! Grounded in `wire_protocol::connection::NodeConnection`'s read/dispatch
//! loop (read into an `IOBuffer`, drain complete messages, write replies)
//! and `wire_protocol::handshake`'s version/verack sequencing, generalized
//! from a single fixed handshake topic into the full state table of §4.2:
//! fallback protocol versions,
//! `getaddr`/`addr` collection, ping/pong keepalive, and the
//! reachable/unreachable/stale classification policy.

use crate::address_book::SessionOutcome;
use crate::candidate::Classification;
use crate::error::ErrorKind;
use crate::wire::{self, Endpoint, IoBuffer, NetAddr, ProtocolMessage, VersionPayload};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Once this many addresses have arrived across at least one `addr` batch,
/// the session closes rather than waiting indefinitely for more (§4.2).
pub const MAX_LEARNED_BEFORE_CLOSING: usize = 1000;

/// How long the `active` state waits for `addr` traffic before closing on
/// its own. Not part of the configuration surface (§10.3) because it only
/// bounds how long a *successful* session lingers, not whether it succeeds.
const ACTIVE_PHASE_DURATION: Duration = Duration::from_secs(20);

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub magic: u32,
    pub protocol_version: i32,
    pub services: u64,
    pub user_agent: String,
    pub start_height: i32,
    pub minimum_version: i32,
    pub connect_timeout: Duration,
    pub getaddr_delay: Duration,
}

/// Runs one probe against `endpoint` to completion, returning an outcome
/// ready to hand to `AddressBook::report`.
///
/// `handshake_timeout` is the caller's choice of `connection_timeout` or
/// `extended_timeout` (§4.2: a candidate once seen `reachable` gets a more
/// patient re-probe on its next attempt).
pub async fn run_session(
    endpoint: Endpoint,
    config: &SessionConfig,
    handshake_timeout: Duration,
) -> SessionOutcome {
    let socket_addr: std::net::SocketAddr = endpoint.into();

    let connect_result = timeout(config.connect_timeout, TcpStream::connect(socket_addr)).await;
    let mut socket = match connect_result {
        Err(_) => return unreachable_outcome(endpoint, ErrorKind::ConnectTimeout),
        Ok(Err(io_err)) => {
            let kind = if io_err.kind() == std::io::ErrorKind::ConnectionRefused {
                ErrorKind::ConnectRefused
            } else {
                ErrorKind::ConnectTimeout
            };
            return unreachable_outcome(endpoint, kind);
        }
        Ok(Ok(socket)) => socket,
    };

    let started = Instant::now();
    let our_version = build_version_message(endpoint, config);
    if write_message(&mut socket, config.magic, &our_version).await.is_err() {
        return unreachable_outcome(endpoint, ErrorKind::ConnectRefused);
    }

    let mut buffer = IoBuffer::new();
    let mut version_payload: Option<VersionPayload> = None;
    let mut verack_received = false;
    let mut getaddr_sent = false;
    let mut learned: Vec<NetAddr> = Vec::new();
    let mut batches = 0u32;

    let handshake_deadline = started + handshake_timeout;
    let mut active_deadline: Option<Instant> = None;

    loop {
        let deadline = active_deadline.unwrap_or(handshake_deadline);
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            if active_deadline.is_some() {
                break; // active-phase timeout is a normal close, not a failure
            }
            return unreachable_outcome(endpoint, ErrorKind::HandshakeTimeout);
        }

        let read_result = timeout(remaining, socket.read(buffer.writable_part())).await;
        let n = match read_result {
            Err(_) => {
                if active_deadline.is_some() {
                    break;
                }
                return unreachable_outcome(endpoint, ErrorKind::HandshakeTimeout);
            }
            Ok(Err(_)) => return unreachable_outcome(endpoint, ErrorKind::ReadTimeout),
            Ok(Ok(0)) => {
                if version_payload.is_some() {
                    break; // peer closed after giving us something useful
                }
                return unreachable_outcome(endpoint, ErrorKind::HandshakeTimeout);
            }
            Ok(Ok(n)) => n,
        };
        buffer.register_added_content(n);

        loop {
            let decoded = match wire::try_decode_message(&mut buffer, config.magic) {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(codec_err) if codec_err.is_incomplete() => break,
                Err(codec_err) => return unreachable_outcome(endpoint, ErrorKind::from(codec_err)),
            };

            match decoded {
                ProtocolMessage::Version(payload) => {
                    version_payload = Some(payload);
                    if write_message(&mut socket, config.magic, &ProtocolMessage::Verack).await.is_err() {
                        return unreachable_outcome(endpoint, ErrorKind::ConnectRefused);
                    }
                }
                ProtocolMessage::Verack => {
                    verack_received = true;
                }
                ProtocolMessage::Addr(addrs) => {
                    batches += 1;
                    learned.extend(addrs);
                }
                ProtocolMessage::Ping(nonce) => {
                    if write_message(&mut socket, config.magic, &ProtocolMessage::Pong(nonce)).await.is_err() {
                        return unreachable_outcome(endpoint, ErrorKind::ConnectRefused);
                    }
                }
                ProtocolMessage::GetAddr | ProtocolMessage::Pong(_) | ProtocolMessage::Unknown(_) => {}
            }
        }

        if verack_received && version_payload.is_some() && !getaddr_sent {
            tokio::time::sleep(config.getaddr_delay).await;
            if write_message(&mut socket, config.magic, &ProtocolMessage::GetAddr)
                .await
                .is_ok()
            {
                getaddr_sent = true;
                active_deadline = Some(Instant::now() + ACTIVE_PHASE_DURATION);
            }
        }

        if batches >= 1 && learned.len() >= MAX_LEARNED_BEFORE_CLOSING {
            break;
        }
    }

    let rtt_ms = Some(started.elapsed().as_millis() as u64);
    finalize(endpoint, config, version_payload, learned, rtt_ms)
}

fn finalize(
    endpoint: Endpoint,
    config: &SessionConfig,
    version_payload: Option<VersionPayload>,
    learned: Vec<NetAddr>,
    rtt_ms: Option<u64>,
) -> SessionOutcome {
    match version_payload {
        None => unreachable_outcome(endpoint, ErrorKind::HandshakeTimeout),
        Some(payload) => {
            let peer_addr_recv = Some(payload.addr_recv.endpoint);
            let classification = if payload.protocol_version < config.minimum_version {
                Classification::Stale(payload)
            } else {
                Classification::Reachable(payload)
            };
            SessionOutcome {
                endpoint,
                classification,
                learned,
                rtt_ms,
                peer_addr_recv,
            }
        }
    }
}

/// Used by the scheduler when a pass is cancelled and a worker's grace
/// period expires before its in-flight session finishes on its own (§5).
pub(crate) fn cancelled_outcome(endpoint: Endpoint) -> SessionOutcome {
    unreachable_outcome(endpoint, ErrorKind::Cancelled)
}

fn unreachable_outcome(endpoint: Endpoint, kind: ErrorKind) -> SessionOutcome {
    SessionOutcome {
        endpoint,
        classification: Classification::Unreachable(kind),
        learned: vec![],
        rtt_ms: None,
        peer_addr_recv: None,
    }
}

fn build_version_message(remote: Endpoint, config: &SessionConfig) -> ProtocolMessage {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    ProtocolMessage::Version(VersionPayload {
        protocol_version: config.protocol_version,
        services: config.services,
        timestamp,
        addr_recv: wire::net_addr_for(remote.into()),
        addr_from: wire::net_addr_for("0.0.0.0:0".parse().unwrap()),
        nonce: rand::random(),
        user_agent: config.user_agent.clone(),
        start_height: config.start_height,
        relay: true,
    })
}

async fn write_message(
    socket: &mut TcpStream,
    magic: u32,
    message: &ProtocolMessage,
) -> std::io::Result<()> {
    socket.write_all(&wire::encode_message(magic, message)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn config() -> SessionConfig {
        SessionConfig {
            magic: 0xD9B4BEF9,
            protocol_version: 70016,
            services: 1,
            user_agent: "/crawler:0.1/".to_string(),
            start_height: 0,
            minimum_version: 70001,
            connect_timeout: Duration::from_millis(500),
            getaddr_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn connect_refused_classifies_unreachable() {
        // Port 0 bound-then-dropped listener guarantees nothing is listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let outcome = run_session(addr.into(), &config(), Duration::from_millis(500)).await;
        assert_eq!(outcome.classification.as_label(), "unreachable");
    }

    #[tokio::test(start_paused = true)]
    async fn full_handshake_yields_reachable_with_learned_addresses() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = IoBuffer::new();

            // read the crawler's `version`
            loop {
                let n = socket.read(buf.writable_part()).await.unwrap();
                buf.register_added_content(n);
                if let Ok(Some(ProtocolMessage::Version(_))) =
                    wire::try_decode_message(&mut buf, 0xD9B4BEF9)
                {
                    break;
                }
            }

            let our_version = ProtocolMessage::Version(VersionPayload {
                protocol_version: 70016,
                services: 1,
                timestamp: 0,
                addr_recv: wire::net_addr_for("127.0.0.1:1".parse().unwrap()),
                addr_from: wire::net_addr_for("127.0.0.1:2".parse().unwrap()),
                nonce: 1,
                user_agent: "/test:1.0/".to_string(),
                start_height: 100,
                relay: true,
            });
            socket
                .write_all(&wire::encode_message(0xD9B4BEF9, &our_version))
                .await
                .unwrap();
            socket
                .write_all(&wire::encode_message(0xD9B4BEF9, &ProtocolMessage::Verack))
                .await
                .unwrap();

            // wait for the crawler's verack + getaddr, then answer with addr
            loop {
                let n = socket.read(buf.writable_part()).await.unwrap();
                buf.register_added_content(n);
                if let Ok(Some(ProtocolMessage::GetAddr)) =
                    wire::try_decode_message(&mut buf, 0xD9B4BEF9)
                {
                    break;
                }
            }
            let addrs = vec![NetAddr::new(
                Endpoint::new("9.9.9.9".parse().unwrap(), 8333),
                1,
                Some(0),
            )];
            socket
                .write_all(&wire::encode_message(0xD9B4BEF9, &ProtocolMessage::Addr(addrs)))
                .await
                .unwrap();
        });

        let outcome = run_session(addr.into(), &config(), Duration::from_secs(2)).await;
        server.await.unwrap();

        assert_eq!(outcome.classification.as_label(), "reachable");
        assert_eq!(outcome.learned.len(), 1);
    }
}
