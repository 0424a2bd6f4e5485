//! Frame-level parsing and composition, per §4.1.
//!
//! Grounded in `wire_protocol::raw_message::RawMessage`'s `to_bytes` /
//! `try_consume_message` pair, generalized in three ways: the command set
//! is open (any 12-byte ASCII token round-trips, not just a fixed
//! `EnumIter` set of four), the chain is identified by a plain `u32` magic
//! rather than a closed `Chain` enum, and a hard 2 MiB payload cap is
//! enforced before any allocation happens.

use super::buffer::{ByteBufferComposer, ByteBufferParser};
use crate::error::CodecError;
use sha2::digest::FixedOutput;
use sha2::{Digest, Sha256};

const MAGIC_LEN: usize = 4;
const COMMAND_LEN: usize = 12;
const LENGTH_LEN: usize = 4;
const CHECKSUM_LEN: usize = 4;
const HEADER_LEN: usize = MAGIC_LEN + COMMAND_LEN + LENGTH_LEN + CHECKSUM_LEN;

/// Hard cap on payload size. Bounds memory and rejects adversarial peers
/// before the length-prefixed payload is even read.
pub const MAX_PAYLOAD_LEN: u32 = 2 * 1024 * 1024;

/// A successfully parsed frame, plus how many bytes of the input it consumed
/// so the caller can drop them from its receive buffer.
#[derive(Debug)]
pub(crate) struct ParsedFrame {
    pub command: String,
    pub payload: Vec<u8>,
    pub consumed: usize,
}

/// Parses one frame from the front of `data`, per the wire contract in
/// §4.1. Returns `Ok(None)` when there are not yet enough bytes to know —
/// callers should keep reading and retry, not treat that as failure.
pub(crate) fn parse_frame(data: &[u8], expected_magic: u32) -> Result<Option<ParsedFrame>, CodecError> {
    if data.len() < HEADER_LEN {
        return Ok(None);
    }

    let mut parser = ByteBufferParser::new(data);
    let magic = parser.read_u32_le()?;
    if magic != expected_magic {
        return Err(CodecError::BadMagic);
    }

    let command_bytes = parser.read(COMMAND_LEN)?;
    let command = decode_command(command_bytes);

    let payload_len = parser.read_u32_le()?;
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(CodecError::OversizePayload { len: payload_len });
    }

    let checksum: [u8; CHECKSUM_LEN] = parser.read(CHECKSUM_LEN)?.try_into().unwrap();

    if parser.remaining() < payload_len as usize {
        return Ok(None);
    }
    let payload = parser.read(payload_len as usize)?.to_vec();

    if checksum != double_sha256(&payload)[..CHECKSUM_LEN] {
        return Err(CodecError::BadChecksum);
    }

    Ok(Some(ParsedFrame {
        command,
        payload,
        consumed: parser.pos(),
    }))
}

/// Composes a full frame: header plus payload, ready to write to the wire.
pub(crate) fn encode_frame(magic: u32, command: &str, payload: &[u8]) -> Vec<u8> {
    let mut composer = ByteBufferComposer::new();
    composer.append(&magic.to_le_bytes());
    composer.append(&encode_command(command));
    composer.append(&(payload.len() as u32).to_le_bytes());
    composer.append(&double_sha256(payload)[..CHECKSUM_LEN]);
    composer.append(payload);
    composer.result()
}

fn encode_command(command: &str) -> [u8; COMMAND_LEN] {
    let bytes = command.as_bytes();
    assert!(bytes.len() <= COMMAND_LEN, "command name too long: {command}");
    let mut out = [0u8; COMMAND_LEN];
    out[..bytes.len()].copy_from_slice(bytes);
    out
}

fn decode_command(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = sha256(data);
    sha256(&first)
}

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::default();
    hasher.update(data);
    hasher.finalize_fixed().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: u32 = 0xD9B4BEF9;

    #[test]
    fn round_trips_a_frame() {
        let payload = b"hello world".to_vec();
        let bytes = encode_frame(MAGIC, "ping", &payload);
        let parsed = parse_frame(&bytes, MAGIC).unwrap().unwrap();
        assert_eq!(parsed.command, "ping");
        assert_eq!(parsed.payload, payload);
        assert_eq!(parsed.consumed, bytes.len());
    }

    #[test]
    fn empty_payload_round_trips() {
        let bytes = encode_frame(MAGIC, "verack", &[]);
        let parsed = parse_frame(&bytes, MAGIC).unwrap().unwrap();
        assert_eq!(parsed.command, "verack");
        assert!(parsed.payload.is_empty());
    }

    #[test]
    fn short_header_waits_for_more_bytes() {
        let result = parse_frame(&[0u8; 10], MAGIC).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn short_payload_waits_for_more_bytes() {
        let bytes = encode_frame(MAGIC, "ping", b"12345678");
        let truncated = &bytes[..bytes.len() - 2];
        let result = parse_frame(truncated, MAGIC).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let bytes = encode_frame(MAGIC, "ping", b"payload");
        let err = parse_frame(&bytes, 0x11223344).unwrap_err();
        assert_eq!(err, CodecError::BadMagic);
    }

    #[test]
    fn oversize_payload_is_rejected_before_reading_it() {
        let mut composer = ByteBufferComposer::new();
        composer.append(&MAGIC.to_le_bytes());
        composer.append(&encode_command("addr"));
        composer.append(&(MAX_PAYLOAD_LEN + 1).to_le_bytes());
        composer.append(&[0u8; CHECKSUM_LEN]);
        let bytes = composer.result();
        let err = parse_frame(&bytes, MAGIC).unwrap_err();
        assert_eq!(err, CodecError::OversizePayload { len: MAX_PAYLOAD_LEN + 1 });
    }

    #[test]
    fn bad_checksum_is_rejected() {
        let mut bytes = encode_frame(MAGIC, "ping", b"payload!");
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = parse_frame(&bytes, MAGIC).unwrap_err();
        assert_eq!(err, CodecError::BadChecksum);
    }

    #[test]
    fn unknown_command_still_parses_for_tolerant_skip() {
        let bytes = encode_frame(MAGIC, "feefilter", b"x");
        let parsed = parse_frame(&bytes, MAGIC).unwrap().unwrap();
        assert_eq!(parsed.command, "feefilter");
    }
}
