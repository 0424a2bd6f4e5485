//! The wire codec: frame-level parsing (`frame`), the six message kinds
//! this crawler speaks (`message`), network addresses (`net_addr`),
//! varints (`varint`), and the low-level buffer types they all share
//! (`buffer`).
//!
//! `mod.rs` wires these together into the two operations `PeerSession`
//! actually needs: [`encode_message`] and [`try_decode_message`].

mod buffer;
mod frame;
mod message;
mod net_addr;
mod varint;

pub use buffer::IoBuffer;
pub use frame::MAX_PAYLOAD_LEN;
pub use message::{net_addr_for, ProtocolMessage, VersionPayload};
pub use net_addr::{canonicalize_ip, is_mapped_ipv6, Endpoint, NetAddr};

use crate::error::CodecError;

/// Encodes a message into a full frame ready to write to the socket.
pub fn encode_message(magic: u32, message: &ProtocolMessage) -> Vec<u8> {
    frame::encode_frame(magic, message.command(), &message.encode_payload())
}

/// Attempts to decode one message from the front of `buffer`'s content.
///
/// Returns `Ok(None)` when more bytes are needed (the underlying
/// `short-header`/`short-payload` conditions are not failures); on success,
/// consumes the underlying bytes from `buffer` so the caller's next read
/// appends past them.
pub fn try_decode_message(
    buffer: &mut IoBuffer,
    expected_magic: u32,
) -> Result<Option<ProtocolMessage>, CodecError> {
    let Some(parsed) = frame::parse_frame(buffer.content(), expected_magic)? else {
        return Ok(None);
    };
    let message = ProtocolMessage::decode(&parsed.command, &parsed.payload)?;
    buffer.consume(parsed.consumed);
    Ok(Some(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_streaming_decode_round_trips() {
        const MAGIC: u32 = 0xD9B4BEF9;
        let message = ProtocolMessage::Ping(7);
        let bytes = encode_message(MAGIC, &message);

        let mut buffer = IoBuffer::new();
        buffer.writable_part()[..bytes.len()].copy_from_slice(&bytes);
        buffer.register_added_content(bytes.len());

        let decoded = try_decode_message(&mut buffer, MAGIC).unwrap().unwrap();
        assert_eq!(decoded, message);
        assert!(buffer.content().is_empty());
    }

    #[test]
    fn partial_frame_yields_none_without_consuming() {
        const MAGIC: u32 = 0xD9B4BEF9;
        let bytes = encode_message(MAGIC, &ProtocolMessage::Verack);

        let mut buffer = IoBuffer::new();
        let partial = &bytes[..bytes.len() - 1];
        buffer.writable_part()[..partial.len()].copy_from_slice(partial);
        buffer.register_added_content(partial.len());

        assert!(try_decode_message(&mut buffer, MAGIC).unwrap().is_none());
        assert_eq!(buffer.content().len(), partial.len());
    }
}
