//! Bitcoin-style variable-length integer encoding.
//!
//! `0x00..0xFC` encode as themselves; `0xFD`/`0xFE`/`0xFF` prefix a
//! little-endian `u16`/`u32`/`u64` respectively.

use super::buffer::{ByteBufferComposer, ByteBufferParser};
use crate::error::CodecError;

pub(crate) fn encode(composer: &mut ByteBufferComposer, value: u64) {
    if value < 0xFD {
        composer.append_u8(value as u8);
    } else if value <= u16::MAX as u64 {
        composer.append_u8(0xFD);
        composer.append(&(value as u16).to_le_bytes());
    } else if value <= u32::MAX as u64 {
        composer.append_u8(0xFE);
        composer.append(&(value as u32).to_le_bytes());
    } else {
        composer.append_u8(0xFF);
        composer.append(&value.to_le_bytes());
    }
}

pub(crate) fn decode(parser: &mut ByteBufferParser) -> Result<u64, CodecError> {
    let prefix = parser.read_u8()?;
    match prefix {
        0xFD => Ok(parser.read_u16_le()? as u64),
        0xFE => Ok(parser.read_u32_le()? as u64),
        0xFF => parser.read_u64_le(),
        small => Ok(small as u64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case(0xFC)]
    #[case(0xFD)]
    #[case(0xFFFF)]
    #[case(0x1_0000)]
    #[case(0xFFFF_FFFF)]
    #[case(0x1_0000_0000)]
    #[case(u64::MAX)]
    fn round_trips(#[case] value: u64) {
        let mut composer = ByteBufferComposer::new();
        encode(&mut composer, value);
        let bytes = composer.result();
        let mut parser = ByteBufferParser::new(&bytes);
        assert_eq!(decode(&mut parser).unwrap(), value);
        assert_eq!(parser.pos(), bytes.len());
    }
}
