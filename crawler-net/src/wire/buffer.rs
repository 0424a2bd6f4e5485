//! Low-level byte cursor and growing receive buffer.
//!
//! Grounded in the `peer::buffer` module's `ByteBufferParser`,
//! `ByteBufferComposer`, and `IOBuffer`; generalized from a fixed
//! `[u8; 1024]` array to a `Vec<u8>` since wire messages here (addr
//! payloads especially) routinely exceed 1 KiB.

use crate::error::CodecError;

pub struct ByteBufferParser<'a> {
    buffer: &'a [u8],
    pos: usize,
}

impl<'a> ByteBufferParser<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        ByteBufferParser { buffer, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.pos
    }

    pub fn skip(&mut self, count: usize) -> Result<(), CodecError> {
        self.eof_check(count)?;
        self.pos += count;
        Ok(())
    }

    pub fn read(&mut self, size: usize) -> Result<&'a [u8], CodecError> {
        self.eof_check(size)?;
        let range = self.pos..self.pos + size;
        self.pos += size;
        Ok(&self.buffer[range])
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read(1)?[0])
    }

    pub fn read_u16_be(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_be_bytes(self.read(2)?.try_into().unwrap()))
    }

    pub fn read_u16_le(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.read(2)?.try_into().unwrap()))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.read(4)?.try_into().unwrap()))
    }

    pub fn read_i32_le(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.read(4)?.try_into().unwrap()))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.read(8)?.try_into().unwrap()))
    }

    pub fn read_i64_le(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.read(8)?.try_into().unwrap()))
    }

    fn eof_check(&self, want: usize) -> Result<(), CodecError> {
        if self.remaining() < want {
            Err(CodecError::ShortPayload)
        } else {
            Ok(())
        }
    }
}

pub struct ByteBufferComposer {
    buffer: Vec<u8>,
}

impl ByteBufferComposer {
    pub fn new() -> Self {
        ByteBufferComposer { buffer: vec![] }
    }

    pub fn result(self) -> Vec<u8> {
        self.buffer
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn append_u8(&mut self, v: u8) {
        self.buffer.push(v);
    }
}

/// A growing receive buffer that tracks how much of its prefix is valid
/// content, and can discard the bytes a caller has consumed.
///
/// Grounded in `IOBuffer`, generalized to grow past its initial capacity
/// instead of a fixed 1024-byte array.
pub struct IoBuffer {
    buffer: Vec<u8>,
    mark: usize,
}

impl IoBuffer {
    pub fn new() -> Self {
        IoBuffer {
            buffer: vec![0u8; 64 * 1024],
            mark: 0,
        }
    }

    pub fn content(&self) -> &[u8] {
        &self.buffer[..self.mark]
    }

    /// Returns a writable slice sized to accept at least one more read,
    /// growing the backing buffer if the tail is exhausted.
    pub fn writable_part(&mut self) -> &mut [u8] {
        if self.mark == self.buffer.len() {
            self.buffer.resize(self.buffer.len() * 2, 0);
        }
        &mut self.buffer[self.mark..]
    }

    pub fn register_added_content(&mut self, size: usize) {
        assert!(self.mark + size <= self.buffer.len());
        self.mark += size;
    }

    /// Drops `size` bytes from the front of the valid content.
    pub fn consume(&mut self, size: usize) {
        assert!(size <= self.mark);
        self.buffer.copy_within(size..self.mark, 0);
        self.mark -= size;
    }
}

impl Default for IoBuffer {
    fn default() -> Self {
        Self::new()
    }
}
