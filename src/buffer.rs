// Random-access byte storage with a read/write cursor.
//
// Every codec owns two of these: the source ("ROM") buffer and the patch
// buffer. Reads past the end yield zero bytes — historical patch tooling
// tolerates malformed trailing data, and the formats themselves rely on it
// (UPS XOR runs may extend past the source). Writes past the end are
// dropped; the cursor still advances so record application stays in step.

use std::fmt;
use std::io::{self, Read};
use std::thread::{self, ScopedJoinHandle};

// ---------------------------------------------------------------------------
// ByteBuffer
// ---------------------------------------------------------------------------

/// Fixed-size byte buffer with an explicit cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl ByteBuffer {
    /// Create a zero-filled buffer of `size` bytes, cursor at 0.
    pub fn with_size(size: usize) -> Self {
        Self {
            data: vec![0; size],
            pos: 0,
        }
    }

    /// Total size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current cursor offset.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// True once the cursor has reached or passed the end.
    pub fn is_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Reposition the cursor absolutely.
    pub fn seek(&mut self, offset: usize) {
        self.pos = offset;
    }

    /// Reposition the cursor relatively. Saturates instead of wrapping so a
    /// hostile length can at worst park the cursor past the end.
    pub fn skip(&mut self, bytes: usize) {
        self.pos = self.pos.saturating_add(bytes);
    }

    /// Single byte at an absolute offset, without moving the cursor.
    /// Zero past the end.
    pub fn get(&self, offset: usize) -> u8 {
        self.data.get(offset).copied().unwrap_or(0)
    }

    /// Byte at cursor + `i`, zero past the end.
    fn peek(&self, i: usize) -> u8 {
        self.get(self.pos.saturating_add(i))
    }

    /// Decode up to `len` bytes as text, stopping early at a zero byte or
    /// the end of the buffer. The cursor advances by exactly `len` either
    /// way — header fields are fixed-width even when the text is shorter.
    pub fn read_string(&mut self, len: usize) -> String {
        let mut text = String::new();
        for i in 0..len {
            if self.pos.saturating_add(i) >= self.data.len() {
                break;
            }
            let byte = self.peek(i);
            if byte == 0 {
                break;
            }
            text.push(byte as char);
        }
        self.skip(len);
        text
    }

    /// Read `len` raw bytes, zero-filled past the end.
    pub fn read_bytes(&mut self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = self.peek(i);
        }
        self.skip(len);
        bytes
    }

    pub fn read_u8(&mut self) -> u8 {
        let value = self.peek(0);
        self.skip(1);
        value
    }

    /// Big-endian 16-bit read.
    pub fn read_u16(&mut self) -> u32 {
        let value = (u32::from(self.peek(0)) << 8) | u32::from(self.peek(1));
        self.skip(2);
        value
    }

    /// Little-endian 16-bit read.
    pub fn read_u16_le(&mut self) -> u32 {
        let value = u32::from(self.peek(0)) | (u32::from(self.peek(1)) << 8);
        self.skip(2);
        value
    }

    /// Big-endian 24-bit read.
    pub fn read_u24(&mut self) -> u32 {
        let value = (u32::from(self.peek(0)) << 16)
            | (u32::from(self.peek(1)) << 8)
            | u32::from(self.peek(2));
        self.skip(3);
        value
    }

    /// Little-endian 24-bit read.
    pub fn read_u24_le(&mut self) -> u32 {
        let value = u32::from(self.peek(0))
            | (u32::from(self.peek(1)) << 8)
            | (u32::from(self.peek(2)) << 16);
        self.skip(3);
        value
    }

    /// Big-endian 32-bit read.
    pub fn read_u32(&mut self) -> u32 {
        let value = (u32::from(self.peek(0)) << 24)
            | (u32::from(self.peek(1)) << 16)
            | (u32::from(self.peek(2)) << 8)
            | u32::from(self.peek(3));
        self.skip(4);
        value
    }

    /// Little-endian 32-bit read.
    pub fn read_u32_le(&mut self) -> u32 {
        let value = u32::from(self.peek(0))
            | (u32::from(self.peek(1)) << 8)
            | (u32::from(self.peek(2)) << 16)
            | (u32::from(self.peek(3)) << 24);
        self.skip(4);
        value
    }

    /// Write one byte at the cursor. Dropped if the cursor is past the end;
    /// the cursor advances regardless.
    pub fn write_u8(&mut self, byte: u8) {
        if self.pos < self.data.len() {
            self.data[self.pos] = byte;
        }
        self.pos = self.pos.saturating_add(1);
    }

    /// Write a run of bytes forward from the cursor, dropping any that fall
    /// past the end. The cursor advances by the full run length.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.write_u8(byte);
        }
    }

    /// Copy a byte range into `target` without moving either cursor.
    ///
    /// `length` defaults to the rest of this buffer; `dst_offset` defaults
    /// to `src_offset`. Reads past this buffer's end produce zeroes, writes
    /// past the target's end are dropped.
    pub fn copy_to(
        &self,
        target: &mut ByteBuffer,
        src_offset: usize,
        length: Option<usize>,
        dst_offset: Option<usize>,
    ) {
        let len = length.unwrap_or_else(|| self.data.len().saturating_sub(src_offset));
        let dst = dst_offset.unwrap_or(src_offset);
        for i in 0..len {
            let at = dst.saturating_add(i);
            if at >= target.data.len() {
                break;
            }
            target.data[at] = self.get(src_offset.saturating_add(i));
        }
    }

    /// Independent copy of a byte range as a new buffer, cursor at 0.
    ///
    /// `length` defaults to the rest of the buffer. The result is exactly
    /// the requested length: any part of the range past this buffer's end
    /// comes back zero-filled, so a slice can also grow the data.
    pub fn slice(&self, offset: usize, length: Option<usize>) -> ByteBuffer {
        let len = length.unwrap_or_else(|| self.data.len().saturating_sub(offset));
        let mut out = ByteBuffer::with_size(len);
        self.copy_to(&mut out, offset, Some(len), Some(0));
        out
    }

    /// Raw byte view, for checksumming and emission.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer, returning the raw bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            pos: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// ByteSource
// ---------------------------------------------------------------------------

/// An opaque byte input: bytes already in memory, or a reader drained on
/// load. Readers must be `Send` because the dual-buffer load materializes
/// the two sources on separate threads.
pub enum ByteSource {
    Bytes(Vec<u8>),
    Reader(Box<dyn Read + Send>),
}

impl ByteSource {
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self::Reader(Box::new(reader))
    }

    /// Drain the source into raw bytes.
    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Reader(mut reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
        }
    }

    /// Drain the source into a buffer.
    fn materialize(self) -> io::Result<ByteBuffer> {
        Ok(ByteBuffer::from(self.into_bytes()?))
    }
}

impl From<Vec<u8>> for ByteSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for ByteSource {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Reader(_) => f.debug_tuple("Reader").finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dual-buffer load
// ---------------------------------------------------------------------------

/// Materialize the ROM and patch sources concurrently.
///
/// The two loads fan out onto scoped threads and join before returning;
/// neither depends on the other. This is the only concurrency in the crate.
pub fn load_pair(rom: ByteSource, patch: ByteSource) -> io::Result<(ByteBuffer, ByteBuffer)> {
    thread::scope(|scope| {
        let rom_load = scope.spawn(move || rom.materialize());
        let patch_load = scope.spawn(move || patch.materialize());
        let rom = join_load(rom_load)?;
        let patch = join_load(patch_load)?;
        Ok((rom, patch))
    })
}

fn join_load(handle: ScopedJoinHandle<'_, io::Result<ByteBuffer>>) -> io::Result<ByteBuffer> {
    match handle.join() {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
