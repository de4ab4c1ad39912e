// BPS/UPS variable-length value encoding.
//
// Base-128, least-significant group first, with an additive bias: a byte
// with the high bit set terminates the value, and every continuation byte
// implicitly encodes "at least this many more" (the decoder adds `shift`
// after widening it). The bias makes every encoding canonical — there is
// exactly one byte sequence per value — and must be reproduced exactly or
// multi-byte sizes decode wrong.

use thiserror::Error;

use crate::buffer::ByteBuffer;

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode one VLV at the buffer's cursor, advancing it.
///
/// Fails if the buffer ends before a terminator byte, or if the value would
/// not fit in a `u64`.
pub fn read_vlv(buf: &mut ByteBuffer) -> Result<u64, VlvError> {
    let mut data: u64 = 0;
    let mut shift: u64 = 1;

    loop {
        if buf.is_eof() {
            return Err(VlvError::Unterminated { offset: buf.pos() });
        }
        let byte = buf.read_u8();

        data = u64::from(byte & 0x7F)
            .checked_mul(shift)
            .and_then(|add| data.checked_add(add))
            .ok_or(VlvError::Overflow { offset: buf.pos() })?;

        if byte & 0x80 != 0 {
            return Ok(data);
        }

        if shift > u64::MAX >> 7 {
            return Err(VlvError::Overflow { offset: buf.pos() });
        }
        shift <<= 7;
        data = data
            .checked_add(shift)
            .ok_or(VlvError::Overflow { offset: buf.pos() })?;
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Append the VLV encoding of `value`. Exact inverse of [`read_vlv`].
pub fn write_vlv(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte | 0x80);
            return;
        }
        out.push(byte);
        value -= 1;
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VlvError {
    /// Buffer ended before the terminator byte.
    #[error("unterminated variable-length value at offset {offset:#x}")]
    Unterminated { offset: usize },
    /// Value does not fit in 64 bits.
    #[error("variable-length value overflow at offset {offset:#x}")]
    Overflow { offset: usize },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
