// IPS patch format.
//
// The oldest of the three formats: "PATCH" magic, then records of
// 3-byte big-endian offset + 2-byte length. Length 0 marks an RLE record
// (2-byte repeat count, 1 fill byte). The stream ends at a 3-byte "EOF"
// sentinel; a legacy extension allows one trailing 3-byte truncate length
// after the sentinel. No checksums anywhere in the format.
//
// The sentinel is ambiguous by construction: 0x454F46 is also a valid
// record offset. It only terminates the stream when nothing follows it, or
// when exactly the 3 truncate bytes follow; anywhere else it is an
// ordinary offset. Reproduced exactly — compatibility with `.ips` files in
// the wild beats cleanliness here.

use log::debug;

use crate::buffer::{ByteBuffer, ByteSource, load_pair};
use crate::formats::{PatchError, PatchFormat};

pub const IPS_MAGIC: &str = "PATCH";

/// "EOF" as a 3-byte big-endian integer.
const IPS_EOF: u32 = 0x0045_4F46;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpsRecord {
    /// Repeat `byte` `count` times at `offset`.
    Fill {
        offset: usize,
        count: usize,
        byte: u8,
    },
    /// Write `data` verbatim at `offset`.
    Literal { offset: usize, data: Vec<u8> },
}

impl IpsRecord {
    /// One past the last output byte this record touches.
    fn end(&self) -> usize {
        match self {
            Self::Fill { offset, count, .. } => offset + count,
            Self::Literal { offset, data } => offset + data.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct IpsCodec {
    rom: ByteBuffer,
    patch: ByteBuffer,
    records: Vec<IpsRecord>,
    truncate: Option<usize>,
}

impl IpsCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parsed records, in file order.
    pub fn records(&self) -> &[IpsRecord] {
        &self.records
    }

    /// Truncate length from the legacy trailing extension, if present.
    pub fn truncate(&self) -> Option<usize> {
        self.truncate
    }
}

impl PatchFormat for IpsCodec {
    fn name(&self) -> &'static str {
        "ips"
    }

    fn belongs_to(&self, header: &str) -> bool {
        header.starts_with(IPS_MAGIC)
    }

    fn init(&mut self, rom: ByteSource, patch: ByteSource) -> Result<(), PatchError> {
        self.records.clear();
        self.truncate = None;
        (self.rom, self.patch) = load_pair(rom, patch)?;
        Ok(())
    }

    fn parse(&mut self) -> Result<(), PatchError> {
        self.records.clear();
        self.truncate = None;
        self.patch.seek(IPS_MAGIC.len());

        while !self.patch.is_eof() {
            let offset = self.patch.read_u24();

            if offset == IPS_EOF {
                if self.patch.is_eof() {
                    break;
                }
                if self.patch.pos() + 3 == self.patch.len() {
                    self.truncate = Some(self.patch.read_u24() as usize);
                    break;
                }
                // Sentinel collision with more data following: an ordinary
                // record that happens to start at offset 0x454F46.
            }

            let length = self.patch.read_u16() as usize;
            if length == 0 {
                let count = self.patch.read_u16() as usize;
                let byte = self.patch.read_u8();
                self.records.push(IpsRecord::Fill {
                    offset: offset as usize,
                    count,
                    byte,
                });
            } else {
                let data = self.patch.read_bytes(length);
                self.records.push(IpsRecord::Literal {
                    offset: offset as usize,
                    data,
                });
            }
        }

        debug!(
            "ips: parsed {} records, truncate={:?}",
            self.records.len(),
            self.truncate
        );
        Ok(())
    }

    fn patch(&self, _strict_validation: bool) -> Result<ByteBuffer, PatchError> {
        // Size the output: the truncate extension overrides everything,
        // otherwise grow the source to cover the furthest-reaching record.
        let mut output = match self.truncate {
            Some(truncate) => self.rom.slice(0, Some(truncate)),
            None => {
                let mut size = self.rom.len();
                for record in &self.records {
                    size = size.max(record.end());
                }
                self.rom.slice(0, Some(size))
            }
        };

        // Apply in file order; later records overwrite earlier ones.
        for record in &self.records {
            match record {
                IpsRecord::Fill {
                    offset,
                    count,
                    byte,
                } => {
                    output.seek(*offset);
                    for _ in 0..*count {
                        output.write_u8(*byte);
                    }
                }
                IpsRecord::Literal { offset, data } => {
                    output.seek(*offset);
                    output.write_bytes(data);
                }
            }
        }

        output.seek(0);
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
