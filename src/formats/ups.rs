// UPS patch format.
//
// "UPS1" magic, then VLV-encoded input and output sizes, then a sparse
// record stream until 12 bytes before end-of-patch. Each record is a VLV
// offset delta — counted from the end of the previous record's XOR run —
// followed by XOR bytes terminated by a zero byte (the terminator is not
// payload: a zero XOR byte would be a no-op, so the format repurposes it).
// Trailing 12 bytes: input, output and patch-self CRC-32, little-endian.
//
// Application is symmetric — XOR-ing the output with the same patch gives
// back the input — which is why the format stores both checksums.

use log::{debug, warn};

use crate::buffer::{ByteBuffer, ByteSource, load_pair};
use crate::checksum::crc32;
use crate::formats::vlv::read_vlv;
use crate::formats::{ChecksumKind, PatchError, PatchFormat};

pub const UPS_MAGIC: &str = "UPS1";

/// Trailing input + output + patch-self CRC-32 fields.
const FOOTER_LEN: usize = 12;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsRecord {
    /// Gap from the end of the previous record's XOR run (and its
    /// terminator) to the start of this one.
    pub offset: u64,
    /// XOR bytes, zero terminator excluded.
    pub xor_data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct UpsCodec {
    rom: ByteBuffer,
    patch: ByteBuffer,
    records: Vec<UpsRecord>,
    input_size: u64,
    output_size: u64,
    input_checksum: u32,
    output_checksum: u32,
    patch_checksum: u32,
}

impl UpsCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[UpsRecord] {
        &self.records
    }

    /// Declared input (source) size from the patch header.
    pub fn input_size(&self) -> u64 {
        self.input_size
    }

    /// Declared output size from the patch header.
    pub fn output_size(&self) -> u64 {
        self.output_size
    }

    pub fn input_checksum(&self) -> u32 {
        self.input_checksum
    }

    pub fn output_checksum(&self) -> u32 {
        self.output_checksum
    }
}

impl PatchFormat for UpsCodec {
    fn name(&self) -> &'static str {
        "ups"
    }

    fn belongs_to(&self, header: &str) -> bool {
        header.starts_with(UPS_MAGIC)
    }

    fn init(&mut self, rom: ByteSource, patch: ByteSource) -> Result<(), PatchError> {
        self.records.clear();
        self.input_size = 0;
        self.output_size = 0;
        self.input_checksum = 0;
        self.output_checksum = 0;
        self.patch_checksum = 0;
        (self.rom, self.patch) = load_pair(rom, patch)?;
        Ok(())
    }

    fn parse(&mut self) -> Result<(), PatchError> {
        self.records.clear();
        self.patch.seek(UPS_MAGIC.len());

        self.input_size = read_vlv(&mut self.patch)?;
        self.output_size = read_vlv(&mut self.patch)?;

        let records_end = self.patch.len().saturating_sub(FOOTER_LEN);
        while self.patch.pos() < records_end {
            let offset = read_vlv(&mut self.patch)?;
            let mut xor_data = Vec::new();
            loop {
                let byte = self.patch.read_u8();
                if byte == 0 {
                    break;
                }
                xor_data.push(byte);
            }
            self.records.push(UpsRecord { offset, xor_data });
        }

        self.input_checksum = self.patch.read_u32_le();
        self.output_checksum = self.patch.read_u32_le();
        self.patch_checksum = self.patch.read_u32_le();

        // Unconditional self-check over everything but the final 4 bytes.
        let self_range = self.patch.len().saturating_sub(4);
        let actual = crc32(&self.patch.as_slice()[..self_range]);
        if actual != self.patch_checksum {
            return Err(PatchError::ChecksumMismatch {
                kind: ChecksumKind::Patch,
                expected: self.patch_checksum,
                actual,
            });
        }

        debug!(
            "ups: parsed {} records, input_size={}, output_size={}",
            self.records.len(),
            self.input_size,
            self.output_size
        );
        Ok(())
    }

    fn patch(&self, strict_validation: bool) -> Result<ByteBuffer, PatchError> {
        if strict_validation {
            let actual = crc32(self.rom.as_slice());
            if actual != self.input_checksum {
                return Err(PatchError::ChecksumMismatch {
                    kind: ChecksumKind::Source,
                    expected: self.input_checksum,
                    actual,
                });
            }
        }

        let mut input_size = self.input_size as usize;
        let mut output_size = self.output_size as usize;

        // Lenient mode accommodates an oversized source (headered ROMs and
        // the like): carry all of it, growing the output if needed.
        if !strict_validation && input_size < self.rom.len() {
            input_size = self.rom.len();
            if output_size < input_size {
                warn!(
                    "ups: source larger than declared ({} > {}), growing output",
                    self.rom.len(),
                    self.output_size
                );
                output_size = input_size;
            }
        }

        let mut output = ByteBuffer::with_size(output_size);
        self.rom.copy_to(&mut output, 0, Some(input_size), None);

        // Both cursors track the same walk: the record offsets are deltas
        // shared by the output and the source-read position.
        let mut source_pos: usize = 0;
        for record in &self.records {
            output.skip(record.offset as usize);
            source_pos = source_pos.saturating_add(record.offset as usize);

            for &xor_byte in &record.xor_data {
                let source_byte = self.rom.get(source_pos);
                source_pos = source_pos.saturating_add(1);
                output.write_u8(source_byte ^ xor_byte);
            }

            // Step past the terminator position.
            output.skip(1);
            source_pos = source_pos.saturating_add(1);
        }

        if strict_validation {
            let actual = crc32(output.as_slice());
            if actual != self.output_checksum {
                return Err(PatchError::ChecksumMismatch {
                    kind: ChecksumKind::Output,
                    expected: self.output_checksum,
                    actual,
                });
            }
        }

        output.seek(0);
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
