// BPS patch format.
//
// "BPS1" magic, then VLV-encoded source size, target size, and a metadata
// length + free-form metadata text. Actions follow until 12 bytes before
// the end of the patch; the trailing 12 bytes are three little-endian
// CRC-32 fields (source, target, patch-self). Each action packs its kind
// into the low 2 bits of one VLV and its length into the rest (+1).
//
// SourceCopy and TargetCopy each maintain their own running cursor,
// adjusted by a signed relative offset per action. TargetCopy reads from
// the output produced so far and must go byte-at-a-time: an overlapping
// copy is the format's idiom for RLE.

use log::debug;

use crate::buffer::{ByteBuffer, ByteSource, load_pair};
use crate::checksum::crc32;
use crate::formats::vlv::{VlvError, read_vlv};
use crate::formats::{ChecksumKind, PatchError, PatchFormat};

pub const BPS_MAGIC: &str = "BPS1";

/// Trailing source + target + patch-self CRC-32 fields.
const FOOTER_LEN: usize = 12;

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BpsAction {
    /// Copy `length` bytes from source at the current output position.
    SourceRead { length: usize },
    /// Write `data` verbatim.
    TargetRead { data: Vec<u8> },
    /// Advance the source-copy cursor by `relative_offset`, then copy
    /// `length` bytes from source.
    SourceCopy {
        length: usize,
        relative_offset: i64,
    },
    /// Advance the target-copy cursor by `relative_offset`, then copy
    /// `length` bytes from the output written so far.
    TargetCopy {
        length: usize,
        relative_offset: i64,
    },
}

/// Kind selector in an action VLV's low two bits.
const ACTION_SOURCE_READ: u64 = 0;
const ACTION_TARGET_READ: u64 = 1;
const ACTION_SOURCE_COPY: u64 = 2;
const ACTION_TARGET_COPY: u64 = 3;

/// Decode a BPS signed number: low bit is the sign, the rest the magnitude.
fn unpack_signed(raw: u64) -> i64 {
    let magnitude = (raw >> 1) as i64;
    if raw & 1 != 0 { -magnitude } else { magnitude }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct BpsCodec {
    rom: ByteBuffer,
    patch: ByteBuffer,
    actions: Vec<BpsAction>,
    source_size: u64,
    target_size: u64,
    metadata: String,
    source_checksum: u32,
    target_checksum: u32,
    patch_checksum: u32,
}

impl BpsCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> &[BpsAction] {
        &self.actions
    }

    /// Declared source size from the patch header.
    pub fn source_size(&self) -> u64 {
        self.source_size
    }

    /// Declared target size from the patch header.
    pub fn target_size(&self) -> u64 {
        self.target_size
    }

    /// Free-form metadata text embedded in the patch (often XML, often empty).
    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    pub fn source_checksum(&self) -> u32 {
        self.source_checksum
    }

    pub fn target_checksum(&self) -> u32 {
        self.target_checksum
    }
}

impl PatchFormat for BpsCodec {
    fn name(&self) -> &'static str {
        "bps"
    }

    fn belongs_to(&self, header: &str) -> bool {
        header.starts_with(BPS_MAGIC)
    }

    fn init(&mut self, rom: ByteSource, patch: ByteSource) -> Result<(), PatchError> {
        self.actions.clear();
        self.source_size = 0;
        self.target_size = 0;
        self.metadata.clear();
        self.source_checksum = 0;
        self.target_checksum = 0;
        self.patch_checksum = 0;
        (self.rom, self.patch) = load_pair(rom, patch)?;
        Ok(())
    }

    fn parse(&mut self) -> Result<(), PatchError> {
        self.actions.clear();
        self.patch.seek(BPS_MAGIC.len());

        self.source_size = read_vlv(&mut self.patch)?;
        self.target_size = read_vlv(&mut self.patch)?;

        let metadata_len = read_vlv(&mut self.patch)? as usize;
        self.metadata = if metadata_len > 0 {
            self.patch.read_string(metadata_len)
        } else {
            String::new()
        };

        let actions_end = self.patch.len().saturating_sub(FOOTER_LEN);
        while self.patch.pos() < actions_end {
            let word = read_vlv(&mut self.patch)?;
            let length = (word >> 2) as usize + 1;

            let action = match word & 3 {
                ACTION_SOURCE_READ => BpsAction::SourceRead { length },
                ACTION_TARGET_READ => {
                    // A literal run longer than the whole patch can never
                    // verify; reject before allocating for it.
                    if length > self.patch.len() {
                        return Err(PatchError::MalformedVlv(VlvError::Overflow {
                            offset: self.patch.pos(),
                        }));
                    }
                    BpsAction::TargetRead {
                        data: self.patch.read_bytes(length),
                    }
                }
                ACTION_SOURCE_COPY => BpsAction::SourceCopy {
                    length,
                    relative_offset: unpack_signed(read_vlv(&mut self.patch)?),
                },
                ACTION_TARGET_COPY => BpsAction::TargetCopy {
                    length,
                    relative_offset: unpack_signed(read_vlv(&mut self.patch)?),
                },
                _ => unreachable!("kind is two bits"),
            };
            self.actions.push(action);
        }

        self.source_checksum = self.patch.read_u32_le();
        self.target_checksum = self.patch.read_u32_le();
        self.patch_checksum = self.patch.read_u32_le();

        // The patch's own CRC covers everything but its final 4 bytes and
        // is enforced unconditionally: a damaged patch must never replay.
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
            "bps: parsed {} actions, source_size={}, target_size={}, metadata={}B",
            self.actions.len(),
            self.source_size,
            self.target_size,
            self.metadata.len()
        );
        Ok(())
    }

    fn patch(&self, strict_validation: bool) -> Result<ByteBuffer, PatchError> {
        if strict_validation {
            let actual = crc32(self.rom.as_slice());
            if actual != self.source_checksum {
                return Err(PatchError::ChecksumMismatch {
                    kind: ChecksumKind::Source,
                    expected: self.source_checksum,
                    actual,
                });
            }
        }

        let mut output = ByteBuffer::with_size(self.target_size as usize);
        let mut source_offset: i64 = 0;
        let mut target_offset: i64 = 0;

        for action in &self.actions {
            match action {
                BpsAction::SourceRead { length } => {
                    let pos = output.pos();
                    self.rom.copy_to(&mut output, pos, Some(*length), None);
                    output.skip(*length);
                }
                BpsAction::TargetRead { data } => {
                    output.write_bytes(data);
                }
                BpsAction::SourceCopy {
                    length,
                    relative_offset,
                } => {
                    source_offset = source_offset.saturating_add(*relative_offset);
                    for _ in 0..*length {
                        // Past the output end every write is dropped; stop.
                        if output.is_eof() {
                            break;
                        }
                        output.write_u8(self.rom.get(source_offset as usize));
                        source_offset = source_offset.saturating_add(1);
                    }
                }
                BpsAction::TargetCopy {
                    length,
                    relative_offset,
                } => {
                    target_offset = target_offset.saturating_add(*relative_offset);
                    // Byte-at-a-time so the copy can read bytes it has just
                    // written (overlap is how the format expresses runs).
                    for _ in 0..*length {
                        if output.is_eof() {
                            break;
                        }
                        let byte = output.get(target_offset as usize);
                        output.write_u8(byte);
                        target_offset = target_offset.saturating_add(1);
                    }
                }
            }
        }

        if strict_validation {
            let actual = crc32(output.as_slice());
            if actual != self.target_checksum {
                return Err(PatchError::ChecksumMismatch {
                    kind: ChecksumKind::Output,
                    expected: self.target_checksum,
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
