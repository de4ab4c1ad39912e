// Patch format codecs.
//
// Three competing binary patch formats, one module each, all exposing the
// same capability set through the `PatchFormat` trait:
//
// - `ips` — "PATCH" header, 3-byte offsets, RLE/literal records
// - `bps` — "BPS1" header, VLV fields, four action kinds, trailing CRCs
// - `ups` — "UPS1" header, VLV sizes, delta-offset XOR records, trailing CRCs
// - `vlv` — the variable-length value encoding BPS and UPS share

pub mod bps;
pub mod ips;
pub mod ups;
pub mod vlv;

use std::fmt;

use thiserror::Error;

use crate::buffer::{ByteBuffer, ByteSource};

// Re-export the codecs for convenience.
pub use bps::BpsCodec;
pub use ips::IpsCodec;
pub use ups::UpsCodec;

// ---------------------------------------------------------------------------
// PatchFormat trait
// ---------------------------------------------------------------------------

/// The operations a patch codec must expose.
///
/// A codec instance runs one operation at a time: `init` loads and resets,
/// `parse` populates the instruction list from the patch buffer, `patch`
/// replays it against the source. Re-using an instance for an unrelated
/// patch requires calling `init` again; state after a failed `parse` or
/// `patch` is unspecified until then.
pub trait PatchFormat {
    /// Short lowercase format name (`"ips"`, `"bps"`, `"ups"`).
    fn name(&self) -> &'static str;

    /// Whether a patch with this header text belongs to this codec.
    fn belongs_to(&self, header: &str) -> bool;

    /// Reset codec state and materialize both input buffers. The two loads
    /// run concurrently and are jointly awaited.
    fn init(&mut self, rom: ByteSource, patch: ByteSource) -> Result<(), PatchError>;

    /// Parse the patch buffer into this codec's instruction stream.
    fn parse(&mut self) -> Result<(), PatchError>;

    /// Replay the parsed instructions against the source, producing the
    /// output buffer. `strict_validation` additionally enforces the
    /// embedded source/output checksums where the format carries them.
    fn patch(&self, strict_validation: bool) -> Result<ByteBuffer, PatchError>;
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Which embedded checksum failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    /// The patch file's own trailing CRC-32. Verified at parse time,
    /// independent of strict validation.
    Patch,
    /// The source (ROM) checksum. Strict validation only.
    Source,
    /// The reconstructed output checksum. Strict validation only.
    Output,
}

impl fmt::Display for ChecksumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Patch => write!(f, "patch"),
            Self::Source => write!(f, "source"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Error type shared by the codecs and the dispatcher.
#[derive(Debug, Error)]
pub enum PatchError {
    /// No registered codec claims the patch header.
    #[error("cannot recognize patch format")]
    UnrecognizedFormat,

    /// A pipeline stage was invoked before both files were set.
    #[error("ROM and patch files are not loaded")]
    FilesNotLoaded,

    /// An embedded CRC-32 did not match the computed one.
    #[error("cannot verify {kind} CRC: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        kind: ChecksumKind,
        expected: u32,
        actual: u32,
    },

    /// A BPS/UPS variable-length value ran off the end of the patch.
    #[error("malformed patch: {0}")]
    MalformedVlv(#[from] vlv::VlvError),

    /// Reading a byte source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
