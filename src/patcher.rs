// Patch dispatcher: format selection and the load → parse → patch pipeline.
//
// The dispatcher never inspects patch contents beyond the first 6 header
// bytes; everything format-specific lives behind the `PatchFormat` trait.
// Codecs are probed in registration order and the first claimant wins, so
// a custom registry controls precedence.

use log::{debug, info};

use crate::buffer::{ByteBuffer, ByteSource};
use crate::formats::{BpsCodec, IpsCodec, PatchError, PatchFormat, UpsCodec};

/// Header bytes read for format selection. Long enough for every magic
/// ("PATCH" is the longest at 5).
const HEADER_PROBE_LEN: usize = 6;

// ---------------------------------------------------------------------------
// Patcher
// ---------------------------------------------------------------------------

/// Applies a binary patch to a ROM through a four-stage pipeline:
///
/// ```no_run
/// use oxipatch::Patcher;
///
/// # fn main() -> Result<(), oxipatch::PatchError> {
/// let mut patcher = Patcher::new();
/// patcher.set_patch_file(std::fs::read("game.ips")?)?;
/// patcher.set_rom_file(std::fs::read("game.rom")?);
/// patcher.load_files()?;
/// patcher.parse_file()?;
/// let output = patcher.patch(true)?;
/// std::fs::write("game-patched.rom", output.as_slice())?;
/// # Ok(())
/// # }
/// ```
pub struct Patcher {
    codecs: Vec<Box<dyn PatchFormat>>,
    selected: Option<usize>,
    rom: Option<ByteSource>,
    rom_set: bool,
    patch_bytes: Option<Vec<u8>>,
}

impl Patcher {
    /// A dispatcher with the three built-in codecs (IPS, BPS, UPS).
    pub fn new() -> Self {
        Self::with_codecs(vec![
            Box::new(IpsCodec::new()),
            Box::new(BpsCodec::new()),
            Box::new(UpsCodec::new()),
        ])
    }

    /// A dispatcher with an explicit codec registry. Probe order is
    /// registration order.
    pub fn with_codecs(codecs: Vec<Box<dyn PatchFormat>>) -> Self {
        Self {
            codecs,
            selected: None,
            rom: None,
            rom_set: false,
            patch_bytes: None,
        }
    }

    /// Accept the raw patch bytes (a reader is drained immediately), sniff
    /// the header and select the owning codec.
    pub fn set_patch_file(&mut self, source: impl Into<ByteSource>) -> Result<(), PatchError> {
        let bytes = source.into().into_bytes()?;
        let header = ByteBuffer::from(bytes.as_slice()).read_string(HEADER_PROBE_LEN);

        for (index, codec) in self.codecs.iter().enumerate() {
            if codec.belongs_to(&header) {
                debug!("selected {} codec for header {header:?}", codec.name());
                self.selected = Some(index);
                self.patch_bytes = Some(bytes);
                return Ok(());
            }
        }

        self.selected = None;
        self.patch_bytes = None;
        Err(PatchError::UnrecognizedFormat)
    }

    /// Store the ROM source without validation; content checks happen at
    /// patch time via the embedded checksums.
    pub fn set_rom_file(&mut self, source: impl Into<ByteSource>) {
        self.rom = Some(source.into());
        self.rom_set = true;
    }

    /// Materialize both buffers into the selected codec. The two loads run
    /// concurrently and are jointly awaited.
    pub fn load_files(&mut self) -> Result<(), PatchError> {
        self.ensure_files_set()?;

        // Byte sources can be re-loaded; a drained reader cannot.
        let rom = match self.rom.take() {
            Some(ByteSource::Bytes(bytes)) => {
                self.rom = Some(ByteSource::Bytes(bytes.clone()));
                ByteSource::Bytes(bytes)
            }
            Some(reader) => reader,
            None => return Err(PatchError::FilesNotLoaded),
        };
        let patch = ByteSource::Bytes(
            self.patch_bytes
                .clone()
                .ok_or(PatchError::FilesNotLoaded)?,
        );

        let codec = &mut self.codecs[self.selected.ok_or(PatchError::UnrecognizedFormat)?];
        codec.init(rom, patch)
    }

    /// Parse the loaded patch into the codec's instruction stream.
    pub fn parse_file(&mut self) -> Result<(), PatchError> {
        self.ensure_files_set()?;
        let codec = &mut self.codecs[self.selected.ok_or(PatchError::UnrecognizedFormat)?];
        codec.parse()
    }

    /// Replay the parsed patch, returning the reconstructed output.
    ///
    /// Strict validation additionally enforces the source/output checksums
    /// where the format embeds them; the patch's own checksum was already
    /// enforced during `parse_file`.
    pub fn patch(&self, strict_validation: bool) -> Result<ByteBuffer, PatchError> {
        self.ensure_files_set()?;
        let codec = &self.codecs[self.selected.ok_or(PatchError::UnrecognizedFormat)?];
        let output = codec.patch(strict_validation)?;
        info!(
            "applied {} patch, output {} bytes (strict={strict_validation})",
            codec.name(),
            output.len()
        );
        Ok(output)
    }

    /// Name of the codec selected for the current patch, if any.
    pub fn format(&self) -> Option<&'static str> {
        self.selected.map(|index| self.codecs[index].name())
    }

    /// Supported format names, in probe order.
    pub fn formats(&self) -> Vec<&'static str> {
        self.codecs.iter().map(|codec| codec.name()).collect()
    }

    fn ensure_files_set(&self) -> Result<(), PatchError> {
        if self.rom_set && self.patch_bytes.is_some() {
            Ok(())
        } else {
            Err(PatchError::FilesNotLoaded)
        }
    }
}

impl Default for Patcher {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// One-shot convenience
// ---------------------------------------------------------------------------

/// Run the whole pipeline over in-memory inputs.
pub fn apply(
    rom: impl Into<ByteSource>,
    patch: impl Into<ByteSource>,
    strict_validation: bool,
) -> Result<ByteBuffer, PatchError> {
    let mut patcher = Patcher::new();
    patcher.set_patch_file(patch)?;
    patcher.set_rom_file(rom);
    patcher.load_files()?;
    patcher.parse_file()?;
    patcher.patch(strict_validation)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
