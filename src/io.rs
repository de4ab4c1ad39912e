// File-level helpers for patch application.
//
// `apply_file()` wraps the full pipeline for callers working with paths:
// read the ROM and patch, apply, write the reconstructed output. The ROM
// and patch are read fully into memory — the formats are random-access and
// inputs are assumed to fit. Optionally computes a SHA-256 of the output
// (feature-gated behind `file-io`).

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use crate::buffer::ByteSource;
use crate::formats::PatchError;
use crate::patcher::Patcher;

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `apply_file()`.
#[derive(Debug, Clone)]
pub struct ApplyStats {
    /// ROM file size in bytes.
    pub rom_size: u64,
    /// Patch file size in bytes.
    pub patch_size: u64,
    /// Reconstructed output size in bytes.
    pub output_size: u64,
    /// Detected patch format name.
    pub format: &'static str,
    /// Whether strict checksum validation was enforced.
    pub strict: bool,
    /// SHA-256 of the reconstructed output (if `file-io` is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file-level operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// I/O error (file open, read, write).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Patch pipeline error.
    #[error("patch error: {0}")]
    Patch(#[from] PatchError),
}

// ---------------------------------------------------------------------------
// apply_file
// ---------------------------------------------------------------------------

/// Apply `patch_path` to `rom_path`, writing the result to `output_path`.
///
/// The patch is read eagerly (its header drives format selection); the ROM
/// is handed to the pipeline as a buffered reader so both materialize
/// during the concurrent load stage.
pub fn apply_file(
    rom_path: &Path,
    patch_path: &Path,
    output_path: &Path,
    strict: bool,
) -> Result<ApplyStats, IoError> {
    let patch_bytes = std::fs::read(patch_path)?;
    let patch_size = patch_bytes.len() as u64;

    let rom_file = File::open(rom_path)?;
    let rom_size = rom_file.metadata()?.len();
    let rom_reader = BufReader::with_capacity(BUF_SIZE, rom_file);

    let mut patcher = Patcher::new();
    patcher.set_patch_file(patch_bytes)?;
    patcher.set_rom_file(ByteSource::from_reader(rom_reader));
    patcher.load_files()?;
    patcher.parse_file()?;
    let output = patcher.patch(strict)?;

    let format = patcher
        .format()
        .expect("a selected codec produced this output");

    #[cfg(feature = "file-io")]
    let output_sha256 = {
        use sha2::Digest;
        let mut hasher = sha2::Sha256::new();
        hasher.update(output.as_slice());
        Some(hasher.finalize().into())
    };
    #[cfg(not(feature = "file-io"))]
    let output_sha256: Option<[u8; 32]> = None;

    let output_file = File::create(output_path)?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, output_file);
    writer.write_all(output.as_slice())?;
    writer.flush()?;

    Ok(ApplyStats {
        rom_size,
        patch_size,
        output_size: output.len() as u64,
        format,
        strict,
        output_sha256,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp_file(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    #[test]
    fn apply_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();

        let mut patch = b"PATCH".to_vec();
        patch.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x02, 0xAA, 0xBB]);
        patch.extend_from_slice(b"EOF");

        let rom_path = write_temp_file(dir.path(), "game.rom", &[0u8; 4]);
        let patch_path = write_temp_file(dir.path(), "game.ips", &patch);
        let output_path = dir.path().join("game-patched.rom");

        let stats = apply_file(&rom_path, &patch_path, &output_path, false).unwrap();
        assert_eq!(stats.rom_size, 4);
        assert_eq!(stats.patch_size, patch.len() as u64);
        assert_eq!(stats.output_size, 4);
        assert_eq!(stats.format, "ips");
        assert!(!stats.strict);

        let output = std::fs::read(&output_path).unwrap();
        assert_eq!(output, vec![0x00, 0xAA, 0xBB, 0x00]);
    }

    #[cfg(feature = "file-io")]
    #[test]
    fn output_sha256_is_computed() {
        let dir = tempfile::tempdir().unwrap();

        let mut patch = b"PATCH".to_vec();
        patch.extend_from_slice(b"EOF");

        let rom_path = write_temp_file(dir.path(), "in.rom", b"unchanged");
        let patch_path = write_temp_file(dir.path(), "noop.ips", &patch);
        let output_path = dir.path().join("out.rom");

        let stats = apply_file(&rom_path, &patch_path, &output_path, false).unwrap();
        let digest = stats.output_sha256.expect("file-io enables hashing");

        use sha2::Digest;
        let mut hasher = sha2::Sha256::new();
        hasher.update(b"unchanged");
        let expected: [u8; 32] = hasher.finalize().into();
        assert_eq!(digest, expected);
    }

    #[test]
    fn missing_rom_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let patch_path = write_temp_file(dir.path(), "p.ips", b"PATCHEOF");
        let err = apply_file(
            &dir.path().join("missing.rom"),
            &patch_path,
            &dir.path().join("out.rom"),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, IoError::Io(_)));
    }
}
