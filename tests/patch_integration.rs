// End-to-end pipeline tests: Patcher dispatch + load + parse + patch for
// all three formats, against reference patches built record-by-record.

use oxipatch::checksum::crc32;
use oxipatch::formats::vlv::write_vlv;
use oxipatch::{ChecksumKind, PatchError, Patcher, apply};

// ---------------------------------------------------------------------------
// Reference patch builders
// ---------------------------------------------------------------------------

fn ips_patch(records: &[(u32, &[u8])], truncate: Option<u32>) -> Vec<u8> {
    let mut patch = b"PATCH".to_vec();
    for &(offset, data) in records {
        patch.extend_from_slice(&offset.to_be_bytes()[1..]);
        patch.extend_from_slice(&(data.len() as u16).to_be_bytes());
        patch.extend_from_slice(data);
    }
    patch.extend_from_slice(b"EOF");
    if let Some(len) = truncate {
        patch.extend_from_slice(&len.to_be_bytes()[1..]);
    }
    patch
}

/// BPS patch that rewrites `source` into `target` with one SourceRead over
/// the unchanged prefix and one TargetRead for the rest.
fn bps_patch(source: &[u8], target: &[u8], common_prefix: usize) -> Vec<u8> {
    let mut patch = b"BPS1".to_vec();
    write_vlv(&mut patch, source.len() as u64);
    write_vlv(&mut patch, target.len() as u64);
    write_vlv(&mut patch, 0);
    if common_prefix > 0 {
        write_vlv(&mut patch, (common_prefix as u64 - 1) << 2); // SourceRead
    }
    let rest = &target[common_prefix..];
    if !rest.is_empty() {
        write_vlv(&mut patch, ((rest.len() as u64 - 1) << 2) | 1); // TargetRead
        patch.extend_from_slice(rest);
    }
    patch.extend_from_slice(&crc32(source).to_le_bytes());
    patch.extend_from_slice(&crc32(target).to_le_bytes());
    let self_crc = crc32(&patch);
    patch.extend_from_slice(&self_crc.to_le_bytes());
    patch
}

/// UPS patch from a source/target pair of equal declared sizes.
fn ups_patch(source: &[u8], target: &[u8]) -> Vec<u8> {
    let mut patch = b"UPS1".to_vec();
    write_vlv(&mut patch, source.len() as u64);
    write_vlv(&mut patch, target.len() as u64);

    let byte_at = |data: &[u8], i: usize| data.get(i).copied().unwrap_or(0);
    let len = source.len().max(target.len());
    let mut pos = 0;
    let mut last_end = 0;
    while pos < len {
        if byte_at(source, pos) == byte_at(target, pos) {
            pos += 1;
            continue;
        }
        write_vlv(&mut patch, (pos - last_end) as u64);
        while pos < len && byte_at(source, pos) != byte_at(target, pos) {
            patch.push(byte_at(source, pos) ^ byte_at(target, pos));
            pos += 1;
        }
        patch.push(0);
        pos += 1; // the terminator consumes one skipped position
        last_end = pos;
    }

    patch.extend_from_slice(&crc32(source).to_le_bytes());
    patch.extend_from_slice(&crc32(target).to_le_bytes());
    let self_crc = crc32(&patch);
    patch.extend_from_slice(&self_crc.to_le_bytes());
    patch
}

fn run_pipeline(rom: &[u8], patch: &[u8], strict: bool) -> Result<Vec<u8>, PatchError> {
    let mut patcher = Patcher::new();
    patcher.set_patch_file(patch.to_vec())?;
    patcher.set_rom_file(rom.to_vec());
    patcher.load_files()?;
    patcher.parse_file()?;
    Ok(patcher.patch(strict)?.into_vec())
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[test]
fn dispatch_selects_each_format() {
    let mut patcher = Patcher::new();
    assert_eq!(patcher.formats(), vec!["ips", "bps", "ups"]);

    patcher.set_patch_file(ips_patch(&[], None)).unwrap();
    assert_eq!(patcher.format(), Some("ips"));

    patcher
        .set_patch_file(bps_patch(b"ab", b"ab", 2))
        .unwrap();
    assert_eq!(patcher.format(), Some("bps"));

    patcher.set_patch_file(ups_patch(b"ab", b"ab")).unwrap();
    assert_eq!(patcher.format(), Some("ups"));
}

#[test]
fn unknown_header_fails_selection() {
    let mut patcher = Patcher::new();
    let err = patcher
        .set_patch_file(b"XPATCHX not a real patch".to_vec())
        .unwrap_err();
    assert!(matches!(err, PatchError::UnrecognizedFormat));
}

#[test]
fn stages_fail_before_files_are_set() {
    let mut patcher = Patcher::new();
    assert!(matches!(
        patcher.load_files().unwrap_err(),
        PatchError::FilesNotLoaded
    ));
    patcher.set_patch_file(ips_patch(&[], None)).unwrap();
    assert!(matches!(
        patcher.patch(true).unwrap_err(),
        PatchError::FilesNotLoaded
    ));
}

// ---------------------------------------------------------------------------
// IPS
// ---------------------------------------------------------------------------

#[test]
fn ips_literal_record() {
    let patch = ips_patch(&[(1, &[0xAA, 0xBB])], None);
    let output = run_pipeline(&[0x00, 0x00, 0x00, 0x00], &patch, false).unwrap();
    assert_eq!(output, vec![0x00, 0xAA, 0xBB, 0x00]);
}

#[test]
fn ips_truncate_extension() {
    let patch = ips_patch(&[(0, &[0x42])], Some(2));
    let output = run_pipeline(&[1, 2, 3, 4, 5], &patch, false).unwrap();
    assert_eq!(output, vec![0x42, 2]);
}

#[test]
fn ips_strict_flag_is_inert() {
    // IPS carries no checksums; strict mode changes nothing.
    let patch = ips_patch(&[(0, &[0x42])], None);
    assert_eq!(
        run_pipeline(b"xyz", &patch, true).unwrap(),
        run_pipeline(b"xyz", &patch, false).unwrap()
    );
}

// ---------------------------------------------------------------------------
// BPS
// ---------------------------------------------------------------------------

#[test]
fn bps_roundtrip_strict() {
    let source = b"The quick brown fox jumps over the lazy dog.";
    let target = b"The quick brown cat naps through the afternoon.";
    let patch = bps_patch(source, target, 16);
    let output = run_pipeline(source, &patch, true).unwrap();
    assert_eq!(output, target);
}

#[test]
fn bps_grows_and_shrinks_targets() {
    let source = b"short";
    let longer = b"short but now considerably longer than before";
    let patch = bps_patch(source, longer, 5);
    assert_eq!(run_pipeline(source, &patch, true).unwrap(), longer);

    let shorter = b"sho";
    let patch = bps_patch(source, shorter, 3);
    assert_eq!(run_pipeline(source, &patch, true).unwrap(), shorter);
}

#[test]
fn bps_strict_rejects_wrong_source_without_output() {
    let source = b"correct source bytes";
    let target = b"correct source bytes plus tail";
    let patch = bps_patch(source, target, source.len());

    let err = run_pipeline(b"not the right source!", &patch, true).unwrap_err();
    assert!(matches!(
        err,
        PatchError::ChecksumMismatch {
            kind: ChecksumKind::Source,
            ..
        }
    ));
}

#[test]
fn bps_damaged_patch_fails_parse_in_lenient_mode_too() {
    let source = b"abcdef";
    let mut patch = bps_patch(source, b"abcxyz", 3);
    let idx = patch.len() - 14; // a literal byte of the TargetRead
    patch[idx] ^= 0x01;

    let err = run_pipeline(source, &patch, false).unwrap_err();
    assert!(matches!(
        err,
        PatchError::ChecksumMismatch {
            kind: ChecksumKind::Patch,
            ..
        }
    ));
}

// ---------------------------------------------------------------------------
// UPS
// ---------------------------------------------------------------------------

#[test]
fn ups_single_byte_xor() {
    // Zero-length delta, payload 0xFF over source 0x0F: output byte 0xF0.
    let source = [0x0F, 0x11, 0x22, 0x33];
    let target = [0xF0, 0x11, 0x22, 0x33];
    let patch = ups_patch(&source, &target);
    assert_eq!(run_pipeline(&source, &patch, true).unwrap(), target);
}

#[test]
fn ups_scattered_edits_roundtrip() {
    let source: Vec<u8> = (0..=255u8).cycle().take(1024).collect();
    let mut target = source.clone();
    target[3] ^= 0x80;
    target[4] ^= 0x21;
    target[500] = 0x00;
    target[1023] ^= 0xFF;
    let patch = ups_patch(&source, &target);
    assert_eq!(run_pipeline(&source, &patch, true).unwrap(), target);
}

#[test]
fn ups_growing_output_roundtrip() {
    let source = b"base".to_vec();
    let mut target = source.clone();
    target.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    let patch = ups_patch(&source, &target);
    assert_eq!(run_pipeline(&source, &patch, true).unwrap(), target);
}

#[test]
fn ups_strict_rejects_wrong_source() {
    let source = [0x55u8; 16];
    let mut target = source;
    target[8] = 0xAA;
    let patch = ups_patch(&source, &target);

    let err = run_pipeline(&[0x11u8; 16], &patch, true).unwrap_err();
    assert!(matches!(
        err,
        PatchError::ChecksumMismatch {
            kind: ChecksumKind::Source,
            ..
        }
    ));
    // Lenient mode applies anyway.
    assert!(run_pipeline(&[0x11u8; 16], &patch, false).is_ok());
}

// ---------------------------------------------------------------------------
// One-shot API
// ---------------------------------------------------------------------------

#[test]
fn apply_convenience_matches_pipeline() {
    let source = b"convenience source".to_vec();
    let target = b"convenience target".to_vec();
    let patch = ups_patch(&source, &target);

    let output = apply(source.clone(), patch.clone(), true).unwrap();
    assert_eq!(output.into_vec(), run_pipeline(&source, &patch, true).unwrap());
}
