// CRC-32 (zlib polynomial) over byte slices.
//
// BPS and UPS embed three little-endian CRC-32 fields at the end of every
// patch. Range selection — skip a header, exclude the trailing checksum
// field itself — is done by slicing at the call site.
//
// With the `crc32` feature (default) the hot path goes through `crc32fast`;
// without it, a 256-entry table built at compile time.

/// Byte-reflected CRC-32, polynomial 0xEDB88320.
pub fn crc32(data: &[u8]) -> u32 {
    #[cfg(feature = "crc32")]
    {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(data);
        hasher.finalize()
    }
    #[cfg(not(feature = "crc32"))]
    {
        let mut crc: u32 = !0;
        for &byte in data {
            let index = (crc ^ u32::from(byte)) & 0xFF;
            crc = (crc >> 8) ^ CRC32_TABLE[index as usize];
        }
        !crc
    }
}

#[cfg(not(feature = "crc32"))]
const CRC32_TABLE: [u32; 256] = build_table();

#[cfg(not(feature = "crc32"))]
const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut value = i as u32;
        let mut k = 0;
        while k < 8 {
            value = if value & 1 != 0 {
                0xEDB8_8320 ^ (value >> 1)
            } else {
                value >> 1
            };
            k += 1;
        }
        table[i] = value;
        i += 1;
    }
    table
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        // Standard check value from the CRC catalogue.
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn sensitive_to_every_byte() {
        let a = crc32(&[0x00, 0x01, 0x02, 0x03]);
        let b = crc32(&[0x00, 0x01, 0x02, 0x04]);
        assert_ne!(a, b);
    }

    #[test]
    fn slicing_excludes_trailing_field() {
        // The self-check convention: checksum everything but the last 4 bytes.
        let mut patch = b"payload".to_vec();
        let crc = crc32(&patch);
        patch.extend_from_slice(&crc.to_le_bytes());
        assert_eq!(crc32(&patch[..patch.len() - 4]), crc);
    }
}
