//! CRC32 checksums guarding the state file
//!
//! The state file's first line carries the checksum of the JSON body that
//! follows it. Any mismatch on load is corruption and aborts startup.

use crc32fast::Hasher;

const HEADER_PREFIX: &str = "crc32:";

/// Computes a CRC32 (IEEE) checksum over the provided data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

pub fn verify_checksum(data: &[u8], expected: u32) -> bool {
    compute_checksum(data) == expected
}

/// Header line for `body`, without the trailing newline.
pub fn header_for(body: &[u8]) -> String {
    format!("{}{:08x}", HEADER_PREFIX, compute_checksum(body))
}

/// Parses a header line back to its checksum.
pub fn parse_header(line: &str) -> Option<u32> {
    let hex = line.trim_end().strip_prefix(HEADER_PREFIX)?;
    u32::from_str_radix(hex, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_deterministic() {
        let data = b"staging state";
        assert_eq!(compute_checksum(data), compute_checksum(data));
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let mut data = vec![0x00, 0x01, 0x02, 0x03, 0x04];
        let original = compute_checksum(&data);
        data[2] ^= 0x01;
        assert!(!verify_checksum(&data, original));
    }

    #[test]
    fn test_header_round_trip() {
        let body = br#"{"versions":{}}"#;
        let header = header_for(body);
        assert!(header.starts_with("crc32:"));
        assert_eq!(header.len(), "crc32:".len() + 8);
        assert_eq!(parse_header(&header), Some(compute_checksum(body)));
        assert_eq!(parse_header("sha1:abcd"), None);
        assert_eq!(parse_header("crc32:zz"), None);
    }
}
