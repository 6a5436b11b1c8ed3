//! Source file fingerprinting
//!
//! The SHA-256 of each input file is recorded in the quality report so a
//! reader can tell which exact export a set of numbers came from.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identity of one input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFingerprint {
    /// File name as given (not canonicalized, so reports stay portable)
    pub path: String,
    /// Lowercase hex SHA-256 of the file contents
    pub sha256: String,
    /// File size in bytes
    pub bytes: u64,
}

impl SourceFingerprint {
    /// Fingerprint of file content already read into memory
    pub fn of_bytes(label: &str, content: &[u8]) -> Self {
        Self {
            path: label.to_string(),
            sha256: format!("{:x}", Sha256::digest(content)),
            bytes: content.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_of_known_content() {
        let fp = SourceFingerprint::of_bytes("permits.csv", b"permitNumber\nA-1\n");

        assert_eq!(fp.path, "permits.csv");
        assert_eq!(fp.bytes, 17);
        assert_eq!(fp.sha256.len(), 64);
        assert!(fp.sha256.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_one_byte_changes_hash() {
        let a = SourceFingerprint::of_bytes("a", b"value\n100\n");
        let b = SourceFingerprint::of_bytes("a", b"value\n101\n");
        assert_ne!(a.sha256, b.sha256);
    }
}
