//! Blake3 content fingerprints for duplicate detection

use std::fmt;

use serde::{Deserialize, Serialize};

/// Hex-encoded blake3 hash of a source file's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of raw bytes.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(blake3::hash(data).to_hex().to_string())
    }

    /// Wrap a fingerprint read back from the sink.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 hex characters, for logs and tables.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_deterministic() {
        assert_eq!(Fingerprint::of_bytes(b"a,b\n"), Fingerprint::of_bytes(b"a,b\n"));
    }

    #[test]
    fn fingerprint_different_input() {
        assert_ne!(Fingerprint::of_bytes(b"hello"), Fingerprint::of_bytes(b"world"));
    }

    #[test]
    fn fingerprint_is_full_hex() {
        let fp = Fingerprint::of_bytes(b"test");
        assert_eq!(fp.as_str().len(), 64);
        assert_eq!(fp.short().len(), 8);
    }
}
