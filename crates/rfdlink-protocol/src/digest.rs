//! 128-bit content digests guarding each image chunk.
//!
//! The sender transmits the MD5 of every chunk as 32 lowercase hex characters
//! immediately before the chunk body.

use crate::constants::DIGEST_LEN;
use crate::error::{ProtocolError, ProtocolResult};

/// Hex-encoded 128-bit digest of a chunk, as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkDigest([u8; DIGEST_LEN]);

impl ChunkDigest {
    /// Compute the digest of a chunk body.
    pub fn compute(data: &[u8]) -> Self {
        let hex = format!("{:x}", md5::compute(data));
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(hex.as_bytes());
        ChunkDigest(out)
    }

    /// Take a digest from received bytes.
    pub fn from_wire(bytes: &[u8]) -> ProtocolResult<Self> {
        let out: [u8; DIGEST_LEN] = bytes.try_into().map_err(|_| ProtocolError::MalformedDigest {
            expected: DIGEST_LEN,
            actual: bytes.len(),
        })?;
        Ok(ChunkDigest(out))
    }

    /// The 32 ASCII bytes sent on the wire.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Byte-for-byte comparison against received digest bytes.
    pub fn matches(&self, received: &[u8]) -> bool {
        self.0.as_slice() == received
    }
}

impl std::fmt::Display for ChunkDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let digest = ChunkDigest::compute(b"");
        assert_eq!(digest.as_bytes(), b"d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(digest.to_string(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_matches_is_exact() {
        let digest = ChunkDigest::compute(b"chunk body");
        assert!(digest.matches(digest.as_bytes()));
        assert!(!digest.matches(&digest.as_bytes()[..31]));
        assert!(!digest.matches(ChunkDigest::compute(b"chunk bodY").as_bytes()));
    }

    #[test]
    fn test_from_wire_requires_full_length() {
        assert!(ChunkDigest::from_wire(&[b'0'; 31]).is_err());
        let digest = ChunkDigest::from_wire(&[b'0'; 32]).unwrap();
        assert!(digest.matches(&[b'0'; 32]));
    }
}
