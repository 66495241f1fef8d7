//! Build metadata exchanged in the version-check handshake.
//!
//! Every peer carries a [`BuildInfo`]. The host compares a joining peer's
//! build hash against its own and may remove peers running different code.

use bitcode::{Decode, Encode};

/// Version of the session protocol. Bumped whenever a payload layout changes.
pub const PROTOCOL_VERSION: u16 = 1;

/// Identity of a running build.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct BuildInfo {
    /// Human-readable version tag (e.g. "0.1.0")
    pub version: String,

    /// Protocol version this build speaks
    pub protocol: u16,

    /// xxHash3 of the version tag and protocol version
    ///
    /// Two peers with equal hashes are running compatible builds.
    pub build_hash: u64,
}

impl BuildInfo {
    /// Build info for an arbitrary version tag.
    pub fn new(version: &str, protocol: u16) -> Self {
        Self {
            version: version.to_string(),
            protocol,
            build_hash: Self::fingerprint(version, protocol),
        }
    }

    /// Build info of this binary.
    pub fn current() -> Self {
        Self::new(env!("CARGO_PKG_VERSION"), PROTOCOL_VERSION)
    }

    /// Hash a version tag together with a protocol version.
    pub fn fingerprint(version: &str, protocol: u16) -> u64 {
        let mut bytes = Vec::with_capacity(version.len() + 2);
        bytes.extend_from_slice(version.as_bytes());
        bytes.extend_from_slice(&protocol.to_le_bytes());
        xxhash_rust::xxh3::xxh3_64(&bytes)
    }

    /// Check whether a peer's build can share a session with this one.
    pub fn validate_compatibility(&self, peer_hash: u64) -> Result<(), BuildMismatch> {
        if self.build_hash != peer_hash {
            return Err(BuildMismatch {
                local: self.build_hash,
                peer: peer_hash,
            });
        }
        Ok(())
    }
}

/// Two builds disagree on their fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("build hash mismatch: local {local:016x}, peer {peer:016x}")]
pub struct BuildMismatch {
    pub local: u64,
    pub peer: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_stable() {
        let a = BuildInfo::new("1.2.3", 1);
        let b = BuildInfo::new("1.2.3", 1);
        assert_eq!(a.build_hash, b.build_hash);
        assert!(a.validate_compatibility(b.build_hash).is_ok());
    }

    #[test]
    fn test_protocol_changes_hash() {
        let a = BuildInfo::new("1.2.3", 1);
        let b = BuildInfo::new("1.2.3", 2);
        assert_ne!(a.build_hash, b.build_hash);
    }

    #[test]
    fn test_mismatch_reported() {
        let local = BuildInfo::new("1.2.3", 1);
        let peer = BuildInfo::new("1.2.4", 1);
        let err = local.validate_compatibility(peer.build_hash).unwrap_err();
        assert_eq!(err.local, local.build_hash);
        assert_eq!(err.peer, peer.build_hash);
        assert!(err.to_string().contains("mismatch"));
    }

    #[test]
    fn test_current_uses_protocol_version() {
        assert_eq!(BuildInfo::current().protocol, PROTOCOL_VERSION);
    }
}
