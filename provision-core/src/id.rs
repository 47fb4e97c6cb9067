use curve25519_dalek::edwards::CompressedEdwardsY;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::ops::Deref;

// ObjectId names everything addressable on a ledger: caller identities,
// logic modules, factories, spawned instances and proxies.
// It is a 32 byte identifier; the all-zero value is the null identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId([u8; 32]);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Format as a hex string with a prefix of the first 6 bytes
        let prefix = hex::encode(&self.0[0..6]);
        write!(f, "obj:{}", prefix)
    }
}

impl Ord for ObjectId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for ObjectId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Deref for ObjectId {
    type Target = [u8; 32];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ObjectId {
    pub fn new(uid: [u8; 32]) -> Self {
        ObjectId(uid)
    }

    /// The null identity. Lookups that find nothing return this.
    pub const fn null() -> Self {
        ObjectId([0; 32])
    }

    /// Check whether this is the null identity
    pub fn is_null(&self) -> bool {
        self.0 == [0; 32]
    }

    /// Get a reference to the internal bytes
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    /// Identity for a named account, e.g. a test signer or an operator key label.
    pub fn from_label(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"PROVISION_Identity");
        hasher.update(label.as_bytes());
        ObjectId(hasher.finalize().into())
    }

    pub fn create_object_id(seeds: &[&[u8]], bump: u8) -> [u8; 32] {
        let mut hasher = Sha256::new();

        // Domain separator
        hasher.update(b"PROVISION_Object");

        for seed in seeds {
            hasher.update(seed);
        }

        hasher.update([bump]);

        hasher.finalize().into()
    }

    /// Verify that a 32-byte array is not a valid point on the ed25519 curve
    ///
    /// Derived objects must be off-curve so that no signing key exists for them.
    pub fn is_off_curve(bytes: &[u8; 32]) -> bool {
        let Ok(compressed_edwards_y) = CompressedEdwardsY::from_slice(bytes.as_ref()) else {
            return true;
        };
        compressed_edwards_y.decompress().is_none()
    }

    /// Try to find an off-curve ObjectId for the given seeds
    pub fn find_uid(seeds: &[&[u8]]) -> Option<(ObjectId, u8)> {
        for bump in 0..255 {
            let id = ObjectId::create_object_id(seeds, bump);
            if ObjectId::is_off_curve(&id) {
                return Some((ObjectId(id), bump));
            }
        }
        None
    }
}

/// Content fingerprint used as a registry key (SHA-256 of the document bytes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn new(hash: [u8; 32]) -> Self {
        Fingerprint(hash)
    }

    /// Fingerprint arbitrary content
    pub fn digest(content: &[u8]) -> Self {
        Fingerprint(Sha256::digest(content).into())
    }

    pub fn bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}
