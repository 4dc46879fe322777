//! State Hashing for Verification
//!
//! Provides deterministic hashing of world state for:
//! - Per-tick checkpoints compared by the run verifier
//! - The progressive hash chain
//! - Config snapshot digests
//!
//! The canonical serialization is little-endian, fixed field order, and
//! domain-separated by the engine version. Any change to what gets fed into
//! a [`StateHasher`] for world state requires an engine version bump.

use sha2::{Sha256, Digest};
use super::fixed::Fixed;
use super::vec2::FixedVec2;

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Chain value at tick -1.
pub const CHAIN_SEED: u32 = 0x9E37_79B9;

const STATE_DOMAIN: &[u8] = b"BASTION_STATE_V1";
const CHAIN_DOMAIN: &[u8] = b"BASTION_CHAIN_V1";

/// Deterministic hasher for world state.
///
/// Wraps SHA-256 with helpers for fixed-point types.
/// Order of updates is critical for determinism.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for world state of the given engine version.
    pub fn for_world_state(engine_version: u32) -> Self {
        let mut hasher = Self::new(STATE_DOMAIN);
        hasher.update_u32(engine_version);
        hasher
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u16 value (little-endian).
    #[inline]
    pub fn update_u16(&mut self, value: u16) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i32 value (little-endian).
    #[inline]
    pub fn update_i32(&mut self, value: i32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a Fixed value.
    #[inline]
    pub fn update_fixed(&mut self, value: Fixed) {
        self.update_i32(value.raw());
    }

    /// Update with a FixedVec2.
    #[inline]
    pub fn update_vec2(&mut self, value: FixedVec2) {
        self.update_fixed(value.x);
        self.update_fixed(value.y);
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with an optional u32: presence byte, then the value or nothing.
    #[inline]
    pub fn update_opt_u32(&mut self, value: Option<u32>) {
        match value {
            Some(v) => {
                self.update_u8(1);
                self.update_u32(v);
            }
            None => self.update_u8(0),
        }
    }

    /// Update with a length prefix for a variable-length section.
    #[inline]
    pub fn update_len(&mut self, len: usize) {
        self.update_u32(len as u32);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }

    /// Finalize and truncate to 32 bits.
    pub fn finalize32(self) -> u32 {
        hash32(&self.finalize())
    }
}

/// Truncate a digest to its first four bytes, read little-endian.
#[inline]
pub fn hash32(digest: &StateHash) -> u32 {
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Compute hash with domain separator.
pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> StateHash {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    hasher.finalize().into()
}

/// Fold one tick hash into the chain.
///
/// `chain(t) = trunc32(sha256(domain || chain(t-1) || hash(t)))`.
pub fn chain_mix(prev_chain: u32, tick_hash: u32) -> u32 {
    let mut hasher = StateHasher::new(CHAIN_DOMAIN);
    hasher.update_u32(prev_chain);
    hasher.update_u32(tick_hash);
    hasher.finalize32()
}

/// Compute the 32-bit state hash of one tick.
///
/// The closure adds state-specific data after the tick and seed.
pub fn compute_state_hash<F>(engine_version: u32, tick: u32, seed: i32, add_state: F) -> u32
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::for_world_state(engine_version);

    // Always hash tick and seed first
    hasher.update_u32(tick);
    hasher.update_i32(seed);

    add_state(&mut hasher);

    hasher.finalize32()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_hasher_determinism() {
        let make_hash = || {
            let mut hasher = StateHasher::for_world_state(1);
            hasher.update_u32(100);
            hasher.update_u64(12345);
            hasher.update_fixed(Fixed::from_milli(5500));
            hasher.update_vec2(FixedVec2::from_ints(1, 2));
            hasher.update_bool(true);
            hasher.finalize()
        };

        assert_eq!(make_hash(), make_hash());
    }

    #[test]
    fn test_hash_order_matters() {
        let hash1 = {
            let mut h = StateHasher::new(b"test");
            h.update_u32(1);
            h.update_u32(2);
            h.finalize()
        };

        let hash2 = {
            let mut h = StateHasher::new(b"test");
            h.update_u32(2);
            h.update_u32(1);
            h.finalize()
        };

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_engine_version_separates_domains() {
        let a = compute_state_hash(1, 10, 42, |h| h.update_u32(7));
        let b = compute_state_hash(2, 10, 42, |h| h.update_u32(7));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash32_is_little_endian_prefix() {
        // sha256("abc") starts with ba 78 16 bf
        let digest = hash_with_domain(b"", b"abc");
        assert_eq!(hash32(&digest), 0xBF16_78BA);
    }

    #[test]
    fn test_chain_mix_known_value() {
        assert_eq!(chain_mix(CHAIN_SEED, 0), 749_229_819);
    }

    #[test]
    fn test_chain_mix_depends_on_history() {
        let a = chain_mix(chain_mix(CHAIN_SEED, 1), 2);
        let b = chain_mix(chain_mix(CHAIN_SEED, 3), 2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_optional_encoding_is_unambiguous() {
        let none = {
            let mut h = StateHasher::new(b"t");
            h.update_opt_u32(None);
            h.update_u32(0);
            h.finalize()
        };
        let some_zero = {
            let mut h = StateHasher::new(b"t");
            h.update_opt_u32(Some(0));
            h.finalize()
        };
        assert_ne!(none, some_zero);
    }
}
