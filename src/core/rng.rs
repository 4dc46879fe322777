//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ algorithm for fast, high-quality, deterministic randomness.
//! Given the same seed, produces identical sequence on all platforms.
//!
//! The simulation owns exactly one generator per run. Every draw happens at a
//! documented point of the tick pipeline (see `game::tick`), so the stream
//! position is itself part of the hashed world state.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use super::fixed::Fixed;

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Determinism Guarantee
///
/// Given the same seed, this RNG will produce the exact same sequence
/// of random numbers on any platform (x86, ARM, WASM).
///
/// # Example
///
/// ```
/// use bastion::core::rng::DeterministicRng;
///
/// let mut rng = DeterministicRng::new(12345);
/// let value = rng.next_u64();
/// assert_eq!(value, 6233086606872742541); // Always the same!
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Create the simulation RNG from a run seed.
    ///
    /// Run seeds travel as `int32` on the wire; the bit pattern is
    /// zero-extended so negative seeds are valid and distinct.
    pub fn from_run_seed(seed: i32) -> Self {
        Self::new(seed as u32 as u64)
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random integer in range [0, max).
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        // Simple modulo - slight bias for very large max, but acceptable
        (self.next_u64() % max as u64) as u32
    }

    /// Generate a random Fixed in range [0, max).
    ///
    /// Always consumes exactly one draw, even when `max` is not positive.
    #[inline]
    pub fn next_fixed(&mut self, max: Fixed) -> Fixed {
        // Use upper 32 bits to avoid overflow in multiplication
        let raw = (self.next_u64() >> 32) as i64;
        if !max.is_positive() {
            return Fixed::ZERO;
        }
        // Scale to [0, max) range: (raw * max) / 2^32
        Fixed::from_raw(((raw * max.raw() as i64) >> 32) as i32)
    }

    /// Generate a random Fixed in range [min, max).
    #[inline]
    pub fn next_fixed_range(&mut self, min: Fixed, max: Fixed) -> Fixed {
        min + self.next_fixed(max - min)
    }

    /// Roll a chance given in whole percent. One draw.
    #[inline]
    pub fn next_percent(&mut self, percent: u32) -> bool {
        self.next_int(100) < percent
    }

    /// Shuffle a slice in place using Fisher-Yates algorithm.
    ///
    /// Consumes `len - 1` draws.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        let len = slice.len();
        for i in (1..len).rev() {
            let j = self.next_int((i + 1) as u32) as usize;
            slice.swap(i, j);
        }
    }

    /// Get current state (for hashing).
    pub fn state(&self) -> [u64; 2] {
        self.state
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

fn digest_prefix_u64(hasher: Sha256) -> u64 {
    let hash = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(prefix)
}

/// Derive a run seed from a server secret and the run id.
///
/// The result cannot be predicted without the secret and is stable for
/// a given run, so re-issuing a credential never changes the seed.
pub fn derive_run_seed(secret: &[u8], run_id: &[u8; 16]) -> i32 {
    let mut hasher = Sha256::new();
    hasher.update(b"BASTION_SEED_V1");
    hasher.update(secret);
    hasher.update(run_id);
    digest_prefix_u64(hasher) as u32 as i32
}

/// Derive the generator used to pick audit ticks for a run.
///
/// Kept separate from the simulation stream: the client never sees this
/// generator's seed.
pub fn audit_rng(secret: &[u8], run_id: &[u8; 16]) -> DeterministicRng {
    let mut hasher = Sha256::new();
    hasher.update(b"BASTION_AUDIT_V1");
    hasher.update(secret);
    hasher.update(run_id);
    DeterministicRng::new(digest_prefix_u64(hasher))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_determinism() {
        // Same seed must produce same sequence
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(12345);

        for _ in 0..1000 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_rng_known_values() {
        // These values must never change!
        // If they do, every recorded run stops replaying.
        let mut rng = DeterministicRng::new(42);
        assert_eq!(rng.next_u64(), 16629283624882167704);
        assert_eq!(rng.next_u64(), 1420492921613871959);
        assert_eq!(rng.next_u64(), 9768315062676884790);
    }

    #[test]
    fn test_run_seed_sign_extension() {
        // Negative seeds map to the upper half of the u32 range, not to u64::MAX-ish values
        let neg = DeterministicRng::from_run_seed(-1);
        assert_eq!(neg, DeterministicRng::new(0xFFFF_FFFF));
        assert_eq!(DeterministicRng::from_run_seed(42), DeterministicRng::new(42));
    }

    #[test]
    fn test_next_int() {
        let mut rng = DeterministicRng::new(1234);

        for _ in 0..1000 {
            assert!(rng.next_int(100) < 100);
        }

        // Edge cases
        assert_eq!(rng.next_int(0), 0);
        assert_eq!(rng.next_int(1), 0);
    }

    #[test]
    fn test_next_fixed() {
        let mut rng = DeterministicRng::new(9999);

        let max = Fixed::from_int(100);
        for _ in 0..1000 {
            let val = rng.next_fixed(max);
            assert!(val >= Fixed::ZERO && val < max);
        }
    }

    #[test]
    fn test_next_fixed_consumes_one_draw_when_empty() {
        let mut a = DeterministicRng::new(3);
        let mut b = DeterministicRng::new(3);
        assert_eq!(a.next_fixed(Fixed::ZERO), Fixed::ZERO);
        b.next_u64();
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn test_shuffle_determinism() {
        let mut rng1 = DeterministicRng::new(1111);
        let mut rng2 = DeterministicRng::new(1111);

        let mut arr1 = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let mut arr2 = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];

        rng1.shuffle(&mut arr1);
        rng2.shuffle(&mut arr2);

        assert_eq!(arr1, arr2);

        let mut sorted = arr1;
        sorted.sort();
        assert_eq!(sorted, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_draw_counts() {
        // shuffle takes len - 1 draws, a percent roll takes one
        let mut a = DeterministicRng::new(77);
        let mut b = DeterministicRng::new(77);
        let mut pool = [0u8; 5];
        a.shuffle(&mut pool);
        a.next_percent(50);
        for _ in 0..5 {
            b.next_u64();
        }
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn test_derive_run_seed() {
        let run_a = [1u8; 16];
        let run_b = [2u8; 16];

        assert_eq!(derive_run_seed(b"secret", &run_a), derive_run_seed(b"secret", &run_a));
        assert_ne!(derive_run_seed(b"secret", &run_a), derive_run_seed(b"secret", &run_b));
        assert_ne!(derive_run_seed(b"secret", &run_a), derive_run_seed(b"other", &run_a));
    }
}
