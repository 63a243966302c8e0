//! State Hashing
//!
//! SHA-256 over simulation state, used to check that two runs with the same
//! seed, content and host commands stayed in lockstep.
//!
//! Values are written through [`Hashable`], which fixes their byte layout
//! (little-endian integers, floats by bit pattern, length-prefixed strings).
//! Write order is part of the hash.

use sha2::{Digest, Sha256};

use super::vec2::Vec2;

/// 256-bit state digest.
pub type StateHash = [u8; 32];

const WORLD_DOMAIN: &[u8] = b"IRONHAVEN_WORLD_V1";

/// A value with a fixed byte layout for hashing.
pub trait Hashable {
    /// Feed this value to `hasher`.
    fn hash_to(&self, hasher: &mut StateHasher);
}

/// Incremental state hasher with a domain prefix.
pub struct StateHasher {
    inner: Sha256,
}

impl StateHasher {
    /// Hasher for `domain`; different domains never collide on equal data.
    pub fn new(domain: &[u8]) -> Self {
        let mut inner = Sha256::new();
        inner.update((domain.len() as u32).to_le_bytes());
        inner.update(domain);
        Self { inner }
    }

    /// Write a value.
    #[inline]
    pub fn write<T: Hashable + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.hash_to(self);
        self
    }

    /// Write an optional value, tagged so `None` differs from any `Some`.
    pub fn write_opt<T: Hashable>(&mut self, value: Option<&T>) -> &mut Self {
        match value {
            Some(v) => self.write(&1u8).write(v),
            None => self.write(&0u8),
        }
    }

    #[inline]
    fn raw(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    /// Finish and return the digest.
    pub fn finalize(self) -> StateHash {
        self.inner.finalize().into()
    }
}

macro_rules! hashable_int {
    ($($t:ty),*) => {$(
        impl Hashable for $t {
            #[inline]
            fn hash_to(&self, hasher: &mut StateHasher) {
                hasher.raw(&self.to_le_bytes());
            }
        }
    )*};
}

hashable_int!(u8, u32, u64, i32);

impl Hashable for f32 {
    #[inline]
    fn hash_to(&self, hasher: &mut StateHasher) {
        hasher.raw(&self.to_bits().to_le_bytes());
    }
}

impl Hashable for bool {
    #[inline]
    fn hash_to(&self, hasher: &mut StateHasher) {
        hasher.raw(&[*self as u8]);
    }
}

impl Hashable for str {
    fn hash_to(&self, hasher: &mut StateHasher) {
        hasher.write(&(self.len() as u32));
        hasher.raw(self.as_bytes());
    }
}

impl Hashable for Vec2 {
    #[inline]
    fn hash_to(&self, hasher: &mut StateHasher) {
        hasher.write(&self.x).write(&self.y);
    }
}

/// Hash one frame of world state.
///
/// The frame number goes in first; `add_state` writes the rest.
pub fn compute_state_hash<F>(frame: u64, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::new(WORLD_DOMAIN);
    hasher.write(&frame);
    add_state(&mut hasher);
    hasher.finalize()
}

/// Short hex prefix of a hash, for log lines.
pub fn short_hex(hash: &StateHash) -> String {
    hex::encode(&hash[..8])
}

/// Per-frame hashes of one run, for comparing against another run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HashTrail {
    hashes: Vec<StateHash>,
}

impl HashTrail {
    /// Empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the next frame's hash.
    pub fn push(&mut self, hash: StateHash) {
        self.hashes.push(hash);
    }

    /// Frames recorded.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// No frames recorded.
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Most recent hash.
    pub fn last(&self) -> Option<&StateHash> {
        self.hashes.last()
    }

    /// First frame at which the two trails differ.
    ///
    /// A trail that stops early diverges where it stops.
    pub fn divergence(&self, other: &HashTrail) -> Option<usize> {
        let common = self.hashes.len().min(other.hashes.len());
        (0..common)
            .find(|&i| self.hashes[i] != other.hashes[i])
            .or_else(|| (self.hashes.len() != other.hashes.len()).then_some(common))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(frame: u64) -> StateHash {
        compute_state_hash(frame, |h| {
            h.write(&7u32).write(&5.5f32).write(&Vec2::new(1.0, 2.0)).write("grasslands");
        })
    }

    #[test]
    fn test_same_writes_same_hash() {
        assert_eq!(sample(3), sample(3));
        assert_ne!(sample(3), sample(4));
    }

    #[test]
    fn test_write_order_matters() {
        let a = compute_state_hash(0, |h| {
            h.write(&1u32).write(&2u32);
        });
        let b = compute_state_hash(0, |h| {
            h.write(&2u32).write(&1u32);
        });
        assert_ne!(a, b);
    }

    #[test]
    fn test_option_tagging() {
        let none = compute_state_hash(0, |h| {
            h.write_opt::<u8>(None);
        });
        let zero = compute_state_hash(0, |h| {
            h.write_opt(Some(&0u8));
        });
        assert_ne!(none, zero);
    }

    #[test]
    fn test_domains_are_separate() {
        let a = StateHasher::new(b"A").finalize();
        let b = StateHasher::new(b"B").finalize();
        assert_ne!(a, b);
    }

    #[test]
    fn test_trail_divergence() {
        let mut a = HashTrail::new();
        let mut b = HashTrail::new();
        for frame in 0..5 {
            a.push(sample(frame));
            b.push(sample(if frame == 3 { 99 } else { frame }));
        }
        assert_eq!(a.divergence(&b), Some(3));
        assert_eq!(a.divergence(&a.clone()), None);

        let mut short = HashTrail::new();
        short.push(sample(0));
        assert_eq!(a.divergence(&short), Some(1));
        assert_eq!(short_hex(&sample(0)).len(), 16);
    }
}
