// Copyright (c) 2024 Mike Tsao

//! Provides the random-number generator that drives the voices' musical
//! choices.

use byteorder::{BigEndian, ByteOrder};
use delegate::delegate;

/// A pseudorandom number generator (PRNG) for applications such as
/// digital-audio libraries that don't require cryptographically secure random
/// numbers.
#[derive(Debug)]
pub struct Rng(oorandom::Rand64);
#[allow(missing_docs)]
impl Rng {
    /// Pass the same number to [Rng::new_with_seed()] to get the same stream
    /// back again. Good for reproducing a performance.
    pub fn new_with_seed(seed: u128) -> Self {
        Self(oorandom::Rand64::new(seed))
    }

    /// Create a sufficiently high-quality random number that's suitable for
    /// [Rng].
    pub fn generate_seed() -> anyhow::Result<u128> {
        let mut bytes = [0u8; 16];

        getrandom::getrandom(&mut bytes)?;
        Ok(BigEndian::read_u128(&bytes))
    }

    /// Returns an independent stream derived from a parent seed. Each voice
    /// gets its own stream, so adding a random choice to one voice doesn't
    /// change what the others play.
    pub fn new_for_stream(seed: u128, stream: u64) -> Self {
        let mut bytes = [0u8; 16];
        BigEndian::write_u64(&mut bytes[..8], stream.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        BigEndian::write_u64(&mut bytes[8..], stream);
        Self::new_with_seed(seed ^ BigEndian::read_u128(&bytes))
    }

    delegate! {
        to self.0 {
            pub fn rand_u64(&mut self) -> u64;
            pub fn rand_float(&mut self) -> f64;
            pub fn rand_range(&mut self, range: core::ops::Range<u64>) -> u64;
        }
    }

    /// Returns true with the given probability.
    pub fn chance(&mut self, probability: f64) -> bool {
        self.rand_float() < probability
    }

    /// Picks a uniformly random index into a collection of `len` items. `len`
    /// must be nonzero.
    pub fn index(&mut self, len: usize) -> usize {
        self.rand_range(0..len.max(1) as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use more_asserts::assert_lt;

    #[test]
    fn mainline() {
        let mut r = Rng::new_with_seed(Rng::generate_seed().unwrap());
        assert_ne!(r.rand_u64(), r.rand_u64());
    }

    #[test]
    fn reproducible_stream() {
        let mut r1 = Rng::new_with_seed(1);
        let mut r2 = Rng::new_with_seed(2);
        assert!(
            (0..100).any(|_| r1.rand_u64() != r2.rand_u64()),
            "RNGs with different seeds should produce different streams."
        );

        let mut r1 = Rng::new_with_seed(1);
        let mut r2 = Rng::new_with_seed(1);
        assert!(
            (0..100).all(|_| r1.rand_u64() == r2.rand_u64()),
            "RNGs with same seeds should produce same streams."
        );
    }

    #[test]
    fn derived_streams_differ() {
        let mut a = Rng::new_for_stream(42, 0);
        let mut b = Rng::new_for_stream(42, 1);
        assert!((0..100).any(|_| a.rand_u64() != b.rand_u64()));

        let mut a = Rng::new_for_stream(42, 3);
        let mut b = Rng::new_for_stream(42, 3);
        assert!((0..100).all(|_| a.rand_u64() == b.rand_u64()));
    }

    #[test]
    fn helpers_stay_in_range() {
        let mut r = Rng::new_with_seed(7);
        for _ in 0..1000 {
            assert_lt!(r.index(5), 5);
        }
        assert!(!(0..100).any(|_| r.chance(0.0)));
        assert!((0..100).all(|_| r.chance(1.0)));
    }
}
