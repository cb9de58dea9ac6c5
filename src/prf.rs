//! A keyed pseudorandom function used to compute destination bins.
//!
//! Per the design notes, any keyed PRF returning a uniform integer mod `C`
//! is acceptable; the choice of PRF affects only the distribution of
//! overflows, not costs. This crate uses HMAC-SHA256, matching the
//! reference implementation's `hmac.new(secret_key, ..., sha256)`.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// A 256-bit secret key for the bin-assignment PRF.
#[derive(Clone, Copy)]
pub struct PrfKey([u8; 32]);

impl PrfKey {
    /// Draws a fresh random key from `rng`.
    pub fn random(rng: &mut impl RngCore) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Returns `PRF_k(addr) mod modulus`.
    pub fn bin_of(&self, addr: u64, modulus: u64) -> u64 {
        debug_assert!(modulus > 0);
        let mut mac = HmacSha256::new_from_slice(&self.0).expect("HMAC accepts any key length");
        mac.update(&addr.to_be_bytes());
        let digest = mac.finalize().into_bytes();
        let value = u64::from_be_bytes(digest[0..8].try_into().unwrap());
        value % modulus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn bin_of_is_deterministic_for_a_fixed_key() {
        let mut rng = StdRng::seed_from_u64(7);
        let key = PrfKey::random(&mut rng);
        let a = key.bin_of(42, 16);
        let b = key.bin_of(42, 16);
        assert_eq!(a, b);
        assert!(a < 16);
    }

    #[test]
    fn bin_of_varies_with_key() {
        let mut rng = StdRng::seed_from_u64(1);
        let k1 = PrfKey::random(&mut rng);
        let k2 = PrfKey::random(&mut rng);
        // Not a correctness property, but with independent random keys the
        // two bins should differ far more often than not across many addrs.
        let mismatches = (0u64..64)
            .filter(|&a| k1.bin_of(a, 1 << 20) != k2.bin_of(a, 1 << 20))
            .count();
        assert!(mismatches > 32);
    }
}
