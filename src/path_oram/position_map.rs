//! The position map: `addr -> leaf` mapping maintained by Path ORAM,
//! either held locally or recursively delegated to another Path ORAM.

use crate::Address;
use rand::{CryptoRng, Rng, RngCore};
use std::collections::HashMap;

/// Base case: a local `addr -> leaf` mapping. A miss fabricates a fresh
/// random leaf for the old position — sound for cost accounting, but means
/// a never-before-seen address has no real "old" leaf (see the crate-level
/// open-question note this mirrors from the reference implementation).
pub struct LocalPositionMap {
    num_leaves: u64,
    leaves: HashMap<Address, u64>,
}

impl LocalPositionMap {
    /// Creates a local position map over `num_leaves` possible leaves.
    pub fn new(num_leaves: u64) -> Self {
        Self {
            num_leaves,
            leaves: HashMap::new(),
        }
    }

    /// Returns `(old_leaf, new_leaf)` for `addr`, rerandomizing the slot on
    /// every access.
    pub fn access<R: RngCore + CryptoRng>(&mut self, addr: Address, rng: &mut R) -> (u64, u64) {
        let old_leaf = *self
            .leaves
            .entry(addr)
            .or_insert_with(|| rng.gen_range(0..self.num_leaves));
        let new_leaf = rng.gen_range(0..self.num_leaves);
        self.leaves.insert(addr, new_leaf);
        (old_leaf, new_leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn repeated_access_rerandomizes_the_slot() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut map = LocalPositionMap::new(1024);
        let (_, first_new) = map.access(7, &mut rng);
        let (second_old, _) = map.access(7, &mut rng);
        assert_eq!(first_new, second_old);
    }
}
