//! Counter-mode Path ORAM: a closed-form access count, no tree or stash
//! materialized.

use crate::utils::{self, next_power_of_two_geq};

/// Counter-mode base case: a local position map costs nothing.
pub struct CounterLocalPositionMap;

impl CounterLocalPositionMap {
    /// Every access to a local position map is free.
    pub fn count_accesses(&self) -> u64 {
        0
    }
}

enum CounterPositionMap {
    Local(CounterLocalPositionMap),
    Recursive(Box<CounterPathOram>),
}

/// A counter-mode Path ORAM: models the same tree-depth and position-map
/// recursion as [`super::PathOram`], but exposes only a closed-form access
/// count rather than simulating any accesses.
pub struct CounterPathOram {
    number_of_levels: u32,
    z: usize,
    local: bool,
    pos_map: CounterPositionMap,
}

impl CounterPathOram {
    /// Builds the counter-mode model for the same parameters as
    /// [`super::PathOram::new`].
    pub fn new(n: u64, server_block_bytes: usize, z: usize, element_size: usize, local_memory_capacity: u64) -> Self {
        let rounded_n = next_power_of_two_geq(n);
        let number_of_levels = rounded_n.ilog2() + 1;
        let local = n < local_memory_capacity;

        let pos_map = if local {
            CounterPositionMap::Local(CounterLocalPositionMap)
        } else {
            let leaf_bytes = utils::leaf_label_bytes(rounded_n);
            let pos_map_n = rounded_n.div_ceil((server_block_bytes / leaf_bytes).max(1) as u64);
            let inner = CounterPathOram::new(pos_map_n, server_block_bytes, z, leaf_bytes, local_memory_capacity);
            CounterPositionMap::Recursive(Box::new(inner))
        };

        Self {
            number_of_levels,
            z,
            local,
            pos_map,
        }
    }

    /// The total number of remote-memory accesses incurred by one logical
    /// access of this Path ORAM: `2` (read + write-back) per bucket on the
    /// path, times `Z` blocks per bucket, plus whatever the position map
    /// recursion costs. Zero if this instance is entirely local.
    pub fn count_accesses(&self) -> u64 {
        if self.local {
            return 0;
        }
        let pos_map_cost = match &self.pos_map {
            CounterPositionMap::Local(m) => m.count_accesses(),
            CounterPositionMap::Recursive(inner) => inner.count_accesses(),
        };
        2 * self.number_of_levels as u64 * self.z as u64 + pos_map_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_tree_costs_nothing() {
        let oram = CounterPathOram::new(4, 256, 4, 32, 8);
        assert_eq!(oram.count_accesses(), 0);
    }

    #[test]
    fn recursive_tree_costs_more_than_one_level_alone() {
        let oram = CounterPathOram::new(1024, 256, 4, 32, 2);
        let single_level_estimate = 2 * (oram.number_of_levels as u64) * 4;
        assert!(oram.count_accesses() > single_level_estimate);
    }
}
