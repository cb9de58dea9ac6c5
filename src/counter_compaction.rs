//! Counter-mode compaction: simulates the I/O shape of
//! [`crate::compaction::compact`] without materializing element contents.

use crate::{counter_bin_packing::counter_bin_pack, counter_memory::CounterMemory, utils};

/// Simulates compacting `n` logical elements (in `ceil(n/b)` cells) down to
/// `ceil(n0/b)` dense output cells.
pub fn counter_compact(n: u64, b: usize, n0: u64) -> CounterMemory {
    let size_of_x = utils::ceil_div(n, b as u64);
    let c = utils::choose_c(n, b as u64);
    let size_of_compact_array = utils::ceil_div(n0, b as u64) as usize;

    let x_prime = CounterMemory::new(b, c as usize, false);
    // One read per processed input block, two writes (the two tagged
    // halves) per processed input block.
    x_prime.add_read_operations(size_of_x);
    x_prime.add_write_operations(2 * size_of_x);
    // Padding the remaining cells up to C.
    x_prime.add_write_operations(c - 2 * size_of_x);

    let (_buckets, _delta) = counter_bin_pack(n, b, false);

    let new_array = CounterMemory::new(b, size_of_compact_array, false);
    // Sequentially reading every bucket, writing every output block.
    new_array.add_read_operations(c);
    new_array.add_write_operations(size_of_compact_array as u64);

    new_array
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_real_compaction_total_shape() {
        crate::reset_counters();
        let out = counter_compact(4, 4, 8);
        assert_eq!(out.memory_size(), 2);
        assert!(crate::current_counts().counter_total() > 0);
    }
}
