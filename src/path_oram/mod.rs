//! Path ORAM: a binary tree of buckets, a position map (local or
//! recursive), and a stash that absorbs blocks between path reads and
//! evictions.

pub mod counter;
pub mod position_map;

use crate::{
    counters,
    utils::{self, next_power_of_two_geq},
    Address, Operation, Payload, DUMMY_ADDR,
};
use position_map::LocalPositionMap;
use rand::{CryptoRng, RngCore};

/// One slot of tree/stash storage: either a real `(addr, value, leaf)`
/// triple or, when `addr == DUMMY_ADDR`, padding.
#[derive(Clone)]
struct PathSlot {
    addr: Address,
    value: Payload,
    leaf: u64,
}

impl PathSlot {
    fn dummy(payload_width: usize) -> Self {
        Self {
            addr: DUMMY_ADDR,
            value: vec![0u8; payload_width],
            leaf: 0,
        }
    }

    fn is_dummy(&self) -> bool {
        self.addr == DUMMY_ADDR
    }
}

/// The remote bucket tree: `memory_size` cells of `b` slots each, counted
/// against the real-memory counters unless `local`.
struct PathTree {
    cells: Vec<Vec<PathSlot>>,
    b: usize,
    local: bool,
}

impl PathTree {
    fn new(memory_size: usize, b: usize, local: bool) -> Self {
        let cells = (0..memory_size).map(|_| vec![PathSlot::dummy(1); b]).collect();
        Self { cells, b, local }
    }

    fn read_cell(&mut self, index: usize) -> Vec<PathSlot> {
        let block = self.cells[index].clone();
        if !self.local {
            counters::bump_real_read();
        }
        block
    }

    fn write_cell(&mut self, index: usize, block: Vec<PathSlot>) {
        debug_assert_eq!(block.len(), self.b);
        if !self.local {
            counters::bump_real_write();
        }
        self.cells[index] = block;
    }
}

/// Either a base-case local mapping, or a recursive Path ORAM whose own
/// stash entries each hold a packed list of `B` leaf labels.
enum PositionMap {
    Local(LocalPositionMap),
    Recursive(Box<PathOram>),
}

impl PositionMap {
    fn access<R: RngCore + CryptoRng>(&mut self, addr: Address, rng: &mut R) -> (u64, u64) {
        match self {
            PositionMap::Local(m) => m.access(addr, rng),
            PositionMap::Recursive(inner) => inner.pos_map_access(addr, rng),
        }
    }
}

/// A Path ORAM over `n` logical addresses (rounded up to a power of two),
/// each holding a value of `element_size` bytes, with bucket capacity `z`.
pub struct PathOram {
    n: u64,
    number_of_levels: u32,
    b: usize,
    z: usize,
    element_size: usize,
    upper_level_n: u64,
    tree: PathTree,
    stash: Vec<PathSlot>,
    pos_map: PositionMap,
}

impl PathOram {
    /// Builds a Path ORAM over `n` addresses (rounded up to a power of two),
    /// each element `element_size` bytes wide, server block size `server_block_bytes`
    /// (so `b = server_block_bytes / element_size` elements per block), bucket
    /// capacity `z`. Below `local_memory_capacity` server blocks the tree and
    /// position map are held locally; otherwise the position map recurses.
    pub fn new(
        n: u64,
        server_block_bytes: usize,
        z: usize,
        element_size: usize,
        local_memory_capacity: u64,
        upper_level_n: u64,
    ) -> Self {
        let rounded_n = next_power_of_two_geq(n);
        let b = (server_block_bytes / element_size).max(1);
        let number_of_levels = rounded_n.ilog2() + 1;
        let local = n < local_memory_capacity;

        let (pos_map, tree_local) = if local {
            (PositionMap::Local(LocalPositionMap::new(rounded_n)), true)
        } else {
            let leaf_bytes = utils::leaf_label_bytes(rounded_n);
            let pos_map_n = rounded_n.div_ceil((server_block_bytes / leaf_bytes).max(1) as u64);
            let inner = PathOram::new(
                pos_map_n,
                server_block_bytes,
                z,
                leaf_bytes,
                local_memory_capacity,
                rounded_n,
            );
            (PositionMap::Recursive(Box::new(inner)), false)
        };

        let tree = PathTree::new((2 * rounded_n as usize - 1) * z, b, tree_local);

        Self {
            n: rounded_n,
            number_of_levels,
            b,
            z,
            element_size,
            upper_level_n,
            tree,
            stash: Vec::new(),
            pos_map,
        }
    }

    fn read_path(&mut self, leaf: u64) -> Vec<PathSlot> {
        let mut path = Vec::with_capacity(self.number_of_levels as usize * self.z);
        for i in 0..self.number_of_levels {
            let starting_index = ((1u64 << i) - 1) as usize * self.z;
            let bucket_index = (leaf >> (self.number_of_levels - 1 - i)) as usize;
            let base_index = starting_index + bucket_index * self.z;
            for j in 0..self.z {
                path.extend(self.tree.read_cell(base_index + j));
            }
        }
        path
    }

    fn write_path(&mut self, buckets: Vec<Vec<PathSlot>>, leaf: u64) {
        for (i, blocks) in buckets.into_iter().enumerate() {
            let starting_index = ((1u64 << i) - 1) as usize * self.z;
            let bucket_index = (leaf >> (self.number_of_levels as usize - 1 - i)) as usize;
            let base_index = starting_index + bucket_index * self.z;
            for (j, block) in blocks.into_iter().enumerate() {
                self.tree.write_cell(base_index + j, block);
            }
        }
    }

    fn split_and_pad_bucket(&self, mut bucket: Vec<PathSlot>) -> Vec<Vec<PathSlot>> {
        while bucket.len() < self.z * self.b {
            bucket.push(PathSlot::dummy(self.element_size));
        }
        bucket.chunks(self.b).map(|c| c.to_vec()).collect()
    }

    fn truncate_stash_and_write_back(&mut self, old_leaf: u64) {
        let mut write_back = Vec::with_capacity(self.number_of_levels as usize);
        for i in 0..self.number_of_levels {
            let shift = self.number_of_levels - 1 - i;
            let mut bucket = Vec::new();
            let mut remaining = Vec::with_capacity(self.stash.len());
            for slot in self.stash.drain(..) {
                if bucket.len() < self.z * self.b && (slot.leaf >> shift) == (old_leaf >> shift) {
                    bucket.push(slot);
                } else {
                    remaining.push(slot);
                }
            }
            self.stash = remaining;
            write_back.push(self.split_and_pad_bucket(bucket));
        }
        self.write_path(write_back, old_leaf);
    }

    /// Performs an oblivious access: read-then-possibly-write at `addr`.
    /// Returns the value found before this access (or a zeroed payload on a
    /// read miss).
    pub fn access<R: RngCore + CryptoRng>(
        &mut self,
        op: Operation,
        addr: Address,
        data: Payload,
        rng: &mut R,
    ) -> Payload {
        let (old_leaf, new_leaf) = self.pos_map.access(addr, rng);

        let path = self.read_path(old_leaf);
        self.stash.extend(path.into_iter().filter(|s| !s.is_dummy()));

        let mut result = None;
        for slot in self.stash.iter_mut() {
            if slot.addr == addr {
                result = Some(slot.value.clone());
                if op == Operation::Write {
                    slot.value = data.clone();
                }
                slot.leaf = new_leaf;
                break;
            }
        }
        if op == Operation::Write && result.is_none() {
            self.stash.push(PathSlot {
                addr,
                value: data,
                leaf: new_leaf,
            });
        }

        self.truncate_stash_and_write_back(old_leaf);
        result.unwrap_or_else(|| vec![0u8; self.element_size])
    }

    /// Performs a recursive position-map access for `upper_addr`: splits
    /// into a block index (`upper_addr / B`) and offset
    /// (`upper_addr % B`), fetching-or-materializing the packed leaf list
    /// and returning the old/new upper-level leaves.
    fn pos_map_access<R: RngCore + CryptoRng>(&mut self, upper_addr: Address, rng: &mut R) -> (u64, u64) {
        let pos_map_addr = upper_addr / self.b as u64;
        let offset = (upper_addr % self.b as u64) as usize;
        let (old_leaf, new_leaf) = self.pos_map.access(pos_map_addr, rng);

        let path = self.read_path(old_leaf);
        self.stash.extend(path.into_iter().filter(|s| !s.is_dummy()));

        let mut upper_old_leaf = None;
        let mut upper_new_leaf = 0u64;
        for slot in self.stash.iter_mut() {
            if slot.addr == pos_map_addr {
                let mut leaves = decode_leaf_list(&slot.value, self.b);
                upper_old_leaf = Some(leaves[offset]);
                upper_new_leaf = rand::Rng::gen_range(rng, 0..self.upper_level_n.max(1));
                leaves[offset] = upper_new_leaf;
                slot.value = encode_leaf_list(&leaves);
                slot.leaf = new_leaf;
                break;
            }
        }
        if upper_old_leaf.is_none() {
            let mut leaves: Vec<u64> = (0..self.b)
                .map(|_| rand::Rng::gen_range(rng, 0..self.upper_level_n.max(1)))
                .collect();
            upper_new_leaf = rand::Rng::gen_range(rng, 0..self.upper_level_n.max(1));
            leaves[offset] = upper_new_leaf;
            upper_old_leaf = Some(rand::Rng::gen_range(rng, 0..self.upper_level_n.max(1)));
            self.stash.push(PathSlot {
                addr: pos_map_addr,
                value: encode_leaf_list(&leaves),
                leaf: new_leaf,
            });
        }

        self.truncate_stash_and_write_back(old_leaf);
        (upper_old_leaf.unwrap(), upper_new_leaf)
    }
}

fn encode_leaf_list(leaves: &[u64]) -> Payload {
    leaves.iter().flat_map(|l| l.to_be_bytes()).collect()
}

fn decode_leaf_list(bytes: &[u8], count: usize) -> Vec<u64> {
    (0..count)
        .map(|i| u64::from_be_bytes(bytes[i * 8..i * 8 + 8].try_into().unwrap()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{init_logger, ReferenceMap};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn writes_then_rereads_are_identity() {
        init_logger();
        let mut rng = StdRng::seed_from_u64(99);
        let mut oram = PathOram::new(8, 256, 4, 32, 2, 0);

        let mut oracle = ReferenceMap::new();
        for addr in 0..8u64 {
            let value = vec![addr as u8; 32];
            oram.access(Operation::Write, addr, value.clone(), &mut rng);
            oracle.write(addr, value);
        }
        for addr in 0..8u64 {
            let got = oram.access(Operation::Read, addr, vec![], &mut rng);
            assert_eq!(Some(&got), oracle.get(addr));
        }
    }

    #[test]
    fn recursive_position_map_engages_above_local_threshold() {
        init_logger();
        let mut rng = StdRng::seed_from_u64(5);
        let mut oram = PathOram::new(64, 256, 4, 32, 2, 0);
        let value = vec![7u8; 32];
        oram.access(Operation::Write, 10, value.clone(), &mut rng);
        let got = oram.access(Operation::Read, 10, vec![], &mut rng);
        assert_eq!(got, value);
        assert!(matches!(oram.pos_map, PositionMap::Recursive(_)));
    }
}
