//! Remote memory: a fixed-size array of blocks, each access to a non-local
//! instance counted against the process-wide real-memory counters.

use crate::{counters, error::OramError, pad_block, Address, Block, Element};

/// A remote-memory abstraction mapping cell index `0..memory_size` to a
/// block of `block_capacity` elements.
///
/// Every instance has a single owner at a time: when a hash table's memory
/// is extracted and concatenated into a fresh element, the source's
/// `RemoteMemory` is consumed by value, matching the ownership rule in the
/// design (`ht_extract` takes `self` conceptually; here it takes `&mut
/// self` and leaves the table logically empty afterwards).
#[derive(Debug, Clone)]
pub struct RemoteMemory {
    cells: Vec<Block>,
    block_capacity: usize,
    /// If true, accesses to this instance are free and do not bump the
    /// process-wide counters.
    pub local: bool,
}

impl RemoteMemory {
    /// Creates a new memory of `memory_size` cells, each padded with
    /// dummies of the given payload width.
    pub fn new(block_capacity: usize, memory_size: usize, payload_width: usize, local: bool) -> Self {
        let cells = (0..memory_size)
            .map(|_| pad_block(Vec::new(), block_capacity, payload_width))
            .collect();
        Self {
            cells,
            block_capacity,
            local,
        }
    }

    /// Creates a memory from already-built cell contents.
    pub fn from_cells(cells: Vec<Block>, block_capacity: usize, local: bool) -> Self {
        Self {
            cells,
            block_capacity,
            local,
        }
    }

    /// Seeds `memory_size` cells of `block_capacity` elements each with the
    /// identity mapping `i -> "d" + i` used to initialize the top MegaBlocks
    /// level (see `RemoteRam.init_memory` in the reference implementation).
    pub fn with_identity_mapping(block_capacity: usize, memory_size: usize) -> Self {
        let mut cells = Vec::with_capacity(memory_size);
        for i in 0..memory_size {
            let mut block = Vec::with_capacity(block_capacity);
            for j in 0..block_capacity {
                let addr = (i * block_capacity + j) as Address;
                block.push(Element::real(addr, format!("d{addr}").into_bytes()));
            }
            cells.push(block);
        }
        Self {
            cells,
            block_capacity,
            local: false,
        }
    }

    /// The number of cells in this memory.
    pub fn memory_size(&self) -> usize {
        self.cells.len()
    }

    /// The number of elements per cell.
    pub fn block_capacity(&self) -> usize {
        self.block_capacity
    }

    /// Reads the block at `location`, bumping the real-read counter unless
    /// this instance is local.
    pub fn read_cell(&mut self, location: usize) -> Result<Block, OramError> {
        let block = self
            .cells
            .get(location)
            .cloned()
            .ok_or(OramError::IndexOutOfBounds {
                index: location,
                memory_size: self.cells.len(),
            })?;
        if !self.local {
            counters::bump_real_read();
        }
        log::debug!("real read  cell={location} local={}", self.local);
        Ok(block)
    }

    /// Writes `block` at `location`, bumping the real-write counter unless
    /// this instance is local.
    pub fn write_cell(&mut self, location: usize, block: Block) -> Result<(), OramError> {
        if location >= self.cells.len() {
            return Err(OramError::IndexOutOfBounds {
                index: location,
                memory_size: self.cells.len(),
            });
        }
        if !self.local {
            counters::bump_real_write();
        }
        log::debug!("real write cell={location} local={}", self.local);
        self.cells[location] = block;
        Ok(())
    }

    /// Concatenates `self` and `other`, which must share a block capacity.
    pub fn concat(self, other: Self) -> Self {
        debug_assert_eq!(self.block_capacity, other.block_capacity);
        let mut cells = self.cells;
        cells.extend(other.cells);
        Self {
            cells,
            block_capacity: self.block_capacity,
            local: self.local && other.local,
        }
    }

    /// Concatenates the *accesses represented by* `a` and `b`: if their
    /// effective element counts fit in one block, merges their single cells
    /// into one local cell; otherwise physically concatenates the two
    /// memories.
    pub fn concat_access(
        mut a: Self,
        mut b: Self,
        cap_a: usize,
        cap_b: usize,
        block_capacity: usize,
    ) -> Result<Self, OramError> {
        if cap_a + cap_b <= block_capacity {
            let block_a = a.read_cell(0)?;
            let block_b = b.read_cell(0)?;
            let merged = merge_blocks(&block_a, &block_b, block_capacity);
            Ok(Self {
                cells: vec![merged],
                block_capacity,
                local: true,
            })
        } else {
            Ok(a.concat(b))
        }
    }
}

/// Interleaves the non-dummy entries of two parallel blocks, preserving
/// input order, padding the result with dummies to `block_capacity`.
pub fn merge_blocks(a: &[Element], b: &[Element], block_capacity: usize) -> Block {
    let payload_width = a
        .iter()
        .chain(b.iter())
        .next()
        .map(|e| e.value.len())
        .unwrap_or(0);
    let mut merged: Vec<Element> = Vec::with_capacity(block_capacity);
    for i in 0..block_capacity {
        if let Some(e) = a.get(i) {
            if !e.is_dummy() {
                merged.push(e.without_tags());
            }
        }
        if let Some(e) = b.get(i) {
            if !e.is_dummy() {
                merged.push(e.without_tags());
            }
        }
    }
    pad_block(merged, block_capacity, payload_width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_logger;

    #[test]
    fn out_of_bounds_is_fatal() {
        init_logger();
        let mut mem = RemoteMemory::new(4, 2, 8, false);
        assert!(matches!(
            mem.read_cell(5),
            Err(OramError::IndexOutOfBounds { .. })
        ));
        assert!(matches!(
            mem.write_cell(5, vec![]),
            Err(OramError::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn local_access_is_free() {
        init_logger();
        crate::reset_counters();
        let mut mem = RemoteMemory::new(4, 2, 8, true);
        mem.read_cell(0).unwrap();
        mem.write_cell(1, pad_block(Vec::new(), 4, 8)).unwrap();
        assert_eq!(crate::current_counts().real_total(), 0);
    }

    #[test]
    fn non_local_access_is_counted() {
        init_logger();
        crate::reset_counters();
        let mut mem = RemoteMemory::new(4, 2, 8, false);
        mem.read_cell(0).unwrap();
        mem.write_cell(1, pad_block(Vec::new(), 4, 8)).unwrap();
        assert_eq!(crate::current_counts().real_total(), 2);
    }

    #[test]
    fn concat_sums_memory_sizes() {
        let a = RemoteMemory::new(4, 2, 8, false);
        let b = RemoteMemory::new(4, 3, 8, false);
        let c = a.concat(b);
        assert_eq!(c.memory_size(), 5);
        assert_eq!(c.block_capacity(), 4);
    }

    #[test]
    fn merge_blocks_preserves_order_and_pads() {
        let a = vec![Element::real(1, vec![1]), Element::dummy(1)];
        let b = vec![Element::dummy(1), Element::real(2, vec![2])];
        let merged = merge_blocks(&a, &b, 4);
        assert_eq!(merged.len(), 4);
        assert_eq!(merged[0].key, 1);
        assert_eq!(merged[1].key, 2);
        assert!(merged[2].is_dummy());
        assert!(merged[3].is_dummy());
    }
}
