//! Counter memory: the same shape as `RemoteMemory` but with no payload —
//! accesses only bump the process-wide counter-memory counters.

use crate::{counters, error::OramError};

/// A payload-free memory used by counter/simulation-mode ORAMs to record
/// I/O shape without materializing any element contents.
#[derive(Debug, Clone, Copy)]
pub struct CounterMemory {
    memory_size: usize,
    block_capacity: usize,
    /// If true, accesses to this instance are free.
    pub local: bool,
}

impl CounterMemory {
    /// Creates a new counter memory of the given shape.
    pub fn new(block_capacity: usize, memory_size: usize, local: bool) -> Self {
        Self {
            memory_size,
            block_capacity,
            local,
        }
    }

    /// The number of cells in this memory.
    pub fn memory_size(&self) -> usize {
        self.memory_size
    }

    /// The number of elements per cell.
    pub fn block_capacity(&self) -> usize {
        self.block_capacity
    }

    /// Records a read of the cell at `location`, bumping the counter-read
    /// tally unless this instance is local.
    pub fn read_cell(&self, location: usize) -> Result<(), OramError> {
        if location >= self.memory_size {
            return Err(OramError::IndexOutOfBounds {
                index: location,
                memory_size: self.memory_size,
            });
        }
        if !self.local {
            counters::bump_counter_reads(1);
        }
        Ok(())
    }

    /// Records a write of the cell at `location`, bumping the counter-write
    /// tally unless this instance is local.
    pub fn write_cell(&self, location: usize) -> Result<(), OramError> {
        if location >= self.memory_size {
            return Err(OramError::IndexOutOfBounds {
                index: location,
                memory_size: self.memory_size,
            });
        }
        if !self.local {
            counters::bump_counter_writes(1);
        }
        Ok(())
    }

    /// Directly adds `n` read operations, for batch-accounted algorithms
    /// (e.g. bin-packing) that know their total I/O in closed form.
    pub fn add_read_operations(&self, n: u64) {
        if !self.local {
            counters::bump_counter_reads(n);
        }
    }

    /// Directly adds `n` write operations.
    pub fn add_write_operations(&self, n: u64) {
        if !self.local {
            counters::bump_counter_writes(n);
        }
    }

    /// Concatenates two counter memories by summing their memory sizes.
    pub fn concat(self, other: Self) -> Self {
        debug_assert_eq!(self.block_capacity, other.block_capacity);
        Self {
            memory_size: self.memory_size + other.memory_size,
            block_capacity: self.block_capacity,
            local: self.local && other.local,
        }
    }

    /// Counter-mode analogue of `RemoteMemory::concat_access`: if the
    /// combined effective size fits in one block, the result collapses to a
    /// single local cell; otherwise the two memories are concatenated.
    pub fn concat_access(a: Self, b: Self, cap_a: usize, cap_b: usize, block_capacity: usize) -> Self {
        if cap_a + cap_b <= block_capacity {
            Self {
                memory_size: 1,
                block_capacity,
                local: true,
            }
        } else {
            a.concat(b)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_is_fatal() {
        let mem = CounterMemory::new(4, 2, false);
        assert!(matches!(
            mem.read_cell(5),
            Err(OramError::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn local_is_free_non_local_is_counted() {
        crate::reset_counters();
        let local = CounterMemory::new(4, 2, true);
        local.read_cell(0).unwrap();
        assert_eq!(crate::current_counts().counter_total(), 0);

        let remote = CounterMemory::new(4, 2, false);
        remote.read_cell(0).unwrap();
        remote.write_cell(1).unwrap();
        assert_eq!(crate::current_counts().counter_total(), 2);
    }

    #[test]
    fn concat_access_collapses_when_it_fits() {
        let a = CounterMemory::new(4, 1, true);
        let b = CounterMemory::new(4, 1, true);
        let merged = CounterMemory::concat_access(a, b, 1, 1, 4);
        assert_eq!(merged.memory_size(), 1);
        assert!(merged.local);
    }

    #[test]
    fn concat_access_concatenates_when_it_does_not_fit() {
        let a = CounterMemory::new(4, 1, false);
        let b = CounterMemory::new(4, 3, false);
        let merged = CounterMemory::concat_access(a, b, 4, 8, 4);
        assert_eq!(merged.memory_size(), 4);
    }
}
