//! Error types for the ORAM simulator.

use std::num::TryFromIntError;
use thiserror::Error;

/// Errors surfaced by the ORAM simulator.
///
/// Per the design, none of these are used for control flow: a lookup of a
/// missing key is not an error, it simply returns a dummy element.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OramError {
    /// A read or write addressed a memory cell outside `[0, memory_size)`.
    /// Indicates a construction bug, not a user error.
    #[error("memory index {index} out of bounds (memory size is {memory_size})")]
    IndexOutOfBounds {
        /// The offending index.
        index: usize,
        /// The size of the memory that was accessed.
        memory_size: usize,
    },

    /// A bin-packing merge-split step produced a half exceeding block
    /// capacity. Fatal: recovering would change the obliviousness pattern.
    #[error("bin-packing overflow: a merge-split output exceeded block capacity {block_capacity}")]
    BinPackingOverflow {
        /// The block capacity that was exceeded.
        block_capacity: usize,
    },

    /// An unknown construction tag, or a non-positive `N`/`B`, or `q <= 1`.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// A human-readable description of what was invalid.
        reason: String,
    },

    /// A numeric conversion between address/index representations failed.
    #[error("address conversion failed: {0}")]
    AddressConversion(#[from] TryFromIntError),
}
