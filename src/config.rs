//! Construction parameters and the choice of ORAM scheme/mode.

use crate::error::OramError;

/// Which ORAM construction and execution mode to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceTag {
    /// MegaBlocks running real logical bookkeeping over counter memory.
    SimMegaBlocks,
    /// Fully-executing MegaBlocks over real (payload-bearing) memory.
    RealMegaBlocks,
    /// Fully-executing Path ORAM.
    RealPath,
    /// Closed-form counter-mode Path ORAM.
    CounterPath,
    /// Closed-form counter-mode MegaBlocks.
    CounterMegaBlocks,
    /// The FutORAMa analytical comparison peer.
    CounterFutorama,
}

/// Construction parameters shared by all choice tags. Not every field is
/// meaningful for every tag; `OramParams::validate` enforces the subset each
/// tag actually requires.
#[derive(Debug, Clone, Copy)]
pub struct OramParams {
    /// Upper bound on the number of logical elements the ORAM will hold.
    pub n: u64,
    /// Block capacity: elements per remote-memory cell.
    pub b: usize,
    /// MegaBlocks expansion factor. Unused by Path ORAM and FutORAMa.
    pub q: u64,
    /// Total number of accesses the cost model should project over.
    /// Required by counter-mode tags, ignored by executing ones.
    pub t: u64,
    /// Local memory budget, in server blocks.
    pub local_memory_in_server_blocks: u64,
    /// Server block size in bits, used by Path ORAM and FutORAMa.
    pub server_block_bits: u64,
    /// Client word size in bits, used by Path ORAM and FutORAMa.
    pub word_bits: u64,
}

impl OramParams {
    /// Validates the parameters required by `tag`, returning
    /// `OramError::InvalidConfiguration` on the first violation found.
    pub fn validate(&self, tag: ChoiceTag) -> Result<(), OramError> {
        if self.n == 0 {
            return Err(invalid("N must be positive"));
        }
        if self.b == 0 {
            return Err(invalid("B must be positive"));
        }
        match tag {
            ChoiceTag::SimMegaBlocks | ChoiceTag::RealMegaBlocks | ChoiceTag::CounterMegaBlocks => {
                if self.q <= 1 {
                    return Err(invalid("q must be greater than 1"));
                }
            }
            ChoiceTag::RealPath | ChoiceTag::CounterPath => {
                if self.server_block_bits == 0 || self.word_bits == 0 {
                    return Err(invalid("Path ORAM requires nonzero server_block_bits and word_bits"));
                }
            }
            ChoiceTag::CounterFutorama => {
                if self.server_block_bits == 0 || self.word_bits == 0 {
                    return Err(invalid("FutORAMa requires nonzero server_block_bits and word_bits"));
                }
            }
        }
        if matches!(
            tag,
            ChoiceTag::CounterMegaBlocks | ChoiceTag::CounterPath | ChoiceTag::CounterFutorama
        ) && self.t == 0
        {
            return Err(invalid("T must be positive for counter-mode cost models"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> OramError {
    OramError::InvalidConfiguration {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_n() {
        let p = OramParams {
            n: 0,
            b: 4,
            q: 2,
            t: 1,
            local_memory_in_server_blocks: 2,
            server_block_bits: 256,
            word_bits: 32,
        };
        assert!(matches!(
            p.validate(ChoiceTag::RealMegaBlocks),
            Err(OramError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn rejects_q_leq_one_for_megablocks() {
        let p = OramParams {
            n: 64,
            b: 4,
            q: 1,
            t: 1,
            local_memory_in_server_blocks: 2,
            server_block_bits: 256,
            word_bits: 32,
        };
        assert!(matches!(
            p.validate(ChoiceTag::RealMegaBlocks),
            Err(OramError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn accepts_well_formed_megablocks_params() {
        let p = OramParams {
            n: 64,
            b: 4,
            q: 2,
            t: 128,
            local_memory_in_server_blocks: 2,
            server_block_bits: 256,
            word_bits: 32,
        };
        assert!(p.validate(ChoiceTag::RealMegaBlocks).is_ok());
        assert!(p.validate(ChoiceTag::CounterMegaBlocks).is_ok());
    }
}
