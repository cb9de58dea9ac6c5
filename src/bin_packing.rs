//! Oblivious bin-packing: routes `2n` tagged elements through `log2(C)`
//! merge-split rounds into `C` bins of capacity `B`.

use crate::{error::OramError, pad_block, prf::PrfKey, remote_memory::RemoteMemory, utils, Block};

/// Packs the elements of `x` into `C = choose_c(n, b)` bins, keyed by the
/// field named by `key_index`, routing each element to the bin whose index
/// equals the first `log2(C)` bits of that field.
///
/// `x` must already have `C` cells (the caller is responsible for tagging
/// and splitting elements into this shape beforehand, as the hash-table and
/// compaction layers do).
pub fn bin_pack(
    x: RemoteMemory,
    n: u64,
    b: usize,
    key_index: KeyIndex,
    local: bool,
) -> Result<RemoteMemory, OramError> {
    let c = utils::choose_c(n, b as u64) as usize;
    let bit_length = (c.max(2) - 1).ilog2() + 1;
    let rounds = c.ilog2();

    let mut current = x;
    for i in 0..rounds {
        let mut next = RemoteMemory::new(b, c, 0, local);
        for j in 0..(c / 2) {
            let j_prime = (j / (1usize << i)) * (1usize << i);
            let a0 = current.read_cell(j + j_prime)?;
            let a1 = current.read_cell(j + j_prime + (1usize << i))?;
            let (b0, b1) = merge_split(&a0, &a1, i, b, bit_length, key_index)?;
            next.write_cell(2 * j, b0)?;
            next.write_cell(2 * j + 1, b1)?;
        }
        current = next;
    }
    Ok(current)
}

/// Which accreted metadata field on an `Element` carries the routing key
/// for a given bin-packing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyIndex {
    /// Route by the destination bin computed during tag-and-split
    /// (hash-table build, compaction).
    BinTag,
    /// Route by the originating block index, to reverse a build's routing
    /// during hash-table extraction.
    SrcBlock,
}

fn field_value(e: &crate::Element, key_index: KeyIndex) -> u64 {
    match key_index {
        KeyIndex::BinTag => e.bin_tag.expect("bin_tag must be set before bin-packing"),
        KeyIndex::SrcBlock => e
            .src_block
            .expect("src_block must be set before reverse bin-packing") as u64,
    }
}

/// Merges two blocks and splits their non-dummy elements into two halves
/// based on the `(i+1)`-th most significant bit of each element's routing
/// key. Returns `OramError::BinPackingOverflow` if either half would exceed
/// `b` elements.
fn merge_split(
    a0: &[crate::Element],
    a1: &[crate::Element],
    i: u32,
    b: usize,
    bit_length: u32,
    key_index: KeyIndex,
) -> Result<(Block, Block), OramError> {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let payload_width = a0
        .iter()
        .chain(a1.iter())
        .next()
        .map(|e| e.value.len())
        .unwrap_or(0);

    for e in a0.iter().chain(a1.iter()) {
        if e.is_dummy() {
            continue;
        }
        let key = field_value(e, key_index);
        if utils::msb_at_index(key, i + 1, bit_length) == 0 {
            left.push(e.clone());
        } else {
            right.push(e.clone());
        }
    }

    if left.len() > b || right.len() > b {
        return Err(OramError::BinPackingOverflow { block_capacity: b });
    }

    Ok((
        pad_block(left, b, payload_width),
        pad_block(right, b, payload_width),
    ))
}

/// Assigns a uniformly random or PRF-derived bin tag to every non-dummy
/// element of `block`, matching the reference's tag-and-split step used by
/// both hash-table build and compaction.
pub fn assign_bin_tags(
    block: &mut [crate::Element],
    key: &PrfKey,
    modulus: u64,
    rng: &mut impl rand::RngCore,
) {
    for e in block.iter_mut() {
        e.bin_tag = Some(if e.key == crate::DUMMY_ADDR {
            rng.gen_range_u64(modulus)
        } else {
            key.bin_of(e.key, modulus)
        });
    }
}

/// A tiny extension trait so `assign_bin_tags` can draw a bounded random
/// value without pulling in `rand::Rng`'s full surface at call sites.
trait RngExt {
    fn gen_range_u64(&mut self, modulus: u64) -> u64;
}

impl<R: rand::RngCore + ?Sized> RngExt for R {
    fn gen_range_u64(&mut self, modulus: u64) -> u64 {
        use rand::Rng;
        self.gen_range(0..modulus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_utils::init_logger, Element};
    use rand::{rngs::StdRng, SeedableRng};

    fn tagged_input(n: usize, b: usize, bins: &[u64]) -> RemoteMemory {
        let c = utils::choose_c(n as u64, b as u64) as usize;
        let mut mem = RemoteMemory::new(b, c, 1, false);
        let mut idx = 0;
        for cell in 0..(n.div_ceil(b)) {
            let mut block = Vec::new();
            for _ in 0..b {
                if idx < n {
                    let mut e = Element::real(idx as u64, vec![idx as u8]);
                    e.bin_tag = Some(bins[idx]);
                    block.push(e);
                    idx += 1;
                } else {
                    block.push(Element::dummy(1));
                }
            }
            mem.write_cell(cell, block).unwrap();
        }
        mem
    }

    #[test]
    fn routes_elements_to_matching_bin_prefix() {
        init_logger();
        // n=4, B=2 -> C = choose_c(4,2) = next_pow2(4) = 4.
        let bins = [0u64, 1, 2, 3];
        let mem = tagged_input(4, 2, &bins);
        let mut packed = bin_pack(mem, 4, 2, KeyIndex::BinTag, false).unwrap();
        for want_bin in 0..4u64 {
            let cell = packed.read_cell(want_bin as usize).unwrap();
            for e in cell.iter().filter(|e| !e.is_dummy()) {
                assert_eq!(e.bin_tag, Some(want_bin));
            }
        }
    }

    #[test]
    fn overflow_when_too_many_elements_share_a_bin() {
        init_logger();
        // All four real elements target bin 0 with B=2 -> definite overflow.
        let bins = [0u64, 0, 0, 0];
        let mem = tagged_input(4, 2, &bins);
        let result = bin_pack(mem, 4, 2, KeyIndex::BinTag, false);
        assert!(matches!(result, Err(OramError::BinPackingOverflow { .. })));
    }

    #[test]
    fn assign_bin_tags_is_deterministic_for_real_keys() {
        let mut rng = StdRng::seed_from_u64(3);
        let key = PrfKey::random(&mut rng);
        let mut block = vec![Element::real(5, vec![0]), Element::dummy(1)];
        assign_bin_tags(&mut block, &key, 16, &mut rng);
        assert_eq!(block[0].bin_tag, Some(key.bin_of(5, 16)));
        assert!(block[1].bin_tag.unwrap() < 16);
    }
}
