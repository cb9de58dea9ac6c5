//! Compaction: redistributes a sparse array holding at most `n0` real
//! elements into `ceil(n0/b)` dense output blocks.

use crate::{
    bin_packing::{self, KeyIndex},
    error::OramError,
    pad_block,
    prf::PrfKey,
    remote_memory::RemoteMemory,
    utils, Element,
};
use rand::{CryptoRng, RngCore};

/// Compacts the `n` logical elements of `x` (spread over `ceil(n/b)` cells)
/// into `ceil(n0/b)` dense output cells, padding with dummies. `n0` is an
/// upper bound on the number of real elements in `x`.
pub fn compact<R: RngCore + CryptoRng>(
    mut x: RemoteMemory,
    n: u64,
    b: usize,
    n0: u64,
    rng: &mut R,
) -> Result<RemoteMemory, OramError> {
    let key = PrfKey::random(rng);
    let c = utils::choose_c(n, b as u64) as usize;
    let size_of_x = utils::ceil_div(n, b as u64) as usize;
    let size_of_compact_array = utils::ceil_div(n0, b as u64) as usize;

    let mut x_prime = RemoteMemory::new(b, c, 0, false);
    for i in 0..size_of_x {
        let mut cell = x.read_cell(i)?;
        bin_packing::assign_bin_tags(&mut cell, &key, c as u64, rng);

        let half = b / 2;
        let mut first_half: Vec<Element> = cell[..half]
            .iter()
            .enumerate()
            .map(|(pos, e)| {
                let mut e = e.clone();
                e.src_block = Some((2 * i) as u32);
                e.src_pos = Some(pos as u16);
                e
            })
            .collect();
        let mut second_half: Vec<Element> = cell[half..]
            .iter()
            .enumerate()
            .map(|(pos, e)| {
                let mut e = e.clone();
                e.src_block = Some((2 * i + 1) as u32);
                e.src_pos = Some(pos as u16);
                e
            })
            .collect();
        first_half.truncate(half);
        second_half.truncate(b - half);

        x_prime.write_cell(2 * i, pad_block(first_half, b, 1))?;
        x_prime.write_cell(2 * i + 1, pad_block(second_half, b, 1))?;
    }
    for j in (2 * size_of_x)..c {
        x_prime.write_cell(j, pad_block(Vec::new(), b, 1))?;
    }

    let mut y_buckets = bin_packing::bin_pack(x_prime, n, b, KeyIndex::BinTag, false)?;

    let mut new_array = RemoteMemory::new(b, size_of_compact_array, 1, false);
    let mut curr_bin = 0usize;
    let mut current_block: Vec<Element> = Vec::new();
    for i in 0..c {
        let block_i = y_buckets.read_cell(i)?;
        for e in block_i.into_iter().filter(|e| !e.is_dummy()) {
            current_block.push(e.without_tags());
            if current_block.len() == b {
                new_array.write_cell(curr_bin, std::mem::take(&mut current_block))?;
                curr_bin += 1;
            }
        }
    }
    if !current_block.is_empty() {
        new_array.write_cell(curr_bin, pad_block(current_block, b, 1))?;
        curr_bin += 1;
    }
    for i in curr_bin..size_of_compact_array {
        new_array.write_cell(i, pad_block(Vec::new(), b, 1))?;
    }

    Ok(new_array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_logger;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn preserves_all_reals_and_produces_expected_block_count() {
        init_logger();
        let mut rng = StdRng::seed_from_u64(11);
        let b = 4usize;
        let n0 = 8u64;
        // n=4 logical elements across ceil(4/4)=1 cell, scattered with dummies.
        let mut mem = RemoteMemory::new(b, 1, 1, false);
        mem.write_cell(
            0,
            vec![
                Element::real(1, vec![10]),
                Element::dummy(1),
                Element::real(3, vec![30]),
                Element::dummy(1),
            ],
        )
        .unwrap();

        let mut out = compact(mem, 4, b, n0, &mut rng).unwrap();
        assert_eq!(out.memory_size(), utils::ceil_div(n0, b as u64) as usize);

        let mut reals = vec![];
        for i in 0..out.memory_size() {
            let block = out.read_cell(i).unwrap();
            assert_eq!(block.len(), b);
            for e in block.into_iter().filter(|e| !e.is_dummy()) {
                reals.push((e.key, e.value));
            }
        }
        reals.sort();
        assert_eq!(reals, vec![(1, vec![10]), (3, vec![30])]);
    }
}
