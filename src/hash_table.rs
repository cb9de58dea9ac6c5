//! The non-recurrent oblivious hash table: build once, look up any number of
//! times (each key at most once — a second lookup of an already-accessed
//! key finds nothing, since extraction drops accessed elements), extract at
//! most once.

use crate::{
    bin_packing::{self, KeyIndex},
    error::OramError,
    pad_block,
    prf::PrfKey,
    remote_memory::RemoteMemory,
    utils, Element, DUMMY_ADDR,
};
use rand::{CryptoRng, RngCore};

/// An oblivious hash table over `n` elements packed `b` to a cell.
///
/// Lifecycle: created empty (around an as-yet-unbuilt input memory) ->
/// `build` once -> any number of `lookup` calls -> at most one `extract`,
/// which yields the surviving (non-accessed) elements back in packed form
/// and leaves the table logically empty.
pub struct HashTable {
    x: RemoteMemory,
    n: u64,
    b: usize,
    c: u64,
    key: PrfKey,
    is_built: bool,
    table: Option<RemoteMemory>,
    local: bool,
}

impl HashTable {
    /// Creates a table over `n` elements of input memory `x`, not yet
    /// built.
    pub fn new<R: RngCore + CryptoRng>(mut x: RemoteMemory, b: usize, n: u64, local: bool, rng: &mut R) -> Self {
        x.local = local;
        let c = utils::choose_c(n, b as u64);
        Self {
            x,
            n,
            b,
            c,
            key: PrfKey::random(rng),
            is_built: false,
            table: None,
            local,
        }
    }

    /// True once `build` has run and `extract` has not yet consumed the
    /// table.
    pub fn is_built(&self) -> bool {
        self.is_built
    }

    /// Builds the table from its input memory. If `C == 1` the table is the
    /// input memory verbatim; otherwise every element is tagged with its
    /// destination bin and the input is routed through bin-packing.
    pub fn build<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<(), OramError> {
        log::trace!("ht build n={} b={} C={}", self.n, self.b, self.c);
        if self.c == 1 {
            self.table = Some(self.x.clone());
            self.is_built = true;
            return Ok(());
        }

        let size_of_x = utils::ceil_div(self.n, self.b as u64) as usize;
        let half = self.b / 2;
        let mut x_prime = RemoteMemory::new(self.b, self.c as usize, 0, self.local);

        for i in 0..size_of_x {
            let mut cell = self.x.read_cell(i)?;
            bin_packing::assign_bin_tags(&mut cell, &self.key, self.c, rng);

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
            second_half.truncate(self.b - half);

            x_prime.write_cell(2 * i, pad_block(first_half, self.b, 1))?;
            x_prime.write_cell(2 * i + 1, pad_block(second_half, self.b, 1))?;
        }
        for j in (2 * size_of_x)..(self.c as usize) {
            x_prime.write_cell(j, pad_block(Vec::new(), self.b, 1))?;
        }

        let table = bin_packing::bin_pack(x_prime, self.n, self.b, KeyIndex::BinTag, self.local)?;
        self.table = Some(table);
        self.is_built = true;
        Ok(())
    }

    /// Looks up `k`. If `k` is `DUMMY_ADDR`, probes a uniformly random
    /// bucket (a dummy lookup, used to keep the access pattern of built,
    /// not-yet-resolved levels indistinguishable from a hit). Returns the
    /// `(k, v)` pair if found, else `None`. Marks a found element
    /// `accessed` in place so a later `extract` treats it as dummy: the
    /// core one-read-one-write-per-lookup invariant.
    pub fn lookup<R: RngCore + CryptoRng>(
        &mut self,
        k: Option<crate::Address>,
        rng: &mut R,
    ) -> Result<Option<Element>, OramError> {
        use rand::Rng;
        let table = self
            .table
            .as_mut()
            .expect("lookup requires a built table");

        let item_key = match k {
            None => rng.gen_range(0..self.c),
            Some(k) => self.key.bin_of(k, self.c),
        } as usize;

        let mut cell = table.read_cell(item_key)?;
        let mut found = None;
        if let Some(target) = k {
            for e in cell.iter_mut() {
                if e.key == target {
                    e.accessed = true;
                    found = Some(Element::real(e.key, e.value.clone()));
                    break;
                }
            }
        }
        table.write_cell(item_key, cell)?;
        Ok(found)
    }

    /// Extracts the surviving (non-`accessed`) elements of this table,
    /// reversing the build's routing via a second bin-packing pass keyed on
    /// originating block index, then folding bucket pairs back into their
    /// original blocks. Output is trimmed to `ceil(n/b)` cells. If the
    /// table was never built, returns its original input memory unchanged.
    pub fn extract(&mut self) -> Result<RemoteMemory, OramError> {
        if !self.is_built {
            return Ok(self.x.clone());
        }
        let table = self.table.take().expect("built implies table is Some");

        if self.c == 1 {
            log::trace!("ht extract n={} b={} C=1 (no-op routing)", self.n, self.b);
            self.is_built = false;
            return mask_accessed(table);
        }

        log::trace!("ht extract n={} b={} C={}", self.n, self.b, self.c);
        let mut y_buckets = bin_packing::bin_pack(table, self.n, self.b, KeyIndex::SrcBlock, self.local)?;

        let mut x_prime = RemoteMemory::new(self.b, (self.c / 2) as usize, 1, self.local);
        let half = self.b / 2;
        for i in 0..(self.c / 2) as usize {
            let mut y_2i = y_buckets.read_cell(2 * i)?;
            let mut y_2i1 = y_buckets.read_cell(2 * i + 1)?;
            y_2i.sort_by_key(sort_key);
            y_2i1.sort_by_key(sort_key);

            let mut out = Vec::with_capacity(self.b);
            for e in y_2i.into_iter().take(half) {
                out.push(reveal_or_dummy(e));
            }
            for e in y_2i1.into_iter().take(self.b - half) {
                out.push(reveal_or_dummy(e));
            }
            x_prime.write_cell(i, pad_block(out, self.b, 1))?;
        }

        self.is_built = false;
        truncate(x_prime, utils::ceil_div(self.n, self.b as u64) as usize)
    }
}

/// Orders extracted elements by their original intra-half position,
/// dummies last, to restore the pre-build block ordering.
fn sort_key(e: &Element) -> (u8, u16) {
    match e.src_pos {
        Some(pos) if !e.is_dummy() => (0, pos),
        _ => (1, 0),
    }
}

fn reveal_or_dummy(e: Element) -> Element {
    if e.is_dummy() {
        Element::dummy(e.value.len())
    } else {
        Element::real(e.key, e.value)
    }
}

/// Replaces every `accessed` element's key/value with a dummy, in place
/// across `table`'s cells. Used only by the unreachable `C == 1` extraction
/// path (`choose_c` never returns 1), where elements resolved by a prior
/// `lookup` would otherwise still carry their real key/value out of the
/// table.
fn mask_accessed(mut table: RemoteMemory) -> Result<RemoteMemory, OramError> {
    for i in 0..table.memory_size() {
        let cell = table.read_cell(i)?;
        let masked: Vec<Element> = cell
            .into_iter()
            .map(|e| if e.is_dummy() { Element::dummy(e.value.len()) } else { e })
            .collect();
        table.write_cell(i, masked)?;
    }
    Ok(table)
}

fn truncate(mem: RemoteMemory, keep: usize) -> Result<RemoteMemory, OramError> {
    let b = mem.block_capacity();
    let mut cells = Vec::with_capacity(keep);
    let mut mem = mem;
    for i in 0..keep.min(mem.memory_size()) {
        cells.push(mem.read_cell(i)?);
    }
    Ok(RemoteMemory::from_cells(cells, b, mem.local))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_logger;
    use rand::{rngs::StdRng, SeedableRng};

    fn build_table(elements: Vec<Element>, b: usize, n: u64, rng: &mut StdRng) -> HashTable {
        let c = utils::ceil_div(n, b as u64) as usize;
        let mut mem = RemoteMemory::new(b, c, 1, false);
        for (i, chunk) in elements.chunks(b).enumerate() {
            mem.write_cell(i, chunk.to_vec()).unwrap();
        }
        let mut ht = HashTable::new(mem, b, n, false, rng);
        ht.build(rng).unwrap();
        ht
    }

    #[test]
    fn build_lookup_extract_round_trip() {
        init_logger();
        let mut rng = StdRng::seed_from_u64(42);
        let b = 2usize;
        let elements = vec![
            Element::real(1, b"a".to_vec()),
            Element::real(2, b"b".to_vec()),
            Element::real(3, b"c".to_vec()),
            Element::dummy(1),
            Element::dummy(1),
            Element::dummy(1),
            Element::dummy(1),
            Element::dummy(1),
        ];
        let mut ht = build_table(elements, b, 8, &mut rng);

        let found = ht.lookup(Some(2), &mut rng).unwrap();
        assert_eq!(found.unwrap().value, b"b".to_vec());

        let miss = ht.lookup(Some(99), &mut rng).unwrap();
        assert!(miss.is_none());

        let mut extracted = ht.extract().unwrap();
        let mut reals = vec![];
        for i in 0..extracted.memory_size() {
            for e in extracted.read_cell(i).unwrap().into_iter().filter(|e| !e.is_dummy()) {
                reals.push(e.key);
            }
        }
        reals.sort();
        assert_eq!(reals, vec![1, 3]);
    }

    #[test]
    fn lookup_costs_exactly_two_per_key_regardless_of_hit() {
        init_logger();
        crate::reset_counters();
        let mut rng = StdRng::seed_from_u64(5);
        let n = 16u64;
        let b = 2usize;
        let elements: Vec<Element> = (0..n).map(|k| Element::real(k, vec![k as u8])).collect();
        let mut ht = build_table(elements, b, n, &mut rng);
        crate::reset_counters();
        for k in 0..n {
            ht.lookup(Some(k), &mut rng).unwrap();
        }
        assert_eq!(crate::current_counts().real_total(), 2 * n);
    }

    #[test]
    fn single_real_element_survives_build_extract() {
        init_logger();
        let mut rng = StdRng::seed_from_u64(9);
        let b = 4usize;
        let elements = vec![
            Element::real(1, vec![1]),
            Element::dummy(1),
            Element::dummy(1),
            Element::dummy(1),
        ];
        let mut ht = build_table(elements, b, 1, &mut rng);
        let mut extracted = ht.extract().unwrap();
        let mut reals = 0;
        for i in 0..extracted.memory_size() {
            reals += extracted
                .read_cell(i)
                .unwrap()
                .into_iter()
                .filter(|e| !e.is_dummy())
                .count();
        }
        assert_eq!(reals, 1);
    }
}
