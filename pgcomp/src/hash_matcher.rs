//! Rolling-hash multi-map over fixed-length patterns.
//!
//! Patterns are indexed first; [`KmerIndexBuilder::build`] then freezes the
//! index into a bucketed table that can only be queried or scanned.

use std::fmt::Debug;

use lazy_static::lazy_static;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

const HASH_TABLE_SEED: u64 = 0x7067_636f_6d70;
const MIN_BUCKET_BITS: u32 = 4;
const MAX_BUCKET_BITS: u32 = 26;

lazy_static! {
    static ref SYMBOL_HASHES: [u64; 256] = {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(HASH_TABLE_SEED);
        let mut table = [0; 256];
        for value in table.iter_mut() {
            *value = rng.gen();
        }
        table
    };
}

/// Buzhash (cyclic polynomial) rolling hash over a window of bytes.
#[derive(Debug, Clone)]
pub struct CyclicHash {
    value: u64,
    out_rotation: u32,
}

impl CyclicHash {
    #[must_use]
    pub fn new(window_length: usize) -> Self {
        Self {
            value: 0,
            out_rotation: (window_length % u64::BITS as usize) as u32,
        }
    }

    #[must_use]
    pub fn hash_of(window: &[u8]) -> u64 {
        let mut hash = Self::new(window.len());
        for &symbol in window {
            hash.eat(symbol);
        }
        hash.value()
    }

    #[inline]
    pub fn eat(&mut self, symbol: u8) {
        self.value = self.value.rotate_left(1) ^ SYMBOL_HASHES[symbol as usize];
    }

    /// Slides the window by one symbol.
    #[inline]
    pub fn update(&mut self, out_symbol: u8, in_symbol: u8) {
        self.value = self.value.rotate_left(1)
            ^ SYMBOL_HASHES[out_symbol as usize].rotate_left(self.out_rotation)
            ^ SYMBOL_HASHES[in_symbol as usize];
    }

    pub fn reset(&mut self) {
        self.value = 0;
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> u64 {
        self.value
    }
}

/// Hash-bucketed multi-map in CSR layout; values of one bucket keep their
/// insertion order.
#[derive(Debug, Clone)]
struct BucketTable<V> {
    mask: u64,
    offsets: Vec<u32>,
    entries: Vec<(u64, V)>,
}

impl<V: Copy + Debug> BucketTable<V> {
    fn new(items: Vec<(u64, V)>) -> Self {
        let bits = (usize::BITS - items.len().leading_zeros() + 1)
            .clamp(MIN_BUCKET_BITS, MAX_BUCKET_BITS);
        let bucket_count = 1usize << bits;
        let mask = (bucket_count - 1) as u64;

        let mut offsets = vec![0u32; bucket_count + 1];
        for (hash, _) in &items {
            offsets[(hash & mask) as usize + 1] += 1;
        }
        for bucket in 0..bucket_count {
            offsets[bucket + 1] += offsets[bucket];
        }

        let mut cursor: Vec<u32> = offsets[..bucket_count].to_vec();
        let mut entries: Vec<Option<(u64, V)>> = vec![None; items.len()];
        for item in items {
            let slot = &mut cursor[(item.0 & mask) as usize];
            entries[*slot as usize] = Some(item);
            *slot += 1;
        }

        Self {
            mask,
            offsets,
            entries: entries.into_iter().flatten().collect(),
        }
    }

    #[inline]
    fn bucket(&self, hash: u64) -> &[(u64, V)] {
        let bucket = (hash & self.mask) as usize;
        &self.entries[self.offsets[bucket] as usize..self.offsets[bucket + 1] as usize]
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Collects patterns to index.
#[derive(Debug, Clone)]
pub struct KmerIndexBuilder {
    pattern_length: usize,
    items: Vec<(u64, u32)>,
}

impl KmerIndexBuilder {
    #[must_use]
    pub fn new(pattern_length: usize) -> Self {
        assert!(pattern_length > 0, "Pattern length must be positive");

        Self {
            pattern_length,
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_capacity(pattern_length: usize, capacity: usize) -> Self {
        let mut builder = Self::new(pattern_length);
        builder.items.reserve(capacity);
        builder
    }

    /// Indexes the first `pattern_length` symbols of `pattern` under `id`.
    ///
    /// # Panics
    /// Panics if the pattern is shorter than the pattern length.
    pub fn index(&mut self, pattern: &[u8], id: u32) {
        assert!(
            pattern.len() >= self.pattern_length,
            "Pattern of length {} is shorter than the indexed length {}",
            pattern.len(),
            self.pattern_length
        );

        let hash = CyclicHash::hash_of(&pattern[..self.pattern_length]);
        self.items.push((hash, id));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn build(self) -> KmerHashMatcher {
        KmerHashMatcher {
            pattern_length: self.pattern_length,
            table: BucketTable::new(self.items),
        }
    }
}

/// Frozen index of contiguous patterns.
#[derive(Debug, Clone)]
pub struct KmerHashMatcher {
    pattern_length: usize,
    table: BucketTable<u32>,
}

impl KmerHashMatcher {
    #[must_use]
    pub fn pattern_length(&self) -> usize {
        self.pattern_length
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Ids of the patterns whose hash equals the hash of
    /// `window[..pattern_length]`.
    pub fn candidates<'a>(&'a self, window: &[u8]) -> impl Iterator<Item = u32> + 'a {
        let hash = CyclicHash::hash_of(&window[..self.pattern_length]);
        self.table
            .bucket(hash)
            .iter()
            .filter(move |(entry_hash, _)| *entry_hash == hash)
            .map(|&(_, id)| id)
    }

    /// Lazily yields `(text_position, pattern_id)` for every hash collision,
    /// left to right. Candidates must be verified by the caller.
    #[must_use]
    pub fn scan<'a>(&'a self, text: &'a [u8]) -> Scan<'a> {
        Scan {
            table: &self.table,
            text,
            pattern_length: self.pattern_length,
            hash: CyclicHash::new(self.pattern_length),
            next_start: 0,
            current_position: 0,
            current: &[],
        }
    }
}

pub struct Scan<'a> {
    table: &'a BucketTable<u32>,
    text: &'a [u8],
    pattern_length: usize,
    hash: CyclicHash,
    next_start: usize,
    current_position: usize,
    current: &'a [(u64, u32)],
}

impl<'a> Iterator for Scan<'a> {
    type Item = (usize, u32);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            while let Some((&(hash, id), rest)) = self.current.split_first() {
                self.current = rest;
                if hash == self.hash.value() {
                    return Some((self.current_position, id));
                }
            }

            let start = self.next_start;
            if start + self.pattern_length > self.text.len() {
                return None;
            }

            if start == 0 {
                for &symbol in &self.text[..self.pattern_length] {
                    self.hash.eat(symbol);
                }
            } else {
                self.hash.update(
                    self.text[start - 1],
                    self.text[start + self.pattern_length - 1],
                );
            }

            self.current = self.table.bucket(self.hash.value());
            self.current_position = start;
            self.next_start = start + 1;
        }
    }
}

/// Collects patterns split into `phases` interleaved parts: part `k` consists
/// of symbols `k, k + phases, k + 2 * phases, ...`.
#[derive(Debug, Clone)]
pub struct InterleavedKmerIndexBuilder {
    pattern_length: usize,
    phases: usize,
    part_length: usize,
    items: Vec<(u64, (u32, u8))>,
}

impl InterleavedKmerIndexBuilder {
    #[must_use]
    pub fn new(pattern_length: usize, phases: usize) -> Self {
        assert!(
            (1..=u8::MAX as usize + 1).contains(&phases),
            "Invalid number of phases: {}",
            phases
        );
        let part_length = pattern_length / phases;
        assert!(
            part_length > 0,
            "Pattern length {} too short for {} phases",
            pattern_length,
            phases
        );

        Self {
            pattern_length,
            phases,
            part_length,
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn part_length(&self) -> usize {
        self.part_length
    }

    /// Indexes every phase of `pattern` under `id`.
    ///
    /// # Panics
    /// Panics if the pattern is shorter than the pattern length.
    pub fn index(&mut self, pattern: &[u8], id: u32) {
        assert!(
            pattern.len() >= self.pattern_length,
            "Pattern of length {} is shorter than the indexed length {}",
            pattern.len(),
            self.pattern_length
        );

        for phase in 0..self.phases {
            let mut hash = CyclicHash::new(self.part_length);
            for symbol in pattern[phase..]
                .iter()
                .step_by(self.phases)
                .take(self.part_length)
            {
                hash.eat(*symbol);
            }
            self.items.push((hash.value(), (id, phase as u8)));
        }
    }

    #[must_use]
    pub fn build(self) -> InterleavedKmerMatcher {
        InterleavedKmerMatcher {
            phases: self.phases,
            part_length: self.part_length,
            table: BucketTable::new(self.items),
        }
    }
}

/// Frozen index of interleaved pattern parts.
#[derive(Debug, Clone)]
pub struct InterleavedKmerMatcher {
    phases: usize,
    part_length: usize,
    table: BucketTable<(u32, u8)>,
}

impl InterleavedKmerMatcher {
    #[must_use]
    pub fn phases(&self) -> usize {
        self.phases
    }

    #[must_use]
    pub fn part_length(&self) -> usize {
        self.part_length
    }

    /// Number of text symbols spanned by one part.
    #[must_use]
    pub fn part_span(&self) -> usize {
        (self.part_length - 1) * self.phases + 1
    }

    /// Lazily yields `(text_position, pattern_id, phase)`; a hit for phase `k`
    /// at `t` implies the pattern starts at `t - k`.
    #[must_use]
    pub fn scan<'a>(&'a self, text: &'a [u8]) -> InterleavedScan<'a> {
        InterleavedScan {
            matcher: self,
            text,
            hashes: vec![CyclicHash::new(self.part_length); self.phases],
            next_start: 0,
            current_position: 0,
            current_hash: 0,
            current: &[],
        }
    }
}

pub struct InterleavedScan<'a> {
    matcher: &'a InterleavedKmerMatcher,
    text: &'a [u8],
    hashes: Vec<CyclicHash>,
    next_start: usize,
    current_position: usize,
    current_hash: u64,
    current: &'a [(u64, (u32, u8))],
}

impl<'a> Iterator for InterleavedScan<'a> {
    type Item = (usize, u32, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let phases = self.matcher.phases;

        loop {
            while let Some((&(hash, (id, phase)), rest)) = self.current.split_first() {
                self.current = rest;
                if hash == self.current_hash {
                    return Some((self.current_position, id, phase as usize));
                }
            }

            let start = self.next_start;
            let last = start + self.matcher.part_span() - 1;
            if last >= self.text.len() {
                return None;
            }

            // Windows starting at `start` and `start - phases` share a hash.
            let hash = &mut self.hashes[start % phases];
            if start < phases {
                for symbol in self.text[start..=last].iter().step_by(phases) {
                    hash.eat(*symbol);
                }
            } else {
                hash.update(self.text[start - phases], self.text[last]);
            }

            self.current_hash = hash.value();
            self.current = self.matcher.table.bucket(self.current_hash);
            self.current_position = start;
            self.next_start = start + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::hash_matcher::{CyclicHash, InterleavedKmerIndexBuilder, KmerIndexBuilder};

    #[test]
    fn test_rolling_equals_direct() {
        let text = b"ACGTTGCAAGGCTTACGATCGGA";
        let window = 7;

        let mut hash = CyclicHash::new(window);
        for &symbol in &text[..window] {
            hash.eat(symbol);
        }
        for start in 1..=text.len() - window {
            hash.update(text[start - 1], text[start + window - 1]);
            assert_eq!(hash.value(), CyclicHash::hash_of(&text[start..start + window]));
        }
    }

    #[test]
    fn test_rolling_long_window() {
        let text: Vec<u8> = b"ACGT".iter().copied().cycle().take(300).collect();
        let window = 130;

        let mut hash = CyclicHash::new(window);
        for &symbol in &text[..window] {
            hash.eat(symbol);
        }
        hash.update(text[0], text[window]);
        assert_eq!(hash.value(), CyclicHash::hash_of(&text[1..=window]));
    }

    #[test]
    fn test_scan_single_pattern() {
        let mut builder = KmerIndexBuilder::new(4);
        builder.index(b"ACGT", 0);
        let matcher = builder.build();

        let text = b"TTACGTTT";
        let verified: Vec<(usize, u32)> = matcher
            .scan(text)
            .filter(|&(pos, _)| &text[pos..pos + 4] == b"ACGT")
            .collect();
        assert_eq!(verified, vec![(2, 0)]);
    }

    #[test]
    fn test_scan_multiple_ids() {
        let mut builder = KmerIndexBuilder::new(3);
        builder.index(b"GATTACA", 0);
        builder.index(b"TAC", 1);
        builder.index(b"GAT", 2);
        let matcher = builder.build();

        let hits: Vec<(usize, u32)> = matcher.scan(b"CTACGATT").collect();
        assert!(hits.contains(&(1, 1)));
        assert!(hits.contains(&(4, 0)));
        assert!(hits.contains(&(4, 2)));
        // Ids of one bucket are reported in insertion order.
        let at_4: Vec<u32> = hits
            .iter()
            .filter(|&&(pos, _)| pos == 4)
            .map(|&(_, id)| id)
            .collect();
        assert_eq!(at_4, vec![0, 2]);
        assert!(hits.windows(2).all(|pair| pair[0].0 <= pair[1].0));
    }

    #[test]
    fn test_scan_short_text() {
        let mut builder = KmerIndexBuilder::new(5);
        builder.index(b"ACGTA", 0);
        let matcher = builder.build();

        assert_eq!(matcher.scan(b"ACGT").count(), 0);
        assert_eq!(matcher.scan(b"").count(), 0);
        assert_eq!(matcher.scan(b"ACGTA").count(), 1);
    }

    #[test]
    fn test_candidates() {
        let mut builder = KmerIndexBuilder::new(4);
        builder.index(b"ACGTAA", 3);
        builder.index(b"ACGT", 5);
        let matcher = builder.build();

        assert_eq!(matcher.candidates(b"ACGTCC").collect::<Vec<_>>(), vec![3, 5]);
        assert_eq!(matcher.len(), 2);
    }

    #[test]
    #[should_panic(expected = "shorter than the indexed length")]
    fn test_index_short_pattern() {
        let mut builder = KmerIndexBuilder::new(4);
        builder.index(b"ACG", 0);
    }

    #[test]
    fn test_interleaved_scan() {
        let mut builder = InterleavedKmerIndexBuilder::new(8, 2);
        // Phase 0: "AGTC", phase 1: "CTAA"
        builder.index(b"ACGTTACA", 7);
        let matcher = builder.build();
        assert_eq!(matcher.part_span(), 7);

        // Pattern at 3 with a mismatch at offset 6, so only phase 1 is exact.
        let text = b"GGGACGTTAGAGG";
        let hits: Vec<(usize, u32, usize)> = matcher
            .scan(text)
            .filter(|&(pos, _, phase)| {
                pos >= phase
                    && text[pos..]
                        .iter()
                        .step_by(2)
                        .take(4)
                        .eq(b"ACGTTACA".iter().skip(phase).step_by(2))
            })
            .collect();
        assert_eq!(hits, vec![(4, 7, 1)]);
    }
}
