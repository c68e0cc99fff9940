use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};

use log::warn;
use rayon::prelude::*;

use crate::alphabet::ReadsSetProperties;

/// Error occurring when building a reads set.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ReadsSetError {
    /// The alphabet does not contain any symbol.
    EmptyAlphabet,
    /// The alphabet would contain more symbols than can be packed.
    AlphabetTooLarge(usize),
    /// A fixed alphabet lists the same symbol twice.
    DuplicateSymbol(u8),
    /// A read contains a symbol outside of the fixed alphabet.
    UnknownSymbol(u8),
    /// The read with given index is empty.
    EmptyRead(usize),
    /// Reads are longer than the supported maximum.
    ReadTooLong(usize, usize),
    /// More reads than can be addressed by a read index.
    TooManyReads(usize),
}

impl Display for ReadsSetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadsSetError::EmptyAlphabet => write!(f, "Empty alphabet"),
            ReadsSetError::AlphabetTooLarge(size) => write!(
                f,
                "Alphabet too large (symbols: {}, limit: {})",
                size,
                crate::alphabet::MAX_ALPHABET_SIZE
            ),
            ReadsSetError::DuplicateSymbol(symbol) => {
                write!(f, "Duplicate alphabet symbol: {:?}", *symbol as char)
            }
            ReadsSetError::UnknownSymbol(symbol) => {
                write!(f, "Symbol outside of the alphabet: {:?}", *symbol as char)
            }
            ReadsSetError::EmptyRead(index) => write!(f, "Read #{} is empty", index),
            ReadsSetError::ReadTooLong(length, max_length) => write!(
                f,
                "Read too long (read length: {}, limit: {})",
                length, max_length
            ),
            ReadsSetError::TooManyReads(count) => write!(f, "Too many reads: {}", count),
        }
    }
}

impl Error for ReadsSetError {}

pub type ReadsSetResult<T> = Result<T, ReadsSetError>;

/// Longest read a set can hold; mismatch offsets are stored as `u16`.
pub const MAX_READ_LENGTH: usize = u16::MAX as usize;

/// Immutable set of equal-length reads, bit-packed into `u64` words.
///
/// Every read starts at a word boundary. The first symbol of a word occupies its
/// most significant bits, so comparing the words of two reads as integers
/// orders the reads lexicographically by symbol rank.
#[derive(Debug, Clone)]
pub struct PackedReadsSet {
    properties: ReadsSetProperties,
    bits: u32,
    symbols_per_word: usize,
    words_per_read: usize,
    data: Vec<u64>,
}

impl PackedReadsSet {
    /// Packs `reads`, assigning alphabet ranks in first-seen order.
    ///
    /// Reads of variable length are truncated to the shortest one (with a
    /// warning).
    pub fn from_reads<R: AsRef<[u8]> + Sync>(reads: &[R]) -> ReadsSetResult<Self> {
        Self::build(reads, ReadsSetProperties::empty(), true)
    }

    /// Packs `reads` using a fixed alphabet.
    pub fn with_alphabet<R: AsRef<[u8]> + Sync>(
        reads: &[R],
        alphabet: &[u8],
    ) -> ReadsSetResult<Self> {
        let properties = ReadsSetProperties::with_alphabet(alphabet)?;
        Self::build(reads, properties, false)
    }

    fn build<R: AsRef<[u8]> + Sync>(
        reads: &[R],
        mut properties: ReadsSetProperties,
        extend_alphabet: bool,
    ) -> ReadsSetResult<Self> {
        if reads.len() > u32::MAX as usize {
            return Err(ReadsSetError::TooManyReads(reads.len()));
        }

        let read_length = Self::common_length(reads)?;
        if extend_alphabet {
            for read in reads {
                for &symbol in &read.as_ref()[..read_length] {
                    properties.observe(symbol)?;
                }
            }
        }
        if properties.symbol_count() == 0 && !reads.is_empty() {
            return Err(ReadsSetError::EmptyAlphabet);
        }
        properties.set_shape(reads.len(), read_length);

        let bits = properties.bits_per_symbol();
        let symbols_per_word = properties.symbols_per_word();
        let words_per_read = (read_length + symbols_per_word - 1) / symbols_per_word;

        let mut data = vec![0u64; words_per_read * reads.len()];
        if words_per_read > 0 {
            data.par_chunks_mut(words_per_read)
                .zip(reads.par_iter())
                .try_for_each(|(words, read)| {
                    for (pos, &symbol) in read.as_ref()[..read_length].iter().enumerate() {
                        let rank = properties
                            .rank(symbol)
                            .ok_or(ReadsSetError::UnknownSymbol(symbol))?;
                        let slot = (pos % symbols_per_word) as u32;
                        words[pos / symbols_per_word] |=
                            (rank as u64) << (u64::BITS - bits * (slot + 1));
                    }
                    Ok(())
                })?;
        }

        Ok(Self {
            properties,
            bits,
            symbols_per_word,
            words_per_read,
            data,
        })
    }

    fn common_length<R: AsRef<[u8]>>(reads: &[R]) -> ReadsSetResult<usize> {
        let mut min_length = usize::MAX;
        let mut max_length = 0;
        for (index, read) in reads.iter().enumerate() {
            let length = read.as_ref().len();
            if length == 0 {
                return Err(ReadsSetError::EmptyRead(index));
            }
            min_length = min_length.min(length);
            max_length = max_length.max(length);
        }

        if reads.is_empty() {
            return Ok(0);
        }
        if min_length > MAX_READ_LENGTH {
            return Err(ReadsSetError::ReadTooLong(min_length, MAX_READ_LENGTH));
        }
        if max_length != min_length {
            let truncated = reads
                .iter()
                .filter(|read| read.as_ref().len() > min_length)
                .count();
            warn!(
                "Variable-length reads are not supported; truncating {} reads (up to {} symbols) to {} symbols",
                truncated, max_length, min_length
            );
        }

        Ok(min_length)
    }

    #[must_use]
    pub fn properties(&self) -> &ReadsSetProperties {
        &self.properties
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.read_count()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    #[must_use]
    pub fn read_length(&self) -> usize {
        self.properties.read_length()
    }

    #[inline]
    #[must_use]
    pub fn words(&self, index: usize) -> &[u64] {
        let start = index * self.words_per_read;
        &self.data[start..start + self.words_per_read]
    }

    #[inline]
    #[must_use]
    pub fn symbol_rank(&self, index: usize, pos: usize) -> u8 {
        let word = self.words(index)[pos / self.symbols_per_word];
        let slot = (pos % self.symbols_per_word) as u32;
        let mask = (1u64 << self.bits) - 1;
        ((word >> (u64::BITS - self.bits * (slot + 1))) & mask) as u8
    }

    #[inline]
    #[must_use]
    pub fn symbol(&self, index: usize, pos: usize) -> u8 {
        self.properties.symbol(self.symbol_rank(index, pos))
    }

    /// Appends the symbols of the read to `out`.
    pub fn unpack_into(&self, index: usize, out: &mut Vec<u8>) {
        out.reserve(self.read_length());
        for pos in 0..self.read_length() {
            out.push(self.symbol(index, pos));
        }
    }

    #[must_use]
    pub fn read_bytes(&self, index: usize) -> Vec<u8> {
        let mut read = Vec::with_capacity(self.read_length());
        self.unpack_into(index, &mut read);
        read
    }

    /// Returns `count` symbols starting at `start`, left-aligned in a word.
    #[inline]
    fn window(&self, index: usize, start: usize, count: usize) -> u64 {
        debug_assert!(count > 0 && count <= self.symbols_per_word);

        let words = self.words(index);
        let word_index = start / self.symbols_per_word;
        let slot = start % self.symbols_per_word;

        let mut value = words[word_index] << (slot as u32 * self.bits);
        if slot != 0 && word_index + 1 < words.len() {
            value |= words[word_index + 1] >> ((self.symbols_per_word - slot) as u32 * self.bits);
        }
        value & (!0u64 << (u64::BITS - count as u32 * self.bits))
    }

    /// Compares `a[a_start..a_start + length]` with `b[b_start..b_start + length]`.
    #[must_use]
    pub fn compare_ranges(
        &self,
        a: usize,
        a_start: usize,
        b: usize,
        b_start: usize,
        length: usize,
    ) -> Ordering {
        let mut done = 0;
        while done < length {
            let count = self.symbols_per_word.min(length - done);
            let word_a = self.window(a, a_start + done, count);
            let word_b = self.window(b, b_start + done, count);
            if word_a != word_b {
                return word_a.cmp(&word_b);
            }
            done += count;
        }

        Ordering::Equal
    }

    #[inline]
    #[must_use]
    pub fn compare_reads(&self, a: usize, b: usize) -> Ordering {
        self.words(a).cmp(self.words(b))
    }

    /// Compares the suffix of `a` starting at `shift` with the prefix of `b` of
    /// the same length.
    #[inline]
    #[must_use]
    pub fn compare_suffix_with_prefix(&self, a: usize, b: usize, shift: usize) -> Ordering {
        self.compare_ranges(a, shift, b, 0, self.read_length() - shift)
    }

    #[inline]
    #[must_use]
    pub fn compare_suffixes(&self, a: usize, b: usize, shift: usize) -> Ordering {
        self.compare_ranges(a, shift, b, shift, self.read_length() - shift)
    }

    #[inline]
    #[must_use]
    pub fn compare_prefixes(&self, a: usize, b: usize, length: usize) -> Ordering {
        self.compare_ranges(a, 0, b, 0, length)
    }

    /// Removes the reads not marked in `keep`, preserving relative order.
    pub fn compact(self, keep: &[bool]) -> (PackedReadsSet, IndexMapping) {
        assert_eq!(
            keep.len(),
            self.len(),
            "Compaction mask length does not match the reads count"
        );

        let original: Vec<u32> = keep
            .iter()
            .enumerate()
            .filter(|(_, &keep)| keep)
            .map(|(index, _)| index as u32)
            .collect();

        let mut data = Vec::with_capacity(original.len() * self.words_per_read);
        for &index in &original {
            data.extend_from_slice(self.words(index as usize));
        }

        let mut properties = self.properties;
        let read_length = properties.read_length();
        properties.set_shape(original.len(), read_length);

        let set = PackedReadsSet {
            properties,
            bits: self.bits,
            symbols_per_word: self.symbols_per_word,
            words_per_read: self.words_per_read,
            data,
        };
        (set, IndexMapping { original })
    }
}

/// Maps read indices of a compacted set back to the set it was compacted from.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct IndexMapping {
    original: Vec<u32>,
}

impl IndexMapping {
    #[must_use]
    pub fn identity(len: usize) -> Self {
        Self {
            original: (0..len as u32).collect(),
        }
    }

    #[inline]
    #[must_use]
    pub fn original_index(&self, index: usize) -> u32 {
        self.original[index]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.original.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    /// Chains a mapping produced by compacting an already compacted set.
    #[must_use]
    pub fn then(&self, next: &IndexMapping) -> IndexMapping {
        IndexMapping {
            original: next
                .original
                .iter()
                .map(|&index| self.original[index as usize])
                .collect(),
        }
    }
}

#[inline]
#[must_use]
pub fn complement(symbol: u8) -> u8 {
    match symbol {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        other => other,
    }
}

pub fn reverse_complement_in_place(sequence: &mut [u8]) {
    sequence.reverse();
    for symbol in sequence.iter_mut() {
        *symbol = complement(*symbol);
    }
}

#[must_use]
pub fn reverse_complement(sequence: &[u8]) -> Vec<u8> {
    sequence.iter().rev().map(|&symbol| complement(symbol)).collect()
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use crate::reads::{
        reverse_complement, IndexMapping, PackedReadsSet, ReadsSetError, MAX_READ_LENGTH,
    };

    #[test]
    fn test_pack_unpack() {
        let reads = ["ACGTACGT", "GTACGTTT"];
        let set = PackedReadsSet::from_reads(&reads).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.read_length(), 8);
        assert_eq!(set.read_bytes(0), b"ACGTACGT");
        assert_eq!(set.read_bytes(1), b"GTACGTTT");
        assert_eq!(set.symbol_rank(1, 0), 2);
    }

    #[test]
    fn test_pack_unpack_across_words() {
        let read: Vec<u8> = b"ACGTN".iter().copied().cycle().take(50).collect();
        let mut other = read.clone();
        other[47] = b'A';
        let set = PackedReadsSet::from_reads(&[&read, &other]).unwrap();

        assert_eq!(set.properties().bits_per_symbol(), 3);
        assert_eq!(set.read_bytes(0), read);
        assert_eq!(set.read_bytes(1), other);
        assert_eq!(set.compare_ranges(0, 1, 1, 1, 46), Ordering::Equal);
        assert_ne!(set.compare_reads(0, 1), Ordering::Equal);
        assert_eq!(set.compare_suffixes(0, 1, 48), Ordering::Equal);
    }

    #[test]
    fn test_compare_suffix_with_prefix() {
        let set = PackedReadsSet::from_reads(&["ACGTACGT", "GTACGTTT"]).unwrap();

        assert_eq!(set.compare_suffix_with_prefix(0, 1, 2), Ordering::Equal);
        assert_eq!(set.compare_suffix_with_prefix(0, 1, 4), Ordering::Less);
        assert_eq!(set.compare_suffix_with_prefix(1, 0, 1), Ordering::Greater);
    }

    #[test]
    fn test_order_matches_ranks() {
        // Ranks: C=0, A=1, G=2
        let set = PackedReadsSet::from_reads(&["CAG", "AAA", "CCC", "GAA"]).unwrap();

        assert_eq!(set.compare_reads(2, 0), Ordering::Less);
        assert_eq!(set.compare_reads(0, 1), Ordering::Less);
        assert_eq!(set.compare_reads(1, 3), Ordering::Less);
    }

    #[test_log::test]
    fn test_variable_length_truncated() {
        let set = PackedReadsSet::from_reads(&["ACGTAA", "ACGT", "TTTTT"]).unwrap();

        assert_eq!(set.read_length(), 4);
        assert_eq!(set.read_bytes(0), b"ACGT");
        assert_eq!(set.read_bytes(2), b"TTTT");
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            PackedReadsSet::from_reads(&["ACGT", ""]).unwrap_err(),
            ReadsSetError::EmptyRead(1)
        );
        assert_eq!(
            PackedReadsSet::with_alphabet(&["ACGN"], b"ACGT").unwrap_err(),
            ReadsSetError::UnknownSymbol(b'N')
        );
        assert_eq!(
            PackedReadsSet::from_reads(&["ABCDEFGHIJ"]).unwrap_err(),
            ReadsSetError::AlphabetTooLarge(9)
        );
        let long = vec![b'A'; MAX_READ_LENGTH + 1];
        assert!(matches!(
            PackedReadsSet::from_reads(&[long]),
            Err(ReadsSetError::ReadTooLong(_, _))
        ));
    }

    #[test]
    fn test_compact() {
        let set = PackedReadsSet::from_reads(&["AAAA", "CCCC", "GGGG", "TTTT"]).unwrap();
        let (set, mapping) = set.compact(&[false, true, false, true]);

        assert_eq!(set.len(), 2);
        assert_eq!(set.read_bytes(0), b"CCCC");
        assert_eq!(set.read_bytes(1), b"TTTT");
        assert_eq!(mapping.original_index(1), 3);

        let (set, next) = set.compact(&[false, true]);
        let chained = mapping.then(&next);
        assert_eq!(set.read_bytes(0), b"TTTT");
        assert_eq!(chained.original_index(0), 3);
        assert_eq!(IndexMapping::identity(2).original_index(1), 1);
    }

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement(b"AACGTN"), b"NACGTT");
    }
}
