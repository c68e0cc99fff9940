use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::Range;

use crate::pg_index::PgIndex;
use crate::reads::{reverse_complement_in_place, IndexMapping, PackedReadsSet};

/// Assembled reference string.
///
/// Holds one symbol per byte. The logical sequence is followed by
/// `read_length` guard symbols so that a read window starting at any logical
/// position can be taken without bounds juggling.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PseudoGenome {
    sequence: Vec<u8>,
    length: usize,
    read_length: usize,
}

impl PseudoGenome {
    #[must_use]
    pub fn new(mut sequence: Vec<u8>, read_length: usize, guard_symbol: u8) -> Self {
        let length = sequence.len();
        sequence.resize(length + read_length, guard_symbol);

        Self {
            sequence,
            length,
            read_length,
        }
    }

    /// Logical length (guard excluded).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[must_use]
    pub fn read_length(&self) -> usize {
        self.read_length
    }

    #[inline]
    #[must_use]
    pub fn sequence(&self) -> &[u8] {
        &self.sequence[..self.length]
    }

    /// Sequence including the guard symbols.
    #[must_use]
    pub fn padded_sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// Returns `length` symbols starting at `pos`.
    ///
    /// # Panics
    /// Panics if the window reaches past the guard padding.
    #[inline]
    #[must_use]
    pub fn window(&self, pos: usize, length: usize) -> &[u8] {
        assert!(
            pos + length <= self.sequence.len(),
            "Pseudogenome window {}..{} out of bounds (padded length: {})",
            pos,
            pos + length,
            self.sequence.len()
        );
        &self.sequence[pos..pos + length]
    }

    #[must_use]
    pub fn into_sequence(self) -> Vec<u8> {
        let mut sequence = self.sequence;
        sequence.truncate(self.length);
        sequence
    }
}

/// Single symbol differing between a read and its pseudogenome window.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Mismatch {
    /// Offset within the pseudogenome window.
    pub offset: u16,
    /// Symbol of the (oriented) read at that offset.
    pub symbol: u8,
}

impl Mismatch {
    #[must_use]
    pub fn new(offset: u16, symbol: u8) -> Self {
        Self { offset, symbol }
    }
}

/// Placement of one read inside a pseudogenome.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ReadListEntry<P> {
    pub position: P,
    pub original_index: u32,
    pub reverse_complement: bool,
    mismatches_start: u32,
    mismatches_len: u16,
}

impl<P: PgIndex> ReadListEntry<P> {
    #[must_use]
    pub fn new(position: P, original_index: u32) -> Self {
        Self {
            position,
            original_index,
            reverse_complement: false,
            mismatches_start: 0,
            mismatches_len: 0,
        }
    }

    #[must_use]
    pub fn mismatch_count(&self) -> usize {
        self.mismatches_len as usize
    }

    fn mismatch_range(&self) -> Range<usize> {
        let start = self.mismatches_start as usize;
        start..start + self.mismatches_len as usize
    }
}

/// Error found when checking a read list against its reads.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ReadListError {
    /// Number of entries differs from the number of reads.
    ReadCountMismatch(usize, usize),
    /// The entry points to a read index outside of the reads set.
    IndexOutOfRange(u32),
    /// The entry does not restore its read.
    ReadMismatch { entry: usize, original_index: u32 },
}

impl Display for ReadListError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadListError::ReadCountMismatch(entries, reads) => write!(
                f,
                "Read count mismatch (entries: {}, reads: {})",
                entries, reads
            ),
            ReadListError::IndexOutOfRange(index) => {
                write!(f, "Read index out of range: {}", index)
            }
            ReadListError::ReadMismatch {
                entry,
                original_index,
            } => write!(
                f,
                "Entry #{} does not restore read #{}",
                entry, original_index
            ),
        }
    }
}

impl Error for ReadListError {}

/// Placements of reads inside a pseudogenome, ordered by position.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ReadList<P> {
    read_length: usize,
    entries: Vec<ReadListEntry<P>>,
    mismatches: Vec<Mismatch>,
}

impl<P: PgIndex> ReadList<P> {
    #[must_use]
    pub fn read_length(&self) -> usize {
        self.read_length
    }

    #[must_use]
    pub fn entries(&self) -> &[ReadListEntry<P>] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn mismatches(&self, entry: &ReadListEntry<P>) -> &[Mismatch] {
        &self.mismatches[entry.mismatch_range()]
    }

    #[must_use]
    pub fn total_mismatches(&self) -> usize {
        self.mismatches.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ReadListEntry<P>, &[Mismatch])> + '_ {
        self.entries
            .iter()
            .map(move |entry| (entry, self.mismatches(entry)))
    }

    /// Positions stored as deltas from the previous entry.
    pub fn offsets(&self) -> impl Iterator<Item = usize> + '_ {
        let mut previous = 0;
        self.entries.iter().map(move |entry| {
            let position = entry.position.to_usize();
            let offset = position - previous;
            previous = position;
            offset
        })
    }

    #[must_use]
    pub fn restore_read(&self, pg: &PseudoGenome, entry: &ReadListEntry<P>) -> Vec<u8> {
        let mut read = pg
            .window(entry.position.to_usize(), self.read_length)
            .to_vec();
        for mismatch in self.mismatches(entry) {
            read[mismatch.offset as usize] = mismatch.symbol;
        }
        if entry.reverse_complement {
            reverse_complement_in_place(&mut read);
        }
        read
    }

    /// Checks that every entry restores its read.
    ///
    /// With `mapping`, entries hold indices of the set `reads` was compacted
    /// from.
    pub fn check_reads(
        &self,
        pg: &PseudoGenome,
        reads: &PackedReadsSet,
        mapping: Option<&IndexMapping>,
    ) -> Result<(), ReadListError> {
        if self.len() != reads.len() {
            return Err(ReadListError::ReadCountMismatch(self.len(), reads.len()));
        }

        let mut read_for_original = std::collections::HashMap::with_capacity(reads.len());
        for index in 0..reads.len() {
            let original = mapping.map_or(index as u32, |mapping| mapping.original_index(index));
            read_for_original.insert(original, index);
        }

        for (entry_index, entry) in self.entries.iter().enumerate() {
            let read_index = *read_for_original
                .get(&entry.original_index)
                .ok_or(ReadListError::IndexOutOfRange(entry.original_index))?;
            if self.restore_read(pg, entry) != reads.read_bytes(read_index) {
                return Err(ReadListError::ReadMismatch {
                    entry: entry_index,
                    original_index: entry.original_index,
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ReadListBuilder<P> {
    read_length: usize,
    entries: Vec<ReadListEntry<P>>,
    mismatches: Vec<Mismatch>,
}

impl<P: PgIndex> ReadListBuilder<P> {
    #[must_use]
    pub fn new(read_length: usize) -> Self {
        Self {
            read_length,
            entries: Vec::new(),
            mismatches: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_capacity(read_length: usize, capacity: usize) -> Self {
        Self {
            read_length,
            entries: Vec::with_capacity(capacity),
            mismatches: Vec::new(),
        }
    }

    pub fn push(&mut self, position: P, original_index: u32) -> &mut Self {
        self.entries
            .push(ReadListEntry::new(position, original_index));
        self
    }

    pub fn push_matched(
        &mut self,
        position: P,
        original_index: u32,
        reverse_complement: bool,
        mismatches: &[Mismatch],
    ) -> &mut Self {
        let mut entry = ReadListEntry::new(position, original_index);
        entry.reverse_complement = reverse_complement;
        entry.mismatches_start = self.mismatches.len() as u32;
        entry.mismatches_len = mismatches.len() as u16;
        self.mismatches.extend_from_slice(mismatches);
        self.entries.push(entry);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorts the entries by position (ties by original index).
    #[must_use]
    pub fn build(mut self) -> ReadList<P> {
        self.entries
            .sort_unstable_by_key(|entry| (entry.position, entry.original_index));

        ReadList {
            read_length: self.read_length,
            entries: self.entries,
            mismatches: self.mismatches,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::pseudogenome::{Mismatch, PseudoGenome, ReadListBuilder, ReadListError};
    use crate::reads::PackedReadsSet;

    #[test]
    fn test_guard_padding() {
        let pg = PseudoGenome::new(b"ACGTACGTTT".to_vec(), 8, b'T');

        assert_eq!(pg.len(), 10);
        assert_eq!(pg.sequence(), b"ACGTACGTTT");
        assert_eq!(pg.padded_sequence().len(), 18);
        assert_eq!(pg.window(9, 3), b"TTT");
        assert_eq!(pg.into_sequence(), b"ACGTACGTTT");
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_window_out_of_bounds() {
        let pg = PseudoGenome::new(b"ACGT".to_vec(), 2, b'T');
        let _ = pg.window(5, 2);
    }

    #[test]
    fn test_build_sorts_entries() {
        let mut builder = ReadListBuilder::<u32>::new(4);
        builder.push(6, 2).push(0, 1).push(6, 0);
        let list = builder.build();

        let order: Vec<(u32, u32)> = list
            .entries()
            .iter()
            .map(|entry| (entry.position, entry.original_index))
            .collect();
        assert_eq!(order, vec![(0, 1), (6, 0), (6, 2)]);
        assert_eq!(list.offsets().collect::<Vec<_>>(), vec![0, 6, 0]);
    }

    #[test]
    fn test_restore_with_mismatches_and_reverse_complement() {
        let pg = PseudoGenome::new(b"AACCGGTT".to_vec(), 4, b'T');
        let mut builder = ReadListBuilder::<u64>::new(4);
        // Window "CCGG" patched to "CAGG", reverse complement "CCTG".
        builder.push_matched(2, 0, true, &[Mismatch::new(1, b'A')]);
        builder.push(0, 1);
        let list = builder.build();

        let reads = PackedReadsSet::from_reads(&["CCTG", "AACC"]).unwrap();
        let entry = list.entries()[1];
        assert_eq!(list.restore_read(&pg, &entry), b"CCTG");
        assert_eq!(list.total_mismatches(), 1);
        list.check_reads(&pg, &reads, None).unwrap();
    }

    #[test]
    fn test_check_reads_errors() {
        let pg = PseudoGenome::new(b"AACCGGTT".to_vec(), 4, b'T');
        let reads = PackedReadsSet::from_reads(&["AACC", "GGTT"]).unwrap();

        let mut builder = ReadListBuilder::<u32>::new(4);
        builder.push(0, 0);
        assert_eq!(
            builder.build().check_reads(&pg, &reads, None),
            Err(ReadListError::ReadCountMismatch(1, 2))
        );

        let mut builder = ReadListBuilder::<u32>::new(4);
        builder.push(0, 0).push(3, 1);
        assert_eq!(
            builder.build().check_reads(&pg, &reads, None),
            Err(ReadListError::ReadMismatch {
                entry: 1,
                original_index: 1
            })
        );
    }
}
