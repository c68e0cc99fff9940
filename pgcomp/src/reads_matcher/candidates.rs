use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rayon::prelude::*;

use crate::reads::{reverse_complement_in_place, PackedReadsSet};
use crate::reads_matcher::MatchingStats;

/// Implied read start, read index, reverse complement flag.
pub(super) type Candidate = (usize, u32, bool);

/// Reads unpacked to one symbol per byte, followed by their reverse
/// complements when requested.
#[derive(Debug)]
pub(super) struct OrientedReads {
    data: Vec<u8>,
    read_length: usize,
    orientations: usize,
}

impl OrientedReads {
    pub fn new(reads: &PackedReadsSet, reverse_complement: bool) -> Self {
        let read_length = reads.read_length();
        let orientations = if reverse_complement { 2 } else { 1 };
        let mut data = vec![0; reads.len() * read_length * orientations];

        if read_length > 0 {
            data.par_chunks_mut(read_length * orientations)
                .enumerate()
                .for_each(|(index, chunk)| {
                    let (forward, rest) = chunk.split_at_mut(read_length);
                    for (pos, symbol) in forward.iter_mut().enumerate() {
                        *symbol = reads.symbol(index, pos);
                    }
                    if reverse_complement {
                        rest.copy_from_slice(forward);
                        reverse_complement_in_place(rest);
                    }
                });
        }

        Self {
            data,
            read_length,
            orientations,
        }
    }

    #[inline]
    pub fn get(&self, read: usize, reverse_complement: bool) -> &[u8] {
        let start = (read * self.orientations + reverse_complement as usize) * self.read_length;
        &self.data[start..start + self.read_length]
    }

    pub fn len(&self) -> usize {
        if self.read_length == 0 {
            0
        } else {
            self.data.len() / self.read_length / self.orientations
        }
    }

    pub fn read_length(&self) -> usize {
        self.read_length
    }

    pub fn orientations(&self) -> usize {
        self.orientations
    }
}

/// Best placement found so far for a read.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(super) struct Placement {
    pub position: usize,
    pub mismatches: u8,
    pub reverse_complement: bool,
}

/// Counts the differing symbols, giving up once there are more than `limit`.
#[inline]
pub(super) fn count_mismatches(pattern: &[u8], window: &[u8], limit: u8) -> Option<u8> {
    let mut count = 0u8;
    for (a, b) in pattern.iter().zip(window) {
        if a != b {
            if count == limit {
                return None;
            }
            count += 1;
        }
    }
    Some(count)
}

/// Verifies candidates against the pseudogenome.
///
/// Feeding every candidate of a read in ascending order keeps the placement
/// with the fewest mismatches, then the lowest position, then the forward
/// orientation.
#[derive(Debug)]
pub(super) struct Verifier<'a> {
    pg: &'a [u8],
    reads: &'a OrientedReads,
    max_mismatches: u8,
    mismatch_floor: u8,
}

impl<'a> Verifier<'a> {
    pub fn new(
        pg: &'a [u8],
        reads: &'a OrientedReads,
        max_mismatches: u8,
        mismatch_floor: u8,
    ) -> Self {
        Self {
            pg,
            reads,
            max_mismatches,
            mismatch_floor,
        }
    }

    pub fn pg(&self) -> &'a [u8] {
        self.pg
    }

    pub fn reads(&self) -> &'a OrientedReads {
        self.reads
    }

    pub fn verify(
        &self,
        best: &mut Option<Placement>,
        (start, read, reverse_complement): Candidate,
        stats: &mut MatchingStats,
    ) {
        let window = match self.pg.get(start..start + self.reads.read_length()) {
            Some(window) => window,
            None => return,
        };
        let pattern = self.reads.get(read as usize, reverse_complement);

        if let Some(placement) = best {
            if placement.mismatches <= self.mismatch_floor {
                if self.max_mismatches == 0 {
                    if pattern == window {
                        stats.multi_match_count += 1;
                    } else {
                        stats.false_match_count += 1;
                    }
                }
                return;
            }
        }

        let limit = best.map_or(self.max_mismatches, |placement| placement.mismatches - 1);
        match count_mismatches(pattern, window, limit) {
            Some(mismatches) => {
                *best = Some(Placement {
                    position: start,
                    mismatches,
                    reverse_complement,
                })
            }
            None => stats.false_match_count += 1,
        }
    }
}

/// Reorders candidates arriving at most `delay` positions after their start
/// into ascending order, dropping duplicates.
#[derive(Debug)]
pub(super) struct ReorderWindow {
    heap: BinaryHeap<Reverse<Candidate>>,
    delay: usize,
    last: Option<Candidate>,
}

impl ReorderWindow {
    pub fn new(delay: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            delay,
            last: None,
        }
    }

    pub fn push(&mut self, candidate: Candidate) {
        self.heap.push(Reverse(candidate));
    }

    /// Emits every candidate that no hit at `position` or later can precede.
    pub fn pop_ready<F: FnMut(Candidate)>(&mut self, position: usize, mut f: F) {
        while let Some(&Reverse(candidate)) = self.heap.peek() {
            if candidate.0 + self.delay >= position {
                break;
            }
            self.heap.pop();
            self.emit(candidate, &mut f);
        }
    }

    pub fn drain<F: FnMut(Candidate)>(&mut self, mut f: F) {
        while let Some(Reverse(candidate)) = self.heap.pop() {
            self.emit(candidate, &mut f);
        }
    }

    fn emit<F: FnMut(Candidate)>(&mut self, candidate: Candidate, f: &mut F) {
        if self.last != Some(candidate) {
            self.last = Some(candidate);
            f(candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::reads::PackedReadsSet;
    use crate::reads_matcher::candidates::{
        count_mismatches, OrientedReads, Placement, ReorderWindow, Verifier,
    };
    use crate::reads_matcher::MatchingStats;

    #[test]
    fn test_count_mismatches() {
        assert_eq!(count_mismatches(b"ACGT", b"ACGT", 0), Some(0));
        assert_eq!(count_mismatches(b"ACGT", b"AGGA", 2), Some(2));
        assert_eq!(count_mismatches(b"ACGT", b"AGGA", 1), None);
        assert_eq!(count_mismatches(b"ACGT", b"TGCA", 3), None);
    }

    #[test]
    fn test_oriented_reads() {
        let reads = PackedReadsSet::from_reads(&["AACG", "TTTC"]).unwrap();
        let oriented = OrientedReads::new(&reads, true);

        assert_eq!(oriented.len(), 2);
        assert_eq!(oriented.get(0, false), b"AACG");
        assert_eq!(oriented.get(0, true), b"CGTT");
        assert_eq!(oriented.get(1, true), b"GAAA");
    }

    #[test]
    fn test_reorder_window() {
        let mut window = ReorderWindow::new(4);
        let mut emitted = Vec::new();

        window.push((7, 1, false));
        window.push((5, 0, true));
        window.push((5, 0, false));
        window.pop_ready(9, |candidate| emitted.push(candidate));
        assert!(emitted.is_empty());

        window.push((5, 0, false));
        window.pop_ready(10, |candidate| emitted.push(candidate));
        assert_eq!(emitted, vec![(5, 0, false), (5, 0, true)]);

        window.drain(|candidate| emitted.push(candidate));
        assert_eq!(emitted.last(), Some(&(7, 1, false)));
        assert_eq!(emitted.len(), 3);
    }

    #[test]
    fn test_verifier_prefers_fewer_mismatches() {
        let reads = PackedReadsSet::from_reads(&["ACGTAC"]).unwrap();
        let oriented = OrientedReads::new(&reads, false);
        let pg = b"ACGAACTACGTACG";
        let verifier = Verifier::new(pg, &oriented, 2, 0);
        let mut stats = MatchingStats::default();

        let mut best = None;
        verifier.verify(&mut best, (0, 0, false), &mut stats);
        assert_eq!(best.map(|placement| placement.mismatches), Some(1));
        verifier.verify(&mut best, (3, 0, false), &mut stats);
        assert_eq!(stats.false_match_count, 1);
        verifier.verify(&mut best, (7, 0, false), &mut stats);
        assert_eq!(
            best,
            Some(Placement {
                position: 7,
                mismatches: 0,
                reverse_complement: false
            })
        );
        // Settled reads are not probed again; past the end is ignored.
        verifier.verify(&mut best, (10, 0, false), &mut stats);
        assert_eq!(stats.false_match_count, 1);
    }

    #[test]
    fn test_verifier_exact_mode_counts_multi_matches() {
        let reads = PackedReadsSet::from_reads(&["ACG"]).unwrap();
        let oriented = OrientedReads::new(&reads, false);
        let pg = b"ACGTACGTT";
        let verifier = Verifier::new(pg, &oriented, 0, 0);
        let mut stats = MatchingStats::default();

        let mut best = None;
        verifier.verify(&mut best, (1, 0, false), &mut stats);
        verifier.verify(&mut best, (4, 0, false), &mut stats);
        verifier.verify(&mut best, (5, 0, false), &mut stats);
        verifier.verify(&mut best, (0, 0, false), &mut stats);

        assert_eq!(best.map(|placement| placement.position), Some(4));
        assert_eq!(stats.false_match_count, 2);
        assert_eq!(stats.multi_match_count, 1);
    }
}
