use log::debug;
use serde::Serialize;

use crate::overlap::{AssemblyError, OverlapResult};
use crate::pg_index::PgIndex;
use crate::pseudogenome::{PseudoGenome, ReadList, ReadListBuilder};
use crate::reads::PackedReadsSet;

pub(crate) const NO_READ: u32 = u32::MAX;

/// Statistics of the cycles broken in an overlap forest.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize)]
pub struct CycleStats {
    pub cycles: usize,
    pub lost_overlap: usize,
}

/// Singly linked chains of overlapping reads.
///
/// `next_read[a] == b` with `overlap[a] == k` means that the last `k` symbols
/// of read `a` are equal to the first `k` symbols of read `b`.
#[derive(Debug, Clone)]
pub struct OverlapForest {
    read_length: usize,
    next_read: Vec<u32>,
    overlap: Vec<u16>,
    has_predecessor: Vec<bool>,
    head_read: Vec<u32>,
}

impl OverlapForest {
    #[must_use]
    pub fn new(read_count: usize, read_length: usize) -> Self {
        Self {
            read_length,
            next_read: vec![NO_READ; read_count],
            overlap: vec![0; read_count],
            has_predecessor: vec![false; read_count],
            head_read: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.next_read.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.next_read.is_empty()
    }

    #[must_use]
    pub fn read_length(&self) -> usize {
        self.read_length
    }

    pub(crate) fn link(&mut self, from: u32, to: u32, overlap: usize) {
        debug_assert_eq!(self.next_read[from as usize], NO_READ);
        debug_assert!(!self.has_predecessor[to as usize]);
        debug_assert!(overlap <= self.read_length);

        self.next_read[from as usize] = to;
        self.overlap[from as usize] = overlap as u16;
        self.has_predecessor[to as usize] = true;
    }

    fn unlink(&mut self, from: usize) {
        let to = self.next_read[from] as usize;
        self.next_read[from] = NO_READ;
        self.overlap[from] = 0;
        self.has_predecessor[to] = false;
    }

    #[inline]
    #[must_use]
    pub fn next_read(&self, read: usize) -> Option<usize> {
        match self.next_read[read] {
            NO_READ => None,
            next => Some(next as usize),
        }
    }

    /// Overlap with the next read, `0` at the end of a chain.
    #[inline]
    #[must_use]
    pub fn overlap(&self, read: usize) -> usize {
        self.overlap[read] as usize
    }

    #[inline]
    #[must_use]
    pub fn has_predecessor(&self, read: usize) -> bool {
        self.has_predecessor[read]
    }

    #[inline]
    #[must_use]
    pub fn has_successor(&self, read: usize) -> bool {
        self.next_read[read] != NO_READ
    }

    /// First read of the chain containing `read`; available after
    /// [`Self::remove_cycles_and_prepare_components`].
    #[must_use]
    pub fn head_read(&self, read: usize) -> Option<usize> {
        match self.head_read.get(read) {
            Some(&head) if head != NO_READ => Some(head as usize),
            _ => None,
        }
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.next_read.iter().filter(|&&next| next != NO_READ).count()
    }

    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.overlap
            .iter()
            .filter(|&&overlap| overlap as usize == self.read_length && self.read_length != 0)
            .count()
    }

    #[must_use]
    pub fn total_overlap(&self) -> usize {
        self.overlap.iter().map(|&overlap| overlap as usize).sum()
    }

    #[must_use]
    pub fn component_count(&self) -> usize {
        self.has_predecessor.iter().filter(|&&pred| !pred).count()
    }

    fn mark_component(&mut self, root: usize) {
        let mut current = root;
        loop {
            self.head_read[current] = root as u32;
            match self.next_read(current) {
                Some(next) => current = next,
                None => break,
            }
        }
    }

    /// Breaks every cycle by removing its shortest overlap (ties: lowest source
    /// read index) and fills the head of every read.
    pub fn remove_cycles_and_prepare_components(&mut self) -> CycleStats {
        let read_count = self.len();
        self.head_read.clear();
        self.head_read.resize(read_count, NO_READ);

        for root in 0..read_count {
            if !self.has_predecessor[root] {
                self.mark_component(root);
            }
        }

        let mut stats = CycleStats::default();
        for start in 0..read_count {
            if self.head_read[start] != NO_READ {
                continue;
            }

            // Not reachable from any root: `start` lies on a cycle.
            let mut weakest = start;
            let mut current = start;
            loop {
                if (self.overlap[current], current) < (self.overlap[weakest], weakest) {
                    weakest = current;
                }
                current = self.next_read[current] as usize;
                if current == start {
                    break;
                }
            }

            let new_root = self.next_read[weakest] as usize;
            stats.cycles += 1;
            stats.lost_overlap += self.overlap(weakest);
            self.unlink(weakest);
            self.mark_component(new_root);
        }

        if stats.cycles > 0 {
            debug!(
                "Removed {} cycles ({} overlapping symbols lost)",
                stats.cycles, stats.lost_overlap
            );
        }
        stats
    }

    /// Length of the pseudogenome built from this forest (guard excluded).
    #[must_use]
    pub fn pseudogenome_length(&self) -> usize {
        self.len() * self.read_length - self.total_overlap()
    }

    /// Linearizes the chains, in increasing order of their first read.
    ///
    /// # Panics
    /// Panics if the forest still contains a cycle.
    pub fn into_pseudogenome<P: PgIndex>(
        self,
        reads: &PackedReadsSet,
    ) -> OverlapResult<(PseudoGenome, ReadList<P>)> {
        assert_eq!(reads.len(), self.len(), "Forest built for another reads set");
        let guard_symbol = reads
            .properties()
            .guard_symbol()
            .ok_or(AssemblyError::EmptyReadsSet)?;

        let length = self.pseudogenome_length();
        if P::from_usize(length + self.read_length).is_none() {
            return Err(AssemblyError::PgTooLong(length, P::BITS));
        }

        let mut sequence = Vec::with_capacity(length + self.read_length);
        let mut builder = ReadListBuilder::with_capacity(self.read_length, self.len());
        let mut read = Vec::with_capacity(self.read_length);
        for root in 0..self.len() {
            if self.has_predecessor[root] {
                continue;
            }

            let mut current = root;
            loop {
                let position = P::from_usize(sequence.len())
                    .ok_or(AssemblyError::PgTooLong(length, P::BITS))?;
                builder.push(position, current as u32);

                read.clear();
                reads.unpack_into(current, &mut read);
                sequence.extend_from_slice(&read[..self.read_length - self.overlap(current)]);

                match self.next_read(current) {
                    Some(next) => current = next,
                    None => break,
                }
            }
        }

        assert_eq!(
            builder.len(),
            self.len(),
            "Overlap forest contains cycles; remove them before linearization"
        );
        debug_assert_eq!(sequence.len(), length);

        Ok((
            PseudoGenome::new(sequence, self.read_length, guard_symbol),
            builder.build(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use crate::overlap::forest::{CycleStats, OverlapForest};
    use crate::reads::PackedReadsSet;

    #[test]
    fn test_linearize_chains() {
        let reads = PackedReadsSet::from_reads(&["GTACGTTT", "TTTTAAAA", "ACGTACGT"]).unwrap();
        let mut forest = OverlapForest::new(3, 8);
        forest.link(2, 0, 6);

        let stats = forest.remove_cycles_and_prepare_components();
        assert_eq!(stats, CycleStats::default());
        assert_eq!(forest.head_read(0), Some(2));
        assert_eq!(forest.component_count(), 2);

        let (pg, list) = forest.into_pseudogenome::<u32>(&reads).unwrap();
        assert_eq!(pg.sequence(), b"TTTTAAAAACGTACGTTT");
        let entries: Vec<(u32, u32)> = list
            .entries()
            .iter()
            .map(|entry| (entry.position, entry.original_index))
            .collect();
        assert_eq!(entries, vec![(0, 1), (8, 2), (10, 0)]);
        list.check_reads(&pg, &reads, None).unwrap();
    }

    #[test]
    fn test_remove_cycle() {
        let reads = PackedReadsSet::from_reads(&["ACAC", "CACA", "GGGG"]).unwrap();
        let mut forest = OverlapForest::new(3, 4);
        forest.link(0, 1, 3);
        forest.link(1, 0, 3);

        let stats = forest.remove_cycles_and_prepare_components();
        assert_eq!(
            stats,
            CycleStats {
                cycles: 1,
                lost_overlap: 3
            }
        );
        assert_eq!(forest.next_read(0), None);
        assert_eq!(forest.next_read(1), Some(0));
        assert_eq!(forest.head_read(0), Some(1));

        let (pg, list) = forest.into_pseudogenome::<u32>(&reads).unwrap();
        assert_eq!(pg.sequence(), b"CACACGGGG");
        list.check_reads(&pg, &reads, None).unwrap();
    }

    #[test]
    fn test_remove_weakest_edge() {
        let mut forest = OverlapForest::new(3, 4);
        forest.link(0, 1, 3);
        forest.link(1, 2, 1);
        forest.link(2, 0, 2);

        let stats = forest.remove_cycles_and_prepare_components();
        assert_eq!(stats.lost_overlap, 1);
        assert_eq!(forest.next_read(1), None);
        assert_eq!(forest.head_read(1), Some(2));
    }
}
