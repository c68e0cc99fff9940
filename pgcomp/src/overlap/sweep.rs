use std::cmp::Ordering;
use std::collections::VecDeque;
use std::ops::Range;

use itertools::Itertools;
use log::{debug, trace};

use crate::overlap::forest::{OverlapForest, NO_READ};
use crate::overlap::head_tracker::HeadTracker;
use crate::overlap::AssemblyParams;
use crate::progress::{ProgressNotifier, SymbolNum};
use crate::reads::PackedReadsSet;

/// Suffixes and prefixes sharing the same overlap key at one depth.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(super) struct EqualGroup {
    pub suffixes: Range<usize>,
    pub prefixes: Range<usize>,
}

/// The data-parallel steps of the sweep; linking itself is always serial.
pub(super) trait SweepStrategy {
    /// Sorts read indices by content, ties by index.
    fn sort_by_content(&self, reads: &PackedReadsSet, order: &mut [u32]);

    /// Finds the equal groups between `suffixes`, sorted by
    /// `(read[shift..], index)`, and `prefixes`, sorted by content.
    fn find_equal_groups(
        &self,
        reads: &PackedReadsSet,
        suffixes: &[u32],
        prefixes: &[u32],
        shift: usize,
    ) -> Vec<EqualGroup>;

    /// Reorders suffixes sorted by `(read[shift..], index)` into
    /// `(read[shift + 1..], index)` order.
    fn advance_suffixes(
        &self,
        reads: &PackedReadsSet,
        suffixes: Vec<u32>,
        shift: usize,
    ) -> Vec<u32>;
}

#[inline]
pub(super) fn content_order(reads: &PackedReadsSet, a: u32, b: u32) -> Ordering {
    reads
        .compare_reads(a as usize, b as usize)
        .then(a.cmp(&b))
}

#[inline]
pub(super) fn suffix_order(reads: &PackedReadsSet, a: u32, b: u32, shift: usize) -> Ordering {
    reads
        .compare_suffixes(a as usize, b as usize, shift)
        .then(a.cmp(&b))
}

/// Walks both sorted lists and records every run of equal keys.
///
/// Group ranges are shifted by `base` so that they index the full lists when
/// joining sub-slices.
pub(super) fn merge_join(
    reads: &PackedReadsSet,
    suffixes: &[u32],
    prefixes: &[u32],
    shift: usize,
    base: (usize, usize),
    groups: &mut Vec<EqualGroup>,
) {
    let overlap = reads.read_length() - shift;
    let (mut s, mut p) = (0, 0);

    while s < suffixes.len() && p < prefixes.len() {
        let suffix = suffixes[s] as usize;
        let prefix = prefixes[p] as usize;

        match reads.compare_suffix_with_prefix(suffix, prefix, shift) {
            Ordering::Less => s += 1,
            Ordering::Greater => p += 1,
            Ordering::Equal => {
                let s_end = s
                    + 1
                    + suffixes[s + 1..]
                        .iter()
                        .take_while(|&&other| {
                            reads.compare_suffixes(suffix, other as usize, shift) == Ordering::Equal
                        })
                        .count();
                let p_end = p
                    + 1
                    + prefixes[p + 1..]
                        .iter()
                        .take_while(|&&other| {
                            reads.compare_prefixes(prefix, other as usize, overlap)
                                == Ordering::Equal
                        })
                        .count();

                groups.push(EqualGroup {
                    suffixes: base.0 + s..base.0 + s_end,
                    prefixes: base.1 + p..base.1 + p_end,
                });
                s = s_end;
                p = p_end;
            }
        }
    }
}

struct Linker<'a> {
    forest: &'a mut OverlapForest,
    heads: HeadTracker,
    cycle_avoidance: bool,
    free_prefixes: VecDeque<u32>,
}

impl<'a> Linker<'a> {
    fn link(&mut self, from: u32, to: u32, overlap: usize) {
        let head = self.heads.get_head(from);
        self.forest.link(from, to, overlap);
        self.heads.attach(to, head);
    }

    fn chain_duplicates(&mut self, reads: &PackedReadsSet, order: &[u32]) -> usize {
        let mut duplicates = 0;
        for (a, b) in order.iter().copied().tuple_windows() {
            if reads.compare_reads(a as usize, b as usize) == Ordering::Equal {
                self.link(a, b, reads.read_length());
                duplicates += 1;
            }
        }

        duplicates
    }

    /// Pairs the suffixes of every group with its prefixes in sorted order,
    /// skipping prefixes that would close a cycle.
    fn link_groups(
        &mut self,
        groups: &[EqualGroup],
        suffixes: &[u32],
        prefixes: &[u32],
        overlap: usize,
    ) -> usize {
        let mut linked = 0;

        for group in groups {
            self.free_prefixes.clear();
            self.free_prefixes
                .extend(prefixes[group.prefixes.clone()].iter().copied());

            for &suffix in &suffixes[group.suffixes.clone()] {
                if self.free_prefixes.is_empty() {
                    break;
                }

                let head = if self.cycle_avoidance {
                    self.heads.get_head(suffix)
                } else {
                    NO_READ
                };
                let found = self
                    .free_prefixes
                    .iter()
                    .position(|&prefix| prefix != head);

                if let Some(prefix) = found.and_then(|pos| self.free_prefixes.remove(pos)) {
                    trace!("Linking read {} -> {} (overlap {})", suffix, prefix, overlap);
                    self.forest.link(suffix, prefix, overlap);
                    if self.cycle_avoidance {
                        self.heads.attach(prefix, head);
                    }
                    linked += 1;
                }
            }
        }

        linked
    }
}

/// Greedy overlap sweep shared by the serial and the parallel generator.
pub(super) fn sweep<S: SweepStrategy>(
    strategy: &S,
    reads: &PackedReadsSet,
    params: &AssemblyParams,
) -> OverlapForest {
    let read_count = reads.len();
    let read_length = reads.read_length();
    let notifier = params.progress_notifier();
    notifier.set_iter_num(read_length as u64);

    let mut forest = OverlapForest::new(read_count, read_length);
    let mut linker = Linker {
        forest: &mut forest,
        heads: HeadTracker::new(read_count),
        cycle_avoidance: params.cycle_avoidance(),
        free_prefixes: VecDeque::new(),
    };

    let mut order: Vec<u32> = (0..read_count as u32).collect();
    strategy.sort_by_content(reads, &mut order);
    let duplicates = linker.chain_duplicates(reads, &order);
    debug!("Chained {} duplicate reads", duplicates);
    notifier.inc_iter();

    let mut prefixes: Vec<u32> = order
        .iter()
        .copied()
        .filter(|&read| !linker.forest.has_predecessor(read as usize))
        .collect();
    let mut suffixes: Vec<u32> = order
        .into_iter()
        .filter(|&read| !linker.forest.has_successor(read as usize))
        .collect();
    if read_length > 1 {
        suffixes = strategy.advance_suffixes(reads, suffixes, 0);
    }

    for shift in 1..read_length {
        if prefixes.is_empty() || suffixes.is_empty() {
            break;
        }

        let overlap = read_length - shift;
        let groups = strategy.find_equal_groups(reads, &suffixes, &prefixes, shift);
        let linked = linker.link_groups(&groups, &suffixes, &prefixes, overlap);

        prefixes.retain(|&read| !linker.forest.has_predecessor(read as usize));
        suffixes.retain(|&read| !linker.forest.has_successor(read as usize));
        if shift + 1 < read_length {
            suffixes = strategy.advance_suffixes(reads, suffixes, shift);
        }

        debug!(
            "Overlap {}: {} groups, {} reads linked, {} suffixes left",
            overlap,
            groups.len(),
            linked,
            suffixes.len()
        );
        notifier.processed_symbols(SymbolNum::new(linked * overlap));
        notifier.inc_iter();
    }

    forest
}

#[cfg(test)]
mod tests {
    use crate::overlap::sweep::{merge_join, EqualGroup};
    use crate::reads::PackedReadsSet;

    #[test]
    fn test_merge_join_groups() {
        // Ranks: A=0, C=1, G=2, T=3
        let reads =
            PackedReadsSet::from_reads(&["ACGT", "AACG", "TACG", "CGAA", "CGTT", "CGTA"]).unwrap();
        // Suffixes by read[2..]: "CG" (1), "CG" (2), "GT" (0)
        let suffixes = [1, 2, 0];
        // Prefixes by content: CGAA, CGTA, CGTT
        let prefixes = [3, 5, 4];

        let mut groups = Vec::new();
        merge_join(&reads, &suffixes, &prefixes, 2, (0, 0), &mut groups);

        assert_eq!(
            groups,
            vec![EqualGroup {
                suffixes: 0..2,
                prefixes: 0..3,
            }]
        );
    }

    #[test]
    fn test_merge_join_offsets() {
        let reads = PackedReadsSet::from_reads(&["AACC", "CCGG"]).unwrap();

        let mut groups = Vec::new();
        merge_join(&reads, &[0], &[1], 2, (5, 7), &mut groups);

        assert_eq!(
            groups,
            vec![EqualGroup {
                suffixes: 5..6,
                prefixes: 7..8,
            }]
        );
    }
}
