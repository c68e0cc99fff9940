use std::ops::Range;

use log::{debug, info};
use rayon::prelude::*;

use crate::overlap::forest::OverlapForest;
use crate::overlap::sweep::{
    content_order, merge_join, suffix_order, sweep, EqualGroup, SweepStrategy,
};
use crate::overlap::{AssemblyError, AssemblyParams, OverlapGenerator, OverlapResult};
use crate::reads::PackedReadsSet;

/// Number of leading key symbols defining a block.
const BLOCK_KEY_SYMBOLS: usize = 3;

struct ParallelSweep {
    thread_num: usize,
}

impl ParallelSweep {
    fn block_key(
        reads: &PackedReadsSet,
        read: u32,
        start: usize,
        key_symbols: usize,
        alphabet_size: usize,
    ) -> usize {
        (start..start + key_symbols).fold(0, |key, pos| {
            key * alphabet_size + reads.symbol_rank(read as usize, pos) as usize
        })
    }

    /// Splits the blocks into at most `parts` contiguous ranges of similar
    /// total work.
    fn split_blocks(work: &[usize], parts: usize) -> Vec<Range<usize>> {
        let parts = parts.max(1);
        let total: usize = work.iter().sum();
        let target = (total + parts - 1) / parts;

        let mut ranges = Vec::with_capacity(parts);
        let mut start = 0;
        let mut accumulated = 0;
        for (block, &block_work) in work.iter().enumerate() {
            accumulated += block_work;
            if accumulated >= target && ranges.len() + 1 < parts && block + 1 < work.len() {
                ranges.push(start..block + 1);
                start = block + 1;
                accumulated = 0;
            }
        }
        ranges.push(start..work.len());

        ranges
    }
}

impl SweepStrategy for ParallelSweep {
    fn sort_by_content(&self, reads: &PackedReadsSet, order: &mut [u32]) {
        order.par_sort_unstable_by(|&a, &b| content_order(reads, a, b));
    }

    fn find_equal_groups(
        &self,
        reads: &PackedReadsSet,
        suffixes: &[u32],
        prefixes: &[u32],
        shift: usize,
    ) -> Vec<EqualGroup> {
        let overlap = reads.read_length() - shift;
        let key_symbols = overlap.min(BLOCK_KEY_SYMBOLS);
        let alphabet_size = reads.properties().symbol_count();
        let block_count = alphabet_size.pow(key_symbols as u32);

        let suffix_block =
            |read: u32| Self::block_key(reads, read, shift, key_symbols, alphabet_size);
        let prefix_block = |read: u32| Self::block_key(reads, read, 0, key_symbols, alphabet_size);

        let mut work = vec![0usize; block_count];
        for &read in suffixes {
            work[suffix_block(read)] += 1;
        }
        for &read in prefixes {
            work[prefix_block(read)] += 1;
        }

        // Keys are sorted in both lists, so every block is a contiguous slice
        // and no equal group spans two blocks.
        let tasks: Vec<(Range<usize>, Range<usize>)> = Self::split_blocks(&work, self.thread_num)
            .into_iter()
            .map(|blocks| {
                let suffix_range = suffixes
                    .partition_point(|&read| suffix_block(read) < blocks.start)
                    ..suffixes.partition_point(|&read| suffix_block(read) < blocks.end);
                let prefix_range = prefixes
                    .partition_point(|&read| prefix_block(read) < blocks.start)
                    ..prefixes.partition_point(|&read| prefix_block(read) < blocks.end);
                (suffix_range, prefix_range)
            })
            .collect();

        tasks
            .into_par_iter()
            .map(|(suffix_range, prefix_range)| {
                let mut groups = Vec::new();
                merge_join(
                    reads,
                    &suffixes[suffix_range.clone()],
                    &prefixes[prefix_range.clone()],
                    shift,
                    (suffix_range.start, prefix_range.start),
                    &mut groups,
                );
                groups
            })
            .collect::<Vec<Vec<EqualGroup>>>()
            .into_iter()
            .flatten()
            .collect()
    }

    fn advance_suffixes(
        &self,
        reads: &PackedReadsSet,
        mut suffixes: Vec<u32>,
        shift: usize,
    ) -> Vec<u32> {
        // Total order, so the result equals the serial bucket merge.
        let next_shift = shift + 1;
        suffixes.par_sort_unstable_by(|&a, &b| suffix_order(reads, a, b, next_shift));
        suffixes
    }
}

/// Greedy overlap generator running the data-parallel steps of every depth on
/// a dedicated thread pool.
///
/// Produces the same forest as [`crate::overlap::SerialOverlapGenerator`].
#[derive(Debug, Clone)]
pub struct ParallelOverlapGenerator {
    params: AssemblyParams,
}

impl ParallelOverlapGenerator {
    #[must_use]
    pub fn new(params: AssemblyParams) -> Self {
        Self { params }
    }
}

impl OverlapGenerator for ParallelOverlapGenerator {
    fn find_overlaps(&self, reads: &PackedReadsSet) -> OverlapResult<OverlapForest> {
        if reads.is_empty() {
            return Err(AssemblyError::EmptyReadsSet);
        }

        let thread_num = self.params.thread_num().max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(thread_num)
            .thread_name(|index| format!("pg-overlap-{}", index))
            .build()?;
        debug!("Started overlap thread pool with {} threads", thread_num);

        info!(
            "Finding overlaps of {} reads ({} symbols each) using {} threads",
            reads.len(),
            reads.read_length(),
            thread_num
        );
        let strategy = ParallelSweep { thread_num };
        Ok(pool.install(|| sweep(&strategy, reads, &self.params)))
    }
}

#[cfg(test)]
mod tests {
    use crate::overlap::parallel::{ParallelSweep, BLOCK_KEY_SYMBOLS};
    use crate::overlap::sweep::{merge_join, SweepStrategy};
    use crate::reads::PackedReadsSet;

    #[test]
    fn test_split_blocks() {
        let ranges = ParallelSweep::split_blocks(&[5, 0, 3, 2, 0, 6, 1, 1], 3);

        assert_eq!(ranges, vec![0..3, 3..6, 6..8]);
        assert_eq!(ParallelSweep::split_blocks(&[0, 0], 4), vec![0..1, 1..2]);
        assert_eq!(ParallelSweep::split_blocks(&[4, 4], 1), vec![0..2]);
    }

    #[test]
    fn test_groups_match_serial_join() {
        let reads = PackedReadsSet::from_reads(&[
            "ACGTAC", "GTACGT", "TACGTA", "CGTACG", "ACGTTT", "GTTTAC", "TTACGT",
        ])
        .unwrap();
        let shift = 2;
        let mut suffixes: Vec<u32> = (0..reads.len() as u32).collect();
        suffixes.sort_by(|&a, &b| {
            reads
                .compare_suffixes(a as usize, b as usize, shift)
                .then(a.cmp(&b))
        });
        let mut prefixes: Vec<u32> = (0..reads.len() as u32).collect();
        prefixes.sort_by(|&a, &b| reads.compare_reads(a as usize, b as usize).then(a.cmp(&b)));

        let mut serial = Vec::new();
        merge_join(&reads, &suffixes, &prefixes, shift, (0, 0), &mut serial);
        assert!(!serial.is_empty());
        for thread_num in [1, 2, 3, 8] {
            let sweep = ParallelSweep { thread_num };
            assert_eq!(
                sweep.find_equal_groups(&reads, &suffixes, &prefixes, shift),
                serial
            );
        }
        assert!(BLOCK_KEY_SYMBOLS <= reads.read_length() - shift);
    }
}
