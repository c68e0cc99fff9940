use itertools::Itertools;
use log::info;

use crate::overlap::forest::OverlapForest;
use crate::overlap::sweep::{
    content_order, merge_join, suffix_order, sweep, EqualGroup, SweepStrategy,
};
use crate::overlap::{AssemblyError, AssemblyParams, OverlapGenerator, OverlapResult};
use crate::reads::PackedReadsSet;

struct SerialSweep;

impl SweepStrategy for SerialSweep {
    fn sort_by_content(&self, reads: &PackedReadsSet, order: &mut [u32]) {
        order.sort_unstable_by(|&a, &b| content_order(reads, a, b));
    }

    fn find_equal_groups(
        &self,
        reads: &PackedReadsSet,
        suffixes: &[u32],
        prefixes: &[u32],
        shift: usize,
    ) -> Vec<EqualGroup> {
        let mut groups = Vec::new();
        merge_join(reads, suffixes, prefixes, shift, (0, 0), &mut groups);
        groups
    }

    fn advance_suffixes(
        &self,
        reads: &PackedReadsSet,
        suffixes: Vec<u32>,
        shift: usize,
    ) -> Vec<u32> {
        let mut buckets = vec![Vec::new(); reads.properties().symbol_count()];
        for read in suffixes {
            buckets[reads.symbol_rank(read as usize, shift) as usize].push(read);
        }

        // Every bucket is already ordered by the symbols after `shift`.
        let next_shift = shift + 1;
        buckets
            .into_iter()
            .kmerge_by(|&a, &b| suffix_order(reads, a, b, next_shift).is_lt())
            .collect()
    }
}

/// Single-threaded greedy overlap generator.
#[derive(Debug, Clone)]
pub struct SerialOverlapGenerator {
    params: AssemblyParams,
}

impl SerialOverlapGenerator {
    #[must_use]
    pub fn new(params: AssemblyParams) -> Self {
        Self { params }
    }
}

impl OverlapGenerator for SerialOverlapGenerator {
    fn find_overlaps(&self, reads: &PackedReadsSet) -> OverlapResult<OverlapForest> {
        if reads.is_empty() {
            return Err(AssemblyError::EmptyReadsSet);
        }

        info!(
            "Finding overlaps of {} reads ({} symbols each)",
            reads.len(),
            reads.read_length()
        );
        Ok(sweep(&SerialSweep, reads, &self.params))
    }
}

#[cfg(test)]
mod tests {
    use crate::overlap::serial::{SerialOverlapGenerator, SerialSweep};
    use crate::overlap::sweep::SweepStrategy;
    use crate::overlap::{AssemblyError, AssemblyParams, OverlapGenerator};
    use crate::reads::PackedReadsSet;

    #[test]
    fn test_advance_suffixes() {
        // Ranks: C=0, A=1, G=2, T=3
        let reads = PackedReadsSet::from_reads(&["CAGT", "AGTA", "TCAA", "GGAC"]).unwrap();
        // Ordered by read[1..]: "CAA" (2), "AGT" (0), "GAC" (3), "GTA" (1)
        let suffixes = vec![2, 0, 3, 1];

        let advanced = SerialSweep.advance_suffixes(&reads, suffixes, 1);

        // Ordered by read[2..]: "AC" (3), "AA" (2), "GT" (0), "TA" (1)
        assert_eq!(advanced, vec![3, 2, 0, 1]);
    }

    #[test_log::test]
    fn test_find_overlaps() {
        let reads = PackedReadsSet::from_reads(&["ACGTACGT", "GTACGTTT"]).unwrap();
        let forest = SerialOverlapGenerator::new(AssemblyParams::default())
            .find_overlaps(&reads)
            .unwrap();

        assert_eq!(forest.next_read(0), Some(1));
        assert_eq!(forest.overlap(0), 6);
        assert_eq!(forest.next_read(1), None);
    }

    #[test]
    fn test_empty_reads_set() {
        let reads = PackedReadsSet::from_reads::<&str>(&[]).unwrap();
        let result = SerialOverlapGenerator::new(AssemblyParams::default()).find_overlaps(&reads);

        assert!(matches!(result, Err(AssemblyError::EmptyReadsSet)));
    }
}
