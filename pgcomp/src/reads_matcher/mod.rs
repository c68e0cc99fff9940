//! Mapping of reads onto an already built pseudogenome.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

use derive_more::AddAssign;
use log::{debug, info};
use serde::Serialize;

use crate::pg_index::PgIndex;
use crate::progress::{DummyProgressNotifier, ProgressNotifier, SymbolNum};
use crate::pseudogenome::{Mismatch, PseudoGenome, ReadListBuilder};
use crate::reads::{IndexMapping, PackedReadsSet};
use crate::reads_matcher::candidates::{OrientedReads, Placement, Verifier};
use crate::stats::{format_stats, percentage};

mod candidates;
mod copmem;
mod default;

/// Error occurring when matching reads.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MatchingError {
    /// Matching length is zero or longer than the reads.
    InvalidMatchingLength(usize, usize),
    /// The matching window cannot be split into `max_mismatches + 1` parts.
    InvalidMismatches(u8, usize),
    /// The pattern ids do not fit 32 bits.
    TooManyPatterns(usize),
    /// A match position does not fit the read list index width.
    PgTooLong(usize, u32),
}

impl Display for MatchingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchingError::InvalidMatchingLength(matching_length, read_length) => write!(
                f,
                "Invalid matching length {} for reads of length {}",
                matching_length, read_length
            ),
            MatchingError::InvalidMismatches(max_mismatches, matching_length) => write!(
                f,
                "Cannot allow {} mismatches with matching length {}",
                max_mismatches, matching_length
            ),
            MatchingError::TooManyPatterns(count) => {
                write!(f, "Too many patterns to index: {}", count)
            }
            MatchingError::PgTooLong(position, bits) => write!(
                f,
                "Match position {} does not fit {}-bit positions",
                position, bits
            ),
        }
    }
}

impl Error for MatchingError {}

pub type ReadsMatcherResult<T> = Result<T, MatchingError>;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum MatchingStrategy {
    /// Scans the pseudogenome with an index of contiguous read parts.
    Default,
    /// Scans the pseudogenome with an index of interleaved read parts.
    Interleaved,
    /// Samples the pseudogenome at coprime strides and probes it with every
    /// read.
    CopMem,
    /// CopMEM for large pseudogenomes, default otherwise.
    #[default]
    Auto,
}

impl MatchingStrategy {
    pub const VALUES: [MatchingStrategy; 4] = [
        MatchingStrategy::Default,
        MatchingStrategy::Interleaved,
        MatchingStrategy::CopMem,
        MatchingStrategy::Auto,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            MatchingStrategy::Default => "default",
            MatchingStrategy::Interleaved => "interleaved",
            MatchingStrategy::CopMem => "copmem",
            MatchingStrategy::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadsMatcherParams {
    matching_length: Option<usize>,
    max_mismatches: u8,
    mismatch_floor: u8,
    reverse_complement: bool,
    strategy: MatchingStrategy,
    copmem_min_pg_length: usize,
    progress_notifier: Arc<dyn ProgressNotifier>,
}

impl ReadsMatcherParams {
    pub fn builder() -> ReadsMatcherParamsBuilder {
        ReadsMatcherParamsBuilder::new()
    }

    #[must_use]
    pub fn max_mismatches(&self) -> u8 {
        self.max_mismatches
    }

    #[must_use]
    pub fn reverse_complement(&self) -> bool {
        self.reverse_complement
    }

    #[must_use]
    pub fn strategy(&self) -> MatchingStrategy {
        self.strategy
    }
}

impl Default for ReadsMatcherParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone)]
pub struct ReadsMatcherParamsBuilder {
    matching_length: Option<usize>,
    max_mismatches: u8,
    mismatch_floor: u8,
    reverse_complement: bool,
    strategy: MatchingStrategy,
    copmem_min_pg_length: usize,
    progress_notifier: Arc<dyn ProgressNotifier>,
}

impl ReadsMatcherParamsBuilder {
    pub fn new() -> Self {
        Self {
            matching_length: None,
            max_mismatches: 0,
            mismatch_floor: 0,
            reverse_complement: false,
            strategy: MatchingStrategy::default(),
            copmem_min_pg_length: 64 * 1024 * 1024,
            progress_notifier: Arc::new(DummyProgressNotifier),
        }
    }

    /// Length of the read prefix the index is built from; defaults to the
    /// read length.
    pub fn matching_length(&mut self, matching_length: usize) -> &mut Self {
        let mut new = self;
        new.matching_length = Some(matching_length);
        new
    }

    /// Mismatch budget; `0` selects exact matching.
    pub fn max_mismatches(&mut self, max_mismatches: u8) -> &mut Self {
        let mut new = self;
        new.max_mismatches = max_mismatches;
        new
    }

    /// Reads placed with at most this many mismatches are not probed further.
    pub fn mismatch_floor(&mut self, mismatch_floor: u8) -> &mut Self {
        let mut new = self;
        new.mismatch_floor = mismatch_floor;
        new
    }

    pub fn reverse_complement(&mut self, reverse_complement: bool) -> &mut Self {
        let mut new = self;
        new.reverse_complement = reverse_complement;
        new
    }

    pub fn strategy(&mut self, strategy: MatchingStrategy) -> &mut Self {
        let mut new = self;
        new.strategy = strategy;
        new
    }

    pub fn copmem_min_pg_length(&mut self, copmem_min_pg_length: usize) -> &mut Self {
        let mut new = self;
        new.copmem_min_pg_length = copmem_min_pg_length;
        new
    }

    pub fn progress_notifier(&mut self, progress_notifier: Arc<dyn ProgressNotifier>) -> &mut Self {
        let mut new = self;
        new.progress_notifier = progress_notifier;
        new
    }

    pub fn build(&mut self) -> ReadsMatcherParams {
        ReadsMatcherParams {
            matching_length: self.matching_length,
            max_mismatches: self.max_mismatches,
            mismatch_floor: self.mismatch_floor,
            reverse_complement: self.reverse_complement,
            strategy: self.strategy,
            copmem_min_pg_length: self.copmem_min_pg_length,
            progress_notifier: self.progress_notifier.clone(),
        }
    }
}

impl Default for ReadsMatcherParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Placement of a single read.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ReadMatch {
    pub matched: bool,
    pub position: usize,
    pub mismatch_count: u8,
    pub reverse_complement: bool,
    /// Offsets are relative to the pseudogenome window; symbols are those of
    /// the read in the matched orientation.
    pub mismatches: Vec<Mismatch>,
}

impl ReadMatch {
    #[must_use]
    pub fn unmatched() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, AddAssign)]
pub struct MatchingStats {
    pub reads: usize,
    pub matched: usize,
    pub exact: usize,
    pub reverse_complement: usize,
    pub total_mismatches: usize,
    /// Hash hits reported for the reads.
    pub candidates: usize,
    /// Further exact placements of already placed reads.
    pub multi_match_count: usize,
    /// Candidates rejected by verification.
    pub false_match_count: usize,
}

#[derive(Debug, Clone)]
pub struct ReadsMatchingResult {
    pub matches: Vec<ReadMatch>,
    pub stats: MatchingStats,
}

impl ReadsMatchingResult {
    #[must_use]
    pub fn unmatched_indices(&self) -> Vec<usize> {
        self.matches
            .iter()
            .enumerate()
            .filter(|(_, read_match)| !read_match.matched)
            .map(|(index, _)| index)
            .collect()
    }

    /// Mask keeping the unmatched reads, for [`PackedReadsSet::compact`].
    #[must_use]
    pub fn unmatched_mask(&self) -> Vec<bool> {
        self.matches
            .iter()
            .map(|read_match| !read_match.matched)
            .collect()
    }

    /// Adds the matched reads to `builder`; with `mapping`, original indices
    /// refer to the set the matched reads were compacted from.
    pub fn add_to_read_list<P: PgIndex>(
        &self,
        builder: &mut ReadListBuilder<P>,
        mapping: Option<&IndexMapping>,
    ) -> ReadsMatcherResult<usize> {
        let mut added = 0;
        for (index, read_match) in self.matches.iter().enumerate() {
            if !read_match.matched {
                continue;
            }

            let position = P::from_usize(read_match.position)
                .ok_or(MatchingError::PgTooLong(read_match.position, P::BITS))?;
            let original_index =
                mapping.map_or(index as u32, |mapping| mapping.original_index(index));
            builder.push_matched(
                position,
                original_index,
                read_match.reverse_complement,
                &read_match.mismatches,
            );
            added += 1;
        }

        Ok(added)
    }
}

/// How the matching window is split into parts.
#[derive(Debug, Copy, Clone)]
pub(super) struct PartLayout {
    pub matching_length: usize,
    pub parts: usize,
    pub part_length: usize,
}

/// Maps reads onto a pseudogenome it owns.
#[derive(Debug)]
pub struct ReadsMatcher {
    pg: PseudoGenome,
    params: ReadsMatcherParams,
}

impl ReadsMatcher {
    #[must_use]
    pub fn new(pg: PseudoGenome, params: ReadsMatcherParams) -> Self {
        Self { pg, params }
    }

    #[must_use]
    pub fn pg(&self) -> &PseudoGenome {
        &self.pg
    }

    #[must_use]
    pub fn into_pg(self) -> PseudoGenome {
        self.pg
    }

    fn resolve_strategy(&self) -> MatchingStrategy {
        match self.params.strategy {
            MatchingStrategy::Auto if self.pg.len() >= self.params.copmem_min_pg_length => {
                MatchingStrategy::CopMem
            }
            MatchingStrategy::Auto => MatchingStrategy::Default,
            strategy => strategy,
        }
    }

    fn layout(&self, read_length: usize) -> ReadsMatcherResult<PartLayout> {
        let matching_length = self.params.matching_length.unwrap_or(read_length);
        if matching_length == 0 || matching_length > read_length {
            return Err(MatchingError::InvalidMatchingLength(
                matching_length,
                read_length,
            ));
        }

        let parts = self.params.max_mismatches as usize + 1;
        let part_length = matching_length / parts;
        if part_length == 0 {
            return Err(MatchingError::InvalidMismatches(
                self.params.max_mismatches,
                matching_length,
            ));
        }

        Ok(PartLayout {
            matching_length,
            parts,
            part_length,
        })
    }

    pub fn match_reads(&self, reads: &PackedReadsSet) -> ReadsMatcherResult<ReadsMatchingResult> {
        let start_time = Instant::now();
        if reads.is_empty() {
            return Ok(ReadsMatchingResult {
                matches: Vec::new(),
                stats: MatchingStats::default(),
            });
        }

        let layout = self.layout(reads.read_length())?;
        let strategy = self.resolve_strategy();
        debug!(
            "Matching {} reads using {} strategy ({} parts of {} symbols)",
            reads.len(),
            strategy.name(),
            layout.parts,
            layout.part_length
        );

        let oriented = OrientedReads::new(reads, self.params.reverse_complement);
        let verifier = Verifier::new(
            self.pg.sequence(),
            &oriented,
            self.params.max_mismatches,
            self.params.mismatch_floor,
        );
        let notifier = self.params.progress_notifier.as_ref();

        let (placements, mut stats) = match strategy {
            MatchingStrategy::Interleaved => {
                default::match_interleaved(&verifier, &layout, notifier)?
            }
            MatchingStrategy::CopMem => copmem::match_copmem(&verifier, &layout, notifier)?,
            MatchingStrategy::Default | MatchingStrategy::Auto => {
                default::match_contiguous(&verifier, &layout, notifier)?
            }
        };

        let matches: Vec<ReadMatch> = placements
            .iter()
            .enumerate()
            .map(|(read, placement)| self.to_read_match(&oriented, read, placement))
            .collect();

        stats.reads = reads.len();
        for read_match in matches.iter().filter(|read_match| read_match.matched) {
            stats.matched += 1;
            stats.exact += (read_match.mismatch_count == 0) as usize;
            stats.reverse_complement += read_match.reverse_complement as usize;
            stats.total_mismatches += read_match.mismatch_count as usize;
        }

        info!(
            "Matched {}/{} reads ({:.2}%, {} exact) onto pseudogenome of {} symbols: {}",
            stats.matched,
            stats.reads,
            percentage(stats.matched, stats.reads),
            stats.exact,
            self.pg.len(),
            format_stats(start_time, SymbolNum::new(reads.len() * reads.read_length()))
        );
        debug!(
            "Matching candidates: {}, false matches: {}, multi-matches: {}",
            stats.candidates, stats.false_match_count, stats.multi_match_count
        );

        Ok(ReadsMatchingResult { matches, stats })
    }

    fn to_read_match(
        &self,
        oriented: &OrientedReads,
        read: usize,
        placement: &Option<Placement>,
    ) -> ReadMatch {
        let placement = match placement {
            Some(placement) => placement,
            None => return ReadMatch::unmatched(),
        };

        let pattern = oriented.get(read, placement.reverse_complement);
        let window = self.pg.window(placement.position, pattern.len());
        let mismatches: Vec<Mismatch> = pattern
            .iter()
            .zip(window)
            .enumerate()
            .filter(|(_, (read_symbol, pg_symbol))| read_symbol != pg_symbol)
            .map(|(offset, (&read_symbol, _))| Mismatch::new(offset as u16, read_symbol))
            .collect();
        debug_assert_eq!(mismatches.len(), placement.mismatches as usize);

        ReadMatch {
            matched: true,
            position: placement.position,
            mismatch_count: placement.mismatches,
            reverse_complement: placement.reverse_complement,
            mismatches,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::_internal_test_data::{mutate, sample_reads, RANDOM_GENOME};
    use crate::pseudogenome::{PseudoGenome, ReadListBuilder};
    use crate::reads::{reverse_complement, PackedReadsSet};
    use crate::reads_matcher::{
        MatchingError, MatchingStrategy, ReadsMatcher, ReadsMatcherParams, ReadsMatchingResult,
    };

    fn genome_pg(length: usize) -> PseudoGenome {
        PseudoGenome::new(RANDOM_GENOME[..length].to_vec(), 40, b'T')
    }

    fn match_with(
        pg: PseudoGenome,
        reads: &PackedReadsSet,
        max_mismatches: u8,
        strategy: MatchingStrategy,
        reverse_complement: bool,
    ) -> ReadsMatchingResult {
        let params = ReadsMatcherParams::builder()
            .max_mismatches(max_mismatches)
            .strategy(strategy)
            .reverse_complement(reverse_complement)
            .build();
        ReadsMatcher::new(pg, params).match_reads(reads).unwrap()
    }

    /// Reads from the genome with 0..=3 mismatches, every fourth reverse
    /// complemented, plus a few random reads.
    fn noisy_reads() -> Vec<Vec<u8>> {
        let mut reads = sample_reads(&RANDOM_GENOME[..5_000], 99, 300, 40);
        for (index, read) in reads.iter_mut().enumerate() {
            mutate(read, index as u64, index % 4, b"ACGT");
            if index % 4 == 1 {
                *read = reverse_complement(read);
            }
        }
        reads.extend(sample_reads(&RANDOM_GENOME[10_000..], 5, 20, 40));
        reads
    }

    #[test_log::test]
    fn test_exact_matching() {
        let pg = genome_pg(2_000);
        let mut reads = sample_reads(&RANDOM_GENOME[..2_000], 1, 50, 40);
        reads.push(RANDOM_GENOME[5_000..5_040].to_vec());
        let reads = PackedReadsSet::from_reads(&reads).unwrap();

        let result = match_with(pg.clone(), &reads, 0, MatchingStrategy::Default, false);

        assert_eq!(result.stats.matched, 50);
        assert_eq!(result.unmatched_indices(), vec![50]);
        for (index, read_match) in result.matches.iter().enumerate().take(50) {
            assert_eq!(
                pg.window(read_match.position, 40),
                reads.read_bytes(index).as_slice()
            );
            assert!(read_match.mismatches.is_empty());
        }
    }

    #[test]
    fn test_lowest_position_wins() {
        let pg = PseudoGenome::new(b"TTACGTACGTACGTT".to_vec(), 6, b'T');
        let reads = PackedReadsSet::from_reads(&["ACGTAC", "ACGTAA"]).unwrap();

        let result = match_with(pg, &reads, 1, MatchingStrategy::Default, false);

        assert_eq!(result.matches[0].position, 2);
        assert_eq!(result.matches[0].mismatch_count, 0);
        assert_eq!(result.matches[1].position, 2);
        assert_eq!(result.matches[1].mismatch_count, 1);
        assert_eq!(result.matches[1].mismatches[0].offset, 5);
        assert_eq!(result.matches[1].mismatches[0].symbol, b'A');
    }

    #[test]
    fn test_reverse_complement_match() {
        let pg = genome_pg(1_000);
        let read = reverse_complement(&RANDOM_GENOME[300..340]);
        let reads = PackedReadsSet::from_reads(&[read]).unwrap();

        let forward_only = match_with(pg.clone(), &reads, 0, MatchingStrategy::Default, false);
        assert!(!forward_only.matches[0].matched);

        let result = match_with(pg, &reads, 0, MatchingStrategy::Default, true);
        assert!(result.matches[0].matched);
        assert!(result.matches[0].reverse_complement);
        assert_eq!(result.matches[0].position, 300);
    }

    #[test]
    fn test_strategies_equivalent() {
        let reads = PackedReadsSet::from_reads(&noisy_reads()).unwrap();

        for max_mismatches in [0, 1, 3] {
            let expected = match_with(
                genome_pg(5_000),
                &reads,
                max_mismatches,
                MatchingStrategy::Default,
                true,
            );
            assert!(expected.stats.matched > 0);
            for strategy in [MatchingStrategy::Interleaved, MatchingStrategy::CopMem] {
                let result = match_with(genome_pg(5_000), &reads, max_mismatches, strategy, true);
                assert_eq!(result.matches, expected.matches, "{:?}", strategy);
            }
        }
    }

    #[test]
    fn test_monotonic_in_mismatch_budget() {
        let reads = PackedReadsSet::from_reads(&noisy_reads()).unwrap();

        let mut previous: Option<ReadsMatchingResult> = None;
        for max_mismatches in 0..=4 {
            let result = match_with(
                genome_pg(5_000),
                &reads,
                max_mismatches,
                MatchingStrategy::Default,
                true,
            );
            if let Some(previous) = &previous {
                for (before, after) in previous.matches.iter().zip(&result.matches) {
                    if before.matched {
                        assert!(after.matched);
                        assert!(after.mismatch_count <= before.mismatch_count);
                    }
                }
                assert!(result.stats.matched >= previous.stats.matched);
            }
            previous = Some(result);
        }
    }

    #[test]
    fn test_matching_length_prefix() {
        let pg = PseudoGenome::new(b"GGACGTACCAGG".to_vec(), 8, b'G');
        // Only the first 4 symbols are indexed; the tail has a mismatch.
        let reads = PackedReadsSet::from_reads(&["ACGTACCT"]).unwrap();
        let params = ReadsMatcherParams::builder()
            .matching_length(4)
            .max_mismatches(1)
            .build();

        let result = ReadsMatcher::new(pg, params).match_reads(&reads).unwrap();
        assert!(result.matches[0].matched);
        assert_eq!(result.matches[0].position, 2);
        assert_eq!(result.matches[0].mismatch_count, 1);
    }

    #[test]
    fn test_pg_shorter_than_pattern() {
        let pg = PseudoGenome::new(b"ACG".to_vec(), 8, b'G');
        let reads = PackedReadsSet::from_reads(&["ACGTACGT"]).unwrap();

        for strategy in MatchingStrategy::VALUES {
            let result = match_with(pg.clone(), &reads, 0, strategy, true);
            assert!(!result.matches[0].matched);
        }
    }

    #[test]
    fn test_invalid_params() {
        let reads = PackedReadsSet::from_reads(&["ACGT"]).unwrap();
        let pg = PseudoGenome::new(b"ACGTACGT".to_vec(), 4, b'T');

        let params = ReadsMatcherParams::builder().matching_length(5).build();
        let error = ReadsMatcher::new(pg.clone(), params)
            .match_reads(&reads)
            .unwrap_err();
        assert_eq!(error, MatchingError::InvalidMatchingLength(5, 4));

        let params = ReadsMatcherParams::builder().max_mismatches(4).build();
        let error = ReadsMatcher::new(pg, params).match_reads(&reads).unwrap_err();
        assert_eq!(error, MatchingError::InvalidMismatches(4, 4));
    }

    #[test]
    fn test_read_list_round_trip() {
        let pg = genome_pg(5_000);
        let reads = PackedReadsSet::from_reads(&noisy_reads()).unwrap();
        let matcher = ReadsMatcher::new(
            pg,
            ReadsMatcherParams::builder()
                .max_mismatches(3)
                .reverse_complement(true)
                .build(),
        );
        let result = matcher.match_reads(&reads).unwrap();
        let pg = matcher.into_pg();

        let (matched, mapping) = reads.clone().compact(
            &result
                .unmatched_mask()
                .iter()
                .map(|unmatched| !unmatched)
                .collect::<Vec<_>>(),
        );
        let mut builder = ReadListBuilder::<u32>::new(40);
        let added = result.add_to_read_list(&mut builder, None).unwrap();
        assert_eq!(added, matched.len());

        let list = builder.build();
        list.check_reads(&pg, &matched, Some(&mapping)).unwrap();
        assert!(list.iter().any(|(entry, _)| entry.reverse_complement));
        assert!(list.iter().any(|(_, mismatches)| mismatches.len() == 3));
    }

    #[test]
    fn test_mutated_read_found() {
        let pg = genome_pg(3_000);
        let mut read = RANDOM_GENOME[1_000..1_040].to_vec();
        mutate(&mut read, 3, 2, b"ACGT");
        let reads = PackedReadsSet::from_reads(&[read]).unwrap();

        let strict = match_with(pg.clone(), &reads, 1, MatchingStrategy::Default, false);
        assert!(!strict.matches[0].matched);
        let result = match_with(pg, &reads, 2, MatchingStrategy::Auto, false);
        assert_eq!(result.matches[0].position, 1_000);
        assert_eq!(result.matches[0].mismatch_count, 2);
    }
}
