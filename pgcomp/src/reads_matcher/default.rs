use log::trace;

use crate::hash_matcher::{InterleavedKmerIndexBuilder, KmerIndexBuilder};
use crate::progress::{ProgressNotifier, SymbolNum};
use crate::reads_matcher::candidates::{Placement, ReorderWindow, Verifier};
use crate::reads_matcher::{MatchingError, MatchingStats, PartLayout, ReadsMatcherResult};

const PROGRESS_STEP: usize = 1 << 20;

pub(super) type Placements = (Vec<Option<Placement>>, MatchingStats);

fn check_pattern_count(count: usize) -> ReadsMatcherResult<()> {
    if count > u32::MAX as usize {
        Err(MatchingError::TooManyPatterns(count))
    } else {
        Ok(())
    }
}

/// Reports scan progress in coarse steps.
struct ScanProgress<'a> {
    notifier: &'a dyn ProgressNotifier,
    reported: usize,
}

impl<'a> ScanProgress<'a> {
    fn new(notifier: &'a dyn ProgressNotifier) -> Self {
        Self {
            notifier,
            reported: 0,
        }
    }

    #[inline]
    fn update(&mut self, position: usize) {
        if position >= self.reported + PROGRESS_STEP {
            self.notifier
                .processed_symbols(SymbolNum::new(position - self.reported));
            self.reported = position;
        }
    }

    fn finish(self, length: usize) {
        if length > self.reported {
            self.notifier
                .processed_symbols(SymbolNum::new(length - self.reported));
        }
    }
}

/// Indexes `max_mismatches + 1` contiguous parts of every oriented read and
/// scans the pseudogenome once. A placement within the mismatch budget leaves
/// at least one part intact, so it is always reported.
pub(super) fn match_contiguous(
    verifier: &Verifier,
    layout: &PartLayout,
    notifier: &dyn ProgressNotifier,
) -> ReadsMatcherResult<Placements> {
    let reads = verifier.reads();
    let orientations = reads.orientations();
    let parts = layout.parts;
    let part_length = layout.part_length;

    let pattern_count = reads.len() * orientations * parts;
    check_pattern_count(pattern_count)?;

    let mut builder = KmerIndexBuilder::with_capacity(part_length, pattern_count);
    for read in 0..reads.len() {
        for orientation in 0..orientations {
            let pattern = reads.get(read, orientation == 1);
            for part in 0..parts {
                let id = (read * orientations + orientation) * parts + part;
                builder.index(&pattern[part * part_length..], id as u32);
            }
        }
    }
    let index = builder.build();
    trace!("Indexed {} contiguous read parts", index.len());

    let mut best = vec![None; reads.len()];
    let mut stats = MatchingStats::default();
    let mut candidates = 0;
    let mut verify = |candidate: (usize, u32, bool)| {
        verifier.verify(&mut best[candidate.1 as usize], candidate, &mut stats)
    };

    let mut window = ReorderWindow::new((parts - 1) * part_length);
    let mut progress = ScanProgress::new(notifier);
    for (position, id) in index.scan(verifier.pg()) {
        candidates += 1;
        progress.update(position);
        window.pop_ready(position, &mut verify);

        let id = id as usize;
        let offset = (id % parts) * part_length;
        let oriented = id / parts;
        if position >= offset {
            window.push((
                position - offset,
                (oriented / orientations) as u32,
                oriented % orientations == 1,
            ));
        }
    }
    window.drain(&mut verify);
    progress.finish(verifier.pg().len());

    stats.candidates = candidates;
    Ok((best, stats))
}

/// Indexes `max_mismatches + 1` interleaved parts of every oriented read, so
/// that a burst of adjacent mismatches still leaves an intact part.
pub(super) fn match_interleaved(
    verifier: &Verifier,
    layout: &PartLayout,
    notifier: &dyn ProgressNotifier,
) -> ReadsMatcherResult<Placements> {
    let reads = verifier.reads();
    let orientations = reads.orientations();

    let pattern_count = reads.len() * orientations;
    check_pattern_count(pattern_count * layout.parts)?;

    let mut builder = InterleavedKmerIndexBuilder::new(layout.matching_length, layout.parts);
    for read in 0..reads.len() {
        for orientation in 0..orientations {
            let id = read * orientations + orientation;
            builder.index(reads.get(read, orientation == 1), id as u32);
        }
    }
    let index = builder.build();

    let mut best = vec![None; reads.len()];
    let mut stats = MatchingStats::default();
    let mut candidates = 0;
    let mut verify = |candidate: (usize, u32, bool)| {
        verifier.verify(&mut best[candidate.1 as usize], candidate, &mut stats)
    };

    let mut window = ReorderWindow::new(layout.parts - 1);
    let mut progress = ScanProgress::new(notifier);
    for (position, id, phase) in index.scan(verifier.pg()) {
        candidates += 1;
        progress.update(position);
        window.pop_ready(position, &mut verify);

        let id = id as usize;
        if position >= phase {
            window.push((
                position - phase,
                (id / orientations) as u32,
                id % orientations == 1,
            ));
        }
    }
    window.drain(&mut verify);
    progress.finish(verifier.pg().len());

    stats.candidates = candidates;
    Ok((best, stats))
}
