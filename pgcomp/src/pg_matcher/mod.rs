//! Removal of long exact repeats between two pseudogenomes, or within one.

use std::borrow::Cow;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use serde::Serialize;

use crate::hash_matcher::{KmerHashMatcher, KmerIndexBuilder};
use crate::pg_index::PgIndex;
use crate::progress::{DummyProgressNotifier, ProgressNotifier, SymbolNum};
use crate::reads::reverse_complement;
use crate::stats::{format_stats, percentage};

mod reconstruct;

pub use reconstruct::{lengths_from_bytes, offsets_from_bytes, reconstruct};

/// Byte standing in for a removed span in the marked destination.
pub const MARKER: u8 = 128;
/// Shortest supported minimum match length.
pub const MIN_MATCH_LENGTH_FLOOR: usize = 4;

const PROGRESS_STEP: usize = 1 << 20;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PgMatchError {
    MinMatchLengthTooShort(usize),
    /// The destination already contains the marker byte at this position.
    MarkerInDestination(usize),
    CorruptedStream(String),
    ChecksumMismatch { expected: u32, actual: u32 },
    OffsetTooLarge(usize, u32),
    MatchTooLong(usize),
    TooManyFragments(usize),
}

impl Display for PgMatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PgMatchError::MinMatchLengthTooShort(length) => write!(
                f,
                "Minimum match length {} is shorter than {}",
                length, MIN_MATCH_LENGTH_FLOOR
            ),
            PgMatchError::MarkerInDestination(position) => write!(
                f,
                "Destination contains the marker byte at position {}",
                position
            ),
            PgMatchError::CorruptedStream(msg) => write!(f, "Corrupted match stream: {}", msg),
            PgMatchError::ChecksumMismatch { expected, actual } => write!(
                f,
                "Checksum mismatch: expected {:08x}, got {:08x}",
                expected, actual
            ),
            PgMatchError::OffsetTooLarge(offset, bits) => {
                write!(f, "Offset {} does not fit {}-bit offsets", offset, bits)
            }
            PgMatchError::MatchTooLong(length) => write!(f, "Match of length {} is too long", length),
            PgMatchError::TooManyFragments(count) => {
                write!(f, "Too many source fragments to index: {}", count)
            }
        }
    }
}

impl Error for PgMatchError {}

pub type PgMatcherResult<T> = Result<T, PgMatchError>;

#[derive(Debug, Clone)]
pub struct PgMatcherParams {
    min_match_length: usize,
    reverse_complement: bool,
    progress_notifier: Arc<dyn ProgressNotifier>,
}

impl PgMatcherParams {
    pub fn builder() -> PgMatcherParamsBuilder {
        PgMatcherParamsBuilder::new()
    }

    #[must_use]
    pub fn min_match_length(&self) -> usize {
        self.min_match_length
    }

    #[must_use]
    pub fn reverse_complement(&self) -> bool {
        self.reverse_complement
    }
}

impl Default for PgMatcherParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone)]
pub struct PgMatcherParamsBuilder {
    min_match_length: usize,
    reverse_complement: bool,
    progress_notifier: Arc<dyn ProgressNotifier>,
}

impl PgMatcherParamsBuilder {
    pub fn new() -> Self {
        Self {
            min_match_length: 32,
            reverse_complement: false,
            progress_notifier: Arc::new(DummyProgressNotifier),
        }
    }

    pub fn min_match_length(&mut self, min_match_length: usize) -> &mut Self {
        let mut new = self;
        new.min_match_length = min_match_length;
        new
    }

    /// Matches the destination against the reverse complement of the source.
    pub fn reverse_complement(&mut self, reverse_complement: bool) -> &mut Self {
        let mut new = self;
        new.reverse_complement = reverse_complement;
        new
    }

    pub fn progress_notifier(&mut self, progress_notifier: Arc<dyn ProgressNotifier>) -> &mut Self {
        let mut new = self;
        new.progress_notifier = progress_notifier;
        new
    }

    pub fn build(&mut self) -> PgMatcherParams {
        PgMatcherParams {
            min_match_length: self.min_match_length,
            reverse_complement: self.reverse_complement,
            progress_notifier: self.progress_notifier.clone(),
        }
    }
}

impl Default for PgMatcherParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Destination span equal to a source span (reverse complemented in
/// reverse-complement mode).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PgMatch {
    pub dest_position: usize,
    pub length: usize,
    pub src_position: usize,
}

impl PgMatch {
    #[must_use]
    pub fn dest_end(&self) -> usize {
        self.dest_position + self.length
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct PgMatchStats {
    pub dest_length: usize,
    pub src_length: usize,
    /// Hash hits reported by the scan.
    pub candidates: usize,
    /// Hits whose fragment differs from the destination window.
    pub false_matches: usize,
    /// Matches found before resolving overlaps in the destination.
    pub raw_matches: usize,
    pub matches: usize,
    pub removed_symbols: usize,
    pub marked_length: usize,
}

/// Marked destination together with the side streams needed to restore it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PgMatchResult<P> {
    /// Destination with every removed span replaced by [`MARKER`].
    pub marked: Vec<u8>,
    /// Source position of every removed span, in destination order.
    pub offsets: Vec<P>,
    /// Length of every removed span minus the minimum match length.
    pub lengths: Vec<u32>,
    pub min_match_length: usize,
    pub reverse_complement: bool,
    /// CRC32 of the original destination.
    pub checksum: u32,
    pub stats: PgMatchStats,
}

impl<P: PgIndex> PgMatchResult<P> {
    /// Restores the destination; `source` is `None` when the destination was
    /// matched against itself.
    pub fn reconstruct_with(&self, source: Option<&[u8]>) -> PgMatcherResult<Vec<u8>> {
        let dest = reconstruct(
            &self.marked,
            source,
            &self.offsets,
            &self.lengths,
            self.min_match_length,
            self.reverse_complement,
        )?;

        let actual = crc32fast::hash(&dest);
        if actual != self.checksum {
            return Err(PgMatchError::ChecksumMismatch {
                expected: self.checksum,
                actual,
            });
        }

        Ok(dest)
    }

    #[must_use]
    pub fn offsets_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.offsets.len() * P::BITS as usize / 8);
        for offset in &self.offsets {
            offset
                .write_le(&mut data)
                .expect("writing to a Vec never fails");
        }
        data
    }

    #[must_use]
    pub fn lengths_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.lengths.len() * 4);
        for length in &self.lengths {
            length
                .write_le(&mut data)
                .expect("writing to a Vec never fails");
        }
        data
    }
}

/// Index of the fragments of a source pseudogenome.
#[derive(Debug)]
pub struct PgMatcher<'a> {
    /// The source, reverse complemented in reverse-complement mode.
    source: Cow<'a, [u8]>,
    fragment_length: usize,
    index: KmerHashMatcher,
    params: PgMatcherParams,
}

impl<'a> PgMatcher<'a> {
    pub fn new(source: &'a [u8], params: PgMatcherParams) -> PgMatcherResult<Self> {
        let min_match_length = params.min_match_length;
        if min_match_length < MIN_MATCH_LENGTH_FLOOR {
            return Err(PgMatchError::MinMatchLengthTooShort(min_match_length));
        }

        let source = if params.reverse_complement {
            Cow::Owned(reverse_complement(source))
        } else {
            Cow::Borrowed(source)
        };

        // Any match of the minimum length fully covers an aligned fragment.
        let fragment_length = min_match_length / 2;
        let fragment_count = source.len() / fragment_length;
        if fragment_count > u32::MAX as usize {
            return Err(PgMatchError::TooManyFragments(fragment_count));
        }

        let mut builder = KmerIndexBuilder::with_capacity(fragment_length, fragment_count);
        for fragment in 0..fragment_count {
            builder.index(&source[fragment * fragment_length..], fragment as u32);
        }
        debug!(
            "Indexed {} source fragments of length {}",
            fragment_count, fragment_length
        );

        Ok(Self {
            source,
            fragment_length,
            index: builder.build(),
            params,
        })
    }

    #[must_use]
    pub fn params(&self) -> &PgMatcherParams {
        &self.params
    }

    /// Removes the spans of `dest` found in the source.
    pub fn match_pg<P: PgIndex>(&self, dest: &[u8]) -> PgMatcherResult<PgMatchResult<P>> {
        self.match_dest(dest, false)
    }

    /// Removes the spans of the source repeated earlier in the source itself.
    pub fn self_match<P: PgIndex>(&self) -> PgMatcherResult<PgMatchResult<P>> {
        if self.params.reverse_complement {
            let dest = reverse_complement(&self.source);
            self.match_dest(&dest, true)
        } else {
            self.match_dest(&self.source, true)
        }
    }

    fn match_dest<P: PgIndex>(
        &self,
        dest: &[u8],
        dest_is_src: bool,
    ) -> PgMatcherResult<PgMatchResult<P>> {
        let start_time = Instant::now();
        if let Some(position) = dest.iter().position(|&symbol| symbol == MARKER) {
            return Err(PgMatchError::MarkerInDestination(position));
        }

        let mut stats = PgMatchStats {
            dest_length: dest.len(),
            src_length: self.source.len(),
            ..PgMatchStats::default()
        };

        let raw_matches = self.find_matches(dest, dest_is_src, &mut stats);
        stats.raw_matches = raw_matches.len();
        let matches = resolve_conflicts(
            raw_matches,
            self.params.min_match_length,
            self.params.reverse_complement,
        );
        stats.matches = matches.len();
        stats.removed_symbols = matches.iter().map(|m| m.length).sum();

        let result = self.encode(dest, &matches, stats)?;
        info!(
            "Removed {} spans ({} symbols, {:.2}%) from pseudogenome of {} symbols: {}",
            result.stats.matches,
            result.stats.removed_symbols,
            percentage(result.stats.removed_symbols, dest.len()),
            dest.len(),
            format_stats(start_time, SymbolNum::new(dest.len()))
        );

        Ok(result)
    }

    /// Scans `dest` and expands every verified fragment hit into a maximal
    /// exact match, in destination order.
    fn find_matches(
        &self,
        dest: &[u8],
        dest_is_src: bool,
        stats: &mut PgMatchStats,
    ) -> Vec<PgMatch> {
        let source: &[u8] = &self.source;
        let min_match_length = self.params.min_match_length;
        let rc = self.params.reverse_complement;
        let notifier = self.params.progress_notifier.as_ref();

        let mut matches = Vec::new();
        // Destination end of the last expanded match on each diagonal.
        let mut diagonal_ends: HashMap<isize, usize> = HashMap::new();
        let mut reported = 0;

        for (dest_position, fragment) in self.index.scan(dest) {
            stats.candidates += 1;
            if dest_position >= reported + PROGRESS_STEP {
                notifier.processed_symbols(SymbolNum::new(dest_position - reported));
                reported = dest_position;
            }

            let src_position = fragment as usize * self.fragment_length;
            if dest_is_src && !rc && dest_position <= src_position {
                continue;
            }
            let diagonal = dest_position as isize - src_position as isize;
            if let Some(&end) = diagonal_ends.get(&diagonal) {
                if dest_position < end {
                    continue;
                }
            }

            let fragment_end = src_position + self.fragment_length;
            if dest[dest_position..dest_position + self.fragment_length]
                != source[src_position..fragment_end]
            {
                stats.false_matches += 1;
                continue;
            }

            let back = dest[..dest_position]
                .iter()
                .rev()
                .zip(source[..src_position].iter().rev())
                .take_while(|(a, b)| a == b)
                .count();
            let forward = dest[dest_position + self.fragment_length..]
                .iter()
                .zip(&source[fragment_end..])
                .take_while(|(a, b)| a == b)
                .count();

            let mut found = PgMatch {
                dest_position: dest_position - back,
                length: back + self.fragment_length + forward,
                src_position: src_position - back,
            };
            diagonal_ends.insert(diagonal, found.dest_end());

            if rc {
                found.src_position = source.len() - found.src_position - found.length;
                if dest_is_src {
                    if found.dest_position < found.src_position {
                        continue;
                    }
                    // The destination must not overlap the span it is restored from.
                    let src_end = found.src_position + found.length;
                    if src_end > found.dest_position {
                        let trim = (src_end - found.dest_position + 1) / 2;
                        found.dest_position += trim;
                        found.length -= trim;
                    }
                }
            }

            if found.length >= min_match_length {
                matches.push(found);
            }
        }

        if dest.len() > reported {
            notifier.processed_symbols(SymbolNum::new(dest.len() - reported));
        }

        matches
    }

    fn encode<P: PgIndex>(
        &self,
        dest: &[u8],
        matches: &[PgMatch],
        mut stats: PgMatchStats,
    ) -> PgMatcherResult<PgMatchResult<P>> {
        let min_match_length = self.params.min_match_length;
        let mut marked = Vec::with_capacity(dest.len() - stats.removed_symbols + matches.len());
        let mut offsets = Vec::with_capacity(matches.len());
        let mut lengths = Vec::with_capacity(matches.len());

        let mut position = 0;
        for found in matches {
            marked.extend_from_slice(&dest[position..found.dest_position]);
            marked.push(MARKER);
            position = found.dest_end();

            offsets.push(
                P::from_usize(found.src_position)
                    .ok_or(PgMatchError::OffsetTooLarge(found.src_position, P::BITS))?,
            );
            lengths.push(
                u32::try_from(found.length - min_match_length)
                    .map_err(|_| PgMatchError::MatchTooLong(found.length))?,
            );
        }
        marked.extend_from_slice(&dest[position..]);
        stats.marked_length = marked.len();

        Ok(PgMatchResult {
            marked,
            offsets,
            lengths,
            min_match_length,
            reverse_complement: self.params.reverse_complement,
            checksum: crc32fast::hash(dest),
            stats,
        })
    }
}

/// Keeps non-overlapping destination spans: ordered by position, longest
/// first, each span is cut at the front to start after the previous accepted
/// one, and dropped when that leaves it below the minimum.
fn resolve_conflicts(
    mut matches: Vec<PgMatch>,
    min_match_length: usize,
    reverse_complement: bool,
) -> Vec<PgMatch> {
    matches.sort_unstable_by_key(|m| (m.dest_position, Reverse(m.length), m.src_position));

    let mut accepted: Vec<PgMatch> = Vec::with_capacity(matches.len());
    let mut covered_end = 0;
    for mut found in matches {
        if found.dest_end() <= covered_end {
            continue;
        }
        if found.dest_position < covered_end {
            let trim = covered_end - found.dest_position;
            found.dest_position += trim;
            found.length -= trim;
            if !reverse_complement {
                found.src_position += trim;
            }
        }
        if found.length < min_match_length {
            continue;
        }

        covered_end = found.dest_end();
        accepted.push(found);
    }

    accepted
}
