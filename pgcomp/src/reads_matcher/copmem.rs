use log::debug;
use rayon::prelude::*;

use crate::hash_matcher::KmerIndexBuilder;
use crate::progress::{ProgressNotifier, SymbolNum};
use crate::reads_matcher::candidates::Verifier;
use crate::reads_matcher::default::Placements;
use crate::reads_matcher::{MatchingError, MatchingStats, PartLayout, ReadsMatcherResult};

/// Sampling parameters: k-mers of the pseudogenome are indexed every
/// `pg_stride` positions and looked up in the reads every `read_stride`
/// positions.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Sampling {
    k: usize,
    pg_stride: usize,
    read_stride: usize,
}

impl Sampling {
    /// With coprime strides, every diagonal meets a sampled pair within any
    /// `pg_stride * read_stride` consecutive offsets, so an intact part of
    /// `part_length` symbols always yields a hit.
    fn for_part_length(part_length: usize) -> Self {
        let k = (part_length / 2).max(1);
        let span = part_length - k + 1;

        let mut s = 0;
        while (s + 1) * (s + 2) <= span {
            s += 1;
        }

        if s == 0 {
            Self {
                k,
                pg_stride: 1,
                read_stride: 1,
            }
        } else {
            Self {
                k,
                pg_stride: s + 1,
                read_stride: s,
            }
        }
    }
}

pub(super) fn match_copmem(
    verifier: &Verifier,
    layout: &PartLayout,
    notifier: &dyn ProgressNotifier,
) -> ReadsMatcherResult<Placements> {
    let pg = verifier.pg();
    let reads = verifier.reads();
    let sampling = Sampling::for_part_length(layout.part_length);
    debug!(
        "CopMEM sampling: k = {}, strides {}/{}",
        sampling.k, sampling.pg_stride, sampling.read_stride
    );

    let sample_count = (pg.len() + sampling.pg_stride - 1) / sampling.pg_stride;
    if sample_count > u32::MAX as usize {
        return Err(MatchingError::TooManyPatterns(sample_count));
    }

    let mut builder = KmerIndexBuilder::with_capacity(sampling.k, sample_count);
    for (sample, position) in (0..pg.len().saturating_sub(sampling.k - 1))
        .step_by(sampling.pg_stride)
        .enumerate()
    {
        builder.index(&pg[position..], sample as u32);
    }
    let index = builder.build();

    let (best, stats): (Vec<_>, Vec<_>) = (0..reads.len())
        .into_par_iter()
        .map(|read| {
            let mut starts = Vec::new();
            for orientation in 0..reads.orientations() {
                let reverse_complement = orientation == 1;
                let pattern = &reads.get(read, reverse_complement)[..layout.matching_length];
                for offset in (0..=layout.matching_length - sampling.k).step_by(sampling.read_stride)
                {
                    for sample in index.candidates(&pattern[offset..]) {
                        let position = sample as usize * sampling.pg_stride;
                        if position >= offset {
                            starts.push((position - offset, reverse_complement));
                        }
                    }
                }
            }

            let mut stats = MatchingStats {
                candidates: starts.len(),
                ..MatchingStats::default()
            };
            starts.sort_unstable();
            starts.dedup();

            let mut best = None;
            for (start, reverse_complement) in starts {
                verifier.verify(&mut best, (start, read as u32, reverse_complement), &mut stats);
            }
            notifier.processed_symbols(SymbolNum::new(reads.read_length()));

            (best, stats)
        })
        .unzip();

    let mut total = MatchingStats::default();
    for read_stats in stats {
        total += read_stats;
    }

    Ok((best, total))
}

#[cfg(test)]
mod tests {
    use crate::reads_matcher::copmem::Sampling;

    #[test]
    fn test_sampling() {
        // span 11: 3 * 4 > 11, so s = 2
        assert_eq!(
            Sampling::for_part_length(20),
            Sampling {
                k: 10,
                pg_stride: 3,
                read_stride: 2,
            }
        );
        assert_eq!(
            Sampling::for_part_length(3),
            Sampling {
                k: 1,
                pg_stride: 2,
                read_stride: 1,
            }
        );
        assert_eq!(
            Sampling::for_part_length(1),
            Sampling {
                k: 1,
                pg_stride: 1,
                read_stride: 1,
            }
        );
    }

    #[test]
    fn test_every_diagonal_sampled() {
        for part_length in 1..40 {
            let sampling = Sampling::for_part_length(part_length);
            let stride_product = sampling.pg_stride * sampling.read_stride;
            assert!(stride_product + sampling.k - 1 <= part_length);
            for diagonal in 0..stride_product {
                assert!((0..stride_product).any(|offset| {
                    offset % sampling.read_stride == 0
                        && (diagonal + offset) % sampling.pg_stride == 0
                }));
            }
        }
    }
}
