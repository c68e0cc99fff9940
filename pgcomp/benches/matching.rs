use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use pgcomp::_internal_test_data::{mutate, sample_reads, RANDOM_GENOME, REPETITIVE_GENOME};
use pgcomp::pg_matcher::{PgMatcher, PgMatcherParams};
use pgcomp::pseudogenome::PseudoGenome;
use pgcomp::reads::PackedReadsSet;
use pgcomp::reads_matcher::{MatchingStrategy, ReadsMatcher, ReadsMatcherParams};

fn noisy_reads() -> PackedReadsSet {
    let mut reads = sample_reads(&RANDOM_GENOME, 5, 5_000, 100);
    for (index, read) in reads.iter_mut().enumerate() {
        mutate(read, index as u64, index % 3, b"ACGT");
    }
    PackedReadsSet::from_reads(&reads).unwrap()
}

fn match_reads(c: &mut Criterion) {
    let reads = noisy_reads();

    for strategy in [
        MatchingStrategy::Default,
        MatchingStrategy::Interleaved,
        MatchingStrategy::CopMem,
    ] {
        c.bench_function(
            &format!("Match 5k reads with 2 mismatches ({})", strategy.name()),
            |b| {
                b.iter_batched_ref(
                    || {
                        let pg = PseudoGenome::new(RANDOM_GENOME.clone(), 100, b'T');
                        let params = ReadsMatcherParams::builder()
                            .max_mismatches(2)
                            .strategy(strategy)
                            .build();
                        ReadsMatcher::new(pg, params)
                    },
                    |matcher| {
                        let result = matcher.match_reads(&reads).unwrap();
                        assert!(result.stats.matched > 0);
                    },
                    BatchSize::LargeInput,
                )
            },
        );
    }
}

fn self_dedup(c: &mut Criterion) {
    c.bench_function("Deduplicate 30k repetitive pseudogenome", |b| {
        b.iter(|| {
            let params = PgMatcherParams::builder()
                .min_match_length(32)
                .reverse_complement(true)
                .build();
            let matcher = PgMatcher::new(&REPETITIVE_GENOME, params).unwrap();
            let result = matcher.self_match::<u32>().unwrap();
            assert!(result.stats.matches > 0);
        })
    });
}

criterion_group!(benches, match_reads, self_dedup);
criterion_main!(benches);
