use lazy_static::lazy_static;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::reads::{reverse_complement, PackedReadsSet};

pub const SIMPLE_READS: [&str; 2] = ["ACGTACGT", "GTACGTTT"];

lazy_static! {
    pub static ref RANDOM_GENOME: Vec<u8> = random_sequence(1337, 20_000, b"ACGT");
    pub static ref COVERED_GENOME_READS: PackedReadsSet = PackedReadsSet::from_reads(
        &sample_reads(&RANDOM_GENOME, 2022, 4_000, 50)
    )
    .expect("Could not pack test reads");
    pub static ref REPETITIVE_GENOME: Vec<u8> = repetitive_sequence(42, 30_000);
}

#[must_use]
pub fn random_sequence(seed: u64, length: usize, alphabet: &[u8]) -> Vec<u8> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..length)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}

/// Reads taken from uniformly random positions of `genome`.
#[must_use]
pub fn sample_reads(genome: &[u8], seed: u64, count: usize, length: usize) -> Vec<Vec<u8>> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let start = rng.gen_range(0..=genome.len() - length);
            genome[start..start + length].to_vec()
        })
        .collect()
}

/// Reads sampled from a random genome short enough to make overlaps and
/// duplicates common.
#[must_use]
pub fn random_reads(seed: u64, count: usize, length: usize, alphabet: &[u8]) -> PackedReadsSet {
    let genome = random_sequence(seed, count * length / 3 + length, alphabet);
    let reads = sample_reads(&genome, seed + 1, count, length);
    PackedReadsSet::from_reads(&reads).expect("Could not pack test reads")
}

/// Changes `mismatches` distinct symbols of `read` to another symbol of
/// `alphabet`.
pub fn mutate(read: &mut [u8], seed: u64, mismatches: usize, alphabet: &[u8]) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut changed = Vec::with_capacity(mismatches);
    while changed.len() < mismatches.min(read.len()) {
        let pos = rng.gen_range(0..read.len());
        if changed.contains(&pos) {
            continue;
        }
        let symbol = loop {
            let symbol = alphabet[rng.gen_range(0..alphabet.len())];
            if symbol != read[pos] {
                break symbol;
            }
        };
        read[pos] = symbol;
        changed.push(pos);
    }
}

/// Random sequence with long forward and reverse-complemented repeats.
#[must_use]
pub fn repetitive_sequence(seed: u64, length: usize) -> Vec<u8> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut sequence = random_sequence(seed, 2_000.min(length), b"ACGT");

    while sequence.len() < length {
        let remaining = length - sequence.len();
        let span = rng.gen_range(40..400).min(remaining).min(sequence.len());
        match rng.gen_range(0..3) {
            0 => {
                let start = rng.gen_range(0..=sequence.len() - span);
                let copy = sequence[start..start + span].to_vec();
                sequence.extend_from_slice(&copy);
            }
            1 => {
                let start = rng.gen_range(0..=sequence.len() - span);
                let copy = reverse_complement(&sequence[start..start + span]);
                sequence.extend_from_slice(&copy);
            }
            _ => {
                let fresh = random_sequence(rng.gen(), span, b"ACGT");
                sequence.extend_from_slice(&fresh);
            }
        }
    }

    sequence
}
