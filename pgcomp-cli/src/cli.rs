use std::path::PathBuf;

use clap::{Parser, PossibleValue, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use lazy_static::lazy_static;
use pgcomp::backend::BackendKind;
use pgcomp::reads_matcher::MatchingStrategy;

use crate::opts::{input_file, input_stream, InputFile, InputStream};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Don't display a progress bar/spinner
    #[clap(long, global = true, value_parser)]
    pub no_progress: bool,

    /// Print statistics as JSON to the standard error
    #[clap(long, global = true, value_parser)]
    pub json: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Copy, Clone, Debug)]
pub struct MatchingStrategyCli {
    pub inner: MatchingStrategy,
}

lazy_static! {
    static ref MATCHING_STRATEGY_CLI_VARIANTS: Vec<MatchingStrategyCli> = MatchingStrategy::VALUES
        .iter()
        .map(|&inner| MatchingStrategyCli { inner })
        .collect();
    static ref BACKEND_KIND_CLI_VARIANTS: Vec<BackendKindCli> = BackendKind::VALUES
        .iter()
        .map(|&inner| BackendKindCli { inner })
        .collect();
}

impl ValueEnum for MatchingStrategyCli {
    fn value_variants<'a>() -> &'a [Self] {
        &MATCHING_STRATEGY_CLI_VARIANTS
    }

    fn to_possible_value<'a>(&self) -> Option<PossibleValue<'a>> {
        Some(PossibleValue::new(self.inner.name()))
    }
}

#[derive(Copy, Clone, Debug)]
pub struct BackendKindCli {
    pub inner: BackendKind,
}

impl ValueEnum for BackendKindCli {
    fn value_variants<'a>() -> &'a [Self] {
        &BACKEND_KIND_CLI_VARIANTS
    }

    fn to_possible_value<'a>(&self) -> Option<PossibleValue<'a>> {
        Some(PossibleValue::new(self.inner.name()))
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble reads (one per line) into a pseudogenome
    ///
    /// Writes the pseudogenome line followed by a `position original_index`
    /// line for every read.
    Assemble {
        /// Input reads file; `-` is the standard input
        #[clap(default_value_t, value_parser = input_stream)]
        input: InputStream,

        /// Output file path; `-` is the standard output
        #[clap(short, long, value_parser)]
        output: Option<PathBuf>,

        /// Number of threads to use
        #[clap(long, value_parser = clap::value_parser!(u32).range(1..))]
        threads: Option<u32>,

        /// Link overlaps first and repair the cycles afterwards
        #[clap(long, value_parser)]
        no_cycle_avoidance: bool,
    },

    /// Map reads (one per line) onto a pseudogenome
    Match {
        /// Pseudogenome file (the first line is used)
        #[clap(value_parser = input_file)]
        pg: InputFile,

        /// Input reads file; `-` is the standard input
        #[clap(default_value_t, value_parser = input_stream)]
        reads: InputStream,

        /// Output file path; `-` is the standard output
        #[clap(short, long, value_parser)]
        output: Option<PathBuf>,

        /// Maximum number of mismatches per read
        #[clap(short, long, default_value_t = 0, value_parser)]
        mismatches: u8,

        /// Number of leading read symbols to index (defaults to the read
        /// length)
        #[clap(long, value_parser = clap::value_parser!(u64).range(1..))]
        matching_length: Option<u64>,

        /// Stop probing a read once it is placed with at most this many
        /// mismatches
        #[clap(long, default_value_t = 0, value_parser)]
        mismatch_floor: u8,

        /// Also match the reverse complements of the reads
        #[clap(long, value_parser)]
        rc: bool,

        /// Candidate search strategy
        #[clap(long, arg_enum, default_value = "auto")]
        strategy: MatchingStrategyCli,

        /// Number of threads to use
        #[clap(long, value_parser = clap::value_parser!(u32).range(1..))]
        threads: Option<u32>,
    },

    /// Remove long repeats from a pseudogenome and report the gain
    Dedup {
        /// Pseudogenome file (the first line is used); `-` is the standard
        /// input
        #[clap(default_value_t, value_parser = input_stream)]
        input: InputStream,

        /// Shortest repeat to remove
        #[clap(long, default_value_t = 32, value_parser = clap::value_parser!(u64).range(4..))]
        min_match_length: u64,

        /// Remove reverse-complemented repeats instead of forward ones
        #[clap(long, value_parser)]
        rc: bool,

        /// Compressor used to measure the gain
        #[clap(long, arg_enum, default_value = "brotli")]
        backend: BackendKindCli,

        /// Compression level (1 - fast, 9 - best)
        #[clap(default_value_t = 7, long, value_parser = clap::value_parser!(u8).range(1..=9))]
        level: u8,
    },
}
