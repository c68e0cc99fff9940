#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use cmd::dedup::DedupOptions;
use cmd::match_reads::MatchOptions;
use human_panic::setup_panic;
use lazy_static::lazy_static;
use pgcomp::backend::CompressionLevel;

use crate::logging::init_logging;
use crate::opts::OutputWriter;
use crate::progress_bar::PgProgressBar;

mod cli;
mod cmd;
mod logging;
mod opts;
mod progress_bar;
mod sequences;

lazy_static! {
    pub(crate) static ref PROGRESS_BAR: PgProgressBar = PgProgressBar::new();
}

fn init_thread_pool(threads: Option<u32>) -> anyhow::Result<()> {
    if let Some(threads) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads as usize)
            .build_global()
            .context("Could not initialize the thread pool")?;
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    setup_panic!();

    let cli: Cli = Cli::parse();

    if !cli.no_progress {
        PROGRESS_BAR.show();
    }

    init_logging(cli.verbose.log_level_filter()).expect("Could not initialize logging");

    match &cli.command {
        Commands::Assemble {
            input,
            output,
            threads,
            no_cycle_avoidance,
        } => {
            let reader = input.as_reader()?;
            let output = OutputWriter::from_path_and_input(output, &reader, "pg")?;

            cmd::assemble::assemble_reads(
                reader.into_read(),
                output.into_write(),
                threads.map(|threads| threads as usize),
                !*no_cycle_avoidance,
                cli.json,
                Arc::new(PROGRESS_BAR.clone()),
            )
            .context("Failed to assemble given reads")?;
        }
        Commands::Match {
            pg,
            reads,
            output,
            mismatches,
            matching_length,
            mismatch_floor,
            rc,
            strategy,
            threads,
        } => {
            init_thread_pool(*threads)?;
            let pg_reader = pg.as_reader()?;
            let reads_reader = reads.as_reader()?;
            let output = OutputWriter::from_path_and_input(output, &reads_reader, "matches")?;

            let options = MatchOptions {
                max_mismatches: *mismatches,
                matching_length: matching_length.map(|length| length as usize),
                mismatch_floor: *mismatch_floor,
                reverse_complement: *rc,
                strategy: strategy.inner,
            };
            cmd::match_reads::match_reads(
                pg_reader.into_read(),
                reads_reader.into_read(),
                output.into_write(),
                &options,
                cli.json,
                Arc::new(PROGRESS_BAR.clone()),
            )
            .context("Failed to match given reads")?;
        }
        Commands::Dedup {
            input,
            min_match_length,
            rc,
            backend,
            level,
        } => {
            let reader = input.as_reader()?;

            let options = DedupOptions {
                min_match_length: *min_match_length as usize,
                reverse_complement: *rc,
                backend: backend.inner,
                level: CompressionLevel::new(*level),
            };
            cmd::dedup::dedup(
                reader.into_read(),
                &options,
                cli.json,
                Arc::new(PROGRESS_BAR.clone()),
            )
            .context("Failed to deduplicate given pseudogenome")?;
        }
    }

    PROGRESS_BAR.finish();
    Ok(())
}
