//! Greedy overlap assembly of reads into a pseudogenome.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

use log::info;
use serde::Serialize;

pub use crate::overlap::forest::{CycleStats, OverlapForest};
pub use crate::overlap::head_tracker::HeadTracker;
pub use crate::overlap::parallel::ParallelOverlapGenerator;
pub use crate::overlap::serial::SerialOverlapGenerator;
use crate::pg_index::PgIndex;
use crate::progress::{DummyProgressNotifier, ProgressNotifier, SymbolNum};
use crate::pseudogenome::{PseudoGenome, ReadList};
use crate::reads::PackedReadsSet;
use crate::stats::{format_stats, percentage};

mod forest;
mod head_tracker;
mod parallel;
mod serial;
mod sweep;

/// Error occurring during the assembly.
#[derive(Debug)]
pub enum AssemblyError {
    /// There are no reads to assemble.
    EmptyReadsSet,
    /// The pseudogenome length does not fit the chosen index width.
    PgTooLong(usize, u32),
    /// Could not start the worker threads.
    ThreadPool(rayon::ThreadPoolBuildError),
}

impl From<rayon::ThreadPoolBuildError> for AssemblyError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPool(e)
    }
}

impl Display for AssemblyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AssemblyError::EmptyReadsSet => write!(f, "No reads to assemble"),
            AssemblyError::PgTooLong(length, bits) => write!(
                f,
                "Pseudogenome too long for {}-bit positions (length: {})",
                bits, length
            ),
            AssemblyError::ThreadPool(e) => write!(f, "Could not create thread pool: {}", e),
        }
    }
}

impl Error for AssemblyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AssemblyError::ThreadPool(e) => Some(e),
            _ => None,
        }
    }
}

pub type OverlapResult<T> = Result<T, AssemblyError>;

/// Computes the overlap forest of a reads set.
pub trait OverlapGenerator {
    fn find_overlaps(&self, reads: &PackedReadsSet) -> OverlapResult<OverlapForest>;
}

#[derive(Debug, Clone)]
pub struct AssemblyParams {
    thread_num: usize,
    cycle_avoidance: bool,
    progress_notifier: Arc<dyn ProgressNotifier>,
}

impl AssemblyParams {
    pub fn builder() -> AssemblyParamsBuilder {
        AssemblyParamsBuilder::new()
    }

    #[must_use]
    pub fn thread_num(&self) -> usize {
        self.thread_num
    }

    #[must_use]
    pub fn cycle_avoidance(&self) -> bool {
        self.cycle_avoidance
    }

    #[must_use]
    pub fn progress_notifier(&self) -> &dyn ProgressNotifier {
        self.progress_notifier.as_ref()
    }
}

impl Default for AssemblyParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone)]
pub struct AssemblyParamsBuilder {
    thread_num: usize,
    cycle_avoidance: bool,
    progress_notifier: Arc<dyn ProgressNotifier>,
}

impl AssemblyParamsBuilder {
    pub fn new() -> Self {
        Self {
            thread_num: 1,
            cycle_avoidance: true,
            progress_notifier: Arc::new(DummyProgressNotifier),
        }
    }

    /// Number of worker threads; more than one selects the parallel generator.
    pub fn thread_num(&mut self, thread_num: usize) -> &mut Self {
        let mut new = self;
        new.thread_num = thread_num;
        new
    }

    /// Whether links closing a cycle are rejected during the sweep. When
    /// disabled, cycles are broken afterwards.
    pub fn cycle_avoidance(&mut self, cycle_avoidance: bool) -> &mut Self {
        let mut new = self;
        new.cycle_avoidance = cycle_avoidance;
        new
    }

    pub fn progress_notifier(&mut self, progress_notifier: Arc<dyn ProgressNotifier>) -> &mut Self {
        let mut new = self;
        new.progress_notifier = progress_notifier;
        new
    }

    pub fn build(&mut self) -> AssemblyParams {
        AssemblyParams {
            thread_num: self.thread_num,
            cycle_avoidance: self.cycle_avoidance,
            progress_notifier: self.progress_notifier.clone(),
        }
    }
}

impl Default for AssemblyParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct AssemblyStats {
    pub reads: usize,
    pub read_length: usize,
    pub duplicates: usize,
    pub links: usize,
    pub total_overlap: usize,
    pub components: usize,
    pub pg_length: usize,
    pub cycles: CycleStats,
}

#[derive(Debug, Clone)]
pub struct AssemblyResult<P> {
    pub pg: PseudoGenome,
    pub read_list: ReadList<P>,
    pub stats: AssemblyStats,
}

/// Assembles `reads` into a pseudogenome.
///
/// Uses the parallel generator when more than one thread is requested.
pub fn assemble<P: PgIndex>(
    reads: &PackedReadsSet,
    params: &AssemblyParams,
) -> OverlapResult<AssemblyResult<P>> {
    let start_time = Instant::now();

    let generator: Box<dyn OverlapGenerator> = if params.thread_num() > 1 {
        Box::new(ParallelOverlapGenerator::new(params.clone()))
    } else {
        Box::new(SerialOverlapGenerator::new(params.clone()))
    };
    let mut forest = generator.find_overlaps(reads)?;
    let cycles = forest.remove_cycles_and_prepare_components();

    let stats = AssemblyStats {
        reads: forest.len(),
        read_length: forest.read_length(),
        duplicates: forest.duplicate_count(),
        links: forest.edge_count(),
        total_overlap: forest.total_overlap(),
        components: forest.component_count(),
        pg_length: forest.pseudogenome_length(),
        cycles,
    };
    let (pg, read_list) = forest.into_pseudogenome::<P>(reads)?;

    let read_symbols = stats.reads * stats.read_length;
    info!(
        "Assembled {} into a pseudogenome of {} symbols ({:.2}% of input, {} components)",
        format_stats(start_time, SymbolNum::new(read_symbols)),
        stats.pg_length,
        percentage(stats.pg_length, read_symbols),
        stats.components
    );

    Ok(AssemblyResult {
        pg,
        read_list,
        stats,
    })
}
