use std::io::{BufWriter, Read, Write};
use std::sync::Arc;

use anyhow::Context;
use pgcomp::overlap::{assemble, AssemblyParams, AssemblyResult};
use pgcomp::pg_index::{PgIndex, PgWidth};
use pgcomp::progress::ProgressNotifier;
use pgcomp::reads::PackedReadsSet;

use crate::cmd::report_stats;
use crate::sequences::read_reads;

pub(crate) fn assemble_reads<R: Read, W: Write>(
    reader: R,
    writer: W,
    threads: Option<usize>,
    cycle_avoidance: bool,
    json: bool,
    progress_notifier: Arc<dyn ProgressNotifier>,
) -> anyhow::Result<()> {
    let reads = read_reads(reader)?;
    let reads = PackedReadsSet::from_reads(&reads).context("Could not pack the reads")?;

    let mut params = AssemblyParams::builder();
    params
        .cycle_avoidance(cycle_avoidance)
        .progress_notifier(progress_notifier);
    if let Some(threads) = threads {
        params.thread_num(threads);
    }
    let params = params.build();

    // Upper bound: no read overlaps any other
    let max_pg_length = (reads.len() + 1) * reads.read_length();
    match PgWidth::for_length(max_pg_length) {
        PgWidth::Standard => {
            let result = assemble::<u32>(&reads, &params).context("Could not assemble reads")?;
            write_assembly(result, writer, json)
        }
        PgWidth::Max => {
            let result = assemble::<u64>(&reads, &params).context("Could not assemble reads")?;
            write_assembly(result, writer, json)
        }
    }
}

fn write_assembly<P: PgIndex, W: Write>(
    result: AssemblyResult<P>,
    writer: W,
    json: bool,
) -> anyhow::Result<()> {
    let mut writer = BufWriter::new(writer);
    writer.write_all(result.pg.sequence())?;
    writeln!(writer)?;
    for (entry, _) in result.read_list.iter() {
        writeln!(writer, "{} {}", entry.position, entry.original_index)?;
    }
    writer.flush().context("Could not write the assembly")?;

    report_stats(json, "Assembly", serde_json::to_value(&result.stats)?)
}
