use std::io::{BufWriter, Read, Write};
use std::sync::Arc;

use anyhow::Context;
use itertools::Itertools;
use pgcomp::progress::ProgressNotifier;
use pgcomp::pseudogenome::PseudoGenome;
use pgcomp::reads::PackedReadsSet;
use pgcomp::reads_matcher::{MatchingStrategy, ReadMatch, ReadsMatcher, ReadsMatcherParams};

use crate::cmd::report_stats;
use crate::sequences::{read_pg, read_reads};

#[derive(Debug, Clone)]
pub(crate) struct MatchOptions {
    pub max_mismatches: u8,
    pub matching_length: Option<usize>,
    pub mismatch_floor: u8,
    pub reverse_complement: bool,
    pub strategy: MatchingStrategy,
}

/// Writes `index position strand mismatches` for every matched read and
/// `index *` for the rest.
pub(crate) fn match_reads<R1: Read, R2: Read, W: Write>(
    pg_reader: R1,
    reads_reader: R2,
    writer: W,
    options: &MatchOptions,
    json: bool,
    progress_notifier: Arc<dyn ProgressNotifier>,
) -> anyhow::Result<()> {
    let pg = read_pg(pg_reader)?;
    let reads = read_reads(reads_reader)?;
    let reads = PackedReadsSet::from_reads(&reads).context("Could not pack the reads")?;

    let guard_symbol = reads.properties().guard_symbol().unwrap_or(b'A');
    let pg = PseudoGenome::new(pg, reads.read_length(), guard_symbol);

    let mut params = ReadsMatcherParams::builder();
    params
        .max_mismatches(options.max_mismatches)
        .mismatch_floor(options.mismatch_floor)
        .reverse_complement(options.reverse_complement)
        .strategy(options.strategy)
        .progress_notifier(progress_notifier);
    if let Some(matching_length) = options.matching_length {
        params.matching_length(matching_length);
    }
    let matcher = ReadsMatcher::new(pg, params.build());
    let result = matcher
        .match_reads(&reads)
        .context("Could not match the reads")?;

    let mut writer = BufWriter::new(writer);
    for (index, read_match) in result.matches.iter().enumerate() {
        writeln!(writer, "{}", format_match(index, read_match))?;
    }
    writer.flush().context("Could not write the matches")?;

    report_stats(json, "Matching", serde_json::to_value(&result.stats)?)
}

fn format_match(index: usize, read_match: &ReadMatch) -> String {
    if !read_match.matched {
        return format!("{} *", index);
    }

    let mismatches = if read_match.mismatches.is_empty() {
        ".".to_owned()
    } else {
        read_match
            .mismatches
            .iter()
            .map(|mismatch| format!("{}{}", mismatch.offset, mismatch.symbol as char))
            .join(",")
    };
    let strand = if read_match.reverse_complement {
        '-'
    } else {
        '+'
    };

    format!(
        "{} {} {} {}",
        index, read_match.position, strand, mismatches
    )
}

#[cfg(test)]
mod tests {
    use pgcomp::pseudogenome::Mismatch;
    use pgcomp::reads_matcher::ReadMatch;

    use crate::cmd::match_reads::format_match;

    #[test]
    fn test_format_match() {
        assert_eq!(format_match(3, &ReadMatch::unmatched()), "3 *");

        let read_match = ReadMatch {
            matched: true,
            position: 120,
            mismatch_count: 2,
            reverse_complement: true,
            mismatches: vec![Mismatch::new(4, b'G'), Mismatch::new(17, b'T')],
        };
        assert_eq!(format_match(0, &read_match), "0 120 - 4G,17T");
    }
}
