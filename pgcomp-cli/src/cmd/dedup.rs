use std::io::Read;
use std::sync::Arc;

use anyhow::{ensure, Context};
use pgcomp::backend::{BackendKind, CompressionLevel};
use pgcomp::pg_index::{PgIndex, PgWidth};
use pgcomp::pg_matcher::{PgMatcher, PgMatcherParams};
use pgcomp::progress::ProgressNotifier;
use serde_json::json;

use crate::cmd::report_stats;
use crate::sequences::read_pg;

#[derive(Debug, Clone)]
pub(crate) struct DedupOptions {
    pub min_match_length: usize,
    pub reverse_complement: bool,
    pub backend: BackendKind,
    pub level: CompressionLevel,
}

/// Removes the repeats of a pseudogenome, checks that it can be restored and
/// compares the compressed sizes before and after.
pub(crate) fn dedup<R: Read>(
    reader: R,
    options: &DedupOptions,
    json: bool,
    progress_notifier: Arc<dyn ProgressNotifier>,
) -> anyhow::Result<()> {
    let pg = read_pg(reader)?;

    let params = PgMatcherParams::builder()
        .min_match_length(options.min_match_length)
        .reverse_complement(options.reverse_complement)
        .progress_notifier(progress_notifier)
        .build();
    let matcher = PgMatcher::new(&pg, params).context("Could not index the pseudogenome")?;

    match PgWidth::for_length(pg.len()) {
        PgWidth::Standard => dedup_with::<u32>(&matcher, &pg, options, json),
        PgWidth::Max => dedup_with::<u64>(&matcher, &pg, options, json),
    }
}

fn dedup_with<P: PgIndex>(
    matcher: &PgMatcher,
    pg: &[u8],
    options: &DedupOptions,
    json: bool,
) -> anyhow::Result<()> {
    let result = matcher
        .self_match::<P>()
        .context("Could not match the pseudogenome against itself")?;
    let restored = result
        .reconstruct_with(None)
        .context("Could not restore the pseudogenome")?;
    ensure!(restored == pg, "Restored pseudogenome differs from the input");

    let backend = options.backend.backend();
    let compressed_len = |data: &[u8]| -> anyhow::Result<usize> {
        Ok(backend.compress(data, options.level, None)?.len())
    };
    let original = compressed_len(pg)?;
    let marked = compressed_len(&result.marked)?;
    let offsets = compressed_len(&result.offsets_bytes())?;
    let lengths = compressed_len(&result.lengths_bytes())?;

    report_stats(
        json,
        "Deduplication",
        json!({
            "matching": result.stats,
            "backend": backend.name(),
            "original_compressed": original,
            "marked_compressed": marked,
            "offsets_compressed": offsets,
            "lengths_compressed": lengths,
            "deduplicated_compressed": marked + offsets + lengths,
        }),
    )
}
