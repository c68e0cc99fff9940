use log::info;
use serde_json::Value;

pub(crate) mod assemble;
pub(crate) mod dedup;
pub(crate) mod match_reads;

/// Prints `stats` as JSON, or logs them one field per line.
pub(crate) fn report_stats(json: bool, title: &str, stats: Value) -> anyhow::Result<()> {
    if json {
        eprintln!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    info!("{}:", title);
    if let Value::Object(fields) = stats {
        for (name, value) in fields {
            info!("  {}: {}", name, value);
        }
    }

    Ok(())
}
