use std::io::{BufRead, BufReader, Read};

use anyhow::{bail, Context};

fn normalized(line: &str) -> Vec<u8> {
    line.trim().bytes().map(|symbol| symbol.to_ascii_uppercase()).collect()
}

/// Reads one read per line, skipping empty lines.
pub(crate) fn read_reads<R: Read>(reader: R) -> anyhow::Result<Vec<Vec<u8>>> {
    let mut reads = Vec::new();
    for (line_num, line) in BufReader::new(reader).lines().enumerate() {
        let line = line.with_context(|| format!("Could not read line {}", line_num + 1))?;
        let read = normalized(&line);
        if !read.is_empty() {
            reads.push(read);
        }
    }

    Ok(reads)
}

/// Reads a pseudogenome stored in the first non-empty line; the read list
/// written by `assemble` may follow it.
pub(crate) fn read_pg<R: Read>(reader: R) -> anyhow::Result<Vec<u8>> {
    for line in BufReader::new(reader).lines() {
        let pg = normalized(&line.context("Could not read the pseudogenome")?);
        if !pg.is_empty() {
            return Ok(pg);
        }
    }

    bail!("The pseudogenome file is empty")
}
