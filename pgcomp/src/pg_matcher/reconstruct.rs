use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::pg_index::PgIndex;
use crate::pg_matcher::{PgMatchError, PgMatcherResult, MARKER};
use crate::reads::complement;

fn corrupted<T>(msg: &str) -> PgMatcherResult<T> {
    Err(PgMatchError::CorruptedStream(msg.to_owned()))
}

/// Restores a destination from its marked form.
///
/// Every marker consumes the next `(offset, length)` pair. With `source` set
/// to `None` the spans are copied from the destination restored so far, one
/// symbol at a time, so a span may overlap the span it is copied from.
pub fn reconstruct<P: PgIndex>(
    marked: &[u8],
    source: Option<&[u8]>,
    offsets: &[P],
    lengths: &[u32],
    min_match_length: usize,
    reverse_complement: bool,
) -> PgMatcherResult<Vec<u8>> {
    if offsets.len() != lengths.len() {
        return Err(PgMatchError::CorruptedStream(format!(
            "{} offsets but {} lengths",
            offsets.len(),
            lengths.len()
        )));
    }

    let removed: usize = lengths
        .iter()
        .map(|&length| length as usize + min_match_length)
        .sum();
    let mut out = Vec::with_capacity(marked.len() + removed);
    let mut spans = offsets.iter().zip(lengths);

    for &symbol in marked {
        if symbol != MARKER {
            out.push(symbol);
            continue;
        }

        let (offset, length) = match spans.next() {
            Some(span) => span,
            None => return corrupted("more markers than matches"),
        };
        let offset = offset.to_usize();
        let length = *length as usize + min_match_length;
        let end = match offset.checked_add(length) {
            Some(end) => end,
            None => return corrupted("match span overflows"),
        };

        match source {
            Some(source) => {
                let span = match source.get(offset..end) {
                    Some(span) => span,
                    None => return corrupted("match span outside the source"),
                };
                if reverse_complement {
                    out.extend(span.iter().rev().map(|&symbol| complement(symbol)));
                } else {
                    out.extend_from_slice(span);
                }
            }
            None if reverse_complement => {
                if end > out.len() {
                    return corrupted("match span not restored yet");
                }
                for i in 0..length {
                    let symbol = complement(out[end - 1 - i]);
                    out.push(symbol);
                }
            }
            None => {
                if offset >= out.len() {
                    return corrupted("match span not restored yet");
                }
                for i in 0..length {
                    let symbol = out[offset + i];
                    out.push(symbol);
                }
            }
        }
    }

    if spans.next().is_some() {
        return corrupted("more matches than markers");
    }

    Ok(out)
}

/// Parses offsets written by `PgMatchResult::offsets_bytes`.
pub fn offsets_from_bytes<P: PgIndex>(data: &[u8]) -> PgMatcherResult<Vec<P>> {
    let width = P::BITS as usize / 8;
    if data.len() % width != 0 {
        return corrupted("truncated offsets");
    }

    let mut reader = Cursor::new(data);
    (0..data.len() / width)
        .map(|_| {
            P::read_le(&mut reader)
                .map_err(|e| PgMatchError::CorruptedStream(e.to_string()))
        })
        .collect()
}

/// Parses lengths written by `PgMatchResult::lengths_bytes`.
pub fn lengths_from_bytes(data: &[u8]) -> PgMatcherResult<Vec<u32>> {
    if data.len() % 4 != 0 {
        return corrupted("truncated lengths");
    }

    let mut reader = Cursor::new(data);
    (0..data.len() / 4)
        .map(|_| {
            reader
                .read_u32::<LittleEndian>()
                .map_err(|e| PgMatchError::CorruptedStream(e.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::pg_matcher::reconstruct::{lengths_from_bytes, offsets_from_bytes, reconstruct};
    use crate::pg_matcher::{PgMatchError, MARKER};

    #[test]
    fn test_overlapping_self_copy() {
        // "ACG" followed by a 9 symbol copy starting at 0
        let marked = [b'A', b'C', b'G', MARKER, b'T'];
        let restored = reconstruct::<u32>(&marked, None, &[0], &[5], 4, false).unwrap();
        assert_eq!(restored, b"ACGACGACGACGT");
    }

    #[test]
    fn test_self_reverse_complement() {
        let marked = [b'A', b'A', b'C', b'G', MARKER];
        let restored = reconstruct::<u32>(&marked, None, &[0], &[0], 4, true).unwrap();
        assert_eq!(restored, b"AACGCGTT");
    }

    #[test]
    fn test_external_source() {
        let source = b"TTTTGGGACCC";
        let marked = [MARKER, b'A', MARKER];
        let restored =
            reconstruct::<u64>(&marked, Some(source), &[4, 0], &[0, 1], 3, false).unwrap();
        assert_eq!(restored, b"GGGATTTT");

        let restored =
            reconstruct::<u64>(&marked, Some(source), &[4, 7], &[0, 0], 4, true).unwrap();
        assert_eq!(restored, b"TCCCAGGGT");
    }

    #[test]
    fn test_corrupted_streams() {
        let marked = [b'A', MARKER];
        assert!(matches!(
            reconstruct::<u32>(&marked, None, &[], &[], 4, false),
            Err(PgMatchError::CorruptedStream(_))
        ));
        assert!(matches!(
            reconstruct::<u32>(&marked, None, &[5], &[0], 4, false),
            Err(PgMatchError::CorruptedStream(_))
        ));
        assert!(matches!(
            reconstruct::<u32>(&[b'A'], None, &[0], &[0], 4, false),
            Err(PgMatchError::CorruptedStream(_))
        ));
        assert!(matches!(
            reconstruct::<u32>(&marked, Some(b"ACG"), &[0], &[0], 4, false),
            Err(PgMatchError::CorruptedStream(_))
        ));
    }

    #[test]
    fn test_stream_parsing() {
        assert_eq!(
            offsets_from_bytes::<u32>(&[1, 0, 0, 0, 0, 1, 0, 0]).unwrap(),
            vec![1, 256]
        );
        assert_eq!(lengths_from_bytes(&[7, 0, 0, 0]).unwrap(), vec![7]);
        assert!(offsets_from_bytes::<u64>(&[1, 0, 0, 0]).is_err());
        assert!(lengths_from_bytes(&[1, 0]).is_err());
    }
}
