//! Splitting of transmissions into bulletins and segments.
//!
//! A transmission may carry several warnings back to back. Each one starts
//! with a UGC line and ends with a line holding only `$$`:
//!
//! ```text
//! WFUS53 KDDC 050056        <- shared header
//! TORDDC
//! ...
//! KSC101-135-050130-        <- bulletin starts
//! /O.NEW.KDDC.TO.W.0045.150605T0056Z-150605T0130Z/
//! ...
//! $$                        <- bulletin ends
//! ```
//!
//! Splitting never fails: text without this structure simply has no
//! bulletins.

use tracing::debug;

use crate::parser::lines_with_offsets;
use crate::product::{Bulletin, Segment};
use crate::ugc::ugc_block;

const SEGMENT_DELIMITER: &str = "$$";

/// Split a filename into its base and extension (with the dot).
///
/// `TORDDCKS.TXT` becomes `("TORDDCKS", ".TXT")`. Any directory part is
/// dropped, so `inbox/TORDDCKS.TXT` splits the same way.
pub fn split_filename(filename: &str) -> (&str, &str) {
    let name = filename
        .rfind(['/', '\\'])
        .map_or(filename, |i| &filename[i + 1..]);
    match name.rfind('.') {
        Some(dot) => name.split_at(dot),
        None => (name, ""),
    }
}

/// Derive the filename of a numbered part, e.g. `TORDDCKS.01.TXT`.
pub fn derive_filename(filename: &str, separator: char, sequence: u32) -> String {
    let (base, ext) = split_filename(filename);
    format!("{}{}{:02}{}", base, separator, sequence, ext)
}

fn is_delimiter(line: &str) -> bool {
    line.trim() == SEGMENT_DELIMITER
}

/// Extract every bulletin from a transmission.
///
/// A bulletin runs from a UGC block at the start of a line through the first
/// following `$$` line. The text before the first bulletin is the shared
/// header and must not be blank; without it there are no bulletins. A UGC
/// block with no closing `$$` is not a bulletin.
pub fn extract_bulletins(filename: &str, content: &str) -> Vec<Bulletin> {
    let lines: Vec<(usize, &str)> = lines_with_offsets(content).collect();
    let mut header: Option<&str> = None;
    let mut bulletins = Vec::new();
    let mut index = 0;

    while index < lines.len() {
        let (start, _) = lines[index];
        let Ok((rest, _)) = ugc_block(&content[start..]) else {
            index += 1;
            continue;
        };
        let block_end = content.len() - rest.len();

        let Some(close) = (index + 1..lines.len())
            .find(|&i| lines[i].0 >= block_end && is_delimiter(lines[i].1))
        else {
            debug!("UGC block at offset {} has no closing $$", start);
            break;
        };
        let (close_offset, close_line) = lines[close];

        let shared = match header {
            Some(shared) => shared,
            None => {
                let candidate = &content[..start];
                if candidate.trim().is_empty() {
                    debug!("No header before first bulletin in {}", filename);
                    return Vec::new();
                }
                header = Some(candidate);
                candidate
            }
        };

        let sequence = bulletins.len() as u32 + 1;
        bulletins.push(Bulletin {
            sequence,
            filename: derive_filename(filename, '.', sequence),
            header: shared.to_string(),
            body: content[start..close_offset + close_line.len()].to_string(),
        });

        index = close + 1;
    }

    bulletins
}

/// Split a bulletin body into its `$$`-delimited segments.
///
/// Chunks are trimmed and empty chunks are dropped, so a body without any
/// `$$` line is one segment and a trailing `$$` adds none.
pub fn split_segments(filename: &str, header: &str, body: &str) -> Vec<Segment> {
    let mut chunks = Vec::new();
    let mut chunk_start = 0;

    for (offset, line) in lines_with_offsets(body) {
        if is_delimiter(line) {
            chunks.push(&body[chunk_start..offset]);
            chunk_start = offset + line.len();
        }
    }
    chunks.push(&body[chunk_start..]);

    chunks
        .into_iter()
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .enumerate()
        .map(|(i, chunk)| {
            let sequence = i as u32 + 1;
            Segment {
                sequence,
                filename: derive_filename(filename, '-', sequence),
                header: header.to_string(),
                body: chunk.to_string(),
            }
        })
        .collect()
}
