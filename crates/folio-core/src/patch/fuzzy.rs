//! Approximate placement for hunks whose context was edited concurrently

use std::iter;
use std::ops::Range;

use super::diff::{Op, Segment};
use super::myers::{edit_script, Edit};

/// Longest hunk source, in chars, searched for approximately
pub const MAX_PATTERN_CHARS: usize = 1024;

/// A match may differ from the pattern in at most one char out of this many
const ERROR_RATIO: usize = 2;

/// Find the substring of `window` closest to `pattern` by edit distance.
///
/// Matches needing more than one edit per [`ERROR_RATIO`] pattern chars are
/// rejected. Among equally close matches the one starting nearest `expected`
/// (a byte offset into `window`) wins. Returns a byte range into `window`.
pub fn find_approx(window: &str, pattern: &str, expected: usize) -> Option<Range<usize>> {
    let pattern: Vec<char> = pattern.chars().collect();
    if pattern.is_empty() || pattern.len() > MAX_PATTERN_CHARS {
        return None;
    }
    let max_errors = pattern.len() / ERROR_RATIO;
    let offsets = char_offsets(window);

    // column[i]: cost and start char of the cheapest alignment of
    // pattern[..i] ending at the current window position
    let mut column: Vec<(usize, usize)> = (0..=pattern.len()).map(|i| (i, 0)).collect();
    let mut best: Option<((usize, usize), Range<usize>)> = None;

    for (j, ch) in window.chars().enumerate() {
        let mut diagonal = column[0];
        column[0] = (0, j + 1);
        for i in 1..=pattern.len() {
            let substitute = (diagonal.0 + usize::from(pattern[i - 1] != ch), diagonal.1);
            let skip_text = (column[i].0 + 1, column[i].1);
            let skip_pattern = (column[i - 1].0 + 1, column[i - 1].1);
            diagonal = column[i];
            column[i] = [substitute, skip_text, skip_pattern]
                .into_iter()
                .min_by_key(|&(cost, _)| cost)
                .unwrap_or(substitute);
        }

        let (cost, start) = column[pattern.len()];
        if cost > max_errors {
            continue;
        }
        let range = offsets[start]..offsets[j + 1];
        let rank = (cost, range.start.abs_diff(expected));
        if best.as_ref().map_or(true, |(best_rank, _)| rank < *best_rank) {
            best = Some((rank, range));
        }
    }
    best.map(|(_, range)| range)
}

/// Rebuild a hunk's output over `found`, a text resembling its source.
///
/// Context is taken from `found` and inserted text is placed through a char
/// alignment of the hunk's source against `found`. Returns `None` when a
/// deleted span is not present verbatim.
pub fn remap(segments: &[Segment], found: &str) -> Option<String> {
    let source: Vec<char> = segments
        .iter()
        .filter(|segment| segment.op != Op::Insert)
        .flat_map(|segment| segment.text.chars())
        .collect();
    let target: Vec<char> = found.chars().collect();
    let edits = edit_script(&source, &target, source.len())?;
    let offsets = char_offsets(found);

    // starts[i]/ends[i]: byte span in `found` aligned with source char i
    let mut starts = vec![found.len(); source.len() + 1];
    let mut ends = vec![0; source.len()];
    let (mut i, mut j) = (0, 0);
    for edit in edits {
        match edit {
            Edit::Equal(count) => {
                for k in 0..count {
                    starts[i + k] = offsets[j + k];
                    ends[i + k] = offsets[j + k + 1];
                }
                i += count;
                j += count;
            }
            Edit::Delete(count) => {
                for k in 0..count {
                    starts[i + k] = offsets[j];
                    ends[i + k] = offsets[j];
                }
                i += count;
            }
            Edit::Insert(count) => j += count,
        }
    }
    starts[0] = 0;

    let mut out = String::with_capacity(found.len());
    let (mut at, mut pos) = (0, 0);
    for segment in segments {
        let len = segment.text.chars().count();
        match segment.op {
            Op::Insert => out.push_str(&segment.text),
            Op::Equal => {
                let end = starts[at + len].max(pos);
                out.push_str(&found[pos..end]);
                pos = end;
                at += len;
            }
            Op::Delete => {
                let end = ends[at + len - 1].max(pos);
                if found[pos..end] != segment.text {
                    return None;
                }
                pos = end;
                at += len;
            }
        }
    }
    out.push_str(&found[pos..]);
    Some(out)
}

/// Byte offset of every char in `text`, plus `text.len()`
fn char_offsets(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(iter::once(text.len()))
        .collect()
}
