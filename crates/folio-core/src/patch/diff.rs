//! Text diff producing equal/delete/insert segments

use super::myers::{edit_script, Edit};

/// Line-level edit distance above which a region is split and diffed in halves
const LINE_EDIT_LIMIT: usize = 1024;

/// Lines searched on each side of the proportional guess for a split anchor
const SPLIT_SEARCH_LINES: usize = 256;

/// Candidate anchor lines tried before splitting proportionally
const SPLIT_ANCHOR_TRIES: usize = 16;

/// Character-level edit distance above which a replaced block is left coarse
const CHAR_EDIT_LIMIT: usize = 512;

/// Replaced blocks longer than this (in chars, both sides) skip refinement
const CHAR_REFINE_LIMIT: usize = 2000;

/// Segment operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Text shared by both versions
    Equal,
    /// Text only in the old version
    Delete,
    /// Text only in the new version
    Insert,
}

/// A run of text with one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub op: Op,
    pub text: String,
}

impl Segment {
    pub fn new(op: Op, text: impl Into<String>) -> Self {
        Self {
            op,
            text: text.into(),
        }
    }
}

/// Append `text` to `segments`, merging with a trailing segment of the same op.
pub fn push_segment(segments: &mut Vec<Segment>, op: Op, text: &str) {
    if text.is_empty() {
        return;
    }
    match segments.last_mut() {
        Some(last) if last.op == op => last.text.push_str(text),
        _ => segments.push(Segment::new(op, text)),
    }
}

/// Diff two texts.
///
/// Concatenating the `Equal` and `Delete` segments yields `old`; concatenating
/// the `Equal` and `Insert` segments yields `new`. Adjacent segments never
/// share an op.
pub fn diff_segments(old: &str, new: &str) -> Vec<Segment> {
    let prefix = common_prefix_len(old, new);
    let suffix = common_suffix_len(&old[prefix..], &new[prefix..]);

    let mut segments = Vec::new();
    push_segment(&mut segments, Op::Equal, &old[..prefix]);
    diff_lines(
        &old[prefix..old.len() - suffix],
        &new[prefix..new.len() - suffix],
        &mut segments,
    );
    push_segment(&mut segments, Op::Equal, &old[old.len() - suffix..]);
    segments
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map_or_else(|| a.len().min(b.len()), |((index, _), _)| index)
}

fn common_suffix_len(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(ca, cb)| ca == cb)
        .map(|(ca, _)| ca.len_utf8())
        .sum()
}

fn diff_lines(old: &str, new: &str, out: &mut Vec<Segment>) {
    if old.is_empty() || new.is_empty() {
        push_segment(out, Op::Delete, old);
        push_segment(out, Op::Insert, new);
        return;
    }

    let a: Vec<&str> = old.split_inclusive('\n').collect();
    let b: Vec<&str> = new.split_inclusive('\n').collect();
    let mut deleted = String::new();
    let mut inserted = String::new();
    diff_line_range(&a, &b, &mut deleted, &mut inserted, out);
    flush_replacement(&mut deleted, &mut inserted, out);
}

/// Diff line slices, leaving any trailing replacement pending in
/// `deleted`/`inserted` so it can join the next range.
fn diff_line_range(
    a: &[&str],
    b: &[&str],
    deleted: &mut String,
    inserted: &mut String,
    out: &mut Vec<Segment>,
) {
    let Some(edits) = edit_script(a, b, LINE_EDIT_LIMIT) else {
        if a.len() < 2 || b.len() < 2 {
            deleted.push_str(&a.concat());
            inserted.push_str(&b.concat());
            return;
        }
        let (split_a, split_b) = split_point(a, b);
        diff_line_range(&a[..split_a], &b[..split_b], deleted, inserted, out);
        diff_line_range(&a[split_a..], &b[split_b..], deleted, inserted, out);
        return;
    };

    let (mut i, mut j) = (0, 0);
    for edit in edits {
        match edit {
            Edit::Equal(count) => {
                flush_replacement(deleted, inserted, out);
                push_segment(out, Op::Equal, &a[i..i + count].concat());
                i += count;
                j += count;
            }
            Edit::Delete(count) => {
                deleted.push_str(&a[i..i + count].concat());
                i += count;
            }
            Edit::Insert(count) => {
                inserted.push_str(&b[j..j + count].concat());
                j += count;
            }
        }
    }
}

/// Split both slices near the middle of `a`, preferring a non-blank line of
/// `a` that also occurs close to the proportional position in `b`.
fn split_point(a: &[&str], b: &[&str]) -> (usize, usize) {
    let mid = a.len() / 2;
    let guess = |at: usize| at * b.len() / a.len();

    for at in (mid..a.len()).take(SPLIT_ANCHOR_TRIES) {
        if a[at].trim().is_empty() {
            continue;
        }
        let center = guess(at);
        let lo = center.saturating_sub(SPLIT_SEARCH_LINES);
        let hi = center.saturating_add(SPLIT_SEARCH_LINES).min(b.len());
        let nearest = (lo..hi)
            .filter(|&k| b[k] == a[at])
            .min_by_key(|&k| k.abs_diff(center));
        if let Some(k) = nearest {
            return (at, k);
        }
    }
    (mid, guess(mid))
}

fn flush_replacement(deleted: &mut String, inserted: &mut String, out: &mut Vec<Segment>) {
    let refine = !deleted.is_empty()
        && !inserted.is_empty()
        && deleted.chars().count() + inserted.chars().count() <= CHAR_REFINE_LIMIT;
    if refine {
        diff_chars(deleted, inserted, out);
    } else {
        push_segment(out, Op::Delete, deleted);
        push_segment(out, Op::Insert, inserted);
    }
    deleted.clear();
    inserted.clear();
}

fn diff_chars(old: &str, new: &str, out: &mut Vec<Segment>) {
    let a: Vec<char> = old.chars().collect();
    let b: Vec<char> = new.chars().collect();
    let Some(edits) = edit_script(&a, &b, CHAR_EDIT_LIMIT) else {
        push_segment(out, Op::Delete, old);
        push_segment(out, Op::Insert, new);
        return;
    };

    let (mut i, mut j) = (0, 0);
    for edit in edits {
        let (op, text): (Op, String) = match edit {
            Edit::Equal(count) => {
                let text = a[i..i + count].iter().collect();
                i += count;
                j += count;
                (Op::Equal, text)
            }
            Edit::Delete(count) => {
                let text = a[i..i + count].iter().collect();
                i += count;
                (Op::Delete, text)
            }
            Edit::Insert(count) => {
                let text = b[j..j + count].iter().collect();
                j += count;
                (Op::Insert, text)
            }
        };
        push_segment(out, op, &text);
    }
}
