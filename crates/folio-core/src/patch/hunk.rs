//! Context-anchored hunks: construction and fuzzy application

use std::ops::Range;

use super::diff::{push_segment, Op, Segment};
use super::fuzzy;

/// Context added on each side of a change, in chars, per expansion step
const CONTEXT_MARGIN: usize = 4;

/// Upper bound on context expansion steps per hunk
const MAX_CONTEXT_STEPS: usize = 16;

/// Radius (bytes) around a hunk inside which its context must be unique
const UNIQUENESS_WINDOW: usize = 64 * 1024;

/// Bounds (bytes) on how far from its expected offset a hunk is searched for
/// approximately
const MIN_FUZZY_RADIUS: usize = 64;
const MAX_FUZZY_RADIUS: usize = 2048;

/// One located change with surrounding context.
///
/// Offsets and lengths are in bytes of the text the hunk was computed
/// against (`old_*`) and of the text it produces (`new_*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
    pub segments: Vec<Segment>,
}

impl Hunk {
    /// Text this hunk expects to find (context plus deleted text)
    pub fn source_text(&self) -> String {
        self.segments
            .iter()
            .filter(|segment| segment.op != Op::Insert)
            .map(|segment| segment.text.as_str())
            .collect()
    }

    /// Text this hunk leaves behind (context plus inserted text)
    pub fn target_text(&self) -> String {
        self.segments
            .iter()
            .filter(|segment| segment.op != Op::Delete)
            .map(|segment| segment.text.as_str())
            .collect()
    }
}

/// A contiguous run of changed segments, in old/new byte coordinates
struct ChangeGroup {
    old_lo: usize,
    old_hi: usize,
    new_lo: usize,
    new_hi: usize,
    segments: Vec<Segment>,
}

/// Group diff segments into hunks with unique-enough context taken from `old`.
pub fn build_hunks(old: &str, segments: &[Segment]) -> Vec<Hunk> {
    let groups = group_changes(segments);

    let mut hunks = Vec::with_capacity(groups.len());
    for (index, group) in groups.iter().enumerate() {
        let floor = if index == 0 {
            0
        } else {
            char_midpoint(old, groups[index - 1].old_hi, group.old_lo)
        };
        let ceil = groups
            .get(index + 1)
            .map_or(old.len(), |next| char_midpoint(old, group.old_hi, next.old_lo));

        let mut start = retreat_chars(old, group.old_lo, CONTEXT_MARGIN, floor);
        let mut end = advance_chars(old, group.old_hi, CONTEXT_MARGIN, ceil);
        let mut steps = 1;
        while steps < MAX_CONTEXT_STEPS
            && (start > floor || end < ceil)
            && !is_locally_unique(old, start, end)
        {
            start = retreat_chars(old, start, CONTEXT_MARGIN, floor);
            end = advance_chars(old, end, CONTEXT_MARGIN, ceil);
            steps += 1;
        }

        let mut hunk_segments = Vec::with_capacity(group.segments.len() + 2);
        push_segment(&mut hunk_segments, Op::Equal, &old[start..group.old_lo]);
        for segment in &group.segments {
            push_segment(&mut hunk_segments, segment.op, &segment.text);
        }
        push_segment(&mut hunk_segments, Op::Equal, &old[group.old_hi..end]);

        let old_len = end - start;
        let changed_old = group.old_hi - group.old_lo;
        let changed_new = group.new_hi - group.new_lo;
        hunks.push(Hunk {
            old_start: start,
            old_len,
            new_start: group.new_lo - (group.old_lo - start),
            new_len: old_len - changed_old + changed_new,
            segments: hunk_segments,
        });
    }
    hunks
}

fn group_changes(segments: &[Segment]) -> Vec<ChangeGroup> {
    let mut groups: Vec<ChangeGroup> = Vec::new();
    let mut current: Option<ChangeGroup> = None;
    let (mut old_pos, mut new_pos) = (0, 0);

    for (index, segment) in segments.iter().enumerate() {
        let len = segment.text.len();
        match segment.op {
            Op::Equal => {
                let bridges = index + 1 < segments.len()
                    && segment.text.chars().count() <= 2 * CONTEXT_MARGIN;
                if let Some(mut group) = current.take() {
                    if bridges {
                        group.segments.push(segment.clone());
                        group.old_hi += len;
                        group.new_hi += len;
                        current = Some(group);
                    } else {
                        groups.push(group);
                    }
                }
                old_pos += len;
                new_pos += len;
            }
            Op::Delete | Op::Insert => {
                let group = current.get_or_insert_with(|| ChangeGroup {
                    old_lo: old_pos,
                    old_hi: old_pos,
                    new_lo: new_pos,
                    new_hi: new_pos,
                    segments: Vec::new(),
                });
                group.segments.push(segment.clone());
                if segment.op == Op::Delete {
                    group.old_hi += len;
                    old_pos += len;
                } else {
                    group.new_hi += len;
                    new_pos += len;
                }
            }
        }
    }
    groups.extend(current);
    groups
}

fn is_locally_unique(text: &str, start: usize, end: usize) -> bool {
    let pattern = &text[start..end];
    if pattern.is_empty() {
        return true;
    }
    let lo = floor_char_boundary(text, start.saturating_sub(UNIQUENESS_WINDOW));
    let hi = ceil_char_boundary(text, end.saturating_add(UNIQUENESS_WINDOW));
    let window = &text[lo..hi];
    window.find(pattern) == window.rfind(pattern)
}

/// Apply hunks in order to `text`.
///
/// Each hunk is placed at the occurrence of its source text nearest to where
/// it is expected, never before the end of the previously applied hunk. When
/// the source text no longer occurs verbatim, the closest approximate match
/// near the expected offset is used instead, provided every deleted span is
/// still intact. Hunks that cannot be placed are skipped. Returns whether
/// every hunk applied.
pub fn apply_hunks(text: &mut String, hunks: &[Hunk]) -> bool {
    let mut cursor = 0_usize;
    // shift from old coordinates to current-text coordinates
    let mut delta = 0_isize;
    let mut all_applied = true;

    for hunk in hunks {
        let source = hunk.source_text();
        let target = hunk.target_text();
        let expected = floor_char_boundary(
            text,
            hunk.old_start
                .saturating_add_signed(delta)
                .clamp(cursor, text.len()),
        )
        .max(cursor);

        let placed = match locate(text, &source, expected, cursor) {
            Some(pos) => Some((pos..pos + source.len(), target)),
            None => locate_approx(text, hunk, &source, expected, cursor),
        };
        let Some((range, replacement)) = placed else {
            all_applied = false;
            continue;
        };

        let pos = range.start;
        text.replace_range(range, &replacement);
        cursor = pos + replacement.len();
        delta = signed(cursor) - signed(hunk.old_start + hunk.old_len);
    }
    all_applied
}

/// Offsets are bounded by `isize::MAX` (text lengths, or validated on parse).
fn signed(value: usize) -> isize {
    isize::try_from(value).unwrap_or(isize::MAX)
}

/// Find the occurrence of `pattern` at or after `cursor` closest to `expected`.
fn locate(text: &str, pattern: &str, expected: usize, cursor: usize) -> Option<usize> {
    if pattern.is_empty() {
        return Some(expected);
    }

    let after = text[expected..].find(pattern).map(|i| expected + i);
    let before = if expected > cursor {
        let bound = floor_char_boundary(text, expected - 1 + pattern.len());
        text.get(cursor..bound)
            .and_then(|window| window.rfind(pattern))
            .map(|i| cursor + i)
    } else {
        None
    };

    match (before, after) {
        (Some(b), Some(a)) => Some(if expected - b < a - expected { b } else { a }),
        (Some(b), None) => Some(b),
        (None, found) => found,
    }
}

/// Place `hunk` over the text closest to its source within a bounded window
/// around `expected`, returning the range to replace and its replacement.
fn locate_approx(
    text: &str,
    hunk: &Hunk,
    source: &str,
    expected: usize,
    cursor: usize,
) -> Option<(Range<usize>, String)> {
    let radius = source
        .len()
        .saturating_mul(2)
        .clamp(MIN_FUZZY_RADIUS, MAX_FUZZY_RADIUS);
    let lo = floor_char_boundary(text, expected.saturating_sub(radius)).max(cursor);
    let hi = ceil_char_boundary(
        text,
        expected.saturating_add(source.len()).saturating_add(radius),
    );
    let window = &text[lo..hi];

    let found = fuzzy::find_approx(window, source, expected - lo)?;
    let replacement = fuzzy::remap(&hunk.segments, &window[found.clone()])?;
    tracing::trace!(expected, at = lo + found.start, "Placed hunk approximately");
    Some((lo + found.start..lo + found.end, replacement))
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Step back up to `count` chars from `from`, stopping at `floor`.
fn retreat_chars(text: &str, from: usize, count: usize, floor: usize) -> usize {
    text[floor..from]
        .char_indices()
        .rev()
        .take(count)
        .last()
        .map_or(from, |(i, _)| floor + i)
}

/// Step forward up to `count` chars from `from`, stopping at `ceil`.
fn advance_chars(text: &str, from: usize, count: usize, ceil: usize) -> usize {
    text[from..ceil]
        .char_indices()
        .nth(count)
        .map_or(ceil, |(i, _)| from + i)
}

fn char_midpoint(text: &str, lo: usize, hi: usize) -> usize {
    let chars = text[lo..hi].chars().count();
    advance_chars(text, lo, chars / 2, hi)
}
