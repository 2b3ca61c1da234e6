//! Patch codec
//!
//! Computes a compact textual patch between two versions of a document and
//! applies it, tolerantly, to a possibly-different document. Each hunk carries
//! enough surrounding context to be located even after unrelated edits shifted
//! it around.
//!
//! Wire format, one hunk after another:
//!
//! ```text
//! @@ -8,8 +8,9 @@
//!  cond
//! +!
//!  %0Athi
//! ```
//!
//! Header offsets and lengths are in bytes. Body lines start with `' '`
//! (context), `'-'` (deleted) or `'+'` (inserted), followed by the
//! percent-encoded text. A patch without hunks serializes to the empty string.

mod diff;
mod fuzzy;
mod hunk;
mod myers;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use diff::{diff_segments, push_segment, Op};
pub use hunk::Hunk;

/// Characters left readable in encoded patch bodies
const READABLE: [(&str, &str); 17] = [
    ("%20", " "),
    ("%21", "!"),
    ("%23", "#"),
    ("%24", "$"),
    ("%26", "&"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
    ("%2B", "+"),
    ("%2C", ","),
    ("%2F", "/"),
    ("%3A", ":"),
    ("%3B", ";"),
    ("%3D", "="),
    ("%3F", "?"),
    ("%40", "@"),
];

/// Errors from parsing patch text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchParseError {
    /// Hunk header line could not be parsed
    #[error("malformed hunk header on line {0}")]
    MalformedHeader(usize),

    /// Body line found before any hunk header
    #[error("line {0} is outside of any hunk")]
    OrphanLine(usize),

    /// Body line starts with an unknown operation
    #[error("unknown operation on line {0}")]
    UnknownOperation(usize),

    /// Body text is not valid percent-encoded UTF-8
    #[error("invalid encoding on line {0}")]
    InvalidEncoding(usize),

    /// Body lengths disagree with the hunk header
    #[error("hunk starting on line {0} does not match its header")]
    LengthMismatch(usize),
}

/// An ordered list of hunks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    hunks: Vec<Hunk>,
}

/// Result of applying a patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchResult {
    /// Text after applying every hunk that could be placed
    pub text: String,
    /// Whether every hunk was placed
    pub all_applied: bool,
}

impl Patch {
    /// Compute the patch turning `old` into `new`
    #[must_use]
    pub fn between(old: &str, new: &str) -> Self {
        let segments = diff_segments(old, new);
        Self {
            hunks: hunk::build_hunks(old, &segments),
        }
    }

    /// The patch's hunks, in document order
    #[must_use]
    pub fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }

    /// Whether the patch changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Apply this patch to `base`
    #[must_use]
    pub fn apply_to(&self, base: &str) -> PatchResult {
        let mut text = base.to_string();
        let all_applied = hunk::apply_hunks(&mut text, &self.hunks);
        PatchResult { text, all_applied }
    }
}

/// Produce the serialized patch turning `old` into `new`.
///
/// Identical inputs produce the empty string.
#[must_use]
pub fn diff(old: &str, new: &str) -> String {
    Patch::between(old, new).to_string()
}

/// Apply serialized `patch_text` to `base`.
///
/// Unparseable patch text leaves `base` unchanged and reports failure.
#[must_use]
pub fn apply(base: &str, patch_text: &str) -> PatchResult {
    match patch_text.parse::<Patch>() {
        Ok(patch) => patch.apply_to(base),
        Err(e) => {
            tracing::debug!("Rejecting malformed patch: {e}");
            PatchResult {
                text: base.to_string(),
                all_applied: false,
            }
        }
    }
}

fn encode_body(text: &str) -> String {
    let mut encoded = urlencoding::encode(text).into_owned();
    for (escaped, plain) in READABLE {
        if encoded.contains(escaped) {
            encoded = encoded.replace(escaped, plain);
        }
    }
    encoded
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for hunk in &self.hunks {
            writeln!(
                f,
                "@@ -{},{} +{},{} @@",
                hunk.old_start, hunk.old_len, hunk.new_start, hunk.new_len
            )?;
            for segment in &hunk.segments {
                let sign = match segment.op {
                    Op::Equal => ' ',
                    Op::Delete => '-',
                    Op::Insert => '+',
                };
                writeln!(f, "{sign}{}", encode_body(&segment.text))?;
            }
        }
        Ok(())
    }
}

/// Parse `-12,30 +12,41 @@` (the part after the leading `@@ `)
fn parse_header(rest: &str) -> Option<[usize; 4]> {
    let ranges = rest.strip_suffix("@@")?.trim_end();
    let (old, new) = ranges.split_once(' ')?;
    let (old_start, old_len) = old.strip_prefix('-')?.split_once(',')?;
    let (new_start, new_len) = new.strip_prefix('+')?.split_once(',')?;
    let numbers = [
        old_start.parse().ok()?,
        old_len.parse().ok()?,
        new_start.parse().ok()?,
        new_len.parse().ok()?,
    ];
    let limit = isize::MAX.unsigned_abs();
    let in_range = |start: usize, len: usize| {
        start
            .checked_add(len)
            .is_some_and(|end| end <= limit)
    };
    (in_range(numbers[0], numbers[1]) && in_range(numbers[2], numbers[3])).then_some(numbers)
}

fn check_lengths(hunk: &Hunk, header_line: usize) -> Result<(), PatchParseError> {
    if hunk.source_text().len() == hunk.old_len && hunk.target_text().len() == hunk.new_len {
        Ok(())
    } else {
        Err(PatchParseError::LengthMismatch(header_line))
    }
}

impl FromStr for Patch {
    type Err = PatchParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut hunks = Vec::new();
        let mut current: Option<(Hunk, usize)> = None;

        for (index, line) in text.split('\n').enumerate() {
            let line_no = index + 1;
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix("@@ ") {
                if let Some((hunk, header_line)) = current.take() {
                    check_lengths(&hunk, header_line)?;
                    hunks.push(hunk);
                }
                let [old_start, old_len, new_start, new_len] =
                    parse_header(rest).ok_or(PatchParseError::MalformedHeader(line_no))?;
                current = Some((
                    Hunk {
                        old_start,
                        old_len,
                        new_start,
                        new_len,
                        segments: Vec::new(),
                    },
                    line_no,
                ));
                continue;
            }

            let (hunk, _) = current
                .as_mut()
                .ok_or(PatchParseError::OrphanLine(line_no))?;
            let op = match line.as_bytes()[0] {
                b' ' => Op::Equal,
                b'-' => Op::Delete,
                b'+' => Op::Insert,
                _ => return Err(PatchParseError::UnknownOperation(line_no)),
            };
            let body = urlencoding::decode(&line[1..])
                .map_err(|_| PatchParseError::InvalidEncoding(line_no))?;
            push_segment(&mut hunk.segments, op, &body);
        }

        if let Some((hunk, header_line)) = current {
            check_lengths(&hunk, header_line)?;
            hunks.push(hunk);
        }
        Ok(Self { hunks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_identical_texts_give_empty_patch() {
        assert_eq!(diff("same\ntext", "same\ntext"), "");
        assert_eq!(diff("", ""), "");
    }

    #[test]
    fn test_empty_patch_applies_cleanly() {
        let result = apply("anything", "");
        assert_eq!(result.text, "anything");
        assert!(result.all_applied);
    }

    #[test]
    fn test_patch_text_format() {
        let patch = diff("first\nsecond\nthird\n", "first\nsecond!\nthird\n");
        assert_eq!(patch, "@@ -8,8 +8,9 @@\n cond\n+!\n %0Athi\n");
    }

    #[test]
    fn test_round_trip_simple_edit() {
        let old = "L1\nL2\nL3";
        let new = "L1 Client\nL2\nL3";
        let result = apply(old, &diff(old, new));
        assert!(result.all_applied);
        assert_eq!(result.text, new);
    }

    #[test]
    fn test_patch_applies_to_concurrently_edited_text() {
        let base = "L1\nL2\nL3";
        let mine = "L1 Client\nL2\nL3";
        let theirs = "L1\nL2\nL3 Server";
        let result = apply(theirs, &diff(base, mine));
        assert!(result.all_applied);
        assert_eq!(result.text, "L1 Client\nL2\nL3 Server");
    }

    #[test]
    fn test_insert_into_empty_and_delete_everything() {
        let insert = apply("", &diff("", "hello\nworld"));
        assert_eq!(insert.text, "hello\nworld");
        assert!(insert.all_applied);

        let delete = apply("hello\nworld", &diff("hello\nworld", ""));
        assert_eq!(delete.text, "");
        assert!(delete.all_applied);
    }

    #[test]
    fn test_unicode_and_special_characters_survive() {
        let old = "caf\u{e9} 100% @home\n\tline";
        let new = "caf\u{e9} 50% + \u{1f600} @home\r\n\tline";
        let patch = diff(old, new);
        assert!(!patch.contains('\r'));
        let result = apply(old, &patch);
        assert!(result.all_applied);
        assert_eq!(result.text, new);
    }

    #[test]
    fn test_partial_application_reports_failure() {
        let old = "alpha\nbravo\ncharlie\ndelta\necho\nfoxtrot\n";
        let new = "ALPHA\nbravo\ncharlie\ndelta\necho\nFOXTROT\n";
        let patch = diff(old, new);

        let drifted = "alpha\nbravo\ncharlie\ndelta\necho\nsomething else\n";
        let result = apply(drifted, &patch);
        assert!(!result.all_applied);
        assert_eq!(result.text, "ALPHA\nbravo\ncharlie\ndelta\necho\nsomething else\n");
    }

    #[test]
    fn test_scattered_edits_in_long_document_give_small_patch() {
        let old: String = (0..6000).map(|i| format!("paragraph {i}: some notebook text\n")).collect();
        let new: String = (0..6000)
            .map(|i| {
                if i % 7 == 0 {
                    format!("paragraph {i}: some edited notebook text\n")
                } else {
                    format!("paragraph {i}: some notebook text\n")
                }
            })
            .collect();

        let patch = diff(&old, &new);
        assert!(patch.len() < old.len(), "patch is {} bytes", patch.len());
        let result = apply(&old, &patch);
        assert!(result.all_applied);
        assert_eq!(result.text, new);
    }

    #[test]
    fn test_malformed_patch_leaves_base_unchanged() {
        for garbage in [
            "not a patch",
            "@@ -a,b +c,d @@\n x",
            "@@ -0,1 +0,1 @@\n*x",
            "@@ -0,1 +0,1 @@\n-%ZZ",
            "@@ -0,3 +0,1 @@\n-x\n+y",
            "@@ -18446744073709551615,1 +0,0 @@\n-x",
        ] {
            let result = apply("base text", garbage);
            assert_eq!(result.text, "base text", "input: {garbage:?}");
            assert!(!result.all_applied, "input: {garbage:?}");
        }
    }

    #[test]
    fn test_parse_errors_name_the_line() {
        assert_eq!(
            "@@ -0,1 +0,1 @@\n?x".parse::<Patch>(),
            Err(PatchParseError::UnknownOperation(2))
        );
        assert_eq!(
            " x".parse::<Patch>(),
            Err(PatchParseError::OrphanLine(1))
        );
    }

    #[test]
    fn test_display_parse_round_trip() {
        let patch = Patch::between("one two three", "one 2 three four");
        let reparsed: Patch = patch.to_string().parse().unwrap();
        assert_eq!(reparsed, patch);
    }

    proptest! {
        #[test]
        fn prop_patch_reproduces_target(old in "(?s).{0,200}", new in "(?s).{0,200}") {
            let result = apply(&old, &diff(&old, &new));
            prop_assert!(result.all_applied);
            prop_assert_eq!(result.text, new);
        }

        #[test]
        fn prop_line_edits_reproduce_target(
            lines in prop::collection::vec("[a-c ]{0,6}", 0..30),
            edits in prop::collection::vec((0usize..30, "[a-d]{0,4}"), 0..6),
        ) {
            let old = lines.join("\n");
            let mut changed = lines.clone();
            for (at, text) in edits {
                if changed.is_empty() {
                    changed.push(text);
                } else {
                    let at = at % changed.len();
                    changed[at] = text;
                }
            }
            let new = changed.join("\n");
            let result = apply(&old, &diff(&old, &new));
            prop_assert!(result.all_applied);
            prop_assert_eq!(result.text, new);
        }
    }
}
