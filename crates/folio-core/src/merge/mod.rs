//! Three-way merge of concurrent notebook edits

mod detect;

pub use detect::detect_conflicts;

use crate::models::ConflictBlock;
use crate::patch;

/// Result of a three-way merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Both edits combined cleanly
    Merged(String),
    /// Edits could not be combined.
    ///
    /// The block list may be empty when no line-level conflict was found but
    /// the patch still failed to apply; callers treat both cases alike.
    Conflicted(Vec<ConflictBlock>),
}

impl MergeOutcome {
    /// Whether the merge produced content
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Merged(_))
    }

    /// Conflicting lines (empty on success)
    #[must_use]
    pub fn conflicts(&self) -> &[ConflictBlock] {
        match self {
            Self::Merged(_) => &[],
            Self::Conflicted(blocks) => blocks,
        }
    }
}

/// Merge `mine` and `theirs`, both derived from `base`.
///
/// Line-level conflicts short-circuit the merge; otherwise the edits that
/// turned `base` into `mine` are replayed onto `theirs`.
pub fn three_way_merge(base: &str, mine: &str, theirs: &str) -> MergeOutcome {
    let conflicts = detect_conflicts(base, mine, theirs);
    if !conflicts.is_empty() {
        return MergeOutcome::Conflicted(conflicts);
    }

    let result = patch::apply(theirs, &patch::diff(base, mine));
    if result.all_applied {
        MergeOutcome::Merged(result.text)
    } else {
        tracing::debug!("Patch drifted with no line conflicts; refusing merge");
        MergeOutcome::Conflicted(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_disjoint_line_edits_merge() {
        let outcome = three_way_merge("L1\nL2\nL3", "L1 Client\nL2\nL3", "L1\nL2\nL3 Server");
        assert_eq!(
            outcome,
            MergeOutcome::Merged("L1 Client\nL2\nL3 Server".to_string())
        );
        assert!(outcome.conflicts().is_empty());
    }

    #[test]
    fn test_conflicting_edits_report_blocks() {
        let outcome = three_way_merge("L1\nL2\nL3", "L1\nL2 Client\nL3", "L1\nL2 Server\nL3");
        assert!(!outcome.is_success());
        assert_eq!(outcome.conflicts().len(), 1);
        assert_eq!(outcome.conflicts()[0].line_number, 2);
    }

    #[test]
    fn test_unchanged_mine_yields_theirs() {
        let outcome = three_way_merge("a\nb", "a\nb", "a\nb\nc");
        assert_eq!(outcome, MergeOutcome::Merged("a\nb\nc".to_string()));
    }

    #[test]
    fn test_adjacent_line_edits_merge() {
        let outcome = three_way_merge("L1\nL2\nL3", "L1 Client\nL2\nL3", "L1\nL2 Server\nL3");
        assert_eq!(
            outcome,
            MergeOutcome::Merged("L1 Client\nL2 Server\nL3".to_string())
        );
    }

    #[test]
    fn test_edit_next_to_changed_line_merges() {
        let base = "intro\nremove me entirely please\noutro";
        let mine = "intro\nremove me entirely please!\noutro";
        let theirs = "intro\nremove me entirely please\nXoutro";
        assert_eq!(
            three_way_merge(base, mine, theirs),
            MergeOutcome::Merged("intro\nremove me entirely please!\nXoutro".to_string())
        );
    }

    #[test]
    fn test_drift_without_line_conflict_fails_with_no_blocks() {
        // theirs dropped the first line and edited the one mine deletes; line
        // positions shift so no single line conflicts
        let base = "keep\nAAAA\nBBBB\nCCCC";
        let mine = "keep\nAAAA\nCCCC";
        let theirs = "AAAA\nBXBB\nCCCC";
        assert!(detect_conflicts(base, mine, theirs).is_empty());
        assert_eq!(
            three_way_merge(base, mine, theirs),
            MergeOutcome::Conflicted(Vec::new())
        );
    }
}
