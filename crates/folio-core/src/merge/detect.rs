//! Line-level conflict detection

use crate::models::ConflictBlock;

/// Report lines that both sides changed away from `base` and that disagree.
///
/// Lines are compared by position; a side that is shorter than the others
/// contributes empty lines. Blocks come back in line order.
pub fn detect_conflicts(base: &str, mine: &str, theirs: &str) -> Vec<ConflictBlock> {
    let base_lines: Vec<&str> = base.lines().collect();
    let my_lines: Vec<&str> = mine.lines().collect();
    let their_lines: Vec<&str> = theirs.lines().collect();
    let line_count = base_lines.len().max(my_lines.len()).max(their_lines.len());

    (0..line_count)
        .filter_map(|index| {
            let base_line = line_at(&base_lines, index);
            let my_line = line_at(&my_lines, index);
            let their_line = line_at(&their_lines, index);

            let conflicting =
                base_line != my_line && base_line != their_line && my_line != their_line;
            conflicting.then(|| ConflictBlock {
                line_number: index + 1,
                base: base_line.to_string(),
                yours: my_line.to_string(),
                theirs: their_line.to_string(),
            })
        })
        .collect()
}

fn line_at<'a>(lines: &[&'a str], index: usize) -> &'a str {
    lines.get(index).copied().unwrap_or("")
}
