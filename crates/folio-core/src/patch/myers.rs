//! Greedy O(ND) shortest edit script with a bounded edit distance

#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)] // k-diagonals are signed

/// One run of an edit script over two token sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    /// Tokens present in both sequences
    Equal(usize),
    /// Tokens only in the old sequence
    Delete(usize),
    /// Tokens only in the new sequence
    Insert(usize),
}

/// Compute the shortest edit script turning `a` into `b`.
///
/// Returns `None` when more than `max_edits` insertions plus deletions would
/// be needed; callers fall back to a whole-region replacement. Memory grows
/// with the square of the edit distance, which is what the bound caps.
pub fn edit_script<T: PartialEq>(a: &[T], b: &[T], max_edits: usize) -> Option<Vec<Edit>> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max_d = max_edits.min(a.len() + b.len()) as isize;
    let offset = max_d + 1;
    let idx = |k: isize| (k + offset) as usize;

    let mut v = vec![0_isize; (2 * offset + 1) as usize];
    // trace[d] holds the furthest-reaching x for diagonals -d..=d before step d
    let mut trace: Vec<Vec<isize>> = Vec::new();

    for d in 0..=max_d {
        trace.push(v[idx(-d)..=idx(d)].to_vec());

        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && v[idx(k - 1)] < v[idx(k + 1)]) {
                v[idx(k + 1)]
            } else {
                v[idx(k - 1)] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx(k)] = x;

            if x >= n && y >= m {
                return Some(backtrack(&trace, n, m));
            }
            k += 2;
        }
    }

    None
}

fn backtrack(trace: &[Vec<isize>], mut x: isize, mut y: isize) -> Vec<Edit> {
    let mut steps = Vec::new();

    for d in (0..trace.len() as isize).rev() {
        if d == 0 {
            for _ in 0..x {
                steps.push(Edit::Equal(1));
            }
            break;
        }

        let snapshot = &trace[d as usize];
        let at = |k: isize| snapshot[(k + d) as usize];
        let k = x - y;
        let prev_k = if k == -d || (k != d && at(k - 1) < at(k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = at(prev_k);
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            steps.push(Edit::Equal(1));
            x -= 1;
            y -= 1;
        }
        if x == prev_x {
            steps.push(Edit::Insert(1));
        } else {
            steps.push(Edit::Delete(1));
        }
        x = prev_x;
        y = prev_y;
    }

    steps.reverse();
    compress(steps)
}

fn compress(steps: Vec<Edit>) -> Vec<Edit> {
    let mut runs: Vec<Edit> = Vec::with_capacity(steps.len());
    for step in steps {
        match (runs.last_mut(), step) {
            (Some(Edit::Equal(count)), Edit::Equal(more))
            | (Some(Edit::Delete(count)), Edit::Delete(more))
            | (Some(Edit::Insert(count)), Edit::Insert(more)) => *count += more,
            _ => runs.push(step),
        }
    }
    runs
}
