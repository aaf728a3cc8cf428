//! Myers O((N+M)·D) shortest edit script.
//!
//! Common prefix and suffix are trimmed first; the search itself runs on the
//! differing middle only. The trace keeps, per edit distance `d`, the
//! furthest-reaching x for diagonals `-d..=d`, so memory is O(D²).

/// One primitive step of an edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    /// Element present on both sides.
    Equal,
    /// Element only present in the new sequence.
    Insert,
    /// Element only present in the old sequence.
    Delete,
}

/// Compute a minimal edit script transforming `old` into `new`.
///
/// Consuming the script left to right walks both sequences: `Equal` advances
/// both, `Delete` advances `old`, `Insert` advances `new`.
pub fn edit_script<T: PartialEq>(old: &[T], new: &[T]) -> Vec<Edit> {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let old_rest = &old[prefix..];
    let new_rest = &new[prefix..];

    let suffix = old_rest
        .iter()
        .rev()
        .zip(new_rest.iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let old_mid = &old_rest[..old_rest.len() - suffix];
    let new_mid = &new_rest[..new_rest.len() - suffix];

    let mut script = Vec::with_capacity(old.len().max(new.len()));
    script.extend(std::iter::repeat(Edit::Equal).take(prefix));
    script.extend(middle(old_mid, new_mid));
    script.extend(std::iter::repeat(Edit::Equal).take(suffix));
    script
}

fn middle<T: PartialEq>(a: &[T], b: &[T]) -> Vec<Edit> {
    let n = a.len() as isize;
    let m = b.len() as isize;

    if n == 0 {
        return vec![Edit::Insert; b.len()];
    }
    if m == 0 {
        return vec![Edit::Delete; a.len()];
    }

    let max = n + m;
    let offset = max + 1;
    let mut v = vec![0isize; (2 * max + 3) as usize];
    let mut trace: Vec<Vec<isize>> = Vec::new();

    'search: for d in 0..=max {
        let mut k = -d;
        while k <= d {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;

            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx] = x;

            if x >= n && y >= m {
                trace.push(round(&v, d, offset));
                break 'search;
            }
            k += 2;
        }
        trace.push(round(&v, d, offset));
    }

    backtrack(&trace, n, m)
}

/// Snapshot of the diagonals `-d..=d` after round `d`.
fn round(v: &[isize], d: isize, offset: isize) -> Vec<isize> {
    let lo = (offset - d) as usize;
    let hi = (offset + d) as usize;
    v[lo..=hi].to_vec()
}

fn backtrack(trace: &[Vec<isize>], n: isize, m: isize) -> Vec<Edit> {
    let mut script = Vec::with_capacity((n + m) as usize);
    let mut x = n;
    let mut y = m;

    for d in (1..trace.len() as isize).rev() {
        let prev = &trace[(d - 1) as usize];
        let at = |k: isize| prev[(k + d - 1) as usize];

        let k = x - y;
        let prev_k = if k == -d || (k != d && at(k - 1) < at(k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = at(prev_k);
        let prev_y = prev_x - prev_k;

        let (mid_x, edit) = if prev_k == k + 1 {
            (prev_x, Edit::Insert)
        } else {
            (prev_x + 1, Edit::Delete)
        };

        while x > mid_x {
            script.push(Edit::Equal);
            x -= 1;
            y -= 1;
        }
        script.push(edit);
        x = prev_x;
        y = prev_y;
    }

    // Round zero is a pure snake from the origin.
    debug_assert_eq!(x, y);
    script.extend(std::iter::repeat(Edit::Equal).take(x.max(0) as usize));

    script.reverse();
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cost(script: &[Edit]) -> usize {
        script.iter().filter(|e| **e != Edit::Equal).count()
    }

    fn replay<'a>(old: &[&'a str], new: &[&'a str], script: &[Edit]) -> Vec<&'a str> {
        let (mut i, mut j) = (0, 0);
        let mut out = Vec::new();
        for edit in script {
            match edit {
                Edit::Equal => {
                    assert_eq!(old[i], new[j]);
                    out.push(old[i]);
                    i += 1;
                    j += 1;
                }
                Edit::Delete => i += 1,
                Edit::Insert => {
                    out.push(new[j]);
                    j += 1;
                }
            }
        }
        assert_eq!(i, old.len());
        out
    }

    #[test]
    fn identical_is_all_equal() {
        let a = ["x", "y", "z"];
        assert_eq!(edit_script(&a, &a), vec![Edit::Equal; 3]);
    }

    #[test]
    fn empty_sides() {
        let empty: [&str; 0] = [];
        assert_eq!(edit_script(&empty, &["a", "b"]), vec![Edit::Insert; 2]);
        assert_eq!(edit_script(&["a", "b"], &empty), vec![Edit::Delete; 2]);
        assert!(edit_script(&empty, &empty).is_empty());
    }

    #[test]
    fn single_substitution() {
        let script = edit_script(&["a", "b", "c"], &["a", "X", "c"]);
        assert_eq!(
            script,
            vec![Edit::Equal, Edit::Delete, Edit::Insert, Edit::Equal]
        );
    }

    #[test]
    fn classic_myers_example_is_minimal() {
        // ABCABBA -> CBABAC has edit distance 5.
        let old = ["A", "B", "C", "A", "B", "B", "A"];
        let new = ["C", "B", "A", "B", "A", "C"];
        let script = edit_script(&old, &new);
        assert_eq!(cost(&script), 5);
        assert_eq!(replay(&old, &new, &script), new.to_vec());
    }

    #[test]
    fn fully_disjoint_sequences() {
        let old = ["a", "b", "c"];
        let new = ["x", "y"];
        let script = edit_script(&old, &new);
        assert_eq!(cost(&script), 5);
        assert_eq!(replay(&old, &new, &script), new.to_vec());
    }

    #[test]
    fn interleaved_changes_replay() {
        let old = ["fn a() {", "  1", "}", "", "fn b() {", "  2", "}"];
        let new = ["fn a() {", "  1", "  1.5", "}", "fn b() {", "  two", "}", "// end"];
        let script = edit_script(&old, &new);
        assert_eq!(replay(&old, &new, &script), new.to_vec());
        assert_eq!(cost(&script), 5);
    }
}
