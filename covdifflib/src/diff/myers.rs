//! Myers shortest edit script.
//!
//! The forward pass records, for every edit distance `d`, the furthest
//! reaching x on each diagonal `k in -d..=d`. Backtracking walks those
//! snapshots from the end point back to the origin. When both neighbours
//! reach the same x the step from diagonal `k + 1` (a deletion) is taken,
//! so deletions are emitted before insertions inside a hunk and an
//! ambiguous alignment always keeps the earliest old unit.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Kind of an edit operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Equal,
    Insert,
    Delete,
}

/// One run of an edit script, using 0-based half-open unit indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OpKind,
    pub old: Range<usize>,
    pub new: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Equal,
    Insert,
    Delete,
}

/// Compute the minimal edit script turning `old` into `new`.
///
/// Consecutive moves of the same kind are grouped, and each change hunk is
/// reported as at most one `Delete` followed by at most one `Insert`.
pub fn diff<S: PartialEq>(old: &[S], new: &[S]) -> Vec<Operation> {
    let moves = shortest_edit(old, new);
    group(&moves)
}

/// Number of insertions plus deletions in the minimal edit script
pub fn edit_distance<S: PartialEq>(old: &[S], new: &[S]) -> usize {
    shortest_edit(old, new)
        .iter()
        .filter(|m| **m != Move::Equal)
        .count()
}

fn shortest_edit<S: PartialEq>(old: &[S], new: &[S]) -> Vec<Move> {
    let n = old.len() as isize;
    let m = new.len() as isize;
    let max = n + m;
    if max == 0 {
        return Vec::new();
    }

    let offset = max;
    let mut v = vec![0isize; (2 * max + 2) as usize];
    let idx = |k: isize| (k + offset) as usize;
    // trace[d] holds v[-d..=d] as it was before round d started
    let mut trace: Vec<Vec<isize>> = Vec::new();

    let mut end_d = 0;
    'outer: for d in 0..=max {
        trace.push(v[idx(-d)..=idx(d)].to_vec());
        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && v[idx(k - 1)] < v[idx(k + 1)]) {
                v[idx(k + 1)]
            } else {
                v[idx(k - 1)] + 1
            };
            let mut y = x - k;
            while x < n && y < m && old[x as usize] == new[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx(k)] = x;
            if x >= n && y >= m {
                end_d = d;
                break 'outer;
            }
            k += 2;
        }
    }

    backtrack(&trace, end_d, n, m)
}

fn backtrack(trace: &[Vec<isize>], end_d: isize, n: isize, m: isize) -> Vec<Move> {
    let mut moves = Vec::with_capacity((n + m) as usize);
    let mut x = n;
    let mut y = m;

    let mut d = end_d;
    while d > 0 {
        let snapshot = &trace[d as usize];
        let get = |k: isize| snapshot[(k + d) as usize];
        let k = x - y;
        let prev_k = if k == -d || (k != d && get(k - 1) < get(k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = get(prev_k);
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            moves.push(Move::Equal);
            x -= 1;
            y -= 1;
        }
        if x == prev_x {
            moves.push(Move::Insert);
        } else {
            moves.push(Move::Delete);
        }
        x = prev_x;
        y = prev_y;
        d -= 1;
    }

    while x > 0 && y > 0 {
        moves.push(Move::Equal);
        x -= 1;
        y -= 1;
    }

    moves.reverse();
    moves
}

fn group(moves: &[Move]) -> Vec<Operation> {
    let mut ops = Vec::new();
    let mut x = 0;
    let mut y = 0;
    let mut i = 0;

    while i < moves.len() {
        if moves[i] == Move::Equal {
            let (sx, sy) = (x, y);
            while i < moves.len() && moves[i] == Move::Equal {
                x += 1;
                y += 1;
                i += 1;
            }
            ops.push(Operation {
                kind: OpKind::Equal,
                old: sx..x,
                new: sy..y,
            });
            continue;
        }

        let (sx, sy) = (x, y);
        while i < moves.len() && moves[i] != Move::Equal {
            match moves[i] {
                Move::Delete => x += 1,
                Move::Insert => y += 1,
                Move::Equal => {}
            }
            i += 1;
        }
        if x > sx {
            ops.push(Operation {
                kind: OpKind::Delete,
                old: sx..x,
                new: sy..sy,
            });
        }
        if y > sy {
            ops.push(Operation {
                kind: OpKind::Insert,
                old: x..x,
                new: sy..y,
            });
        }
    }

    ops
}
