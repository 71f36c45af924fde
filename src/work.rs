//! Work units of the all-pairs computation and their partition into ranges.
//!
//! For a corpus of `n` sequences the work units are the pairs `(i, j)` with `i <= j`,
//! ranked row by row: `(0,0), (0,1), ..., (0,n-1), (1,1), (1,2), ...`.
//! A unit is identified by its rank alone, so a worker only needs `(offset, count)`
//! to know what to compute.
use crate::error::KernelError;
use serde::{Deserialize, Serialize};

/// Number of work units for `n` sequences, `n(n+1)/2`.
pub fn pair_count(n: usize) -> usize {
    n * (n + 1) / 2
}

// Rank of (i, i).
fn row_start(n: usize, i: usize) -> usize {
    i * (2 * n + 1 - i) / 2
}

/// Rank of the pair `(i, j)`, `i <= j < n`.
pub fn rank(n: usize, i: usize, j: usize) -> usize {
    debug_assert!(i <= j && j < n);
    row_start(n, i) + j - i
}

/// The pair with rank `rank`, or `None` if `rank >= pair_count(n)`.
pub fn unit_at(n: usize, rank: usize) -> Option<(usize, usize)> {
    if pair_count(n) <= rank {
        return None;
    }
    // Largest i with row_start(i) <= rank.
    let (mut lo, mut hi) = (0, n);
    while lo + 1 < hi {
        let mid = (lo + hi) / 2;
        if row_start(n, mid) <= rank {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Some((lo, lo + rank - row_start(n, lo)))
}

/// A contiguous block of work units: the dispatch message sent to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRange {
    pub offset: usize,
    pub count: usize,
}

impl WorkRange {
    pub fn end(&self) -> usize {
        self.offset + self.count
    }
    /// The pairs of this range, in rank order.
    pub fn units(&self, n: usize) -> WorkUnits {
        let (i, j) = unit_at(n, self.offset).unwrap_or((n, n));
        WorkUnits {
            n,
            i,
            j,
            remaining: self.count.min(pair_count(n).saturating_sub(self.offset)),
        }
    }
}

impl std::fmt::Display for WorkRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.offset, self.end())
    }
}

/// The gather message: the values of one range, in rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeResult {
    pub offset: usize,
    pub count: usize,
    pub values: Vec<f64>,
}

/// Iterator over the `(i, j)` pairs of a range.
/// It decodes the first rank once and then walks the upper triangle.
#[derive(Debug, Clone)]
pub struct WorkUnits {
    n: usize,
    i: usize,
    j: usize,
    remaining: usize,
}

impl std::iter::Iterator for WorkUnits {
    type Item = (usize, usize);
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let unit = (self.i, self.j);
        self.j += 1;
        if self.j == self.n {
            self.i += 1;
            self.j = self.i;
        }
        Some(unit)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl std::iter::ExactSizeIterator for WorkUnits {}

/// The range assigned to worker `rank` out of `workers`.
/// The first `total % workers` workers get one unit more than the others, so the
/// range only depends on `total`, `workers`, and `rank`.
pub fn range_for(total: usize, workers: usize, rank: usize) -> WorkRange {
    let (base, extra) = (total / workers, total % workers);
    WorkRange {
        offset: rank * base + rank.min(extra),
        count: base + if rank < extra { 1 } else { 0 },
    }
}

/// Split `[0, total)` into `workers` contiguous ranges, in order.
/// Ranges are empty when there are more workers than units.
pub fn partition(total: usize, workers: usize) -> Result<Vec<WorkRange>, KernelError> {
    if workers == 0 {
        return Err(KernelError::InvalidWorkerCount);
    }
    Ok((0..workers).map(|r| range_for(total, workers, r)).collect())
}
