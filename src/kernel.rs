//! The local alignment kernel: a five-state pair-HMM over two protein sequences.
//!
//! For sequences `xs` (rows, index `i`) and `ys` (columns, index `j`) the states are
//!
//! - `Mat`: `xs[i]` aligned with `ys[j]`,
//! - `GapX` / `GapY`: inside a gap with affine cost,
//! - `ClosedX` / `ClosedY`: the alignment has already ended; they carry the mass
//!   of every earlier match cell towards the last cell without paying gap costs.
//!
//! ```text
//! GapX[i,j]    = c(Mat[i-1,j] - open, GapX[i-1,j] - ext)
//! ClosedX[i,j] = c(Mat[i-1,j], ClosedX[i-1,j])
//! GapY[i,j]    = c(c(Mat[i,j-1] - open, GapY[i,j-1] - ext), GapX[i,j-1] - open)
//! ClosedY[i,j] = c(c(Mat[i,j-1], ClosedY[i,j-1]), ClosedX[i,j-1])
//! Mat[i,j]     = c(c(GapX[i-1,j-1], GapY[i-1,j-1]), c(0, Mat[i-1,j-1])) + s(xs[i], ys[j])
//! kernel       = c(c(ClosedX[n,m], ClosedY[n,m]), c(0, Mat[n,m])) / SCALE
//! ```
//!
//! where `c` is `Combine::combine` and row/column 0 are `LOG0`.
//! The `0` inside `Mat` lets a local alignment start at any cell.
use crate::error::KernelError;
use crate::logspace::{Combine, LogSum};
use crate::params::KernelParams;
use crate::sequence::Sequence;
use crate::{LOG0, SCALE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Mat,
    GapX,
    GapY,
    ClosedX,
    ClosedY,
}
const STATES: usize = 5;

// Two rows of the DP table for each state. Row `i` lives at parity `i & 1`,
// so only the current and the previous row are ever kept.
#[derive(Debug, Clone)]
struct RollingTable {
    column: usize,
    data: Vec<i64>,
}

impl RollingTable {
    fn new(column: usize) -> Result<Self, KernelError> {
        let len = 2 * STATES * column;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| KernelError::Allocation { what: "DP buffers" })?;
        data.resize(len, LOG0);
        Ok(Self { column, data })
    }
    #[inline]
    fn index(&self, parity: usize, j: usize, state: State) -> usize {
        (parity * STATES + state as usize) * self.column + j
    }
    #[inline]
    fn get(&self, parity: usize, j: usize, state: State) -> i64 {
        self.data[self.index(parity, j, state)]
    }
    #[inline]
    fn get_mut(&mut self, parity: usize, j: usize, state: State) -> &mut i64 {
        let idx = self.index(parity, j, state);
        &mut self.data[idx]
    }
}

/// A local alignment kernel bound to one parameter set.
/// The type parameter fixes how scores are merged: `LogSum` (default) sums over every
/// local alignment, `Viterbi` keeps only the best one and reduces to Smith-Waterman.
/// ```rust
/// use lakernel::{KernelParams, LocalAlignmentKernel, Sequence};
/// let params = KernelParams::default();
/// let kernel: LocalAlignmentKernel = LocalAlignmentKernel::new(&params);
/// let xs = Sequence::new("x", b"AABRS").unwrap();
/// let ys = Sequence::new("y", b"AABRT").unwrap();
/// let k = kernel.align(&xs, &ys).unwrap();
/// assert_eq!(k, kernel.align(&xs, &ys).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct LocalAlignmentKernel<'a, C: Combine = LogSum> {
    params: &'a KernelParams,
    _mode: std::marker::PhantomData<C>,
}

impl<'a, C: Combine> LocalAlignmentKernel<'a, C> {
    pub fn new(params: &'a KernelParams) -> Self {
        crate::logspace::warm_up();
        Self {
            params,
            _mode: std::marker::PhantomData,
        }
    }
    pub fn params(&self) -> &'a KernelParams {
        self.params
    }
    /// Kernel value between two sequences, as a scaled log-score (not a probability).
    /// Memory is proportional to `ys.len()`, so pass the shorter sequence second
    /// for very long inputs. The value depends on the argument order only through the
    /// asymmetric gap transition, so the matrix driver always calls it with `i <= j`.
    pub fn align(&self, xs: &Sequence, ys: &Sequence) -> Result<f64, KernelError> {
        self.forward(xs.residues(), ys.residues())
    }
    /// Same as `align` on raw residue indices, validating them first.
    pub fn score(&self, xs: &[u8], ys: &[u8]) -> Result<f64, KernelError> {
        for (seq, label) in [(xs, "xs"), (ys, "ys")].iter() {
            if seq.is_empty() {
                return Err(KernelError::EmptySequence {
                    label: label.to_string(),
                });
            }
            if let Some(&index) = seq
                .iter()
                .find(|&&x| crate::alphabet::ALPHABET_SIZE <= x as usize)
            {
                return Err(KernelError::InvalidResidue { index });
            }
        }
        self.forward(xs, ys)
    }
    fn forward(&self, xs: &[u8], ys: &[u8]) -> Result<f64, KernelError> {
        let params = self.params;
        let (open, ext) = (params.gap_open, params.gap_extend);
        let mut dp = RollingTable::new(ys.len() + 1)?;
        for (i, &x) in xs.iter().enumerate().map(|(p, x)| (p + 1, x)) {
            let (cur, prev) = (i & 1, (i - 1) & 1);
            for (j, &y) in ys.iter().enumerate().map(|(p, y)| (p + 1, y)) {
                let gap_x = C::combine(
                    dp.get(prev, j, State::Mat) - open,
                    dp.get(prev, j, State::GapX) - ext,
                );
                let closed_x = C::combine(
                    dp.get(prev, j, State::Mat),
                    dp.get(prev, j, State::ClosedX),
                );
                let gap_y = C::combine(
                    C::combine(
                        dp.get(cur, j - 1, State::Mat) - open,
                        dp.get(cur, j - 1, State::GapY) - ext,
                    ),
                    dp.get(cur, j - 1, State::GapX) - open,
                );
                let closed_y = C::combine(
                    C::combine(
                        dp.get(cur, j - 1, State::Mat),
                        dp.get(cur, j - 1, State::ClosedY),
                    ),
                    dp.get(cur, j - 1, State::ClosedX),
                );
                let mat = C::combine(
                    C::combine(
                        dp.get(prev, j - 1, State::GapX),
                        dp.get(prev, j - 1, State::GapY),
                    ),
                    C::combine(0, dp.get(prev, j - 1, State::Mat)),
                ) + params.substitution(x, y);
                *dp.get_mut(cur, j, State::GapX) = gap_x;
                *dp.get_mut(cur, j, State::ClosedX) = closed_x;
                *dp.get_mut(cur, j, State::GapY) = gap_y;
                *dp.get_mut(cur, j, State::ClosedY) = closed_y;
                *dp.get_mut(cur, j, State::Mat) = mat;
            }
        }
        let (last, m) = (xs.len() & 1, ys.len());
        let total = C::combine(
            C::combine(
                dp.get(last, m, State::ClosedX),
                dp.get(last, m, State::ClosedY),
            ),
            C::combine(0, dp.get(last, m, State::Mat)),
        );
        let kernel = total as f64 / SCALE as f64;
        trace!("{}\t{}x{}\t{}", C::NAME, xs.len(), ys.len(), kernel);
        Ok(kernel)
    }
}
