//! Fixed-point log-domain arithmetic.
//!
//! Every value in the kernel recursion is `SCALE * ln(p)` rounded to an integer.
//! Adding two probabilities is then `max(a, b) + f(|a - b|)` with
//! `f(d) = SCALE * ln(1 + exp(-d / SCALE))`, and `f` is read from a table instead of
//! calling `exp`/`ln` for each cell. Differences beyond the table are treated as if the
//! smaller term were zero.
use crate::{LOG0, SCALE};

/// Number of samples of `f`. One sample per fixed-point unit, so the table covers
/// differences in `[0, LOG_SUM_TABLE_SIZE)`.
pub const LOG_SUM_TABLE_SIZE: usize = 10_000;

lazy_static::lazy_static! {
    static ref LOG_SUM_TABLE: Vec<i64> = {
        let scale = SCALE as f64;
        (0..LOG_SUM_TABLE_SIZE)
            .map(|i| (scale * (1f64 + (-(i as f64) / scale).exp()).ln()).round() as i64)
            .collect()
    };
}

/// Build the table now instead of on the first `log_sum`.
/// Calling this more than once is harmless.
pub fn warm_up() {
    lazy_static::initialize(&LOG_SUM_TABLE);
}

/// `SCALE * ln(exp(p1 / SCALE) + exp(p2 / SCALE))`, approximately.
/// Any value at or below `LOG0` is log-zero, so `log_sum(p, LOG0) == p`.
#[inline]
pub fn log_sum(p1: i64, p2: i64) -> i64 {
    if p1 <= LOG0 {
        return p2.max(LOG0);
    } else if p2 <= LOG0 {
        return p1;
    }
    let (max, diff) = if p1 < p2 { (p2, p2 - p1) } else { (p1, p1 - p2) };
    match LOG_SUM_TABLE.get(diff as usize) {
        Some(correction) => max + correction,
        None => max,
    }
}

/// How two log-domain scores are merged in the recursion.
/// Implemented by zero-sized marker types, so the choice is made when a kernel is
/// constructed and the recursion is monomorphised for it.
pub trait Combine: Clone + std::fmt::Debug + Send + Sync {
    const NAME: &'static str;
    fn combine(a: i64, b: i64) -> i64;
}

/// Sum over all local alignments: the pair-HMM forward score.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSum;
impl Combine for LogSum {
    const NAME: &'static str = "logsum";
    #[inline]
    fn combine(a: i64, b: i64) -> i64 {
        log_sum(a, b)
    }
}

/// Best local alignment only. With this mode the kernel is the Smith-Waterman score
/// (scaled by `beta`), i.e. a Viterbi path score rather than a forward score.
#[derive(Debug, Clone, Copy, Default)]
pub struct Viterbi;
impl Combine for Viterbi {
    const NAME: &'static str = "viterbi";
    #[inline]
    fn combine(a: i64, b: i64) -> i64 {
        a.max(b)
    }
}
