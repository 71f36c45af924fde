//! Substitution and gap parameters of the kernel.
//!
//! A parameter set is read from a stream of 213 numbers: the lower triangle of a
//! 20x20 substitution matrix (row-major, `i >= j`, in `alphabet::AMINO_ACIDS` order),
//! followed by `beta`, the gap-open penalty and the gap-extension penalty.
//! Every score is multiplied by `beta * SCALE` and rounded once, here, so the
//! recursion only ever adds integers.
use crate::alphabet::ALPHABET_SIZE;
use crate::error::KernelError;
use crate::SCALE;
use serde::{Deserialize, Serialize};
use std::io::BufRead;

/// Number of entries of the lower-triangular substitution matrix.
pub const TRIANGLE_LEN: usize = ALPHABET_SIZE * (ALPHABET_SIZE + 1) / 2;
/// Number of values in a parameter file.
pub const PARAMETER_COUNT: usize = TRIANGLE_LEN + 3;
/// Largest magnitude a scaled score may have. Sums of such scores over any realistic
/// sequence length stay far from `i64` overflow, even next to `LOG0`.
pub const MAX_SCALED: f64 = 1e12;

/// Scaled, immutable kernel parameters.
/// Build one with `from_raw`, `from_reader`, or `from_path` and pass it by reference;
/// it is never modified afterwards and can be shared across worker threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelParams {
    /// The `beta` all scores were multiplied by.
    pub beta: f64,
    /// `beta * SCALE * s(i, j)`, symmetric.
    substitution: [[i64; ALPHABET_SIZE]; ALPHABET_SIZE],
    /// `beta * SCALE * gap open`, non-negative.
    pub gap_open: i64,
    /// `beta * SCALE * gap extension`, non-negative.
    pub gap_extend: i64,
}

impl KernelParams {
    /// Build from the 213 raw values of a parameter file.
    /// Values after the 213th are ignored.
    pub fn from_raw(raw: &[f64]) -> Result<Self, KernelError> {
        if raw.len() < PARAMETER_COUNT {
            return Err(KernelError::parameter(format!(
                "expected {} values, found {}",
                PARAMETER_COUNT,
                raw.len()
            )));
        }
        if PARAMETER_COUNT < raw.len() {
            warn!(
                "Parameter list has {} values. Only the first {} are used.",
                raw.len(),
                PARAMETER_COUNT
            );
        }
        if let Some(pos) = raw[..PARAMETER_COUNT].iter().position(|x| !x.is_finite()) {
            return Err(KernelError::parameter(format!(
                "value #{} is not finite",
                pos + 1
            )));
        }
        let (triangle, rest) = raw[..PARAMETER_COUNT].split_at(TRIANGLE_LEN);
        let (beta, gap_open, gap_extend) = (rest[0], rest[1], rest[2]);
        if beta <= 0f64 {
            return Err(KernelError::parameter(format!(
                "beta must be positive, found {}",
                beta
            )));
        }
        if gap_open < 0f64 || gap_extend < 0f64 {
            return Err(KernelError::parameter(format!(
                "gap penalties must be non-negative (open {}, extend {})",
                gap_open, gap_extend
            )));
        }
        let factor = beta * SCALE as f64;
        if let Some(pos) = raw[..PARAMETER_COUNT]
            .iter()
            .enumerate()
            .filter(|&(pos, _)| pos != TRIANGLE_LEN)
            .find(|&(_, x)| MAX_SCALED < (x * factor).abs())
            .map(|(pos, _)| pos)
        {
            return Err(KernelError::parameter(format!(
                "value #{} ({}) is too large after scaling by beta * {}",
                pos + 1,
                raw[pos],
                SCALE
            )));
        }
        let scale = |x: f64| (x * factor).round() as i64;
        let mut substitution = [[0i64; ALPHABET_SIZE]; ALPHABET_SIZE];
        let mut entries = triangle.iter();
        for i in 0..ALPHABET_SIZE {
            for j in 0..=i {
                // `triangle` holds exactly TRIANGLE_LEN values.
                let score = entries.next().map(|&x| scale(x)).unwrap_or(0);
                substitution[i][j] = score;
                substitution[j][i] = score;
            }
        }
        debug!(
            "Parameters: beta={}, gap open={}, gap extend={} (scaled {}, {})",
            beta,
            gap_open,
            gap_extend,
            scale(gap_open),
            scale(gap_extend)
        );
        Ok(Self {
            beta,
            substitution,
            gap_open: scale(gap_open),
            gap_extend: scale(gap_extend),
        })
    }
    /// Parse a whitespace/newline separated stream of numbers.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, KernelError> {
        let mut raw = Vec::with_capacity(PARAMETER_COUNT);
        for line in reader.lines() {
            let line = line.map_err(KernelError::parameter)?;
            for token in line.split_whitespace() {
                let value: f64 = token.parse().map_err(|_| {
                    KernelError::parameter(format!(
                        "value #{} (`{}`) is not a number",
                        raw.len() + 1,
                        token
                    ))
                })?;
                raw.push(value);
            }
        }
        Self::from_raw(&raw)
    }
    /// Read a parameter file.
    pub fn from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self, KernelError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|why| {
            KernelError::parameter(format!("cannot open {}: {}", path.display(), why))
        })?;
        Self::from_reader(std::io::BufReader::new(file))
    }
    /// BLOSUM62 with the given `beta` and (unscaled) gap penalties.
    pub fn blosum62(beta: f64, gap_open: f64, gap_extend: f64) -> Result<Self, KernelError> {
        let raw: Vec<f64> = BLOSUM62_TRIANGLE
            .iter()
            .map(|&x| x as f64)
            .chain(vec![beta, gap_open, gap_extend])
            .collect();
        Self::from_raw(&raw)
    }
    /// Scaled score of aligning residue `x` against residue `y`.
    #[inline]
    pub fn substitution(&self, x: u8, y: u8) -> i64 {
        self.substitution[x as usize][y as usize]
    }
}

impl std::default::Default for KernelParams {
    /// BLOSUM62, `beta = 0.5`, gap open 11, gap extension 1.
    fn default() -> Self {
        // The built-in values always pass validation.
        match Self::blosum62(0.5, 11f64, 1f64) {
            Ok(params) => params,
            Err(why) => unreachable!("{}", why),
        }
    }
}

static INSTALLED: std::sync::OnceLock<KernelParams> = std::sync::OnceLock::new();

/// Store `params` as the process-wide parameter set and return the stored value.
/// Installing the same parameters again is a no-op. Installing different parameters
/// after the first call fails with `ConfigConflict` rather than being ignored.
/// Concurrent first calls are serialised; exactly one value is ever stored.
pub fn install(params: KernelParams) -> Result<&'static KernelParams, KernelError> {
    let stored = INSTALLED.get_or_init(|| params.clone());
    if *stored == params {
        Ok(stored)
    } else {
        Err(KernelError::ConfigConflict)
    }
}

/// The process-wide parameter set, if one was installed.
pub fn installed() -> Option<&'static KernelParams> {
    INSTALLED.get()
}

// BLOSUM62, lower triangle in ARNDCQEGHILKMFPSTWYV order.
#[rustfmt::skip]
const BLOSUM62_TRIANGLE: [i8; TRIANGLE_LEN] = [
     4,
    -1,  5,
    -2,  0,  6,
    -2, -2,  1,  6,
     0, -3, -3, -3,  9,
    -1,  1,  0,  0, -3,  5,
    -1,  0,  0,  2, -4,  2,  5,
     0, -2,  0, -1, -3, -2, -2,  6,
    -2,  0,  1, -1, -3,  0,  0, -2,  8,
    -1, -3, -3, -3, -1, -3, -3, -4, -3,  4,
    -1, -2, -3, -4, -1, -2, -3, -4, -3,  2,  4,
    -1,  2,  0, -1, -3,  1,  1, -2, -1, -3, -2,  5,
    -1, -1, -2, -3, -1,  0, -2, -3, -2,  1,  2, -1,  5,
    -2, -3, -3, -3, -2, -3, -3, -3, -1,  0,  0, -3,  0,  6,
    -1, -2, -2, -1, -3, -1, -1, -2, -2, -3, -3, -1, -2, -4,  7,
     1, -1,  1,  0, -1,  0,  0,  0, -1, -2, -2,  0, -1, -2, -1,  4,
     0, -1,  0, -1, -1, -1, -1, -2, -2, -1, -1, -1, -1, -2, -1,  1,  5,
    -3, -3, -4, -4, -2, -2, -3, -2, -2, -3, -2, -3, -1,  1, -4, -3, -2, 11,
    -2, -2, -2, -3, -2, -1, -2, -3,  2, -1, -1, -2, -1,  3, -3, -2, -2,  2,  7,
     0, -3, -3, -3, -1, -2, -2, -3, -3,  3,  1, -2,  1, -1, -2, -2,  0, -3, -1,  4,
];

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::alphabet::encode;
    // A small matrix: +5 on the diagonal, -1 elsewhere, beta 0.2, gaps 4/1.
    pub(crate) fn toy_raw() -> Vec<f64> {
        let mut raw = vec![];
        for i in 0..ALPHABET_SIZE {
            for j in 0..=i {
                raw.push(if i == j { 5f64 } else { -1f64 });
            }
        }
        raw.extend(vec![0.2, 4f64, 1f64]);
        raw
    }
    pub(crate) fn toy() -> KernelParams {
        KernelParams::from_raw(&toy_raw()).unwrap()
    }
    #[test]
    fn scaling() {
        let params = toy();
        assert_eq!(params.substitution(3, 3), 1000);
        assert_eq!(params.substitution(3, 7), -200);
        assert_eq!(params.gap_open, 800);
        assert_eq!(params.gap_extend, 200);
    }
    #[test]
    fn lower_triangle_order() {
        let params = KernelParams::blosum62(1f64, 11f64, 1f64).unwrap();
        let s = |x: u8, y: u8| params.substitution(encode(x).unwrap(), encode(y).unwrap());
        assert_eq!(s(b'A', b'A'), 4000);
        assert_eq!(s(b'W', b'W'), 11000);
        assert_eq!(s(b'R', b'K'), 2000);
        assert_eq!(s(b'K', b'R'), 2000);
        assert_eq!(s(b'Y', b'H'), 2000);
        assert_eq!(s(b'V', b'I'), 3000);
        assert_eq!(s(b'P', b'F'), -4000);
        for x in 0..ALPHABET_SIZE as u8 {
            for y in 0..ALPHABET_SIZE as u8 {
                assert_eq!(params.substitution(x, y), params.substitution(y, x));
            }
        }
    }
    #[test]
    fn from_reader() {
        let text: String = toy_raw()
            .iter()
            .enumerate()
            .map(|(i, x)| format!("{}{}", x, if i % 7 == 6 { "\n" } else { "  " }))
            .collect();
        let params = KernelParams::from_reader(text.as_bytes()).unwrap();
        assert_eq!(params, toy());
    }
    #[test]
    fn malformed() {
        let raw = toy_raw();
        let short = KernelParams::from_raw(&raw[..PARAMETER_COUNT - 1]);
        assert!(matches!(short, Err(KernelError::ParameterFile { .. })));
        let mut negative = raw.clone();
        negative[PARAMETER_COUNT - 1] = -1f64;
        assert!(KernelParams::from_raw(&negative).is_err());
        let mut nan = raw.clone();
        nan[10] = f64::NAN;
        assert!(KernelParams::from_raw(&nan).is_err());
        for &beta in &[0f64, -0.2] {
            let mut raw = raw.clone();
            raw[TRIANGLE_LEN] = beta;
            let err = KernelParams::from_raw(&raw).unwrap_err();
            assert!(err.to_string().contains("beta"), "{}", err);
        }
        let mut huge_gap = raw.clone();
        huge_gap[TRIANGLE_LEN + 1] = 1e300;
        let err = KernelParams::from_raw(&huge_gap).unwrap_err();
        assert!(err.to_string().contains("too large"), "{}", err);
        let mut huge_score = raw.clone();
        huge_score[3] = -1e15;
        assert!(matches!(
            KernelParams::from_raw(&huge_score),
            Err(KernelError::ParameterFile { .. })
        ));
        let mut large_beta = raw.clone();
        large_beta[TRIANGLE_LEN] = 1e5;
        assert!(KernelParams::from_raw(&large_beta).is_ok());
        let err = KernelParams::from_reader("1 2 three".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("three"), "{}", err);
        let err = KernelParams::from_path("/nonexistent/params.txt").unwrap_err();
        assert_eq!(err.stage(), "parameter load");
    }
    #[test]
    fn install_once() {
        let first = install(KernelParams::default()).unwrap();
        assert_eq!(first, &KernelParams::default());
        let again = install(KernelParams::default()).unwrap();
        assert!(std::ptr::eq(first, again));
        assert!(matches!(install(toy()), Err(KernelError::ConfigConflict)));
        assert_eq!(installed(), Some(first));
    }
    #[test]
    fn install_from_threads() {
        let stored: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| install(KernelParams::default()).map(|p| p as *const _ as usize)))
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        assert!(stored.windows(2).all(|w| w[0] == w[1]));
    }
}
