//! Local alignment kernel for protein sequences.
//!
//! The kernel value between two sequences is the (log) total weight of every local
//! alignment between them under a pair-HMM with a substitution matrix and affine gaps,
//! a soft version of the Smith-Waterman score that can be used as a kernel for
//! sequence classifiers. `pairwise` computes the symmetric kernel matrix of a corpus
//! with a fixed pool of workers.
#[macro_use]
extern crate log;
pub mod alphabet;
pub mod error;
pub mod fasta;
pub mod gen_seq;
pub mod kernel;
pub mod logspace;
pub mod pairwise;
pub mod params;
pub mod sequence;
pub mod work;

pub use error::KernelError;
pub use kernel::LocalAlignmentKernel;
pub use logspace::{Combine, LogSum, Viterbi};
pub use pairwise::{Backend, DriverConfig, KernelMatrix};
pub use params::KernelParams;
pub use sequence::Sequence;

/// Fixed-point factor: log-domain scores are stored as `round(SCALE * x)`.
pub const SCALE: i64 = 1000;
/// Log of probability zero. Anything at or below it is treated as impossible.
pub const LOG0: i64 = -100_000_000;

/// Kernel matrix of `records` (`(label, raw sequence)` pairs) in the default,
/// log-sum mode.
pub fn kernel_matrix<L, T>(
    records: &[(L, T)],
    params: &KernelParams,
    config: &DriverConfig,
) -> Result<KernelMatrix, KernelError>
where
    L: AsRef<str>,
    T: AsRef<[u8]>,
{
    let seqs = sequence::encode_records(records)?;
    let kernel: LocalAlignmentKernel = LocalAlignmentKernel::new(params);
    pairwise::compute_all_pairs(&kernel, &seqs, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn end_to_end_pair() {
        let params = KernelParams::default();
        let records = vec![("X", b"AABRS".to_vec()), ("Y", b"AABRT".to_vec())];
        let matrix = kernel_matrix(&records, &params, &DriverConfig::new(2, Backend::Rayon, 0)).unwrap();
        let kernel: LocalAlignmentKernel = LocalAlignmentKernel::new(&params);
        let xs = Sequence::new("X", b"AABRS").unwrap();
        let ys = Sequence::new("Y", b"AABRT").unwrap();
        let xy = kernel.align(&xs, &ys).unwrap();
        assert_eq!(matrix.get(0, 1), xy);
        assert_eq!(matrix.get(1, 0), xy);
        assert_eq!(matrix.get(0, 0), kernel.align(&xs, &xs).unwrap());
        assert_eq!(matrix.get(1, 1), kernel.align(&ys, &ys).unwrap());
        assert_eq!(format!("{:.5}", xy), format!("{:.5}", kernel.align(&xs, &ys).unwrap()));
        assert_eq!(matrix.labels(), &["X".to_string(), "Y".to_string()]);
    }
    #[test]
    fn empty_record_aborts() {
        let params = KernelParams::default();
        let records = vec![("X", b"AABRS".to_vec()), ("Y", b"123".to_vec())];
        match kernel_matrix(&records, &params, &DriverConfig::default()) {
            Err(KernelError::EmptySequence { label }) => assert_eq!(label, "Y"),
            other => panic!("{:?}", other),
        }
    }
}
