//! Errors raised while loading inputs, aligning, and gathering the kernel matrix.

/// Everything that can stop a kernel computation.
/// None of these is recoverable at the point it is raised; the binary reports
/// `stage()` and exits with a non-zero status.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("sequence `{label}` has no amino-acid residues")]
    EmptySequence { label: String },

    #[error("malformed parameter file: {reason}")]
    ParameterFile { reason: String },

    #[error("unreadable sequence file: {reason}")]
    SequenceFile { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not allocate {what}")]
    Allocation { what: &'static str },

    #[error("worker for range [{offset}, {}) failed: {reason}", .offset + .count)]
    WorkerFailure {
        offset: usize,
        count: usize,
        reason: String,
    },

    #[error("a different parameter set is already installed in this process")]
    ConfigConflict,

    #[error("residue index {index} is outside the amino-acid alphabet")]
    InvalidResidue { index: u8 },

    #[error("worker count must be at least one")]
    InvalidWorkerCount,

    #[error("{reason}")]
    InvalidArgument { reason: String },
}

impl KernelError {
    /// The pipeline stage an error belongs to, used as the diagnostic prefix.
    pub fn stage(&self) -> &'static str {
        match self {
            KernelError::ParameterFile { .. } => "parameter load",
            KernelError::EmptySequence { .. } | KernelError::SequenceFile { .. } => {
                "sequence load"
            }
            KernelError::Io(_) => "input",
            KernelError::Allocation { .. } | KernelError::InvalidResidue { .. } => "alignment",
            KernelError::WorkerFailure { .. } => "worker gather",
            KernelError::ConfigConflict
            | KernelError::InvalidWorkerCount
            | KernelError::InvalidArgument { .. } => "configuration",
        }
    }
    pub(crate) fn parameter<T: std::fmt::Display>(reason: T) -> Self {
        KernelError::ParameterFile {
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn stage_names() {
        let err = KernelError::EmptySequence {
            label: "seq1".to_string(),
        };
        assert_eq!(err.stage(), "sequence load");
        assert!(err.to_string().contains("seq1"));
        let err = KernelError::WorkerFailure {
            offset: 3,
            count: 4,
            reason: "panicked".to_string(),
        };
        assert_eq!(err.stage(), "worker gather");
        assert_eq!(
            err.to_string(),
            "worker for range [3, 7) failed: panicked"
        );
        assert_eq!(KernelError::parameter("x").stage(), "parameter load");
    }
}
