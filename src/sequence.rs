//! Index-encoded protein sequences.
use crate::alphabet;
use crate::error::KernelError;

/// Labels are cut to this many characters so the matrix output keeps a fixed column width.
pub const LABEL_WIDTH: usize = 16;

/// A protein sequence reduced to amino-acid indices in `[0, 20)`.
/// It always holds at least one residue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    label: String,
    residues: Vec<u8>,
}

impl Sequence {
    /// Encode `raw`, silently dropping every byte outside the amino-acid alphabet.
    /// Fails with `EmptySequence` if nothing is left.
    /// ```rust
    /// use lakernel::Sequence;
    /// let seq = Sequence::new("q1", b"AAB-rs").unwrap();
    /// assert_eq!(seq.len(), 4);
    /// assert!(Sequence::new("q2", b"BXZ").is_err());
    /// ```
    pub fn new<T: AsRef<[u8]>>(label: &str, raw: T) -> Result<Self, KernelError> {
        let residues: Vec<_> = raw
            .as_ref()
            .iter()
            .filter_map(|&b| alphabet::encode(b))
            .collect();
        Self::from_indices(label, residues)
    }
    /// Wrap already-encoded residues after checking them.
    pub fn from_indices(label: &str, residues: Vec<u8>) -> Result<Self, KernelError> {
        if let Some(&index) = residues
            .iter()
            .find(|&&x| alphabet::ALPHABET_SIZE <= x as usize)
        {
            return Err(KernelError::InvalidResidue { index });
        }
        let label = normalize_label(label);
        if residues.is_empty() {
            return Err(KernelError::EmptySequence { label });
        }
        Ok(Self { label, residues })
    }
    pub fn label(&self) -> &str {
        &self.label
    }
    pub fn len(&self) -> usize {
        self.residues.len()
    }
    /// Always false; kept for the `len`/`is_empty` pair.
    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }
    pub fn residues(&self) -> &[u8] {
        &self.residues
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let letters: String = self
            .residues
            .iter()
            .map(|&x| alphabet::decode(x) as char)
            .collect();
        write!(f, "{}\t{}", self.label, letters)
    }
}

impl std::convert::AsRef<[u8]> for Sequence {
    fn as_ref(&self) -> &[u8] {
        &self.residues
    }
}

// First whitespace-delimited token, cut to `LABEL_WIDTH` characters.
fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .next()
        .unwrap_or("")
        .chars()
        .take(LABEL_WIDTH)
        .collect()
}

/// Encode a batch of `(label, raw)` records, stopping at the first empty one.
pub fn encode_records<L, T>(records: &[(L, T)]) -> Result<Vec<Sequence>, KernelError>
where
    L: AsRef<str>,
    T: AsRef<[u8]>,
{
    records
        .iter()
        .map(|(label, raw)| Sequence::new(label.as_ref(), raw))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn filters_non_amino_acids() {
        let seq = Sequence::new("x", b"AABRS").unwrap();
        // B is an ambiguity code.
        assert_eq!(seq.residues(), &[0, 0, 1, 15]);
        let seq = Sequence::new("x", b"a a\nb-r*s").unwrap();
        assert_eq!(seq.residues(), &[0, 0, 1, 15]);
        assert_eq!(seq.to_string(), "x\tAARS");
    }
    #[test]
    fn empty_sequence() {
        match Sequence::new("void", b"BZX--") {
            Err(KernelError::EmptySequence { label }) => assert_eq!(label, "void"),
            other => panic!("{:?}", other),
        }
        assert!(Sequence::new("void", b"").is_err());
    }
    #[test]
    fn invalid_indices() {
        assert!(matches!(
            Sequence::from_indices("x", vec![0, 19, 20]),
            Err(KernelError::InvalidResidue { index: 20 })
        ));
        assert!(Sequence::from_indices("x", vec![0, 19]).is_ok());
    }
    #[test]
    fn labels() {
        let seq = Sequence::new("sp|P69905|HBA_HUMAN Hemoglobin subunit alpha", b"MVLS").unwrap();
        assert_eq!(seq.label(), "sp|P69905|HBA_HU");
        assert_eq!(seq.label().chars().count(), LABEL_WIDTH);
        let seq = Sequence::new("  short  ", b"MVLS").unwrap();
        assert_eq!(seq.label(), "short");
    }
    #[test]
    fn encode_batch() {
        let records = vec![("a".to_string(), b"ACD".to_vec()), ("b".to_string(), b"XX".to_vec())];
        assert!(encode_records(&records).is_err());
        let seqs = encode_records(&records[..1]).unwrap();
        assert_eq!(seqs.len(), 1);
    }
}
