//! The fixed amino-acid alphabet.
//!
//! Residues are encoded as indices in [0, 20) following the order of `AMINO_ACIDS`,
//! which is also the row/column order of the parameter file. Every other byte,
//! including ambiguity codes such as B, Z, X and gap characters, maps to `NOT_AMINO_ACID`
//! and is dropped when a sequence is built.

/// The twenty canonical amino acids, in parameter-file order.
pub const AMINO_ACIDS: &[u8; ALPHABET_SIZE] = b"ARNDCQEGHILKMFPSTWYV";
pub const ALPHABET_SIZE: usize = 20;
pub(crate) const NOT_AMINO_ACID: u8 = 0xff;

const fn lookup_table() -> [u8; 256] {
    let mut slots = [NOT_AMINO_ACID; 256];
    let mut i = 0;
    while i < ALPHABET_SIZE {
        let upper = AMINO_ACIDS[i];
        slots[upper as usize] = i as u8;
        slots[upper.to_ascii_lowercase() as usize] = i as u8;
        i += 1;
    }
    slots
}
pub(crate) const LOOKUP_TABLE: [u8; 256] = lookup_table();

/// Index of an amino-acid letter (either case), or `None` for anything else.
pub const fn encode(residue: u8) -> Option<u8> {
    match LOOKUP_TABLE[residue as usize] {
        NOT_AMINO_ACID => None,
        idx => Some(idx),
    }
}

/// Upper-case letter of an index. Panics if `index` is out of the alphabet.
pub fn decode(index: u8) -> u8 {
    AMINO_ACIDS[index as usize]
}
