//! IUPAC ambiguity codes and DNA sequence utilities

use once_cell::sync::Lazy;

/// Standard DNA bases
pub const STANDARD_BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Ambiguity codes understood by the ambiguity-aware scoring matrices
pub const AMBIGUITY_CODES: [u8; 11] = [b'B', b'D', b'H', b'V', b'R', b'Y', b'K', b'M', b'S', b'W', b'N'];

/// Complement of every byte; unknown bytes map to themselves.
/// Case is preserved so lowercase-masked templates keep their mask.
pub static COMPLEMENT: Lazy<[u8; 256]> = Lazy::new(|| {
    let mut table = [0u8; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = i as u8;
    }
    let pairs: [(u8, u8); 15] = [
        (b'A', b'T'),
        (b'T', b'A'),
        (b'U', b'A'),
        (b'C', b'G'),
        (b'G', b'C'),
        (b'R', b'Y'),
        (b'Y', b'R'),
        (b'S', b'S'),
        (b'W', b'W'),
        (b'K', b'M'),
        (b'M', b'K'),
        (b'B', b'V'),
        (b'V', b'B'),
        (b'D', b'H'),
        (b'H', b'D'),
    ];
    for (from, to) in pairs {
        table[from as usize] = to;
        table[from.to_ascii_lowercase() as usize] = to.to_ascii_lowercase();
    }
    table
});

/// Convert a DNA base byte to its bitmask (bit 0 = A, bit 1 = C, bit 2 = G,
/// bit 3 = T). Also handles IUPAC ambiguity codes.
/// Returns 0 for unrecognized bytes.
#[inline]
pub fn base_to_bit(b: u8) -> u8 {
    match b.to_ascii_uppercase() {
        b'A' => 0b0001,
        b'C' => 0b0010,
        b'G' => 0b0100,
        b'T' => 0b1000,
        b'R' => 0b0101,
        b'Y' => 0b1010,
        b'S' => 0b0110,
        b'W' => 0b1001,
        b'K' => 0b1100,
        b'M' => 0b0011,
        b'B' => 0b1110,
        b'D' => 0b1101,
        b'H' => 0b1011,
        b'V' => 0b0111,
        b'N' => 0b1111,
        _ => 0,
    }
}

/// Concrete bases represented by an IUPAC code, in A,C,G,T order.
pub fn concrete_bases(code: u8) -> Vec<u8> {
    let mask = base_to_bit(code);
    STANDARD_BASES
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, &b)| b)
        .collect()
}

/// Check if a byte is a standard DNA base
#[inline]
pub fn is_standard_base(b: u8) -> bool {
    matches!(b, b'A' | b'C' | b'G' | b'T')
}

/// Check if a byte is a valid DNA character (including ambiguity codes), any case
#[inline]
pub fn is_valid_dna(b: u8) -> bool {
    base_to_bit(b) != 0
}

/// Check if a byte is a G or C, any case
#[inline]
pub fn is_gc(b: u8) -> bool {
    matches!(b, b'G' | b'C' | b'g' | b'c')
}

/// Compute the reverse complement of a DNA sequence
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| COMPLEMENT[b as usize]).collect()
}

/// Upper-case a sequence, replacing unrecognized letters with `N`.
/// Returns the cleaned sequence and the first unrecognized byte, if any.
pub fn normalize_dna(seq: &[u8]) -> (Vec<u8>, Option<u8>) {
    let mut offender = None;
    let cleaned = seq
        .iter()
        .map(|&b| {
            let up = b.to_ascii_uppercase();
            if is_valid_dna(up) {
                up
            } else {
                if offender.is_none() {
                    offender = Some(b);
                }
                b'N'
            }
        })
        .collect();
    (cleaned, offender)
}
