//! Voice codeword de-interleaving.
//!
//! Each voice LDU carries nine 144-bit IMBE codewords. A codeword occupies a
//! 148-bit span of the unit (two status dibits fall inside every span), and
//! its bits are spread by a fixed permutation that pairs adjacent rows of the
//! 24x6 interleave matrix.

use crate::defaults::{CODEWORDS_PER_LDU, CODEWORD_BITS, CODEWORD_BYTES, LDU_PAYLOAD_BYTES};
use crate::fec;
use crate::ldu::is_status_bit;

/// Start positions of the nine voice codewords within the 1728-bit unit.
pub const CODEWORD_OFFSETS: [usize; 9] = [114, 262, 452, 640, 830, 1020, 1208, 1398, 1578];

/// De-interleave permutation: transmitted bit `t` lands at codeword bit
/// `INTERLEAVE[t]`.
pub const INTERLEAVE: [usize; 144] = [
    0, 24, 48, 72, 96, 120, //
    25, 1, 73, 49, 121, 97, //
    2, 26, 50, 74, 98, 122, //
    27, 3, 75, 51, 123, 99, //
    4, 28, 52, 76, 100, 124, //
    29, 5, 77, 53, 125, 101, //
    6, 30, 54, 78, 102, 126, //
    31, 7, 79, 55, 127, 103, //
    8, 32, 56, 80, 104, 128, //
    33, 9, 81, 57, 129, 105, //
    10, 34, 58, 82, 106, 130, //
    35, 11, 83, 59, 131, 107, //
    12, 36, 60, 84, 108, 132, //
    37, 13, 85, 61, 133, 109, //
    14, 38, 62, 86, 110, 134, //
    39, 15, 87, 63, 135, 111, //
    16, 40, 64, 88, 112, 136, //
    41, 17, 89, 65, 137, 113, //
    18, 42, 66, 90, 114, 138, //
    43, 19, 91, 67, 139, 115, //
    20, 44, 68, 92, 116, 140, //
    45, 21, 93, 69, 141, 117, //
    22, 46, 70, 94, 118, 142, //
    47, 23, 95, 71, 143, 119, //
];

/// Frame-bit positions of a codeword's 144 transmitted bits, in transmission
/// order (status dibits skipped).
pub fn codeword_bit_positions(index: usize) -> [usize; CODEWORD_BITS] {
    assert!(index < CODEWORDS_PER_LDU);
    let mut positions = [0usize; CODEWORD_BITS];
    let mut pos = CODEWORD_OFFSETS[index];
    for slot in positions.iter_mut() {
        while is_status_bit(pos) {
            pos += 1;
        }
        *slot = pos;
        pos += 1;
    }
    positions
}

/// Pull one de-interleaved codeword out of an unpacked 1728-bit unit.
pub fn extract_codeword(bits: &[bool], index: usize) -> [bool; CODEWORD_BITS] {
    let mut cw = [false; CODEWORD_BITS];
    for (t, pos) in codeword_bit_positions(index).iter().enumerate() {
        cw[INTERLEAVE[t]] = bits[*pos];
    }
    cw
}

/// Place a codeword into an unpacked unit (inverse of [`extract_codeword`]);
/// used to generate loopback test captures.
pub fn insert_codeword(bits: &mut [bool], index: usize, cw: &[bool; CODEWORD_BITS]) {
    for (t, pos) in codeword_bit_positions(index).iter().enumerate() {
        bits[*pos] = cw[INTERLEAVE[t]];
    }
}

/// Extract all nine codewords from an LDU payload, packed to 18 bytes each.
pub fn extract_codewords(payload: &[u8]) -> Vec<[u8; CODEWORD_BYTES]> {
    if payload.len() < LDU_PAYLOAD_BYTES {
        return Vec::new();
    }
    let bits = fec::unpack_bits(&payload[..LDU_PAYLOAD_BYTES]);

    (0..CODEWORDS_PER_LDU)
        .map(|index| {
            let cw = extract_codeword(&bits, index);
            let packed = fec::pack_bits(&cw);
            let mut out = [0u8; CODEWORD_BYTES];
            out.copy_from_slice(&packed);
            out
        })
        .collect()
}
